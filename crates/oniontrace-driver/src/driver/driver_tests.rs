use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use super::*;
use crate::config::Config;

async fn mock_router(port_tx: tokio::sync::oneshot::Sender<u16>, trace: Vec<String>) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind");
    let port = listener.local_addr().expect("local_addr").port();
    let _ = port_tx.send(port);

    let (stream, _) = listener.accept().await.expect("accept");
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let auth = lines.next_line().await.expect("read auth").expect("line present");
    assert_eq!(auth, "AUTHENTICATE");
    write_half.write_all(b"250 OK\r\n").await.expect("auth reply");

    let bootstrap = lines.next_line().await.expect("read bootstrap").expect("line present");
    assert_eq!(bootstrap, "GETINFO status/bootstrap-phase");
    write_half
        .write_all(b"250-status/bootstrap-phase=NOTICE BOOTSTRAP PROGRESS=100\r\n")
        .await
        .expect("bootstrap reply");

    let setevents = lines.next_line().await.expect("read setevents").expect("line present");
    assert_eq!(setevents, "SETEVENTS CIRC");
    write_half.write_all(b"250 OK\r\n").await.expect("setevents reply");

    for line in trace {
        write_half.write_all(format!("{line}\r\n").as_bytes()).await.expect("write trace line");
    }

    // Keep the connection open until the driver stops reading from it.
    tokio::time::sleep(Duration::from_secs(5)).await;
}

fn record_config(port: u16, trace_file: PathBuf, run_time_seconds: u64) -> Config {
    Config {
        mode: Mode::Record,
        trace_file,
        control_port: port,
        run_time_seconds,
        id: "test-driver".into(),
    }
}

#[tokio::test(start_paused = true)]
async fn start_rejected_when_not_idle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (port_tx, port_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(mock_router(port_tx, vec![]));
    let port = port_rx.await.expect("router port");

    let config = record_config(port, dir.path().join("t.jsonl"), 0);
    let mut driver = Driver::new(config, EventManager::new());

    driver.start().await.expect("first start succeeds");
    assert!(!driver.state().is_idle());

    let result = driver.start().await;
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn stop_rejected_when_idle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = record_config(9051, dir.path().join("t.jsonl"), 0);
    let mut driver = Driver::new(config, EventManager::new());
    assert!(driver.stop().is_err());
}

/// I4: the heartbeat and (when configured) shutdown timers are registered
/// with the event manager as soon as they're armed, and every registration
/// is gone again once `stop()` frees the timers.
#[tokio::test(start_paused = true)]
async fn timers_are_registered_while_armed_and_deregistered_on_stop() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (port_tx, port_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(mock_router(port_tx, vec![]));
    let port = port_rx.await.expect("router port");

    let config = record_config(port, dir.path().join("t.jsonl"), 5);
    let mut driver = Driver::new(config, EventManager::new());

    assert_eq!(driver.manager.registered_count(), 0);
    driver.start().await.expect("start succeeds");
    assert_eq!(driver.manager.registered_count(), 2);

    driver.stop().expect("stop succeeds");
    assert_eq!(driver.manager.registered_count(), 0);
    driver.free();
}

#[tokio::test(start_paused = true)]
async fn record_scenario_runs_to_recording_and_shuts_down() {
    let dir = tempfile::tempdir().expect("tempdir");
    let trace_file = dir.path().join("t1.jsonl");

    let (port_tx, port_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(mock_router(port_tx, vec![]));
    let port = port_rx.await.expect("router port");

    let config = record_config(port, trace_file.clone(), 5);
    let mut driver = Driver::new(config, EventManager::new());

    // `run()` drives the handshake to Recording, then the paused clock
    // auto-advances through the 1s heartbeat ticks and the 5s shutdown
    // timer since nothing else is runnable in between.
    driver.run().await.expect("run drains until shutdown");

    driver.stop().expect("stop succeeds");
    driver.free();
}

#[tokio::test(start_paused = true)]
async fn empty_play_trace_arms_no_play_timer() {
    let dir = tempfile::tempdir().expect("tempdir");
    let trace_file = dir.path().join("empty.jsonl");
    std::fs::write(&trace_file, "").expect("write empty trace");

    let (port_tx, port_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(mock_router(port_tx, vec![]));
    let port = port_rx.await.expect("router port");

    let config = Config {
        mode: Mode::Play,
        trace_file,
        control_port: port,
        run_time_seconds: 2,
        id: "test-driver".into(),
    };
    let mut driver = Driver::new(config, EventManager::new());
    driver.start().await.expect("start succeeds");

    assert!(matches!(driver.state(), DriverState::Playing(_)));
    if let DriverState::Playing(player) = driver.state() {
        assert_eq!(player.remaining(), 0);
    }
}

/// Scenario: Mode=Play, run_time=10, trace contains one record at t=1s with
/// path [R1,R2,R3]. After bootstrap, the Player issues one launch with that
/// path at t~=1s; state stays Playing throughout.
#[tokio::test(start_paused = true)]
async fn replay_one_issues_the_recorded_path_at_its_scheduled_time() {
    let dir = tempfile::tempdir().expect("tempdir");
    let trace_file = dir.path().join("one.jsonl");
    let record = crate::trace::TraceRecord {
        relative_time_us: 1_000_000,
        path: vec!["R1".into(), "R2".into(), "R3".into()],
        purpose: "general".into(),
    };
    std::fs::write(&trace_file, format!("{}\n", serde_json::to_string(&record).unwrap()))
        .expect("write trace");

    let (port_tx, port_rx) = tokio::sync::oneshot::channel();
    let server = tokio::spawn(async move {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind");
        let port = listener.local_addr().expect("local_addr").port();
        let _ = port_tx.send(port);

        let (stream, _) = listener.accept().await.expect("accept");
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        let auth = lines.next_line().await.expect("read auth").expect("line present");
        assert_eq!(auth, "AUTHENTICATE");
        write_half.write_all(b"250 OK\r\n").await.expect("auth reply");

        let bootstrap = lines.next_line().await.expect("read bootstrap").expect("line present");
        assert_eq!(bootstrap, "GETINFO status/bootstrap-phase");
        write_half
            .write_all(b"250-status/bootstrap-phase=NOTICE BOOTSTRAP PROGRESS=100\r\n")
            .await
            .expect("bootstrap reply");

        let setevents = lines.next_line().await.expect("read setevents").expect("line present");
        assert_eq!(setevents, "SETEVENTS CIRC");
        write_half.write_all(b"250 OK\r\n").await.expect("setevents reply");

        let extend = lines.next_line().await.expect("read extend").expect("line present");
        assert_eq!(extend, "EXTENDCIRCUIT 0 R1,R2,R3 purpose=general");
        write_half.write_all(b"250 EXTENDED 11\r\n").await.expect("extend reply");

        tokio::time::sleep(Duration::from_secs(10)).await;
    });
    let port = port_rx.await.expect("router port");

    let config = Config {
        mode: Mode::Play,
        trace_file,
        control_port: port,
        run_time_seconds: 10,
        id: "test-driver".into(),
    };
    let mut driver = Driver::new(config, EventManager::new());

    driver.run().await.expect("run drains until shutdown");
    assert!(driver.manager.is_stopped());

    driver.free();
    server.abort();
}

/// Scenario 6: the router authenticates but never answers the bootstrap
/// poll. `get_bootstrap_status` has no failure signal by protocol design,
/// so the handshake hangs; the configured shutdown timer is the only thing
/// that bounds it.
#[tokio::test(start_paused = true)]
async fn handshake_hang_on_bootstrap_is_bounded_by_shutdown_timer() {
    let dir = tempfile::tempdir().expect("tempdir");
    let trace_file = dir.path().join("t.jsonl");

    let (port_tx, port_rx) = tokio::sync::oneshot::channel();
    let server = tokio::spawn(async move {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind");
        let port = listener.local_addr().expect("local_addr").port();
        let _ = port_tx.send(port);

        let (stream, _) = listener.accept().await.expect("accept");
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        let auth = lines.next_line().await.expect("read auth").expect("line present");
        assert_eq!(auth, "AUTHENTICATE");
        write_half.write_all(b"250 OK\r\n").await.expect("auth reply");

        // Never answer the bootstrap poll.
        tokio::time::sleep(Duration::from_secs(30)).await;
    });
    let port = port_rx.await.expect("router port");

    let config = record_config(port, trace_file, 2);
    let mut driver = Driver::new(config, EventManager::new());

    driver.start().await.expect("shutdown timer wins the race, not an error");
    assert!(matches!(driver.state(), DriverState::Bootstrapping));

    driver.free();
    server.abort();
}
