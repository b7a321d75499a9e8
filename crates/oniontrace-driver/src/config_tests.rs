use super::*;

fn base(mode: Mode, trace_file: PathBuf) -> Config {
    Config {
        mode,
        trace_file,
        control_port: 9051,
        run_time_seconds: 0,
        id: "test".into(),
    }
}

#[test]
fn rejects_zero_control_port() {
    let mut cfg = base(Mode::Record, PathBuf::from("/tmp/doesnotneedtoexist.trace"));
    cfg.control_port = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn play_mode_requires_existing_trace_file() {
    let cfg = base(Mode::Play, PathBuf::from("/nonexistent/path/trace.jsonl"));
    assert!(cfg.validate().is_err());
}

#[test]
fn play_mode_accepts_existing_trace_file() -> anyhow::Result<()> {
    let tmp = tempfile::NamedTempFile::new()?;
    let cfg = base(Mode::Play, tmp.path().to_path_buf());
    assert!(cfg.validate().is_ok());
    Ok(())
}

#[test]
fn record_mode_does_not_require_trace_file_to_preexist() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = base(Mode::Record, dir.path().join("out.trace"));
    assert!(cfg.validate().is_ok());
    Ok(())
}
