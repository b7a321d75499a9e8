// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control client (C3).
//!
//! Realized as `async fn` methods rather than callback/context-pointer
//! pairs — this resolves the open question about owner back-references by
//! construction, since no raw context pointer ever exists. A background
//! task owns the socket's read half and forwards parsed lines to this
//! struct over channels; the struct itself is not `Send` and lives on the
//! driver's single-threaded reactor.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::error::DriverError;

/// Status of a circuit as reported by a `650 CIRC` event line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitStatus {
    Launched,
    Built,
    Extended,
    Failed,
    Closed,
}

impl CircuitStatus {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "LAUNCHED" => Some(Self::Launched),
            "BUILT" => Some(Self::Built),
            "EXTENDED" => Some(Self::Extended),
            "FAILED" => Some(Self::Failed),
            "CLOSED" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// One circuit lifecycle notification, pushed asynchronously by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitEvent {
    pub circ_id: u64,
    pub status: CircuitStatus,
    pub path: Vec<String>,
    pub purpose: String,
}

/// Asynchronous request/response client for the router's control channel.
pub struct ControlClient {
    writer: OwnedWriteHalf,
    replies_rx: mpsc::Receiver<String>,
    events_rx: Option<mpsc::Receiver<CircuitEvent>>,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
}

impl ControlClient {
    /// Initiates the control-channel connection. Connection failure is
    /// reported as `Err`, resolving the spec's open question about
    /// distinguishing connection failure from success.
    pub async fn connect(control_port: u16) -> Result<Self, DriverError> {
        let stream = TcpStream::connect(("127.0.0.1", control_port))
            .await
            .map_err(|e| DriverError::ControlClientFailure(format!("connect: {e}")))?;
        stream.set_nodelay(true).ok();

        let local_addr = stream
            .local_addr()
            .map_err(|e| DriverError::ControlClientFailure(format!("local_addr: {e}")))?;
        let peer_addr = stream
            .peer_addr()
            .map_err(|e| DriverError::ControlClientFailure(format!("peer_addr: {e}")))?;

        let (read_half, writer) = stream.into_split();

        let (replies_tx, replies_rx) = mpsc::channel(16);
        let (events_tx, events_rx) = mpsc::channel(64);

        tokio::spawn(read_loop(read_half, replies_tx, events_tx));

        Ok(Self { writer, replies_rx, events_rx: Some(events_rx), local_addr, peer_addr })
    }

    pub fn local_port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn remote_port(&self) -> u16 {
        self.peer_addr.port()
    }

    async fn send_command(&mut self, command: &str) -> Result<String, DriverError> {
        self.writer
            .write_all(format!("{command}\r\n").as_bytes())
            .await
            .map_err(|e| DriverError::ControlClientFailure(format!("write: {e}")))?;
        self.replies_rx
            .recv()
            .await
            .ok_or_else(|| DriverError::ControlClientFailure("control connection closed".into()))
    }

    /// Sends the authentication command over the open channel.
    pub async fn authenticate(&mut self) -> Result<(), DriverError> {
        let reply = self.send_command("AUTHENTICATE").await?;
        if reply.starts_with("250") {
            Ok(())
        } else {
            Err(DriverError::ControlClientFailure(format!("authenticate rejected: {reply}")))
        }
    }

    /// Polls `GETINFO status/bootstrap-phase` until the router reports
    /// fully bootstrapped. There is no per-command timeout by design; a
    /// hang here is bounded only by the driver's shutdown timer, raced
    /// against this future in the caller's `select!`.
    pub async fn get_bootstrap_status(&mut self) -> Result<(), DriverError> {
        loop {
            let reply = self.send_command("GETINFO status/bootstrap-phase").await?;
            if reply.contains("PROGRESS=100") {
                return Ok(());
            }
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
    }

    /// Subscribes to circuit lifecycle notifications. May only be called
    /// once per connection; the receiver is moved out on success.
    pub async fn subscribe_circuit_events(
        &mut self,
    ) -> Result<mpsc::Receiver<CircuitEvent>, DriverError> {
        let reply = self.send_command("SETEVENTS CIRC").await?;
        if !reply.starts_with("250") {
            return Err(DriverError::ControlClientFailure(format!(
                "SETEVENTS rejected: {reply}"
            )));
        }
        self.events_rx
            .take()
            .ok_or_else(|| DriverError::ControlClientFailure("already subscribed".into()))
    }

    /// Issues a directed circuit construction with an explicit relay path
    /// and returns the router-assigned circuit id.
    pub async fn launch_circuit(&mut self, path: &[String], purpose: &str) -> Result<u64, DriverError> {
        let command = format!("EXTENDCIRCUIT 0 {} purpose={}", path.join(","), purpose);
        let reply = self.send_command(&command).await?;
        parse_extended_reply(&reply)
            .ok_or_else(|| DriverError::CircuitLaunchFailure(format!("unexpected reply: {reply}")))
    }
}

fn parse_extended_reply(reply: &str) -> Option<u64> {
    // "250 EXTENDED <id>"
    if !reply.starts_with("250") {
        return None;
    }
    reply.split_whitespace().last()?.parse().ok()
}

async fn read_loop(
    read_half: tokio::net::tcp::OwnedReadHalf,
    replies_tx: mpsc::Sender<String>,
    events_tx: mpsc::Sender<CircuitEvent>,
) {
    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(event) = parse_circ_event(&line) {
                    if events_tx.send(event).await.is_err() {
                        break;
                    }
                } else if replies_tx.send(line).await.is_err() {
                    break;
                }
            }
            Ok(None) | Err(_) => break,
        }
    }
}

/// Parses a `650 CIRC <id> <STATUS> <path> ... PURPOSE=<purpose>` line.
fn parse_circ_event(line: &str) -> Option<CircuitEvent> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "650" {
        return None;
    }
    if parts.next()? != "CIRC" {
        return None;
    }
    let circ_id: u64 = parts.next()?.parse().ok()?;
    let status = CircuitStatus::parse(parts.next()?)?;

    let mut path = Vec::new();
    let mut purpose = String::from("general");
    for field in parts {
        if let Some(p) = field.strip_prefix("PURPOSE=") {
            purpose = p.to_string();
        } else if field.contains(',') || field.chars().next().is_some_and(|c| c == '$') {
            path = field.split(',').map(|s| s.trim_start_matches('$').to_string()).collect();
        }
    }

    Some(CircuitEvent { circ_id, status, path, purpose })
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
