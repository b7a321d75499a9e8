// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Player (C5).
//!
//! Reads a trace into a time-ordered queue of launch instructions and
//! exposes "time to next circuit" / "launch next circuit" to the driver's
//! one-shot Play-timer (I5). There is no internal thread or scheduler here;
//! the Player is purely deadline-driven.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::control::{CircuitEvent, CircuitStatus, ControlClient};
use crate::error::DriverError;
use crate::trace::{read_trace, TraceRecord};

pub struct Player {
    queue: VecDeque<TraceRecord>,
    base_time: Instant,
    events_rx: mpsc::Receiver<CircuitEvent>,
    issued_by_circ_id: HashMap<u64, ()>,
    issued: u64,
    built: u64,
    failed: u64,
}

impl Player {
    /// Reads the entire trace file and subscribes to circuit events so
    /// launch outcomes can be counted in the status summary. Construction
    /// failure (missing or malformed trace) is a fatal `ConstructionFailure`.
    pub async fn new(control: &mut ControlClient, trace_path: &Path) -> Result<Self, DriverError> {
        let records = read_trace(trace_path)?;
        let events_rx = control
            .subscribe_circuit_events()
            .await
            .map_err(|e| DriverError::ConstructionFailure(format!("subscribe circuit events: {e}")))?;

        Ok(Self {
            queue: records.into_iter().collect(),
            base_time: Instant::now(),
            events_rx,
            issued_by_circ_id: HashMap::new(),
            issued: 0,
            built: 0,
            failed: 0,
        })
    }

    /// Delay from now until the head-of-queue launch should fire. A past-due
    /// head collapses to zero delay rather than attempting to catch up on
    /// accumulated lateness. `None` when the queue is empty.
    pub fn get_next_launch_time(&self) -> Option<Duration> {
        let head = self.queue.front()?;
        let target = self.base_time + Duration::from_micros(head.relative_time_us);
        let now = Instant::now();
        Some(target.saturating_duration_since(now))
    }

    /// Pops the head instruction and issues it on the control client. Safe
    /// to call even if no deadline has elapsed.
    pub async fn launch_next_circuit(&mut self, control: &mut ControlClient) -> Result<(), DriverError> {
        let Some(record) = self.queue.pop_front() else {
            return Ok(());
        };
        match control.launch_circuit(&record.path, &record.purpose).await {
            Ok(circ_id) => {
                self.issued += 1;
                self.issued_by_circ_id.insert(circ_id, ());
            }
            Err(_) => {
                // Router-side launch failure: counted, does not halt replay.
                self.failed += 1;
            }
        }
        Ok(())
    }

    /// Awaits and processes the next circuit event, updating built/failed
    /// counts for circuits this Player issued. Returns `false` once the
    /// event stream has closed.
    pub async fn tick(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    fn handle_event(&mut self, event: CircuitEvent) {
        if !self.issued_by_circ_id.contains_key(&event.circ_id) {
            return;
        }
        match event.status {
            CircuitStatus::Built => {
                self.built += 1;
                self.issued_by_circ_id.remove(&event.circ_id);
            }
            CircuitStatus::Failed | CircuitStatus::Closed => {
                self.failed += 1;
                self.issued_by_circ_id.remove(&event.circ_id);
            }
            CircuitStatus::Launched | CircuitStatus::Extended => {}
        }
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Status summary: remaining, issued, built, and failed circuits.
    pub fn to_string_status(&self) -> String {
        format!(
            "remaining={} issued={} built={} failed={}",
            self.queue.len(),
            self.issued,
            self.built,
            self.failed
        )
    }
}

#[cfg(test)]
#[path = "player_tests.rs"]
mod tests;
