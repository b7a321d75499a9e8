// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recorder (C4).
//!
//! Subscribes to the control client's circuit events and appends one trace
//! record per circuit that reaches BUILT. Circuits that never reach BUILT
//! are discarded.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::control::{CircuitEvent, CircuitStatus, ControlClient};
use crate::error::DriverError;
use crate::trace::{TraceRecord, TraceWriter};

struct PendingCircuit {
    path: Vec<String>,
    purpose: String,
}

pub struct Recorder {
    writer: TraceWriter,
    base_time: Instant,
    events_rx: mpsc::Receiver<CircuitEvent>,
    pending: HashMap<u64, PendingCircuit>,
    observed: u64,
    built: u64,
    written: u64,
}

impl Recorder {
    /// Opens the trace file for append and subscribes to circuit events.
    /// Construction failure (trace file cannot be opened, or the control
    /// client rejects the subscription) is a fatal `ConstructionFailure`.
    pub async fn new(control: &mut ControlClient, trace_path: &Path) -> Result<Self, DriverError> {
        let writer = TraceWriter::create(trace_path)
            .map_err(|e| DriverError::ConstructionFailure(format!("open trace file: {e}")))?;
        let events_rx = control
            .subscribe_circuit_events()
            .await
            .map_err(|e| DriverError::ConstructionFailure(format!("subscribe circuit events: {e}")))?;

        Ok(Self {
            writer,
            base_time: Instant::now(),
            events_rx,
            pending: HashMap::new(),
            observed: 0,
            built: 0,
            written: 0,
        })
    }

    /// Awaits and processes the next circuit event. Returns `false` once the
    /// control connection's event stream has closed.
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
        self.observed += 1;

        let entry = self.pending.entry(event.circ_id).or_insert_with(|| PendingCircuit {
            path: Vec::new(),
            purpose: event.purpose.clone(),
        });
        if !event.path.is_empty() {
            entry.path = event.path.clone();
        }
        entry.purpose = event.purpose.clone();

        match event.status {
            CircuitStatus::Built => {
                self.built += 1;
                if let Some(circuit) = self.pending.remove(&event.circ_id) {
                    let record = TraceRecord {
                        relative_time_us: self.base_time.elapsed().as_micros() as u64,
                        path: circuit.path,
                        purpose: circuit.purpose,
                    };
                    if self.writer.append(&record).is_ok() {
                        self.written += 1;
                    }
                }
            }
            CircuitStatus::Failed | CircuitStatus::Closed => {
                self.pending.remove(&event.circ_id);
            }
            CircuitStatus::Launched | CircuitStatus::Extended => {}
        }
    }

    /// Drains any circuit events already buffered but not yet processed, so
    /// a BUILT event that arrived just before shutdown is still written
    /// before the trace file closes. Unbuilt circuits remain discarded.
    pub fn free(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }
    }

    /// Single-line status summary: counts of observed, built, and written
    /// circuits.
    pub fn to_string_status(&self) -> String {
        format!(
            "observed={} built={} written={}",
            self.observed, self.built, self.written
        )
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.free();
    }
}

#[cfg(test)]
#[path = "recorder_tests.rs"]
mod tests;
