// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-oriented trace file format shared by the Recorder and Player.
//!
//! Each line is one JSON object: `{relative_time_us, path, purpose}`.
//! Ascending launch-time order is a precondition the Player trusts rather
//! than one it enforces.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DriverError;

/// One circuit launch instruction, as read from or written to a trace file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Launch time relative to the Recorder/Player's base time, in microseconds.
    pub relative_time_us: u64,
    /// Ordered relay identities composing the circuit.
    pub path: Vec<String>,
    /// The circuit's declared purpose (e.g. "general").
    pub purpose: String,
}

impl TraceRecord {
    pub fn to_line(&self) -> Result<String, DriverError> {
        serde_json::to_string(self)
            .map_err(|e| DriverError::ConstructionFailure(format!("encode trace record: {e}")))
    }

    fn from_line(line: &str) -> Result<Self, DriverError> {
        serde_json::from_str(line)
            .map_err(|e| DriverError::ConstructionFailure(format!("parse trace record: {e}")))
    }
}

/// Reads every record out of a trace file, in file order. Malformed lines
/// are a construction failure (the trace file is considered malformed as a
/// whole), matching the spec's "trace file missing or malformed" category.
pub fn read_trace(path: &Path) -> Result<Vec<TraceRecord>, DriverError> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        records.push(TraceRecord::from_line(trimmed)?);
    }
    Ok(records)
}

/// Appends a single record to a trace file, opening it for append if
/// necessary. Used by the Recorder, which writes one record per BUILT
/// circuit as it observes them.
pub struct TraceWriter {
    file: std::fs::File,
}

impl TraceWriter {
    pub fn create(path: &Path) -> Result<Self, DriverError> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self { file })
    }

    pub fn append(&mut self, record: &TraceRecord) -> Result<(), DriverError> {
        let line = record.to_line()?;
        writeln!(self.file, "{line}")?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "trace_tests.rs"]
mod tests;
