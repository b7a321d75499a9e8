// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Error categories produced by the driver's state machine and its
/// subsystems. Mirrors the categories in the error-handling design: most are
/// recoverable by the embedder (returned from `start`/`stop`), a few are
/// fatal and cause the reactor to stop.
#[derive(Debug)]
pub enum DriverError {
    /// Recorder or Player could not be instantiated (trace file missing or
    /// malformed). Fatal: the driver transitions to Idle and the reactor
    /// stops.
    ConstructionFailure(String),
    /// The control client failed to connect or authenticate. Recoverable:
    /// `start` returns this and the driver state remains Idle.
    ControlClientFailure(String),
    /// A timer's descriptor was readable but `check()` returned false.
    SpuriousTimerWake,
    /// The router rejected a directed circuit launch.
    CircuitLaunchFailure(String),
    /// `start` was called while not Idle, or `stop` while Idle.
    InvalidStateTransition(&'static str),
    /// Wraps an I/O failure reading or writing the trace file.
    Trace(std::io::Error),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConstructionFailure(msg) => write!(f, "construction failure: {msg}"),
            Self::ControlClientFailure(msg) => write!(f, "control client failure: {msg}"),
            Self::SpuriousTimerWake => write!(f, "spurious timer wake"),
            Self::CircuitLaunchFailure(msg) => write!(f, "circuit launch failure: {msg}"),
            Self::InvalidStateTransition(msg) => write!(f, "invalid state transition: {msg}"),
            Self::Trace(e) => write!(f, "trace file error: {e}"),
        }
    }
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Trace(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DriverError {
    fn from(e: std::io::Error) -> Self {
        Self::Trace(e)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
