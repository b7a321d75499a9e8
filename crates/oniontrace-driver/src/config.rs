// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Which subsystem the driver activates once the control connection is
/// bootstrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Subscribe to circuit events and append BUILT circuits to the trace file.
    Record,
    /// Read the trace file and drive the router to build the same circuits.
    Play,
}

/// Read-only configuration consumed by the driver. Never mutated after
/// `validate()` succeeds.
#[derive(Debug, Clone, Parser)]
#[command(name = "oniontrace-driver", version, about = "Record or replay onion router circuit activity")]
pub struct Config {
    /// Whether to record circuit activity or replay a previously recorded trace.
    #[arg(long, env = "ONIONTRACE_MODE", value_enum)]
    pub mode: Mode,

    /// Path to write (Record mode) or read (Play mode).
    #[arg(long, env = "ONIONTRACE_TRACE_FILE")]
    pub trace_file: PathBuf,

    /// TCP port of the router's control listener on the local host.
    #[arg(long, env = "ONIONTRACE_CONTROL_PORT", default_value_t = 9051)]
    pub control_port: u16,

    /// Seconds to run before shutting down; 0 means until externally stopped.
    #[arg(long, env = "ONIONTRACE_RUN_TIME_SECONDS", default_value_t = 0)]
    pub run_time_seconds: u64,

    /// Stable identity string used as a log prefix.
    #[arg(long, env = "ONIONTRACE_ID", default_value = "oniontrace-driver")]
    pub id: String,
}

impl Config {
    /// Validates cross-field invariants not expressible via clap alone.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.control_port == 0 {
            anyhow::bail!("control_port must be nonzero");
        }

        match self.mode {
            Mode::Play => {
                if !self.trace_file.exists() {
                    anyhow::bail!(
                        "trace file {:?} does not exist (required in play mode)",
                        self.trace_file
                    );
                }
            }
            Mode::Record => {
                if let Some(parent) = self.trace_file.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        anyhow::bail!(
                            "trace file directory {:?} does not exist",
                            parent
                        );
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
