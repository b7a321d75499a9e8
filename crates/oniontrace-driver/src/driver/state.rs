// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::player::Player;
use crate::recorder::Recorder;

/// The driver's state, expressed as a sum type per the design note in §9:
/// `Recording`/`Playing` carry their subsystem directly, which structurally
/// enforces I1 ("at most one of Recorder or Player is non-null at any time")
/// without runtime null-checks.
pub enum DriverState {
    Idle,
    Connecting,
    Authenticating,
    Bootstrapping,
    Recording(Recorder),
    Playing(Player),
}

impl DriverState {
    /// Lowercase name matching the original C enum's `to_string`, since
    /// these appear verbatim in heartbeat log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Bootstrapping => "bootstrapping",
            Self::Recording(_) => "recording",
            Self::Playing(_) => "playing",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}
