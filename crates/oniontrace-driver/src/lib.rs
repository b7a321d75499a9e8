// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! oniontrace-driver: attaches to a running onion router's control channel
//! and either records its circuit-construction activity to a trace file, or
//! replays a previously recorded trace against an identically configured
//! router.
//!
//! The crate's core is the [`driver`] module's `Driver` state machine; every
//! other module is a collaborator it composes (`control`, `timer`,
//! `reactor`, `recorder`, `player`, `trace`) or a boundary concern
//! (`config`, `error`).

pub mod config;
pub mod control;
pub mod driver;
pub mod error;
pub mod player;
pub mod reactor;
pub mod recorder;
pub mod timer;
pub mod trace;

use crate::config::Config;
use crate::driver::Driver;
use crate::error::DriverError;
use crate::reactor::EventManager;

/// Builds a `Driver` from the given configuration and runs it to
/// completion: handshake through bootstrap, activate Record or Play, then
/// dispatch heartbeat/shutdown/Play-timer/circuit-event callbacks until the
/// event manager stops. Always tears the driver down before returning,
/// including on error.
pub async fn run(config: Config) -> Result<(), DriverError> {
    config
        .validate()
        .map_err(|e| DriverError::ConstructionFailure(e.to_string()))?;

    let manager = EventManager::new();
    let mut driver = Driver::new(config, manager);

    let result = driver.run().await;
    driver.free();
    result
}
