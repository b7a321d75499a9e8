// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-threaded event manager (C2).
//!
//! The reactor primitive itself is tokio's own runtime — this module does
//! not multiplex file descriptors directly. `register`/`deregister` instead
//! track which timer sources are currently live, so the driver can assert
//! I4 ("every live timer is registered; every deregistered timer is freed
//! before the next reactor iteration completes") without an fd table.
//! `run`/`stop` keep their names and unwind semantics, backed by a
//! [`tokio_util::sync::CancellationToken`] — the same primitive
//! `broker::client::run` and `LogWatcher::run` use to stop a `select!` loop.

use std::cell::RefCell;
use std::collections::HashSet;

use tokio_util::sync::CancellationToken;

/// Opaque handle returned by [`EventManager::register`]. Deregistering an
/// id more than once, or one that was never registered, is a no-op —
/// matching the spec's "safe during callback dispatch" requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

pub struct EventManager {
    cancel: CancellationToken,
    stopped: bool,
    registered: RefCell<HashSet<RegistrationId>>,
    next_id: RefCell<u64>,
}

impl EventManager {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            stopped: false,
            registered: RefCell::new(HashSet::new()),
            next_id: RefCell::new(0),
        }
    }

    /// Registers a new source (a timer's readable descriptor, in spec
    /// terms). Rejected once the manager has been stopped.
    pub fn register(&self) -> Option<RegistrationId> {
        if self.stopped {
            return None;
        }
        let mut next = self.next_id.borrow_mut();
        let id = RegistrationId(*next);
        *next += 1;
        self.registered.borrow_mut().insert(id);
        Some(id)
    }

    pub fn deregister(&self, id: RegistrationId) {
        self.registered.borrow_mut().remove(&id);
    }

    pub fn registered_count(&self) -> usize {
        self.registered.borrow().len()
    }

    /// Causes `run()`/`stopped()` to unwind. Idempotent; subsequent
    /// registrations are rejected per the contract.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Resolves once `stop()` has been called. The driver's main loop
    /// selects on this alongside its timers and channels.
    pub async fn stopped(&self) {
        self.cancel.cancelled().await;
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "reactor_tests.rs"]
mod tests;
