// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer source (C1).
//!
//! Realized atop `tokio::time` rather than a Linux timerfd: there is no
//! literal file descriptor to expose, so `fd()` is replaced by the timer
//! polling directly as a future inside the reactor's `select!` — the
//! idiomatic equivalent of "becomes readable when the timer expires".

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};

enum TimerState {
    Disarmed,
    OneShot(Pin<Box<Sleep>>),
    Periodic(Interval),
}

/// A one-shot or periodic timer whose expiration invokes a stored callback.
///
/// `free()`/`Drop` disarm it; `check()` consumes an expiration and invokes
/// the callback at most once, returning whether it fired.
pub struct Timer {
    state: TimerState,
    cb: Box<dyn FnMut()>,
}

impl Timer {
    /// Allocates a timer armed to nothing.
    pub fn new(cb: impl FnMut() + 'static) -> Self {
        Self { state: TimerState::Disarmed, cb: Box::new(cb) }
    }

    /// Arms at a whole-second relative deadline. `interval_seconds != 0`
    /// makes it periodic.
    pub fn arm(&mut self, seconds: u64, interval_seconds: u64) {
        let interval = (interval_seconds != 0).then(|| Duration::from_secs(interval_seconds));
        self.arm_granular(Duration::from_secs(seconds), interval);
    }

    /// Arms with sub-second precision; `interval` makes it periodic.
    pub fn arm_granular(&mut self, delay: Duration, interval: Option<Duration>) {
        self.state = match interval {
            Some(period) => {
                let mut iv = time::interval_at(Instant::now() + delay, period);
                iv.set_missed_tick_behavior(MissedTickBehavior::Delay);
                TimerState::Periodic(iv)
            }
            None => TimerState::OneShot(Box::pin(time::sleep(delay))),
        };
    }

    pub fn is_armed(&self) -> bool {
        !matches!(self.state, TimerState::Disarmed)
    }

    /// Resolves when the timer's next expiration becomes readable. Pending
    /// forever while disarmed, so it never wins a `select!` race.
    pub async fn readable(&mut self) {
        match &mut self.state {
            TimerState::Disarmed => std::future::pending::<()>().await,
            TimerState::OneShot(sleep) => sleep.as_mut().await,
            TimerState::Periodic(interval) => {
                interval.tick().await;
            }
        }
    }

    /// Consumes the expiration and invokes the callback at most once.
    /// One-shot timers disarm themselves so they cannot retrigger; periodic
    /// timers remain armed. Returns whether the callback was invoked —
    /// `false` only when called on an already-disarmed timer (the spurious-
    /// wake case the driver logs and, for one-shots, is a no-op since the
    /// timer is already free).
    pub fn check(&mut self) -> bool {
        if matches!(self.state, TimerState::Disarmed) {
            return false;
        }
        (self.cb)();
        if matches!(self.state, TimerState::OneShot(_)) {
            self.state = TimerState::Disarmed;
        }
        true
    }

    /// Disarms and releases. The caller is responsible for deregistering
    /// from the `EventManager` before or after calling this, per §5's
    /// ordering requirement.
    pub fn free(&mut self) {
        self.state = TimerState::Disarmed;
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.free();
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
