// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Driver (C6) — the state machine.
//!
//! Owns lifecycle, the state machine, heartbeat, shutdown, and composes
//! every other component. This is the orchestrator the rest of the crate
//! exists to support.

mod state;

pub use state::DriverState;

use crate::config::{Config, Mode};
use crate::control::ControlClient;
use crate::error::DriverError;
use crate::player::Player;
use crate::reactor::{EventManager, RegistrationId};
use crate::recorder::Recorder;
use crate::timer::Timer;

pub struct Driver {
    config: Config,
    manager: EventManager,
    id: String,
    state: DriverState,
    control: Option<ControlClient>,
    heartbeat_timer: Timer,
    shutdown_timer: Timer,
    play_timer: Timer,
    heartbeat_registration: Option<RegistrationId>,
    shutdown_registration: Option<RegistrationId>,
    play_registration: Option<RegistrationId>,
}

impl Driver {
    /// Creates a Driver in the Idle state. The configuration and event
    /// manager are borrowed conceptually (owned here only because this
    /// crate does not otherwise share them across components).
    pub fn new(config: Config, manager: EventManager) -> Self {
        let id = config.id.clone();
        Self {
            config,
            manager,
            id,
            state: DriverState::Idle,
            control: None,
            heartbeat_timer: Timer::new(|| {}),
            shutdown_timer: Timer::new(|| {}),
            play_timer: Timer::new(|| {}),
            heartbeat_registration: None,
            shutdown_registration: None,
            play_registration: None,
        }
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    /// Idle -> Connecting. Arms heartbeat (and shutdown, if configured),
    /// then drives the handshake through bootstrap. Races the handshake
    /// against the shutdown timer so a hang anywhere in the handshake
    /// (scenario: authenticate succeeds but bootstrap never completes) is
    /// still bounded by run-time, per §5's cancellation model.
    pub async fn start(&mut self) -> Result<(), DriverError> {
        if !self.state.is_idle() {
            tracing::info!("{}: can't start driver because it is not idle", self.id);
            return Err(DriverError::InvalidStateTransition("start when not idle"));
        }

        self.state = DriverState::Connecting;
        self.heartbeat_timer.arm(1, 1);
        self.heartbeat_registration = self.manager.register();
        if self.config.run_time_seconds > 0 {
            self.shutdown_timer.arm(self.config.run_time_seconds, 0);
            self.shutdown_registration = self.manager.register();
        }

        let Driver {
            id,
            config,
            control,
            state,
            manager,
            play_timer,
            play_registration,
            shutdown_timer,
            shutdown_registration,
            ..
        } = self;

        tokio::select! {
            result = handshake(id, config, control, state, manager, play_timer, play_registration) => result,
            _ = shutdown_timer.readable() => {
                shutdown_timer.check();
                if let Some(reg) = shutdown_registration.take() {
                    manager.deregister(reg);
                }
                manager.stop();
                Ok(())
            }
        }
    }

    /// Drives the reactor: starts the handshake, then dispatches heartbeat,
    /// shutdown, Play-timer, and circuit-event callbacks until the event
    /// manager is stopped. Does not itself perform teardown; the caller
    /// invokes `stop()` then `free()` once this returns.
    pub async fn run(&mut self) -> Result<(), DriverError> {
        self.start().await?;
        if self.manager.is_stopped() {
            return Ok(());
        }

        loop {
            let Driver {
                id,
                manager,
                heartbeat_timer,
                shutdown_timer,
                shutdown_registration,
                play_timer,
                play_registration,
                state,
                control,
                ..
            } = &mut *self;

            tokio::select! {
                _ = manager.stopped() => break,
                _ = heartbeat_timer.readable() => {
                    if heartbeat_timer.check() {
                        log_heartbeat(id, state);
                    } else {
                        tracing::warn!("{id}: spurious heartbeat timer wake");
                    }
                }
                _ = shutdown_timer.readable() => {
                    if shutdown_timer.check() {
                        if let Some(reg) = shutdown_registration.take() {
                            manager.deregister(reg);
                        }
                        manager.stop();
                    } else {
                        tracing::warn!("{id}: spurious shutdown timer wake");
                    }
                }
                _ = play_timer.readable() => {
                    if play_timer.check() {
                        if let Some(reg) = play_registration.take() {
                            manager.deregister(reg);
                        }
                        launch_one_and_rearm(id, play_timer, play_registration, manager, control, state).await;
                    }
                }
                active = tick_active_subsystem(state) => {
                    if !active {
                        tracing::warn!("{id}: circuit event stream closed");
                        manager.stop();
                    }
                }
            }
        }

        Ok(())
    }

    /// Idempotent rejection if Idle. Otherwise frees, in order: Recorder
    /// (via its state variant), heartbeat timer, shutdown timer, play
    /// timer, control client; then sets Idle.
    pub fn stop(&mut self) -> Result<(), DriverError> {
        if self.state.is_idle() {
            tracing::info!("{}: can't stop driver because it is already idle", self.id);
            return Err(DriverError::InvalidStateTransition("stop when idle"));
        }

        if let DriverState::Recording(recorder) = &mut self.state {
            recorder.free();
        }
        self.state = DriverState::Idle;

        if let Some(reg) = self.heartbeat_registration.take() {
            self.manager.deregister(reg);
        }
        if let Some(reg) = self.shutdown_registration.take() {
            self.manager.deregister(reg);
        }
        if let Some(reg) = self.play_registration.take() {
            self.manager.deregister(reg);
        }
        self.heartbeat_timer.free();
        self.shutdown_timer.free();
        self.play_timer.free();
        self.control = None;
        self.manager.stop();

        Ok(())
    }

    /// If non-Idle, performs Stop semantics, then releases the Driver.
    pub fn free(mut self) {
        if !self.state.is_idle() {
            let _ = self.stop();
        }
    }
}

/// Sequences connect -> authenticate -> bootstrap -> subsystem construction.
/// A free function (not a method) so the event-manager/shutdown-timer borrow
/// in `start()` can remain disjoint from the fields this needs.
async fn handshake(
    id: &str,
    config: &Config,
    control_slot: &mut Option<ControlClient>,
    state: &mut DriverState,
    manager: &mut EventManager,
    play_timer: &mut Timer,
    play_registration: &mut Option<RegistrationId>,
) -> Result<(), DriverError> {
    tracing::info!("{id}: creating control client to connect to Tor");
    let mut control = match ControlClient::connect(config.control_port).await {
        Ok(c) => c,
        Err(e) => {
            tracing::info!("{id}: control client construction failed: {e}");
            *state = DriverState::Idle;
            return Err(e);
        }
    };
    tracing::info!("{id}: successfully created control client");
    tracing::info!(
        "{id}: connection attempt finished local_port={} remote_port={}",
        control.local_port(),
        control.remote_port()
    );
    *state = DriverState::Authenticating;

    if let Err(e) = control.authenticate().await {
        tracing::warn!("{id}: authentication failed: {e}");
        *state = DriverState::Idle;
        return Err(e);
    }
    tracing::info!("{id}: successfully authenticated");
    *state = DriverState::Bootstrapping;

    if let Err(e) = control.get_bootstrap_status().await {
        tracing::warn!("{id}: bootstrap polling failed: {e}");
        *state = DriverState::Idle;
        return Err(e);
    }
    tracing::info!(
        "{id}: successfully bootstrapped client port {}",
        control.local_port()
    );

    match config.mode {
        Mode::Record => match Recorder::new(&mut control, &config.trace_file).await {
            Ok(recorder) => {
                *state = DriverState::Recording(recorder);
                *control_slot = Some(control);
                Ok(())
            }
            Err(e) => {
                tracing::error!("{id}: {e}");
                *state = DriverState::Idle;
                manager.stop();
                Err(e)
            }
        },
        Mode::Play => match Player::new(&mut control, &config.trace_file).await {
            Ok(player) => {
                // register_play_timer: arm a one-shot at the delay to the
                // next launch, if any (I5). An exhausted/empty trace leaves
                // no timer armed; the driver remains Playing until shutdown.
                if let Some(delay) = player.get_next_launch_time() {
                    play_timer.arm_granular(delay, None);
                    *play_registration = manager.register();
                }
                *state = DriverState::Playing(player);
                *control_slot = Some(control);
                Ok(())
            }
            Err(e) => {
                tracing::error!("{id}: {e}");
                *state = DriverState::Idle;
                manager.stop();
                Err(e)
            }
        },
    }
}

fn log_heartbeat(id: &str, state: &DriverState) {
    let subsystem_status = match state {
        DriverState::Recording(r) => r.to_string_status(),
        DriverState::Playing(p) => p.to_string_status(),
        _ => String::new(),
    };
    tracing::info!(
        "{id}: heartbeat: state={} {subsystem_status}",
        state.as_str()
    );
}

/// Launches one circuit and, per I5, re-arms the Play-timer with the delay
/// until the next scheduled circuit if any remain.
async fn launch_one_and_rearm(
    id: &str,
    play_timer: &mut Timer,
    play_registration: &mut Option<RegistrationId>,
    manager: &mut EventManager,
    control: &mut Option<ControlClient>,
    state: &mut DriverState,
) {
    let (Some(control), DriverState::Playing(player)) = (control.as_mut(), state) else {
        return;
    };
    if let Err(e) = player.launch_next_circuit(control).await {
        tracing::warn!("{id}: circuit launch failed: {e}");
    }
    if let Some(delay) = player.get_next_launch_time() {
        play_timer.arm_granular(delay, None);
        *play_registration = manager.register();
    }
}

async fn tick_active_subsystem(state: &mut DriverState) -> bool {
    match state {
        DriverState::Recording(r) => r.tick().await,
        DriverState::Playing(p) => p.tick().await,
        _ => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
