//! Run control shared between the kernel thread and its handles.
//!
//! State changes (pause/resume/stop) are recorded immediately and observed
//! by the loop at tick boundaries. Field reads and writes need the models,
//! so they travel over a channel and are answered between ticks.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::sink::RunSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulatorState {
    NotRunning,
    Paused,
    Running,
    Stopping,
}

impl SimulatorState {
    pub fn as_str(self) -> &'static str {
        match self {
            SimulatorState::NotRunning => "not_running",
            SimulatorState::Paused => "paused",
            SimulatorState::Running => "running",
            SimulatorState::Stopping => "stopping",
        }
    }
}

impl std::fmt::Display for SimulatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completed ticks and the simulated time they reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Clock {
    pub tick: u64,
    pub t: f64,
}

#[derive(Debug)]
struct Shared {
    state: SimulatorState,
    clock: Clock,
}

#[derive(Debug)]
pub(crate) struct SimControl {
    shared: Mutex<Shared>,
    changed: Condvar,
}

impl SimControl {
    pub(crate) fn new() -> Self {
        Self {
            shared: Mutex::new(Shared {
                state: SimulatorState::NotRunning,
                clock: Clock::default(),
            }),
            changed: Condvar::new(),
        }
    }

    pub(crate) fn state(&self) -> SimulatorState {
        self.shared.lock().state
    }

    pub(crate) fn clock(&self) -> Clock {
        self.shared.lock().clock
    }

    pub(crate) fn publish_clock(&self, clock: Clock) {
        self.shared.lock().clock = clock;
    }

    /// Apply `transition` to the current state and wake a paused loop.
    fn transition(&self, transition: impl FnOnce(SimulatorState) -> SimulatorState) -> SimulatorState {
        let mut shared = self.shared.lock();
        let next = transition(shared.state);
        if next != shared.state {
            tracing::info!(from = ?shared.state, to = ?next, "simulator state change");
            shared.state = next;
        }
        self.changed.notify_all();
        next
    }

    /// Leave NotRunning for Running, or Paused when asked to start paused.
    /// Any other state was commanded already and is kept.
    pub(crate) fn enter(&self, paused: bool) -> SimulatorState {
        self.transition(|s| match s {
            SimulatorState::NotRunning if paused => SimulatorState::Paused,
            SimulatorState::NotRunning => SimulatorState::Running,
            other => other,
        })
    }

    pub(crate) fn leave(&self) {
        self.transition(|_| SimulatorState::NotRunning);
    }

    pub(crate) fn pause(&self) -> SimulatorState {
        self.transition(|s| match s {
            SimulatorState::Running => SimulatorState::Paused,
            other => other,
        })
    }

    pub(crate) fn resume(&self) -> SimulatorState {
        self.transition(|s| match s {
            SimulatorState::Paused => SimulatorState::Running,
            other => other,
        })
    }

    pub(crate) fn stop(&self) -> SimulatorState {
        self.transition(|s| match s {
            SimulatorState::Running | SimulatorState::Paused => SimulatorState::Stopping,
            other => other,
        })
    }

    pub(crate) fn wake(&self) {
        self.changed.notify_all();
    }

    /// Block up to `timeout` while paused; returns the state afterwards.
    pub(crate) fn wait_while_paused(&self, timeout: Duration) -> SimulatorState {
        let mut shared = self.shared.lock();
        if shared.state == SimulatorState::Paused {
            self.changed.wait_for(&mut shared, timeout);
        }
        shared.state
    }
}

/// Requests that need the kernel's models.
#[derive(Debug)]
pub(crate) enum Command {
    GetField {
        model: String,
        field: String,
        reply: Sender<SimResult<f64>>,
    },
    SetField {
        model: String,
        field: String,
        value: f64,
        reply: Sender<SimResult<()>>,
    },
}

pub(crate) fn command_channel() -> (Sender<Command>, Receiver<Command>) {
    channel()
}

/// Control surface of a kernel running on its own thread.
///
/// State commands are idempotent: pausing a paused run or stopping a
/// stopping run returns the current state unchanged.
#[derive(Debug)]
pub struct KernelHandle {
    control: Arc<SimControl>,
    commands: Sender<Command>,
    thread: JoinHandle<SimResult<RunSummary>>,
}

impl KernelHandle {
    pub(crate) fn new(
        control: Arc<SimControl>,
        commands: Sender<Command>,
        thread: JoinHandle<SimResult<RunSummary>>,
    ) -> Self {
        Self {
            control,
            commands,
            thread,
        }
    }

    fn ensure_alive(&self) -> SimResult<()> {
        if self.thread.is_finished() {
            return Err(SimError::KernelGone);
        }
        Ok(())
    }

    /// Leave an initial pause; same as `resume` once running.
    pub fn start(&self) -> SimResult<SimulatorState> {
        self.resume()
    }

    pub fn pause(&self) -> SimResult<SimulatorState> {
        self.ensure_alive()?;
        Ok(self.control.pause())
    }

    pub fn resume(&self) -> SimResult<SimulatorState> {
        self.ensure_alive()?;
        Ok(self.control.resume())
    }

    pub fn stop(&self) -> SimResult<SimulatorState> {
        self.ensure_alive()?;
        Ok(self.control.stop())
    }

    pub fn state(&self) -> SimulatorState {
        self.control.state()
    }

    pub fn clock(&self) -> Clock {
        self.control.clock()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Read a model field at the next tick boundary.
    pub fn get_field(&self, model: &str, field: &str) -> SimResult<f64> {
        let (reply, answer) = channel();
        self.send(Command::GetField {
            model: model.to_string(),
            field: field.to_string(),
            reply,
        })?;
        answer.recv().map_err(|_| SimError::KernelGone)?
    }

    /// Write a model field at the next tick boundary.
    pub fn set_field(&self, model: &str, field: &str, value: f64) -> SimResult<()> {
        let (reply, answer) = channel();
        self.send(Command::SetField {
            model: model.to_string(),
            field: field.to_string(),
            value,
            reply,
        })?;
        answer.recv().map_err(|_| SimError::KernelGone)?
    }

    fn send(&self, command: Command) -> SimResult<()> {
        self.ensure_alive()?;
        self.commands.send(command).map_err(|_| SimError::KernelGone)?;
        self.control.wake();
        Ok(())
    }

    /// Wait for the kernel thread and return its run summary.
    pub fn join(self) -> SimResult<RunSummary> {
        self.thread.join().map_err(|_| SimError::KernelPanicked)?
    }
}
