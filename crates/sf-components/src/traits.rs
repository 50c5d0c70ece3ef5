//! The model contract every component implements.

use crate::error::{ModelError, ModelResult};
use sf_core::Accuracy;
use sf_net::{BackwardPorts, ForwardPorts, Network, PortSpec};

/// Outcome of a forward iteration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// Outputs agree with the inputs and boundary requests.
    Converged,
    /// A boundary or hydraulic condition is not met yet; another
    /// backward+forward round is needed.
    Pending,
}

/// Integer status convention shared with external tooling:
/// 0 = success, 1 = fatal, -1 = not yet converged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Fatal,
    NotConverged,
}

impl Status {
    pub fn code(self) -> i32 {
        match self {
            Status::Success => 0,
            Status::Fatal => 1,
            Status::NotConverged => -1,
        }
    }
}

impl From<&ModelResult<()>> for Status {
    fn from(result: &ModelResult<()>) -> Self {
        match result {
            Ok(()) => Status::Success,
            Err(_) => Status::Fatal,
        }
    }
}

impl From<&ModelResult<Convergence>> for Status {
    fn from(result: &ModelResult<Convergence>) -> Self {
        match result {
            Ok(Convergence::Converged) => Status::Success,
            Ok(Convergence::Pending) => Status::NotConverged,
            Err(_) => Status::Fatal,
        }
    }
}

/// Which calc-step containers a model joins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Schedule {
    /// Wants `time_step` every tick.
    pub time_step: bool,
    /// Wants `regul_step` every `regul_every` ticks (0 = never).
    pub regul_every: u32,
}

impl Schedule {
    pub fn time_stepped() -> Self {
        Self {
            time_step: true,
            ..Self::default()
        }
    }

    pub fn regulated(every: u32) -> Self {
        Self {
            regul_every: every,
            ..Self::default()
        }
    }

    pub fn wants_regul(&self) -> bool {
        self.regul_every > 0
    }
}

/// Clock information handed to time and regulation steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepContext {
    /// Index of the tick being computed (first tick is 0).
    pub tick: u64,
    /// Simulated time at the start of the tick (s).
    pub t: f64,
    /// Tick length (s).
    pub dt: f64,
}

impl StepContext {
    pub fn t_end(&self) -> f64 {
        self.t + self.dt
    }
}

/// A component registered into the simulation kernel.
///
/// The kernel owns boxed models only to schedule them. Within one pass
/// models run strictly in order, so a model may rely on upstream writes made
/// earlier in the same pass.
///
/// Port discipline is enforced by the view types: forward values can only
/// be written through `ForwardPorts` (time, regulation and iteration steps),
/// boundary requests only through `BackwardPorts` (back-iteration steps).
pub trait Model: Send {
    /// Unique instance name.
    fn name(&self) -> &str;

    /// Type tag for diagnostics (e.g. "pipe", "junction").
    fn type_tag(&self) -> &'static str;

    /// Ports this model type declares.
    fn port_specs(&self) -> &'static [PortSpec];

    /// Resolve the declared ports against a wired network.
    fn bind(&mut self, network: &Network) -> ModelResult<()>;

    /// Numeric accuracy and step bounds this model computes with.
    fn accuracy(&self) -> Accuracy {
        Accuracy::default()
    }

    /// Calc-step participation, queried once when containers are built.
    fn schedule(&self) -> Schedule {
        Schedule::default()
    }

    /// One-time setup before the first mesh pass; may seed output ports.
    fn init(&mut self, _ports: &mut ForwardPorts<'_>) -> ModelResult<()> {
        Ok(())
    }

    /// Advance internal state over `[ctx.t, ctx.t + ctx.dt]`.
    fn time_step(&mut self, _ctx: &StepContext, _ports: &mut ForwardPorts<'_>) -> ModelResult<()> {
        Ok(())
    }

    /// Compute outputs from current inputs (forward pass).
    fn iteration_step(&mut self, ports: &mut ForwardPorts<'_>) -> ModelResult<Convergence>;

    /// Read downstream boundary requests and write upstream ones on the
    /// model's own inlets (backward pass).
    fn back_iter_step(&mut self, ports: &mut BackwardPorts<'_>) -> ModelResult<()>;

    /// Periodic regulation update.
    fn regul_step(&mut self, _ctx: &StepContext, _ports: &mut ForwardPorts<'_>) -> ModelResult<()> {
        Ok(())
    }

    /// Read a named field.
    fn get_field(&self, name: &str) -> ModelResult<f64> {
        Err(ModelError::UnknownField {
            name: name.to_string(),
        })
    }

    /// Write a named field.
    fn set_field(&mut self, name: &str, _value: f64) -> ModelResult<()> {
        Err(ModelError::UnknownField {
            name: name.to_string(),
        })
    }

    /// Names of all readable fields.
    fn field_names(&self) -> Vec<&'static str> {
        Vec::new()
    }
}
