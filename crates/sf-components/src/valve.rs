//! Regulated valve: quadratic loss scaled by a first-order actuator.

use crate::common::{bound, validate_non_negative, validate_positive};
use crate::error::ModelResult;
use crate::fields::FieldTable;
use crate::pipe::{TwoPorts, apply_loss, propagate_request};
use crate::traits::{Convergence, Model, Schedule, StepContext};
use sf_net::{BackwardPorts, ForwardPorts, Network, PortSpec};

const PORTS: &[PortSpec] = &[PortSpec::inlet("in"), PortSpec::outlet("out")];

/// Opening below which the loss stops growing.
const MIN_OPENING: f64 = 1e-3;

/// Valve with loss `k_open / opening^2`.
///
/// `command` is a setpoint in [0, 1]. Each regulation step moves `opening`
/// towards it with time constant `tau_s`, limited to `max_rate` per second.
#[derive(Debug)]
pub struct Valve {
    name: String,
    /// Loss coefficient when fully open (Pa s^2/kg^2).
    pub k_open: f64,
    pub command: f64,
    opening: f64,
    tau_s: f64,
    max_rate: f64,
    regul_every: u32,
    last_regul_t: Option<f64>,
    mdot: f64,
    dp: f64,
    ports: Option<TwoPorts>,
    fields: FieldTable<Self>,
}

impl Valve {
    pub fn new(name: impl Into<String>, k_open: f64, opening: f64) -> Self {
        let opening = opening.clamp(0.0, 1.0);
        Self {
            name: name.into(),
            k_open,
            command: opening,
            opening,
            tau_s: 0.5,
            max_rate: 1.0,
            regul_every: 1,
            last_regul_t: None,
            mdot: 0.0,
            dp: 0.0,
            ports: None,
            fields: FieldTable::<Self>::new()
                .read_write(
                    "command",
                    |m| m.command,
                    |m, v| {
                        m.command = validate_non_negative(v, "valve command")?.min(1.0);
                        Ok(())
                    },
                )
                .read_only("opening", |m| m.opening)
                .read_write(
                    "k_open",
                    |m| m.k_open,
                    |m, v| {
                        m.k_open = validate_non_negative(v, "valve loss coefficient")?;
                        Ok(())
                    },
                )
                .read_write(
                    "tau_s",
                    |m| m.tau_s,
                    |m, v| {
                        m.tau_s = validate_positive(v, "valve time constant")?;
                        Ok(())
                    },
                )
                .read_only("mdot_kgps", |m| m.mdot)
                .read_only("dp_pa", |m| m.dp),
        }
    }

    pub fn with_actuator(mut self, tau_s: f64, max_rate: f64) -> ModelResult<Self> {
        self.tau_s = validate_positive(tau_s, "valve time constant")?;
        self.max_rate = validate_non_negative(max_rate, "valve rate limit")?;
        Ok(self)
    }

    /// Regulate every `every` ticks (0 disables regulation).
    pub fn with_regul_every(mut self, every: u32) -> Self {
        self.regul_every = every;
        self
    }

    pub fn opening(&self) -> f64 {
        self.opening
    }

    fn effective_k(&self) -> f64 {
        let o = self.opening.max(MIN_OPENING);
        self.k_open / (o * o)
    }
}

impl Model for Valve {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_tag(&self) -> &'static str {
        "valve"
    }

    fn port_specs(&self) -> &'static [PortSpec] {
        PORTS
    }

    fn bind(&mut self, network: &Network) -> ModelResult<()> {
        self.ports = Some(TwoPorts::resolve(network, &self.name)?);
        Ok(())
    }

    fn schedule(&self) -> Schedule {
        Schedule::regulated(self.regul_every)
    }

    fn iteration_step(&mut self, ports: &mut ForwardPorts<'_>) -> ModelResult<Convergence> {
        let p = bound(&self.ports, &self.name)?;
        let inlet = ports.forward(p.inlet)?;
        let (outlet, dp) = apply_loss(inlet, self.effective_k())?;
        self.mdot = inlet.mdot.value;
        self.dp = dp;
        ports.set_forward(p.outlet, outlet)?;
        Ok(Convergence::Converged)
    }

    fn back_iter_step(&mut self, ports: &mut BackwardPorts<'_>) -> ModelResult<()> {
        let p = bound(&self.ports, &self.name)?;
        let request = ports.boundary(p.outlet)?;
        ports.set_boundary(p.inlet, propagate_request(request, self.effective_k()))?;
        Ok(())
    }

    fn regul_step(&mut self, ctx: &StepContext, _ports: &mut ForwardPorts<'_>) -> ModelResult<()> {
        let t_end = ctx.t_end();
        let elapsed = t_end - self.last_regul_t.unwrap_or(ctx.t);
        self.last_regul_t = Some(t_end);
        if elapsed <= 0.0 {
            return Ok(());
        }

        let error = self.command - self.opening;
        let lag = error * (1.0 - (-elapsed / self.tau_s).exp());
        let limit = self.max_rate * elapsed;
        self.opening = (self.opening + lag.clamp(-limit, limit)).clamp(0.0, 1.0);
        tracing::trace!(valve = %self.name, opening = self.opening, command = self.command, "regulated");
        Ok(())
    }

    fn get_field(&self, name: &str) -> ModelResult<f64> {
        self.fields.get(self, name)
    }

    fn set_field(&mut self, name: &str, value: f64) -> ModelResult<()> {
        let set = self.fields.setter(name)?;
        set(self, value)
    }

    fn field_names(&self) -> Vec<&'static str> {
        self.fields.names()
    }
}
