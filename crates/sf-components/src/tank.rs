//! Ideal-gas tank integrated over each tick with RKF45.

use crate::common::{bound, validate_positive};
use crate::error::{ModelError, ModelResult};
use crate::fields::FieldTable;
use crate::pipe::TwoPorts;
use crate::traits::{Convergence, Model, Schedule, StepContext};
use sf_core::units::{constants, k, kgps, pa};
use sf_core::{Accuracy, Real};
use sf_net::{BackwardPorts, BoundaryRequest, FlowState, FluidKind, ForwardPorts, Network, PortSpec};
use sf_ode::{Rkf45, StateVector};

const PORTS: &[PortSpec] = &[PortSpec::inlet("in"), PortSpec::outlet("out")];

const MASS: usize = 0;
const TEMP: usize = 1;

/// Rigid volume of ideal gas with one inlet and one outlet.
///
/// State is `[mass, temperature]`. Mass balance is `dm/dt = in - out`; the
/// energy balance assumes adiabatic walls and inflow at the inlet
/// temperature.
#[derive(Debug)]
pub struct Tank {
    name: String,
    fluid: FluidKind,
    volume: f64,
    r_gas: f64,
    gamma: f64,
    state: StateVector,
    accuracy: Accuracy,
    integrator: Rkf45,
    step_hint: Real,
    outflow: f64,
    ports: Option<TwoPorts>,
    fields: FieldTable<Self>,
}

/// Time derivative of `[m, T]` for constant boundary flows.
fn derivative(
    cv: f64,
    cp: f64,
    inflow: f64,
    t_in: f64,
    outflow: f64,
) -> impl Fn(Real, &[Real], &mut [Real]) {
    move |_t, y, dydt| {
        let (m, t) = (y[MASS], y[TEMP]);
        dydt[MASS] = inflow - outflow;
        dydt[TEMP] = (inflow * (cp * t_in - cv * t) - outflow * (cp - cv) * t) / (m * cv);
    }
}

impl Tank {
    /// Air tank of `volume_m3` starting at `p0_pa`, `t0_k`.
    pub fn new(name: impl Into<String>, volume_m3: f64, p0_pa: f64, t0_k: f64) -> ModelResult<Self> {
        let volume = validate_positive(volume_m3, "tank volume")?;
        let p0 = validate_positive(p0_pa, "tank pressure")?;
        let t0 = validate_positive(t0_k, "tank temperature")?;
        let r_gas = constants::R_AIR;
        let state = StateVector::new(vec![p0 * volume / (r_gas * t0), t0])?;
        let accuracy = Accuracy::default();

        Ok(Self {
            name: name.into(),
            fluid: FluidKind::Air,
            volume,
            r_gas,
            gamma: constants::GAMMA_AIR,
            state,
            accuracy,
            integrator: Rkf45::new(accuracy.tol, 10_000),
            step_hint: accuracy.step.max,
            outflow: 0.0,
            ports: None,
            fields: FieldTable::<Self>::new()
                .read_only("p_pa", |m| m.pressure())
                .read_only("t_k", |m| m.state[TEMP])
                .read_only("mass_kg", |m| m.state[MASS])
                .read_only("volume_m3", |m| m.volume)
                .read_only("outflow_kgps", |m| m.outflow),
        })
    }

    pub fn with_accuracy(mut self, accuracy: Accuracy) -> Self {
        self.accuracy = accuracy;
        self.integrator.tol = accuracy.tol;
        self.step_hint = accuracy.step.max;
        self
    }

    pub fn pressure(&self) -> f64 {
        self.state[MASS] * self.r_gas * self.state[TEMP] / self.volume
    }

    pub fn mass(&self) -> f64 {
        self.state[MASS]
    }

    pub fn temperature(&self) -> f64 {
        self.state[TEMP]
    }

    fn outlet_state(&self) -> FlowState {
        FlowState::new(self.fluid, pa(self.pressure()), k(self.state[TEMP]), kgps(self.outflow))
    }
}

impl Model for Tank {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_tag(&self) -> &'static str {
        "tank"
    }

    fn port_specs(&self) -> &'static [PortSpec] {
        PORTS
    }

    fn bind(&mut self, network: &Network) -> ModelResult<()> {
        self.ports = Some(TwoPorts::resolve(network, &self.name)?);
        Ok(())
    }

    fn accuracy(&self) -> Accuracy {
        self.accuracy
    }

    fn schedule(&self) -> Schedule {
        Schedule::time_stepped()
    }

    fn init(&mut self, ports: &mut ForwardPorts<'_>) -> ModelResult<()> {
        let p = bound(&self.ports, &self.name)?;
        ports.set_forward(p.outlet, self.outlet_state())?;
        Ok(())
    }

    fn time_step(&mut self, ctx: &StepContext, ports: &mut ForwardPorts<'_>) -> ModelResult<()> {
        let p = bound(&self.ports, &self.name)?;
        let inlet = ports.forward(p.inlet)?;
        let cv = self.r_gas / (self.gamma - 1.0);
        let cp = self.gamma * cv;

        let f = derivative(cv, cp, inlet.mdot.value, inlet.t.value, self.outflow);
        let guess = self.step_hint.clamp(self.accuracy.step.min, self.accuracy.step.max);
        let advance = self
            .integrator
            .advance_state(ctx.t, guess, &mut self.state, ctx.t_end(), f)?;
        self.step_hint = advance.step;

        let physical = self.state[MASS] > 0.0 && self.state[TEMP] > 0.0;
        if !physical {
            return Err(ModelError::NonPhysical {
                what: "tank mass or temperature",
            });
        }
        tracing::trace!(
            tank = %self.name,
            p = self.pressure(),
            evals = advance.evals,
            rejected = advance.rejected,
            "integrated"
        );
        ports.set_forward(p.outlet, self.outlet_state())?;
        Ok(())
    }

    fn iteration_step(&mut self, ports: &mut ForwardPorts<'_>) -> ModelResult<Convergence> {
        let p = bound(&self.ports, &self.name)?;
        ports.set_forward(p.outlet, self.outlet_state())?;
        Ok(Convergence::Converged)
    }

    fn back_iter_step(&mut self, ports: &mut BackwardPorts<'_>) -> ModelResult<()> {
        let p = bound(&self.ports, &self.name)?;
        self.outflow = ports
            .boundary(p.outlet)?
            .mass_flow_rate()
            .map_or(0.0, |m| m.value);
        ports.set_boundary(
            p.inlet,
            BoundaryRequest::none().with_pressure(pa(self.pressure())),
        )?;
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
