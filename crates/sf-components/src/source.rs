//! Fixed-pressure source bounding the upstream side of a network.

use crate::common::{bound, validate_positive};
use crate::error::ModelResult;
use crate::fields::FieldTable;
use crate::traits::{Convergence, Model};
use sf_core::PortId;
use sf_core::units::{MassRate, Pressure, Temperature, k, kgps, pa};
use sf_net::{BackwardPorts, FlowState, FluidKind, ForwardPorts, Network, PortSpec};

const PORTS: &[PortSpec] = &[PortSpec::outlet("out")];

/// Reservoir at fixed pressure and temperature.
///
/// Delivers whatever mass flow downstream requests; with no request it
/// delivers nothing.
#[derive(Debug)]
pub struct PressureSource {
    name: String,
    pub fluid: FluidKind,
    pub p: Pressure,
    pub t: Temperature,
    mdot: MassRate,
    out: Option<PortId>,
    fields: FieldTable<Self>,
}

impl PressureSource {
    pub fn new(name: impl Into<String>, fluid: FluidKind, p: Pressure, t: Temperature) -> Self {
        Self {
            name: name.into(),
            fluid,
            p,
            t,
            mdot: kgps(0.0),
            out: None,
            fields: FieldTable::<Self>::new()
                .read_write(
                    "p_pa",
                    |m| m.p.value,
                    |m, v| {
                        m.p = pa(validate_positive(v, "source pressure")?);
                        Ok(())
                    },
                )
                .read_write(
                    "t_k",
                    |m| m.t.value,
                    |m, v| {
                        m.t = k(validate_positive(v, "source temperature")?);
                        Ok(())
                    },
                )
                .read_only("mdot_kgps", |m| m.mdot.value),
        }
    }

    pub fn mass_flow(&self) -> MassRate {
        self.mdot
    }

    fn state(&self) -> FlowState {
        FlowState::new(self.fluid, self.p, self.t, self.mdot)
    }
}

impl Model for PressureSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_tag(&self) -> &'static str {
        "pressure_source"
    }

    fn port_specs(&self) -> &'static [PortSpec] {
        PORTS
    }

    fn bind(&mut self, network: &Network) -> ModelResult<()> {
        self.out = Some(network.port_of(&self.name, "out")?);
        Ok(())
    }

    fn init(&mut self, ports: &mut ForwardPorts<'_>) -> ModelResult<()> {
        let out = bound(&self.out, &self.name)?;
        ports.set_forward(out, self.state())?;
        Ok(())
    }

    fn iteration_step(&mut self, ports: &mut ForwardPorts<'_>) -> ModelResult<Convergence> {
        let out = bound(&self.out, &self.name)?;
        ports.set_forward(out, self.state())?;
        Ok(Convergence::Converged)
    }

    fn back_iter_step(&mut self, ports: &mut BackwardPorts<'_>) -> ModelResult<()> {
        let out = bound(&self.out, &self.name)?;
        self.mdot = ports
            .boundary(out)?
            .mass_flow_rate()
            .unwrap_or_else(|| kgps(0.0));
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
