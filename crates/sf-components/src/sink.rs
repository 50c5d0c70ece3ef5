//! Flow sink demanding a fixed mass flow from the network.

use crate::common::{bound, validate_non_negative};
use crate::error::ModelResult;
use crate::fields::FieldTable;
use crate::traits::{Convergence, Model};
use sf_core::PortId;
use sf_core::units::{MassRate, kgps};
use sf_net::{BackwardPorts, BoundaryRequest, FlowState, ForwardPorts, Network, PortSpec};

const PORTS: &[PortSpec] = &[PortSpec::inlet("in")];

/// Consumer that requests `demand` from upstream and records what arrives.
#[derive(Debug)]
pub struct FlowSink {
    name: String,
    pub demand: MassRate,
    received: FlowState,
    inlet: Option<PortId>,
    fields: FieldTable<Self>,
}

impl FlowSink {
    pub fn new(name: impl Into<String>, demand: MassRate) -> Self {
        Self {
            name: name.into(),
            demand,
            received: FlowState::default(),
            inlet: None,
            fields: FieldTable::<Self>::new()
                .read_write(
                    "mdot_kgps",
                    |m| m.demand.value,
                    |m, v| {
                        m.demand = kgps(validate_non_negative(v, "sink demand")?);
                        Ok(())
                    },
                )
                .read_only("p_pa", |m| m.received.p.value)
                .read_only("t_k", |m| m.received.t.value)
                .read_only("received_kgps", |m| m.received.mdot.value),
        }
    }

    /// Flow state seen at the inlet after the last forward pass.
    pub fn received(&self) -> FlowState {
        self.received
    }
}

impl Model for FlowSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_tag(&self) -> &'static str {
        "flow_sink"
    }

    fn port_specs(&self) -> &'static [PortSpec] {
        PORTS
    }

    fn bind(&mut self, network: &Network) -> ModelResult<()> {
        self.inlet = Some(network.port_of(&self.name, "in")?);
        Ok(())
    }

    fn iteration_step(&mut self, ports: &mut ForwardPorts<'_>) -> ModelResult<Convergence> {
        let inlet = bound(&self.inlet, &self.name)?;
        self.received = ports.forward(inlet)?;
        Ok(Convergence::Converged)
    }

    fn back_iter_step(&mut self, ports: &mut BackwardPorts<'_>) -> ModelResult<()> {
        let inlet = bound(&self.inlet, &self.name)?;
        ports.set_boundary(inlet, BoundaryRequest::mass_flow(self.demand))?;
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
