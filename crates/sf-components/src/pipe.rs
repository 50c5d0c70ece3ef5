//! Pipe with a lumped quadratic pressure loss.

use crate::common::{bound, quadratic_loss, validate_non_negative};
use crate::error::{ModelError, ModelResult};
use crate::fields::FieldTable;
use crate::traits::{Convergence, Model};
use sf_core::PortId;
use sf_core::units::pa;
use sf_net::{BackwardPorts, BoundaryRequest, FlowState, ForwardPorts, Network, PortSpec};

const PORTS: &[PortSpec] = &[PortSpec::inlet("in"), PortSpec::outlet("out")];

#[derive(Debug, Clone, Copy)]
pub(crate) struct TwoPorts {
    pub(crate) inlet: PortId,
    pub(crate) outlet: PortId,
}

impl TwoPorts {
    pub(crate) fn resolve(network: &Network, name: &str) -> ModelResult<Self> {
        Ok(Self {
            inlet: network.port_of(name, "in")?,
            outlet: network.port_of(name, "out")?,
        })
    }
}

/// Carry a downstream request upstream across a loss of `k_loss`.
///
/// The mass flow passes through unchanged; a requested outlet pressure
/// becomes an inlet pressure raised by the loss at that flow.
pub(crate) fn propagate_request(request: BoundaryRequest, k_loss: f64) -> BoundaryRequest {
    let mut upstream = request;
    if let (Some(p), Some(m)) = (request.pressure(), request.mass_flow_rate()) {
        upstream.p = pa(p.value + quadratic_loss(k_loss, m.value));
    }
    upstream
}

/// Apply a loss of `k_loss` to an inlet state, failing on non-positive
/// outlet pressure.
pub(crate) fn apply_loss(inlet: FlowState, k_loss: f64) -> ModelResult<(FlowState, f64)> {
    let dp = quadratic_loss(k_loss, inlet.mdot.value);
    let p_out = inlet.p.value - dp;
    if !p_out.is_finite() || p_out <= 0.0 {
        return Err(ModelError::NonPhysical {
            what: "outlet pressure",
        });
    }
    Ok((FlowState { p: pa(p_out), ..inlet }, dp))
}

/// Pipe with `dp = k * mdot * |mdot|`.
#[derive(Debug)]
pub struct Pipe {
    name: String,
    /// Loss coefficient (Pa s^2/kg^2).
    pub k: f64,
    mdot: f64,
    dp: f64,
    ports: Option<TwoPorts>,
    fields: FieldTable<Self>,
}

impl Pipe {
    pub fn new(name: impl Into<String>, k: f64) -> Self {
        Self {
            name: name.into(),
            k,
            mdot: 0.0,
            dp: 0.0,
            ports: None,
            fields: FieldTable::<Self>::new()
                .read_write(
                    "k",
                    |m| m.k,
                    |m, v| {
                        m.k = validate_non_negative(v, "pipe loss coefficient")?;
                        Ok(())
                    },
                )
                .read_only("mdot_kgps", |m| m.mdot)
                .read_only("dp_pa", |m| m.dp),
        }
    }
}

impl Model for Pipe {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_tag(&self) -> &'static str {
        "pipe"
    }

    fn port_specs(&self) -> &'static [PortSpec] {
        PORTS
    }

    fn bind(&mut self, network: &Network) -> ModelResult<()> {
        self.ports = Some(TwoPorts::resolve(network, &self.name)?);
        Ok(())
    }

    fn iteration_step(&mut self, ports: &mut ForwardPorts<'_>) -> ModelResult<Convergence> {
        let p = bound(&self.ports, &self.name)?;
        let inlet = ports.forward(p.inlet)?;
        let (outlet, dp) = apply_loss(inlet, self.k)?;
        self.mdot = inlet.mdot.value;
        self.dp = dp;
        ports.set_forward(p.outlet, outlet)?;
        Ok(Convergence::Converged)
    }

    fn back_iter_step(&mut self, ports: &mut BackwardPorts<'_>) -> ModelResult<()> {
        let p = bound(&self.ports, &self.name)?;
        let request = ports.boundary(p.outlet)?;
        ports.set_boundary(p.inlet, propagate_request(request, self.k))?;
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
