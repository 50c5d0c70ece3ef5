//! Two-into-one junction balancing its inlet pressures.
//!
//! Downstream demand is split between the inlets by `split` (fraction to
//! `in1`). After each forward pass the junction compares the two arriving
//! pressures; while they disagree it moves `split` with a secant update and
//! reports `Pending`, so the enclosing mesh runs another round.

use crate::common::{bound, mix_temperature};
use crate::error::ModelResult;
use crate::fields::FieldTable;
use crate::traits::{Convergence, Model};
use sf_core::units::{kgps, pa};
use sf_core::{Accuracy, PortId, Tolerances, nearly_equal};
use sf_net::{BackwardPorts, BoundaryRequest, FlowState, ForwardPorts, Network, PortSpec};

const PORTS: &[PortSpec] = &[
    PortSpec::inlet("in1"),
    PortSpec::inlet("in2"),
    PortSpec::outlet("out"),
];

/// First move of the split before a secant slope is known.
const INITIAL_STEP: f64 = 0.01;
const MIN_SPLIT: f64 = 1e-6;
const MAX_SPLIT: f64 = 1.0 - 1e-6;
/// Pressure balance tolerance relative to `rel * max(p1, p2)`.
const BALANCE_FRACTION: f64 = 1e-3;

#[derive(Debug, Clone, Copy)]
struct JunctionPorts {
    in1: PortId,
    in2: PortId,
    out: PortId,
}

#[derive(Debug)]
pub struct Junction {
    name: String,
    split: f64,
    accuracy: Accuracy,
    /// Previous (split, mismatch) pair for the secant slope.
    previous: Option<(f64, f64)>,
    mismatch: f64,
    total: f64,
    outlet: FlowState,
    ports: Option<JunctionPorts>,
    fields: FieldTable<Self>,
}

impl Junction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            split: 0.5,
            accuracy: Accuracy::default(),
            previous: None,
            mismatch: 0.0,
            total: 0.0,
            outlet: FlowState::default(),
            ports: None,
            fields: FieldTable::<Self>::new()
                .read_only("split", |m| m.split)
                .read_only("t_out_k", |m| m.outlet.t.value)
                .read_only("p_out_pa", |m| m.outlet.p.value)
                .read_only("mdot_out_kgps", |m| m.outlet.mdot.value)
                .read_only("mismatch_pa", |m| m.mismatch),
        }
    }

    pub fn with_accuracy(mut self, accuracy: Accuracy) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn with_split(mut self, split: f64) -> Self {
        self.split = split.clamp(MIN_SPLIT, MAX_SPLIT);
        self
    }

    pub fn split(&self) -> f64 {
        self.split
    }

    fn next_split(&self, residual: f64) -> f64 {
        let secant = self.previous.and_then(|(s_prev, r_prev)| {
            let denom = residual - r_prev;
            (denom.abs() > f64::EPSILON * residual.abs().max(1.0))
                .then(|| self.split - residual * (self.split - s_prev) / denom)
        });
        secant
            .filter(|s| s.is_finite())
            .unwrap_or(self.split + INITIAL_STEP * residual.signum())
            .clamp(MIN_SPLIT, MAX_SPLIT)
    }
}

impl Model for Junction {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_tag(&self) -> &'static str {
        "junction"
    }

    fn port_specs(&self) -> &'static [PortSpec] {
        PORTS
    }

    fn bind(&mut self, network: &Network) -> ModelResult<()> {
        self.ports = Some(JunctionPorts {
            in1: network.port_of(&self.name, "in1")?,
            in2: network.port_of(&self.name, "in2")?,
            out: network.port_of(&self.name, "out")?,
        });
        Ok(())
    }

    fn accuracy(&self) -> Accuracy {
        self.accuracy
    }

    fn iteration_step(&mut self, ports: &mut ForwardPorts<'_>) -> ModelResult<Convergence> {
        let p = bound(&self.ports, &self.name)?;
        let a = ports.forward(p.in1)?;
        let b = ports.forward(p.in2)?;

        self.total = a.mdot.value + b.mdot.value;
        self.outlet = FlowState::new(
            a.fluid,
            pa(0.5 * (a.p.value + b.p.value)),
            mix_temperature(a.mdot, a.t, b.mdot, b.t),
            kgps(self.total),
        );
        ports.set_forward(p.out, self.outlet)?;

        let residual = a.p.value - b.p.value;
        self.mismatch = residual;
        let balance = Tolerances::new(0.0, BALANCE_FRACTION * self.accuracy.tol.rel);
        if nearly_equal(a.p.value, b.p.value, balance) {
            self.previous = None;
            return Ok(Convergence::Converged);
        }

        let next = self.next_split(residual);
        tracing::trace!(
            junction = %self.name,
            residual,
            split = self.split,
            next,
            "rebalancing split"
        );
        self.previous = Some((self.split, residual));
        self.split = next;
        Ok(Convergence::Pending)
    }

    fn back_iter_step(&mut self, ports: &mut BackwardPorts<'_>) -> ModelResult<()> {
        let p = bound(&self.ports, &self.name)?;
        let request = ports.boundary(p.out)?;
        let total = request
            .mass_flow_rate()
            .map(|m| m.value)
            .unwrap_or(self.total);

        let branch = |share: f64| {
            let mut req = BoundaryRequest::mass_flow(kgps(share * total));
            if let Some(p_req) = request.pressure() {
                req = req.with_pressure(p_req);
            }
            req
        };
        ports.set_boundary(p.in1, branch(self.split))?;
        ports.set_boundary(p.in2, branch(1.0 - self.split))?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use sf_core::units::k;
    use sf_net::{FluidKind, NetworkBuilder};

    fn bound_junction() -> (Junction, Network) {
        let mut j = Junction::new("mix")
            .with_accuracy(Accuracy::with_tolerances(Tolerances::new(1e-6, 1e-3)));
        let mut b = NetworkBuilder::new();
        b.add_model("mix", j.port_specs()).unwrap();
        let net = b.build().unwrap();
        j.bind(&net).unwrap();
        (j, net)
    }

    fn feed(net: &mut Network, port: &str, p: f64, t: f64, mdot: f64) {
        let id = net.port_of("mix", port).unwrap();
        net.ports
            .forward_view()
            .set_forward(id, FlowState::new(FluidKind::Air, pa(p), k(t), kgps(mdot)))
            .unwrap();
    }

    #[test]
    fn balanced_inlets_converge_and_mix() {
        let (mut j, mut net) = bound_junction();
        feed(&mut net, "in1", 5.0e5, 300.0, 0.1);
        feed(&mut net, "in2", 5.0e5, 400.0, 0.3);

        let conv = j.iteration_step(&mut net.ports.forward_view()).unwrap();
        assert_eq!(conv, Convergence::Converged);
        let out = net.ports.forward(net.port_of("mix", "out").unwrap()).unwrap();
        assert!((out.t.value - 375.0).abs() < 1e-9);
        assert!((out.mdot.value - 0.4).abs() < 1e-12);
        assert_eq!(out.p.value, 5.0e5);
    }

    #[test]
    fn first_move_follows_residual_sign() {
        let (mut j, mut net) = bound_junction();
        feed(&mut net, "in1", 4.0e5, 300.0, 0.1);
        feed(&mut net, "in2", 5.0e5, 300.0, 0.1);

        let conv = j.iteration_step(&mut net.ports.forward_view()).unwrap();
        assert_eq!(conv, Convergence::Pending);
        assert!((j.split() - 0.49).abs() < 1e-12);
        assert_eq!(j.get_field("mismatch_pa").unwrap(), -1.0e5);
    }

    #[test]
    fn back_step_splits_demand() {
        let (mut j, mut net) = bound_junction();
        j = j.with_split(0.25);
        let out = net.port_of("mix", "out").unwrap();
        net.ports
            .backward_view()
            .set_boundary(out, BoundaryRequest::mass_flow(kgps(0.8)))
            .unwrap();
        j.back_iter_step(&mut net.ports.backward_view()).unwrap();

        let r1 = net.ports.boundary(net.port_of("mix", "in1").unwrap()).unwrap();
        let r2 = net.ports.boundary(net.port_of("mix", "in2").unwrap()).unwrap();
        assert!((r1.mass_flow_rate().unwrap().value - 0.2).abs() < 1e-12);
        assert!((r2.mass_flow_rate().unwrap().value - 0.6).abs() < 1e-12);
    }

    #[test]
    fn split_stays_inside_bounds() {
        let (mut j, mut net) = bound_junction();
        // Residual independent of split: secant slope is undefined.
        feed(&mut net, "in1", 6.0e5, 300.0, 0.1);
        feed(&mut net, "in2", 5.0e5, 300.0, 0.1);
        for _ in 0..200 {
            j.iteration_step(&mut net.ports.forward_view()).unwrap();
            assert!(j.split() >= MIN_SPLIT && j.split() <= MAX_SPLIT);
        }
        assert_eq!(j.split(), MAX_SPLIT);
    }
}
