//! Network convergence by repeated backward+forward rounds.
//!
//! One round runs a backward pass in reverse member order (nested meshes
//! converge completely at their position, leaves propagate boundary
//! requests upstream) followed by a forward pass in member order over the
//! leaves. The mesh converges once a forward pass completes with no member
//! pending.

use sf_components::Convergence;
use sf_core::ModelId;
use sf_net::PortTable;

use crate::error::{SimError, SimResult};
use crate::registry::ModelRegistry;

/// Round cap per `iteration_step` call.
pub const MAX_MESH_ROUNDS: u32 = 20;

#[derive(Debug)]
pub enum MeshMember {
    Leaf(ModelId),
    SubMesh(Mesh),
}

/// Result of one `Mesh::iteration_step` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshOutcome {
    Converged { rounds: u32 },
    /// Round cap reached with members still pending. The network state of
    /// the last round is kept.
    Exhausted { rounds: u32 },
}

impl MeshOutcome {
    /// External status code: 0 for both outcomes.
    pub fn status_code(self) -> i32 {
        0
    }

    pub fn is_converged(self) -> bool {
        matches!(self, MeshOutcome::Converged { .. })
    }

    pub fn rounds(self) -> u32 {
        match self {
            MeshOutcome::Converged { rounds } | MeshOutcome::Exhausted { rounds } => rounds,
        }
    }
}

#[derive(Debug)]
pub struct Mesh {
    name: String,
    members: Vec<MeshMember>,
    top_level: bool,
    max_rounds: u32,
    last_rounds: u32,
    exhaustions: u64,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            top_level: true,
            max_rounds: MAX_MESH_ROUNDS,
            last_rounds: 0,
            exhaustions: 0,
        }
    }

    pub fn with_leaf(mut self, id: ModelId) -> Self {
        self.push(MeshMember::Leaf(id));
        self
    }

    pub fn with_submesh(mut self, sub: Mesh) -> Self {
        self.push(MeshMember::SubMesh(sub));
        self
    }

    /// Lower the round cap (never above `MAX_MESH_ROUNDS`).
    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds.clamp(1, MAX_MESH_ROUNDS);
        self
    }

    pub fn push(&mut self, member: MeshMember) {
        let member = match member {
            MeshMember::SubMesh(mut sub) => {
                sub.top_level = false;
                MeshMember::SubMesh(sub)
            }
            leaf => leaf,
        };
        self.members.push(member);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[MeshMember] {
        &self.members
    }

    pub fn is_top_level(&self) -> bool {
        self.top_level
    }

    /// Rounds used by the last converged call.
    pub fn last_rounds(&self) -> u32 {
        self.last_rounds
    }

    /// Exhausted calls of this mesh and every nested mesh.
    pub fn total_exhaustions(&self) -> u64 {
        self.exhaustions
            + self
                .members
                .iter()
                .map(|m| match m {
                    MeshMember::SubMesh(sub) => sub.total_exhaustions(),
                    MeshMember::Leaf(_) => 0,
                })
                .sum::<u64>()
    }

    /// Every leaf model, nested meshes included, in member order.
    pub fn leaves(&self) -> Vec<ModelId> {
        let mut out = Vec::new();
        for member in &self.members {
            match member {
                MeshMember::Leaf(id) => out.push(*id),
                MeshMember::SubMesh(sub) => out.extend(sub.leaves()),
            }
        }
        out
    }

    /// Iterate until converged or the round cap is reached.
    ///
    /// Any model failure aborts the call immediately.
    pub fn iteration_step(
        &mut self,
        registry: &mut ModelRegistry,
        ports: &mut PortTable,
    ) -> SimResult<MeshOutcome> {
        for round in 1..=self.max_rounds {
            self.backward_pass(registry, ports)?;
            match self.forward_pass(registry, ports)? {
                None => {
                    self.last_rounds = round;
                    tracing::debug!(mesh = %self.name, rounds = round, "mesh converged");
                    return Ok(MeshOutcome::Converged { rounds: round });
                }
                Some(pending) => {
                    tracing::debug!(mesh = %self.name, round, pending = %pending, "mesh round pending");
                }
            }
        }

        self.exhaustions += 1;
        tracing::warn!(
            mesh = %self.name,
            rounds = self.max_rounds,
            "mesh did not converge within its round cap; continuing with unconverged state"
        );
        Ok(MeshOutcome::Exhausted {
            rounds: self.max_rounds,
        })
    }

    fn backward_pass(&mut self, registry: &mut ModelRegistry, ports: &mut PortTable) -> SimResult<()> {
        for member in self.members.iter_mut().rev() {
            match member {
                MeshMember::Leaf(id) => {
                    let model = registry.model_mut(*id)?;
                    model
                        .back_iter_step(&mut ports.backward_view())
                        .map_err(|e| SimError::model(model.name(), "back_iter_step", e))?;
                }
                MeshMember::SubMesh(sub) => {
                    sub.iteration_step(registry, ports)?;
                }
            }
        }
        Ok(())
    }

    /// Name of the first pending model, if any.
    fn forward_pass(&self, registry: &mut ModelRegistry, ports: &mut PortTable) -> SimResult<Option<String>> {
        let mut pending = None;
        for member in &self.members {
            let MeshMember::Leaf(id) = member else {
                continue;
            };
            let model = registry.model_mut(*id)?;
            let conv = model
                .iteration_step(&mut ports.forward_view())
                .map_err(|e| SimError::model(model.name(), "iteration_step", e))?;
            if conv == Convergence::Pending && pending.is_none() {
                pending = Some(model.name().to_string());
            }
        }
        Ok(pending)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use sf_components::{Model, ModelError, ModelResult};
    use sf_net::{BackwardPorts, ForwardPorts, Network, PortSpec};
    use std::sync::Arc;

    pub(crate) type CallLog = Arc<Mutex<Vec<String>>>;

    /// Reports `Pending` for its first `pending` forward steps.
    pub(crate) struct Stub {
        name: String,
        pending: u32,
        fail_forward: bool,
        log: CallLog,
    }

    impl Stub {
        pub(crate) fn new(name: &str, pending: u32, log: &CallLog) -> Self {
            Self {
                name: name.to_string(),
                pending,
                fail_forward: false,
                log: Arc::clone(log),
            }
        }

        pub(crate) fn failing(mut self) -> Self {
            self.fail_forward = true;
            self
        }
    }

    impl Model for Stub {
        fn name(&self) -> &str {
            &self.name
        }
        fn type_tag(&self) -> &'static str {
            "stub"
        }
        fn port_specs(&self) -> &'static [PortSpec] {
            &[]
        }
        fn bind(&mut self, _network: &Network) -> ModelResult<()> {
            Ok(())
        }
        fn time_step(
            &mut self,
            _ctx: &sf_components::StepContext,
            _ports: &mut ForwardPorts<'_>,
        ) -> ModelResult<()> {
            self.log.lock().push(format!("{}.time", self.name));
            if self.fail_forward {
                return Err(ModelError::Failed {
                    message: "stub failure".into(),
                });
            }
            Ok(())
        }
        fn iteration_step(&mut self, _ports: &mut ForwardPorts<'_>) -> ModelResult<Convergence> {
            self.log.lock().push(format!("{}.fwd", self.name));
            if self.fail_forward {
                return Err(ModelError::Failed {
                    message: "stub failure".into(),
                });
            }
            if self.pending > 0 {
                self.pending -= 1;
                return Ok(Convergence::Pending);
            }
            Ok(Convergence::Converged)
        }
        fn back_iter_step(&mut self, _ports: &mut BackwardPorts<'_>) -> ModelResult<()> {
            self.log.lock().push(format!("{}.back", self.name));
            Ok(())
        }
        fn regul_step(
            &mut self,
            ctx: &sf_components::StepContext,
            _ports: &mut ForwardPorts<'_>,
        ) -> ModelResult<()> {
            self.log.lock().push(format!("{}.regul@{}", self.name, ctx.tick));
            Ok(())
        }
    }

    fn setup(stubs: Vec<Stub>) -> (ModelRegistry, Vec<ModelId>) {
        let mut reg = ModelRegistry::new();
        let ids = stubs
            .into_iter()
            .map(|s| reg.register_instance(Box::new(s)).unwrap())
            .collect();
        (reg, ids)
    }

    #[test]
    fn single_round_order() {
        let log = CallLog::default();
        let (mut reg, ids) = setup(vec![Stub::new("a", 0, &log), Stub::new("b", 0, &log)]);
        let mut mesh = Mesh::new("m").with_leaf(ids[0]).with_leaf(ids[1]);
        let mut ports = PortTable::default();

        let outcome = mesh.iteration_step(&mut reg, &mut ports).unwrap();
        assert_eq!(outcome, MeshOutcome::Converged { rounds: 1 });
        assert_eq!(*log.lock(), vec!["b.back", "a.back", "a.fwd", "b.fwd"]);
    }

    #[test]
    fn pending_member_adds_rounds() {
        let log = CallLog::default();
        let (mut reg, ids) = setup(vec![Stub::new("a", 2, &log)]);
        let mut mesh = Mesh::new("m").with_leaf(ids[0]);
        let outcome = mesh
            .iteration_step(&mut reg, &mut PortTable::default())
            .unwrap();
        assert_eq!(outcome.rounds(), 3);
        assert_eq!(mesh.last_rounds(), 3);
    }

    #[test]
    fn exhaustion_reports_success_code() {
        let log = CallLog::default();
        let (mut reg, ids) = setup(vec![Stub::new("a", u32::MAX, &log)]);
        let mut mesh = Mesh::new("m").with_leaf(ids[0]);
        let outcome = mesh
            .iteration_step(&mut reg, &mut PortTable::default())
            .unwrap();
        assert_eq!(
            outcome,
            MeshOutcome::Exhausted {
                rounds: MAX_MESH_ROUNDS
            }
        );
        assert_eq!(outcome.status_code(), 0);
        assert_eq!(mesh.total_exhaustions(), 1);
        assert_eq!(log.lock().len(), 2 * MAX_MESH_ROUNDS as usize);
    }

    #[test]
    fn nested_mesh_converges_during_backward_pass() {
        let log = CallLog::default();
        let (mut reg, ids) = setup(vec![
            Stub::new("outer", 0, &log),
            Stub::new("inner", 1, &log),
        ]);
        let sub = Mesh::new("sub").with_leaf(ids[1]);
        let mut mesh = Mesh::new("top").with_leaf(ids[0]).with_submesh(sub);
        assert!(mesh.is_top_level());
        let MeshMember::SubMesh(sub) = &mesh.members()[1] else {
            panic!("expected submesh");
        };
        assert!(!sub.is_top_level());

        mesh.iteration_step(&mut reg, &mut PortTable::default())
            .unwrap();
        assert_eq!(
            *log.lock(),
            vec![
                "inner.back",
                "inner.fwd",
                "inner.back",
                "inner.fwd",
                "outer.back",
                "outer.fwd"
            ]
        );
        assert_eq!(mesh.leaves(), vec![ids[0], ids[1]]);
    }

    #[test]
    fn failure_aborts() {
        let log = CallLog::default();
        let (mut reg, ids) = setup(vec![
            Stub::new("a", 0, &log).failing(),
            Stub::new("b", 0, &log),
        ]);
        let mut mesh = Mesh::new("m").with_leaf(ids[0]).with_leaf(ids[1]);
        let err = mesh
            .iteration_step(&mut reg, &mut PortTable::default())
            .unwrap_err();
        assert!(matches!(err, SimError::Model { op: "iteration_step", .. }));
        assert!(!log.lock().contains(&"b.fwd".to_string()));
    }
}
