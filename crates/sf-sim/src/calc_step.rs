//! Calc-step containers: ordered execution lists built once at load time.

use std::collections::HashSet;

use sf_components::StepContext;
use sf_core::ModelId;
use sf_net::PortTable;

use crate::error::{SimError, SimResult};
use crate::mesh::{Mesh, MeshOutcome};
use crate::registry::ModelRegistry;

/// Which model operation a `CalcStepList` drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Time,
    Regul,
}

impl StepKind {
    fn op(self) -> &'static str {
        match self {
            StepKind::Time => "time_step",
            StepKind::Regul => "regul_step",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Member {
    id: ModelId,
    /// Run when `tick % every == 0`.
    every: u32,
}

/// Insertion-ordered list of models sharing one step operation.
#[derive(Debug, Clone)]
pub struct CalcStepList {
    kind: StepKind,
    members: Vec<Member>,
}

impl CalcStepList {
    pub fn new(kind: StepKind) -> Self {
        Self {
            kind,
            members: Vec::new(),
        }
    }

    /// Collect every registered model whose schedule asks for `kind`.
    pub fn from_registry(kind: StepKind, registry: &ModelRegistry) -> Self {
        let mut list = Self::new(kind);
        for (id, model) in registry.iter() {
            let schedule = model.schedule();
            match kind {
                StepKind::Time if schedule.time_step => list.push(id, 1),
                StepKind::Regul if schedule.wants_regul() => list.push(id, schedule.regul_every),
                _ => {}
            }
        }
        tracing::debug!(kind = kind.op(), members = list.len(), "built calc-step list");
        list
    }

    /// Append a member running every `every` ticks (0 is treated as 1).
    pub fn push(&mut self, id: ModelId, every: u32) {
        self.members.push(Member {
            id,
            every: every.max(1),
        });
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn ids(&self) -> Vec<ModelId> {
        self.members.iter().map(|m| m.id).collect()
    }

    /// Run every due member once, in order, stopping at the first failure.
    pub fn run(&self, ctx: &StepContext, registry: &mut ModelRegistry, ports: &mut PortTable) -> SimResult<()> {
        for member in &self.members {
            if ctx.tick % u64::from(member.every) != 0 {
                continue;
            }
            let model = registry.model_mut(member.id)?;
            let mut view = ports.forward_view();
            let result = match self.kind {
                StepKind::Time => model.time_step(ctx, &mut view),
                StepKind::Regul => model.regul_step(ctx, &mut view),
            };
            result.map_err(|e| SimError::model(model.name(), self.kind.op(), e))?;
        }
        Ok(())
    }
}

/// What one pass over the top-level meshes produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeshPassReport {
    /// Rounds used per top-level mesh, in list order.
    pub rounds: Vec<u32>,
    /// Exhausted mesh calls during the pass, nested meshes included.
    pub exhausted: u64,
}

/// The ordered list of top-level meshes.
#[derive(Debug, Default)]
pub struct IterationStepList {
    meshes: Vec<Mesh>,
}

impl IterationStepList {
    /// Take ownership of the top-level meshes; a model may belong to at most
    /// one mesh.
    pub fn new(meshes: Vec<Mesh>, registry: &ModelRegistry) -> SimResult<Self> {
        let mut seen = HashSet::new();
        for mesh in &meshes {
            for id in mesh.leaves() {
                if !seen.insert(id) {
                    return Err(SimError::DuplicateMeshMember {
                        model: registry.model(id)?.name().to_string(),
                    });
                }
            }
        }
        Ok(Self { meshes })
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    /// Converge every mesh in order. Exhaustion is reported, not fatal.
    pub fn run(&mut self, registry: &mut ModelRegistry, ports: &mut PortTable) -> SimResult<MeshPassReport> {
        let mut report = MeshPassReport::default();
        for mesh in &mut self.meshes {
            let before = mesh.total_exhaustions();
            let outcome: MeshOutcome = mesh.iteration_step(registry, ports)?;
            report.rounds.push(outcome.rounds());
            report.exhausted += mesh.total_exhaustions() - before;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tests::{CallLog, Stub};
    use proptest::prelude::*;

    fn ctx(tick: u64) -> StepContext {
        StepContext {
            tick,
            t: tick as f64 * 0.1,
            dt: 0.1,
        }
    }

    fn registry_of(count: usize, fail_at: Option<usize>, log: &CallLog) -> (ModelRegistry, Vec<ModelId>) {
        let mut reg = ModelRegistry::new();
        let ids = (0..count)
            .map(|i| {
                let stub = Stub::new(&format!("m{i}"), 0, log);
                let stub = if fail_at == Some(i) { stub.failing() } else { stub };
                reg.register_instance(Box::new(stub)).unwrap()
            })
            .collect();
        (reg, ids)
    }

    proptest! {
        #[test]
        fn runs_in_insertion_order_and_stops_at_first_failure(
            count in 1usize..12,
            fail_seed in any::<Option<usize>>(),
        ) {
            let fail_at = fail_seed.map(|s| s % count);
            let log = CallLog::default();
            let (mut reg, ids) = registry_of(count, fail_at, &log);
            let mut list = CalcStepList::new(StepKind::Time);
            for id in &ids {
                list.push(*id, 1);
            }

            let result = list.run(&ctx(0), &mut reg, &mut PortTable::default());
            let called = fail_at.map_or(count, |f| f + 1);
            let expected: Vec<String> = (0..called).map(|i| format!("m{i}.time")).collect();
            prop_assert_eq!(&*log.lock(), &expected);
            prop_assert_eq!(result.is_err(), fail_at.is_some());
        }
    }

    #[test]
    fn regulation_period_is_respected() {
        let log = CallLog::default();
        let (mut reg, ids) = registry_of(2, None, &log);
        let mut list = CalcStepList::new(StepKind::Regul);
        list.push(ids[0], 1);
        list.push(ids[1], 3);
        let mut ports = PortTable::default();
        for tick in 0..6 {
            list.run(&ctx(tick), &mut reg, &mut ports).unwrap();
        }
        assert_eq!(
            *log.lock(),
            vec![
                "m0.regul@0",
                "m1.regul@0",
                "m0.regul@1",
                "m0.regul@2",
                "m0.regul@3",
                "m1.regul@3",
                "m0.regul@4",
                "m0.regul@5",
            ]
        );
    }

    #[test]
    fn from_registry_uses_schedules() {
        use sf_components::{Pipe, Tank, Valve};
        let mut reg = ModelRegistry::new();
        reg.register_instance(Box::new(Pipe::new("pipe", 1.0))).unwrap();
        let tank = reg
            .register_instance(Box::new(Tank::new("tank", 1.0, 1.0e5, 300.0).unwrap()))
            .unwrap();
        let valve = reg
            .register_instance(Box::new(Valve::new("valve", 1.0, 1.0)))
            .unwrap();

        assert_eq!(CalcStepList::from_registry(StepKind::Time, &reg).ids(), vec![tank]);
        assert_eq!(CalcStepList::from_registry(StepKind::Regul, &reg).ids(), vec![valve]);
    }

    #[test]
    fn model_in_two_meshes_rejected() {
        let log = CallLog::default();
        let (reg, ids) = registry_of(2, None, &log);
        let a = Mesh::new("a").with_leaf(ids[0]).with_leaf(ids[1]);
        let b = Mesh::new("b").with_leaf(ids[1]);
        let err = IterationStepList::new(vec![a, b], &reg).unwrap_err();
        assert!(matches!(err, SimError::DuplicateMeshMember { model } if model == "m1"));
    }

    #[test]
    fn exhaustion_is_counted_per_pass() {
        let log = CallLog::default();
        let mut reg = ModelRegistry::new();
        let stuck = reg
            .register_instance(Box::new(Stub::new("stuck", u32::MAX, &log)))
            .unwrap();
        let fine = reg
            .register_instance(Box::new(Stub::new("fine", 0, &log)))
            .unwrap();
        let mut list = IterationStepList::new(
            vec![Mesh::new("a").with_leaf(stuck), Mesh::new("b").with_leaf(fine)],
            &reg,
        )
        .unwrap();

        let report = list.run(&mut reg, &mut PortTable::default()).unwrap();
        assert_eq!(report.exhausted, 1);
        assert_eq!(report.rounds, vec![20, 1]);
    }
}
