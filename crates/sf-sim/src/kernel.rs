//! The master loop.
//!
//! Startup initializes every model and converges all meshes once at t = 0.
//! Each tick then runs, strictly in order: time-step list, data exchange,
//! regulation list, top-level meshes, clock advance, result row, pacing
//! sleep. Run control is observed only between ticks.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use std::time::Duration;

use sf_components::StepContext;
use sf_core::timing::{AccumulatingTimer, Timer};
use sf_net::{Network, PortTable};

use crate::calc_step::{CalcStepList, IterationStepList, StepKind};
use crate::control::{Clock, Command, KernelHandle, SimControl, SimulatorState, command_channel};
use crate::error::{SimError, SimResult};
use crate::exchange::DataExchange;
use crate::mesh::Mesh;
use crate::registry::ModelRegistry;
use crate::sink::{OutputField, ResultSink, RunOutcome, RunSummary, TickRow};

/// How long a paused loop sleeps between command checks.
const PAUSE_POLL: Duration = Duration::from_millis(20);

/// Loop settings.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelConfig {
    /// Simulated seconds per tick.
    pub step_s: f64,
    /// Wall-clock budget per tick; zero disables pacing.
    pub interval: Duration,
    /// Stop once the clock reaches this time.
    pub t_end_s: Option<f64>,
    /// Stop after this many ticks.
    pub max_ticks: Option<u64>,
    /// Wait for `start` before the first tick.
    pub start_paused: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            step_s: 0.1,
            interval: Duration::from_millis(100),
            t_end_s: None,
            max_ticks: None,
            start_paused: false,
        }
    }
}

/// Relative slack absorbing rounding in `t_end / step` (1.1 / 0.1 > 11).
const TICK_RATIO_SLACK: f64 = 1e-9;

impl KernelConfig {
    pub fn validate(&self) -> SimResult<()> {
        if !self.step_s.is_finite() || self.step_s <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "step_s must be positive",
            });
        }
        if let Some(t_end) = self.t_end_s
            && (!t_end.is_finite() || t_end < 0.0)
        {
            return Err(SimError::InvalidArg {
                what: "t_end_s must be non-negative",
            });
        }
        Ok(())
    }

    /// Number of ticks after which the run completes, if bounded.
    pub fn tick_limit(&self) -> Option<u64> {
        let from_time = self
            .t_end_s
            .map(|t| ((t / self.step_s) * (1.0 - TICK_RATIO_SLACK)).ceil().max(0.0) as u64);
        match (from_time, self.max_ticks) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

#[derive(Debug, Default)]
struct RunStats {
    overruns: u64,
    mesh_exhaustions: u64,
    exchange_failures: u64,
    degraded: bool,
    tick_time: AccumulatingTimer,
}

struct DiscardSink;

impl ResultSink for DiscardSink {
    fn write_row(&mut self, _row: &TickRow) -> SimResult<()> {
        Ok(())
    }

    fn finish(&mut self, _summary: &RunSummary) -> SimResult<()> {
        Ok(())
    }
}

fn read_field(registry: &ModelRegistry, model: &str, field: &str) -> SimResult<f64> {
    registry
        .get(model)?
        .get_field(field)
        .map_err(|e| SimError::model(model, "get_field", e))
}

pub struct Kernel {
    config: KernelConfig,
    registry: ModelRegistry,
    ports: PortTable,
    time_steps: CalcStepList,
    reguls: CalcStepList,
    meshes: IterationStepList,
    exchange: Option<Box<dyn DataExchange>>,
    outputs: Vec<OutputField>,
    sink: Box<dyn ResultSink>,
    control: Arc<SimControl>,
    command_tx: Sender<Command>,
    commands: Receiver<Command>,
    clock: Clock,
    stats: RunStats,
}

impl Kernel {
    /// Bind every registered model to `network` and build the calc-step
    /// lists from the models' schedules.
    pub fn new(config: KernelConfig, mut registry: ModelRegistry, network: Network) -> SimResult<Self> {
        config.validate()?;
        registry.bind_all(&network)?;
        let time_steps = CalcStepList::from_registry(StepKind::Time, &registry);
        let reguls = CalcStepList::from_registry(StepKind::Regul, &registry);
        let (command_tx, commands) = command_channel();

        Ok(Self {
            config,
            registry,
            ports: network.ports,
            time_steps,
            reguls,
            meshes: IterationStepList::default(),
            exchange: None,
            outputs: Vec::new(),
            sink: Box::new(DiscardSink),
            control: Arc::new(SimControl::new()),
            command_tx,
            commands,
            clock: Clock::default(),
            stats: RunStats::default(),
        })
    }

    /// Top-level meshes, converged in the given order every tick.
    pub fn with_meshes(mut self, meshes: Vec<Mesh>) -> SimResult<Self> {
        self.meshes = IterationStepList::new(meshes, &self.registry)?;
        Ok(self)
    }

    pub fn with_exchange(mut self, exchange: Box<dyn DataExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    /// Fields recorded in every row; each must be readable now.
    pub fn with_outputs(mut self, outputs: Vec<OutputField>) -> SimResult<Self> {
        for output in &outputs {
            read_field(&self.registry, &output.model, &output.field)?;
        }
        self.outputs = outputs;
        Ok(self)
    }

    pub fn with_sink(mut self, sink: Box<dyn ResultSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn ports(&self) -> &PortTable {
        &self.ports
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn state(&self) -> SimulatorState {
        self.control.state()
    }

    /// Run the loop on a dedicated thread.
    pub fn spawn(self) -> SimResult<KernelHandle> {
        let control = Arc::clone(&self.control);
        let commands = self.command_tx.clone();
        control.enter(self.config.start_paused);

        let thread = thread::Builder::new()
            .name("sf-kernel".into())
            .spawn(move || {
                let mut kernel = self;
                kernel.run()
            })
            .map_err(|e| SimError::Spawn {
                message: e.to_string(),
            })?;
        Ok(KernelHandle::new(control, commands, thread))
    }

    /// Run the loop on the calling thread until it completes, is stopped or
    /// fails.
    pub fn run(&mut self) -> SimResult<RunSummary> {
        self.control.enter(self.config.start_paused);
        tracing::info!(
            models = self.registry.len(),
            meshes = self.meshes.len(),
            step_s = self.config.step_s,
            interval_ms = self.config.interval.as_millis() as u64,
            tick_limit = ?self.config.tick_limit(),
            "kernel starting"
        );

        let columns: Vec<String> = self.outputs.iter().map(OutputField::column).collect();
        if let Err(e) = self.sink.begin(&columns).and_then(|()| self.startup()) {
            return Err(self.abort(e));
        }

        let outcome = loop {
            self.service_commands();
            match self.control.state() {
                SimulatorState::Running => {}
                SimulatorState::Paused => {
                    self.control.wait_while_paused(PAUSE_POLL);
                    continue;
                }
                SimulatorState::Stopping | SimulatorState::NotRunning => break RunOutcome::Stopped,
            }
            if self
                .config
                .tick_limit()
                .is_some_and(|limit| self.clock.tick >= limit)
            {
                break RunOutcome::Completed;
            }

            let timer = Timer::start("tick");
            if let Err(e) = self.tick() {
                return Err(self.abort(e));
            }
            self.pace(&timer);
        };

        Ok(self.finish(outcome))
    }

    fn startup(&mut self) -> SimResult<()> {
        self.registry.init_all(&mut self.ports)?;
        let report = self.meshes.run(&mut self.registry, &mut self.ports)?;
        self.note_exhaustions(report.exhausted);
        tracing::debug!(rounds = ?report.rounds, "initial mesh pass complete");
        Ok(())
    }

    fn tick(&mut self) -> SimResult<()> {
        let ctx = StepContext {
            tick: self.clock.tick,
            t: self.clock.t,
            dt: self.config.step_s,
        };

        self.time_steps.run(&ctx, &mut self.registry, &mut self.ports)?;

        if let Some(exchange) = self.exchange.as_mut()
            && let Err(e) = exchange.exchange(&mut self.registry)
        {
            self.stats.exchange_failures += 1;
            tracing::warn!(tick = ctx.tick, error = %e, "data exchange failed");
        }

        self.reguls.run(&ctx, &mut self.registry, &mut self.ports)?;

        let report = self.meshes.run(&mut self.registry, &mut self.ports)?;
        self.note_exhaustions(report.exhausted);

        let tick = self.clock.tick + 1;
        self.clock = Clock {
            tick,
            t: tick as f64 * self.config.step_s,
        };
        self.control.publish_clock(self.clock);

        let row = TickRow {
            tick,
            t: self.clock.t,
            values: self
                .outputs
                .iter()
                .map(|o| read_field(&self.registry, &o.model, &o.field).unwrap_or(f64::NAN))
                .collect(),
        };
        if let Err(e) = self.sink.write_row(&row) {
            self.stats.degraded = true;
            tracing::warn!(tick, error = %e, "result row not written");
        }
        Ok(())
    }

    fn note_exhaustions(&mut self, exhausted: u64) {
        if exhausted > 0 {
            self.stats.mesh_exhaustions += exhausted;
            self.stats.degraded = true;
        }
    }

    fn pace(&mut self, timer: &Timer) {
        let elapsed = timer.elapsed();
        self.stats.tick_time.record(elapsed);
        let interval = self.config.interval;
        if interval.is_zero() {
            return;
        }
        if elapsed > interval {
            self.stats.overruns += 1;
            tracing::warn!(
                tick = self.clock.tick,
                phase = timer.label(),
                elapsed_ms = elapsed.as_secs_f64() * 1e3,
                interval_ms = interval.as_secs_f64() * 1e3,
                "tick overran its pacing interval"
            );
        } else {
            thread::sleep(timer.remaining(interval));
        }
    }

    fn service_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::GetField {
                    model,
                    field,
                    reply,
                } => {
                    // The requester may have given up; nothing to do then.
                    let _ = reply.send(read_field(&self.registry, &model, &field));
                }
                Command::SetField {
                    model,
                    field,
                    value,
                    reply,
                } => {
                    let result = self.registry.get_mut(&model).and_then(|m| {
                        m.set_field(&field, value)
                            .map_err(|e| SimError::model(&model, "set_field", e))
                    });
                    if result.is_ok() {
                        tracing::info!(model = %model, field = %field, value, "field set");
                    }
                    let _ = reply.send(result);
                }
            }
        }
    }

    fn summary(&self, outcome: RunOutcome) -> RunSummary {
        RunSummary {
            outcome,
            ticks: self.clock.tick,
            t_final: self.clock.t,
            overruns: self.stats.overruns,
            mesh_exhaustions: self.stats.mesh_exhaustions,
            exchange_failures: self.stats.exchange_failures,
            mean_tick_s: self.stats.tick_time.average_seconds(),
            degraded: self.stats.degraded,
        }
    }

    fn abort(&mut self, error: SimError) -> SimError {
        tracing::error!(tick = self.clock.tick, t = self.clock.t, error = %error, "simulation aborted");
        self.stats.degraded = true;
        let summary = self.summary(RunOutcome::Failed {
            message: error.to_string(),
        });
        if let Err(e) = self.sink.finish(&summary) {
            tracing::warn!(error = %e, "final summary not written");
        }
        self.control.leave();
        error
    }

    fn finish(&mut self, outcome: RunOutcome) -> RunSummary {
        let summary = self.summary(outcome);
        if let Err(e) = self.sink.finish(&summary) {
            tracing::warn!(error = %e, "final summary not written");
        }
        tracing::info!(
            outcome = ?summary.outcome,
            ticks = summary.ticks,
            t_final = summary.t_final,
            overruns = summary.overruns,
            mesh_exhaustions = summary.mesh_exhaustions,
            clean = summary.is_clean(),
            "kernel finished"
        );
        self.control.leave();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tests::{CallLog, Stub};
    use crate::sink::MemorySink;
    use sf_net::NetworkBuilder;

    fn kernel(stubs: Vec<Stub>, config: KernelConfig) -> Kernel {
        let mut reg = ModelRegistry::new();
        for stub in stubs {
            reg.register_instance(Box::new(stub)).unwrap();
        }
        let network = NetworkBuilder::new().build().unwrap();
        Kernel::new(config, reg, network).unwrap()
    }

    fn unpaced(max_ticks: u64) -> KernelConfig {
        KernelConfig {
            step_s: 0.25,
            interval: Duration::ZERO,
            max_ticks: Some(max_ticks),
            ..KernelConfig::default()
        }
    }

    #[test]
    fn tick_limit_from_end_time() {
        let cfg = KernelConfig {
            step_s: 0.1,
            t_end_s: Some(1.0),
            ..KernelConfig::default()
        };
        assert_eq!(cfg.tick_limit(), Some(10));
        let capped = KernelConfig {
            max_ticks: Some(3),
            ..cfg.clone()
        };
        assert_eq!(capped.tick_limit(), Some(3));
        assert_eq!(KernelConfig::default().tick_limit(), None);
    }

    #[test]
    fn tick_limit_rounding() {
        let limit = |t_end: f64, step_s: f64| {
            KernelConfig {
                step_s,
                t_end_s: Some(t_end),
                ..KernelConfig::default()
            }
            .tick_limit()
        };
        assert_eq!(limit(1e-10, 0.1), Some(1));
        assert_eq!(limit(1e-9, 1.0), Some(1));
        assert_eq!(limit(1.1, 0.1), Some(11));
        assert_eq!(limit(0.3, 0.1), Some(3));
        assert_eq!(limit(0.0, 0.1), Some(0));
    }

    #[test]
    fn invalid_step_rejected() {
        let cfg = KernelConfig {
            step_s: 0.0,
            ..KernelConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn clock_advances_without_drift() {
        let sink = MemorySink::new();
        let mut k = kernel(vec![], unpaced(7)).with_sink(Box::new(sink.clone()));
        let summary = k.run().unwrap();

        assert_eq!(summary.ticks, 7);
        assert_eq!(summary.t_final, 7.0 * 0.25);
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert!(summary.is_clean());
        let ticks: Vec<u64> = sink.rows().iter().map(|r| r.tick).collect();
        assert_eq!(ticks, (1..=7).collect::<Vec<_>>());
        assert_eq!(k.state(), SimulatorState::NotRunning);
    }

    #[test]
    fn time_steps_see_tick_start() {
        let log = CallLog::default();
        let mut k = kernel(vec![], unpaced(2));
        let id = k
            .registry
            .register_instance(Box::new(Stub::new("s", 0, &log)))
            .unwrap();
        k.time_steps.push(id, 1);
        k.run().unwrap();
        assert_eq!(*log.lock(), vec!["s.time", "s.time"]);
    }

    #[test]
    fn fatal_time_step_aborts_and_writes_summary() {
        let log = CallLog::default();
        let sink = MemorySink::new();
        let mut k = kernel(vec![], unpaced(5)).with_sink(Box::new(sink.clone()));
        let id = k
            .registry
            .register_instance(Box::new(Stub::new("bad", 0, &log).failing()))
            .unwrap();
        k.time_steps.push(id, 1);

        let err = k.run().unwrap_err();
        assert!(matches!(err, SimError::Model { op: "time_step", .. }));
        let summary = sink.summary().unwrap();
        assert!(summary.degraded);
        assert!(matches!(summary.outcome, RunOutcome::Failed { .. }));
        assert_eq!(summary.ticks, 0);
        assert!(sink.rows().is_empty());
        assert_eq!(k.state(), SimulatorState::NotRunning);
    }
}
