//! Master-loop scenarios: pacing overrun, pause/resume, fatal abort.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use sf_components::{
    Convergence, FlowSink, Model, ModelResult, PressureSource, Schedule, StepContext, Tank,
};
use sf_core::units::{k, kgps, pa};
use sf_net::{BackwardPorts, FluidKind, ForwardPorts, Network, NetworkBuilder, PortSpec};
use sf_sim::{
    Kernel, KernelConfig, MemorySink, Mesh, ModelRegistry, OutputField, RunOutcome, SimError,
    SimulatorState,
};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Time-stepped model whose step takes `delay` of wall time.
struct Slow {
    delay: Duration,
    steps: u32,
}

impl Model for Slow {
    fn name(&self) -> &str {
        "slow"
    }
    fn type_tag(&self) -> &'static str {
        "slow"
    }
    fn port_specs(&self) -> &'static [PortSpec] {
        &[]
    }
    fn bind(&mut self, _network: &Network) -> ModelResult<()> {
        Ok(())
    }
    fn schedule(&self) -> Schedule {
        Schedule::time_stepped()
    }
    fn time_step(&mut self, _ctx: &StepContext, _ports: &mut ForwardPorts<'_>) -> ModelResult<()> {
        thread::sleep(self.delay);
        self.steps += 1;
        Ok(())
    }
    fn iteration_step(&mut self, _ports: &mut ForwardPorts<'_>) -> ModelResult<Convergence> {
        Ok(Convergence::Converged)
    }
    fn back_iter_step(&mut self, _ports: &mut BackwardPorts<'_>) -> ModelResult<()> {
        Ok(())
    }
    fn get_field(&self, name: &str) -> ModelResult<f64> {
        match name {
            "steps" => Ok(f64::from(self.steps)),
            _ => Err(sf_components::ModelError::UnknownField {
                name: name.to_string(),
            }),
        }
    }
}

/// Counts `warn` events emitted while installed.
#[derive(Clone, Default)]
struct WarnCounter(Arc<AtomicUsize>);

impl WarnCounter {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn kernel_with(models: Vec<Box<dyn Model>>, config: KernelConfig) -> Kernel {
    let mut registry = ModelRegistry::new();
    for m in models {
        registry.register_instance(m).unwrap();
    }
    let mut builder = NetworkBuilder::new();
    registry.declare_ports(&mut builder).unwrap();
    let network = builder.build().unwrap();
    Kernel::new(config, registry, network).unwrap()
}

#[test]
fn overrun_completes_tick_once() {
    let config = KernelConfig {
        step_s: 0.5,
        interval: Duration::from_millis(5),
        max_ticks: Some(1),
        ..KernelConfig::default()
    };
    let slow = Slow {
        delay: Duration::from_millis(30),
        steps: 0,
    };
    let sink = MemorySink::new();
    let mut kernel = kernel_with(vec![Box::new(slow)], config)
        .with_outputs(vec![OutputField::new("slow", "steps")])
        .unwrap()
        .with_sink(Box::new(sink.clone()));

    let warnings = WarnCounter::default();
    let subscriber = tracing_subscriber::registry().with(warnings.clone());
    let summary = tracing::subscriber::with_default(subscriber, || kernel.run()).unwrap();
    assert_eq!(summary.ticks, 1);
    assert_eq!(summary.t_final, 0.5);
    assert_eq!(summary.overruns, 1);
    assert_eq!(warnings.count(), 1);
    assert!(summary.is_clean());

    let rows = sink.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values, vec![1.0]);
    assert_eq!(sink.columns(), vec!["slow.steps"]);
}

#[test]
fn pause_freezes_clock_and_resume_continues() {
    let config = KernelConfig {
        step_s: 0.1,
        interval: Duration::from_millis(5),
        max_ticks: Some(60),
        ..KernelConfig::default()
    };
    let source = PressureSource::new("src", FluidKind::Air, pa(2.0e5), k(300.0));
    let sink = MemorySink::new();
    let kernel = kernel_with(vec![Box::new(source)], config).with_sink(Box::new(sink.clone()));
    let handle = kernel.spawn().unwrap();

    thread::sleep(Duration::from_millis(40));
    assert_eq!(handle.pause().unwrap(), SimulatorState::Paused);
    assert_eq!(handle.pause().unwrap(), SimulatorState::Paused);
    // Let an in-flight tick finish.
    thread::sleep(Duration::from_millis(30));

    let first = handle.clock();
    for _ in 0..3 {
        thread::sleep(Duration::from_millis(20));
        assert_eq!(handle.clock(), first);
    }
    assert!(first.tick < 60);
    assert_eq!(handle.state(), SimulatorState::Paused);

    // Field access is serviced while paused.
    assert_eq!(handle.get_field("src", "p_pa").unwrap(), 2.0e5);
    handle.set_field("src", "p_pa", 3.0e5).unwrap();
    assert_eq!(handle.get_field("src", "p_pa").unwrap(), 3.0e5);
    assert!(handle.get_field("ghost", "p_pa").is_err());

    assert_eq!(handle.resume().unwrap(), SimulatorState::Running);
    let summary = handle.join().unwrap();
    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.ticks, 60);

    let rows = sink.rows();
    let ticks: Vec<u64> = rows.iter().map(|r| r.tick).collect();
    assert_eq!(ticks, (1..=60).collect::<Vec<_>>());
    for row in &rows {
        assert_eq!(row.t, row.tick as f64 * 0.1);
    }
}

#[test]
fn stop_ends_run_at_tick_boundary() {
    let config = KernelConfig {
        step_s: 0.1,
        interval: Duration::from_millis(5),
        start_paused: true,
        ..KernelConfig::default()
    };
    let kernel = kernel_with(vec![], config);
    let handle = kernel.spawn().unwrap();
    assert_eq!(handle.state(), SimulatorState::Paused);
    assert_eq!(handle.start().unwrap(), SimulatorState::Running);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(handle.stop().unwrap(), SimulatorState::Stopping);

    let summary = handle.join().unwrap();
    assert_eq!(summary.outcome, RunOutcome::Stopped);
    assert!(summary.is_clean());
}

#[test]
fn fatal_model_failure_aborts_run() {
    let mut registry = ModelRegistry::new();
    let tank = registry
        .register_instance(Box::new(Tank::new("tank", 1.0, 2.0e5, 300.0).unwrap()))
        .unwrap();
    let drain = registry
        .register_instance(Box::new(FlowSink::new("drain", kgps(10.0))))
        .unwrap();
    let mut builder = NetworkBuilder::new();
    registry.declare_ports(&mut builder).unwrap();
    builder.connect("tank", "out", "drain", "in");
    let network = builder.build().unwrap();

    let config = KernelConfig {
        step_s: 1.0,
        interval: Duration::ZERO,
        max_ticks: Some(5),
        ..KernelConfig::default()
    };
    let sink = MemorySink::new();
    let mut kernel = Kernel::new(config, registry, network)
        .unwrap()
        .with_meshes(vec![Mesh::new("drain").with_leaf(tank).with_leaf(drain)])
        .unwrap()
        .with_sink(Box::new(sink.clone()));

    let err = kernel.run().unwrap_err();
    assert!(matches!(err, SimError::Model { ref model, op: "time_step", .. } if model == "tank"));
    assert_eq!(kernel.state(), SimulatorState::NotRunning);

    let summary = sink.summary().unwrap();
    assert!(summary.degraded);
    assert!(matches!(summary.outcome, RunOutcome::Failed { .. }));
    assert!(sink.rows().is_empty());
}
