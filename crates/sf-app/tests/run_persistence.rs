use std::time::{Duration, Instant};

use sf_app::*;
use sf_project::Project;
use sf_results::RunStore;
use sf_sim::{RunOutcome, SimulatorState};

const CHAIN: &str = r#"
version: 1
name: chain
kernel: { step_s: 0.1, pacing_ms: 0, t_end_s: 0.5 }
models:
  - id: src
    kind: { type: pressure_source, p_pa: 5.0e5, t_k: 300.0 }
  - id: pipe
    kind: { type: pipe, k: 2.0e4 }
  - id: valve
    kind: { type: valve, k_open: 1.0e4, opening: 1.0 }
  - id: sink
    kind: { type: flow_sink, mdot_kgps: 0.1 }
connections:
  - { from: src.out, to: pipe.in }
  - { from: pipe.out, to: valve.in }
  - { from: valve.out, to: sink.in }
meshes:
  - id: main
    members: [src, pipe, valve, sink]
outputs: [sink.p_pa, valve.opening]
"#;

fn chain() -> Project {
    serde_yaml::from_str(CHAIN).unwrap()
}

fn fresh_store(name: &str) -> RunStore {
    let dir = std::env::temp_dir().join(name);
    let _ = std::fs::remove_dir_all(&dir);
    RunStore::new(dir).unwrap()
}

fn unpaced() -> RunOptions {
    RunOptions {
        overrides: RunOverrides {
            pacing_ms: Some(0),
            ..RunOverrides::default()
        },
        ..RunOptions::default()
    }
}

#[test]
fn completed_run_is_stored() {
    let store = fresh_store("sf_app_completed_run");
    let response = run_project(&chain(), &store, &unpaced()).unwrap();

    assert_eq!(response.summary.outcome, RunOutcome::Completed);
    assert_eq!(response.summary.ticks, 5);
    assert!(response.summary.is_clean());

    let stored = load_run(&store, &response.run_id).unwrap();
    assert_eq!(stored.manifest.columns, vec!["sink.p_pa", "valve.opening"]);
    assert_eq!(stored.records.len(), 5);
    // 0.1 kg/s: pipe 2e4*0.01 + valve 1e4*0.01.
    let p_sink = stored.records[4].values[0].unwrap();
    assert!((p_sink - (5.0e5 - 300.0)).abs() < 1e-6, "{p_sink}");
    assert_eq!(stored.summary, Some(response.summary));

    assert_eq!(list_runs(&store, Some("chain")).unwrap().len(), 1);
}

#[test]
fn exchange_feeds_valve_opening_into_demand() {
    let mut project = chain();
    project.models[2].kind = sf_project::ModelKindDef::Valve {
        k_open: 1.0e4,
        opening: 0.2,
        tau_s: 0.5,
        rate_limit_per_s: 1.0,
        regul_every: 1,
    };
    project.exchanges.push(sf_project::ExchangeDef {
        from: "valve.opening".into(),
        to: "sink.mdot_kgps".into(),
    });

    let store = fresh_store("sf_app_exchange_run");
    let response = run_project(&project, &store, &unpaced()).unwrap();
    assert_eq!(response.summary.exchange_failures, 0);

    // Demand 0.2 kg/s: pipe 2e4*0.04, valve (1e4/0.04)*0.04.
    let stored = load_run(&store, &response.run_id).unwrap();
    let p_sink = stored.records[0].values[0].unwrap();
    assert!((p_sink - (5.0e5 - 800.0 - 1.0e4)).abs() < 1e-6, "{p_sink}");
}

#[test]
fn interactive_run_can_be_steered() {
    let mut project = chain();
    project.kernel.t_end_s = None;
    let options = RunOptions {
        overrides: RunOverrides {
            pacing_ms: Some(1),
            start_paused: true,
            ..RunOverrides::default()
        },
        ..RunOptions::default()
    };
    let store = fresh_store("sf_app_interactive_run");
    let running = start_project(&project, &store, &options).unwrap();
    let handle = &running.handle;

    assert_eq!(handle.state(), SimulatorState::Paused);
    let reply = ConsoleCommand::parse("set sink mdot_kgps 0.3")
        .unwrap()
        .unwrap()
        .execute(handle)
        .unwrap();
    assert_eq!(reply, "sink.mdot_kgps <- 0.3");
    assert_eq!(handle.clock().tick, 0);

    assert_eq!(handle.start().unwrap(), SimulatorState::Running);
    let deadline = Instant::now() + Duration::from_secs(10);
    while handle.clock().tick < 3 {
        assert!(Instant::now() < deadline, "kernel made no progress");
        std::thread::sleep(Duration::from_millis(2));
    }
    let p = handle.get_field("sink", "p_pa").unwrap();
    assert!((p - (5.0e5 - 3.0e4 * 0.09)).abs() < 1e-6, "{p}");

    handle.stop().unwrap();
    let response = running.wait().unwrap();
    assert_eq!(response.summary.outcome, RunOutcome::Stopped);

    let stored = load_run(&store, &response.run_id).unwrap();
    assert_eq!(stored.records.len() as u64, response.summary.ticks);
}

#[test]
fn unreadable_output_fails_compilation() {
    let mut project = chain();
    project.outputs.push("sink.bogus".into());
    assert!(matches!(
        compile_project(&project, &RunOverrides::default()),
        Err(AppError::Simulation(_))
    ));
}

#[test]
fn exchange_to_unknown_field_fails_compilation() {
    let mut project = chain();
    project.exchanges.push(sf_project::ExchangeDef {
        from: "valve.opening".into(),
        to: "sink.bogus".into(),
    });
    assert!(matches!(
        compile_project(&project, &RunOverrides::default()),
        Err(AppError::Compile { .. })
    ));
}
