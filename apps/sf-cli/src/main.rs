use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use sf_app::{
    AppError, AppResult, ConsoleCommand, RunOptions, RunOverrides, RunResponse, console,
    project_service, run_service,
};
use sf_results::RunStore;
use sf_sim::{RunOutcome, RunSummary};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(about = "seqflow CLI - sequentially-modular network simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a project file
    Validate {
        /// Path to the project YAML or JSON file
        project_path: PathBuf,
    },
    /// Run a project and store its results
    Run {
        /// Path to the project YAML or JSON file
        project_path: PathBuf,
        /// Simulated seconds per tick
        #[arg(long)]
        step: Option<f64>,
        /// Wall-clock milliseconds per tick (0 = as fast as possible)
        #[arg(long)]
        pacing_ms: Option<u64>,
        /// Simulated end time in seconds
        #[arg(long)]
        t_end: Option<f64>,
        /// Read control commands from stdin while running
        #[arg(long)]
        interactive: bool,
        /// Wait for `start` before the first tick (interactive only)
        #[arg(long, requires = "interactive")]
        paused: bool,
    },
    /// List stored runs for a project
    Runs {
        /// Path to the project YAML or JSON file
        project_path: PathBuf,
    },
    /// Show details of a stored run
    ShowRun {
        /// Path to the project YAML or JSON file
        project_path: PathBuf,
        /// Run ID to display
        run_id: String,
        /// Number of trailing rows to print
        #[arg(long, default_value_t = 10)]
        tail: usize,
    },
}

fn main() -> AppResult<()> {
    // Logs go to stderr so interactive replies stay readable on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { project_path } => cmd_validate(&project_path),
        Commands::Run {
            project_path,
            step,
            pacing_ms,
            t_end,
            interactive,
            paused,
        } => {
            let overrides = RunOverrides {
                step_s: step,
                pacing_ms,
                t_end_s: t_end,
                start_paused: paused,
            };
            cmd_run(&project_path, overrides, interactive)
        }
        Commands::Runs { project_path } => cmd_runs(&project_path),
        Commands::ShowRun {
            project_path,
            run_id,
            tail,
        } => cmd_show_run(&project_path, &run_id, tail),
    }
}

fn cmd_validate(project_path: &Path) -> AppResult<()> {
    println!("Validating project: {}", project_path.display());
    let project = project_service::load_project(project_path)?;
    let summary = project_service::summarize(&project);
    println!("✓ Project '{}' is valid", summary.name);
    println!(
        "  {} models, {} connections, {} meshes ({} top-level), {} exchanges, {} outputs",
        summary.models,
        summary.connections,
        summary.meshes,
        summary.top_level_meshes,
        summary.exchanges,
        summary.outputs
    );
    Ok(())
}

fn store_for(project_path: &Path) -> AppResult<RunStore> {
    Ok(RunStore::for_project(project_path)?)
}

fn cmd_run(project_path: &Path, overrides: RunOverrides, interactive: bool) -> AppResult<()> {
    let project = project_service::load_project(project_path)?;
    let store = store_for(project_path)?;
    let options = RunOptions {
        overrides,
        ..RunOptions::default()
    };

    let settings = sf_app::effective_settings(&project, &overrides);
    println!("Running project: {}", project.name);
    match settings.t_end_s {
        Some(t_end) => println!(
            "  step = {:.3} s, pacing = {} ms, t_end = {:.3} s",
            settings.step_s, settings.pacing_ms, t_end
        ),
        None => println!(
            "  step = {:.3} s, pacing = {} ms, unbounded",
            settings.step_s, settings.pacing_ms
        ),
    }

    let response = if interactive {
        run_interactive(&project, &store, &options, settings.t_end_s.is_none())?
    } else {
        run_service::run_project(&project, &store, &options)?
    };
    print_response(&response);
    Ok(())
}

fn run_interactive(
    project: &sf_project::Project,
    store: &RunStore,
    options: &RunOptions,
    unbounded: bool,
) -> AppResult<RunResponse> {
    let running = run_service::start_project(project, store, options)?;
    println!("Run {} started ({})", running.run_id, running.handle.state());
    println!("  {}", console::HELP);

    let (tx, lines) = mpsc::channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    while !running.handle.is_finished() {
        match lines.recv_timeout(Duration::from_millis(100)) {
            Ok(line) => match ConsoleCommand::parse(&line).and_then(|cmd| match cmd {
                Some(cmd) => cmd.execute(&running.handle).map(Some),
                None => Ok(None),
            }) {
                Ok(Some(reply)) => println!("{reply}"),
                Ok(None) => {}
                // The kernel may finish between the check and the command.
                Err(AppError::Simulation(msg)) if running.handle.is_finished() => {
                    tracing::debug!(%msg, "command after kernel exit");
                }
                Err(e) => eprintln!("error: {e}"),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                if unbounded {
                    // Nothing can stop an unbounded run once stdin is gone.
                    let _ = running.handle.stop();
                }
                break;
            }
        }
        let _ = io::stdout().flush();
    }

    running.wait()
}

fn print_response(response: &RunResponse) {
    let summary = &response.summary;
    let mark = if summary.is_clean() { "✓" } else { "!" };
    println!(
        "{mark} Run {} {} after {} ticks (t = {:.3} s, {:.2} s wall)",
        response.run_id,
        outcome_label(&summary.outcome),
        summary.ticks,
        summary.t_final,
        response.wall_time_s
    );
    print_summary(summary);
}

fn outcome_label(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Completed => "completed".to_string(),
        RunOutcome::Stopped => "stopped".to_string(),
        RunOutcome::Failed { message } => format!("failed: {message}"),
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "  {}  overruns={}  mesh_exhaustions={}  exchange_failures={}  mean_tick={:.3} ms",
        if summary.degraded { "degraded" } else { "clean" },
        summary.overruns,
        summary.mesh_exhaustions,
        summary.exchange_failures,
        summary.mean_tick_s * 1e3
    );
}

fn cmd_runs(project_path: &Path) -> AppResult<()> {
    let project = project_service::load_project(project_path)?;
    let store = store_for(project_path)?;
    let runs = run_service::list_runs(&store, Some(&project.name))?;

    if runs.is_empty() {
        println!("No stored runs for project '{}'", project.name);
        return Ok(());
    }
    println!("Runs for project '{}':", project.name);
    for manifest in runs {
        let status = match store.load_summary(&manifest.run_id) {
            Ok(Some(summary)) => outcome_label(&summary.outcome),
            Ok(None) => "unfinished".to_string(),
            Err(e) => format!("unreadable: {e}"),
        };
        println!("  {}  {}  {}", manifest.timestamp, manifest.run_id, status);
    }
    Ok(())
}

fn cmd_show_run(project_path: &Path, run_id: &str, tail: usize) -> AppResult<()> {
    let store = store_for(project_path)?;
    let run = run_service::load_run(&store, run_id)?;
    let manifest = &run.manifest;

    println!("Run: {}", manifest.run_id);
    println!("  Project: {} ({})", manifest.project_name, &manifest.project_hash[..12.min(manifest.project_hash.len())]);
    println!("  Started: {}", manifest.timestamp);
    println!(
        "  step = {:.3} s, pacing = {} ms, t_end = {}",
        manifest.settings.step_s,
        manifest.settings.pacing_ms,
        manifest
            .settings
            .t_end_s
            .map_or_else(|| "none".to_string(), |t| format!("{t:.3} s"))
    );
    match &run.summary {
        Some(summary) => {
            println!("  Outcome: {} after {} ticks", outcome_label(&summary.outcome), summary.ticks);
            print_summary(summary);
        }
        None => println!("  Outcome: unfinished"),
    }

    println!("  Rows: {}", run.records.len());
    if run.records.is_empty() || manifest.columns.is_empty() {
        return Ok(());
    }

    print!("{:>8} {:>12}", "tick", "t_s");
    for column in &manifest.columns {
        print!(" {column:>18}");
    }
    println!();
    let skip = run.records.len().saturating_sub(tail);
    for record in run.records.iter().skip(skip) {
        print!("{:>8} {:>12.4}", record.tick, record.time_s);
        for value in &record.values {
            match value {
                Some(v) => print!(" {v:>18.6e}"),
                None => print!(" {:>18}", "-"),
            }
        }
        println!();
    }
    Ok(())
}
