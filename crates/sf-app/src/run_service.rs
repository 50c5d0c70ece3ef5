//! Run execution and storage service.

use std::time::Instant;

use sf_project::Project;
use sf_results::{RunManifest, RunStore, TimeseriesRecord};
use sf_sim::{KernelHandle, RunSummary};

use crate::compile::{RunOverrides, compile_project, effective_settings};
use crate::error::AppResult;

/// Options for running a project.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub overrides: RunOverrides,
    pub solver_version: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            overrides: RunOverrides::default(),
            solver_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Response from a completed run.
#[derive(Debug, Clone)]
pub struct RunResponse {
    pub run_id: String,
    pub manifest: RunManifest,
    pub summary: RunSummary,
    pub wall_time_s: f64,
}

/// A run executing on its own kernel thread.
#[derive(Debug)]
pub struct RunningProject {
    pub run_id: String,
    pub manifest: RunManifest,
    pub handle: KernelHandle,
    started: Instant,
}

impl RunningProject {
    /// Wait for the kernel to finish and report the stored run.
    pub fn wait(self) -> AppResult<RunResponse> {
        let summary = self.handle.join()?;
        Ok(RunResponse {
            run_id: self.run_id,
            manifest: self.manifest,
            summary,
            wall_time_s: self.started.elapsed().as_secs_f64(),
        })
    }
}

/// Everything stored for one run.
#[derive(Debug, Clone)]
pub struct StoredRun {
    pub manifest: RunManifest,
    pub records: Vec<TimeseriesRecord>,
    pub summary: Option<RunSummary>,
}

fn prepare(
    project: &Project,
    store: &RunStore,
    options: &RunOptions,
) -> AppResult<(sf_sim::Kernel, RunManifest)> {
    let kernel = compile_project(project, &options.overrides)?;
    let settings = effective_settings(project, &options.overrides);
    let manifest = RunManifest::for_project(project, settings, &options.solver_version);
    let sink = store.create_run(manifest.clone())?;
    tracing::info!(run_id = %manifest.run_id, project = %project.name, "run prepared");
    Ok((kernel.with_sink(Box::new(sink)), manifest))
}

/// Run a project to completion on the calling thread, storing its results.
pub fn run_project(project: &Project, store: &RunStore, options: &RunOptions) -> AppResult<RunResponse> {
    let started = Instant::now();
    let (mut kernel, manifest) = prepare(project, store, options)?;
    let summary = kernel.run()?;
    Ok(RunResponse {
        run_id: manifest.run_id.clone(),
        manifest,
        summary,
        wall_time_s: started.elapsed().as_secs_f64(),
    })
}

/// Start a project on a kernel thread and return its control handle.
pub fn start_project(project: &Project, store: &RunStore, options: &RunOptions) -> AppResult<RunningProject> {
    let started = Instant::now();
    let (kernel, manifest) = prepare(project, store, options)?;
    let handle = kernel.spawn()?;
    Ok(RunningProject {
        run_id: manifest.run_id.clone(),
        manifest,
        handle,
        started,
    })
}

/// Stored runs, oldest first, optionally for one project.
pub fn list_runs(store: &RunStore, project_name: Option<&str>) -> AppResult<Vec<RunManifest>> {
    Ok(store.list_runs(project_name)?)
}

pub fn load_run(store: &RunStore, run_id: &str) -> AppResult<StoredRun> {
    Ok(StoredRun {
        manifest: store.load_manifest(run_id)?,
        records: store.load_timeseries(run_id)?,
        summary: store.load_summary(run_id)?,
    })
}
