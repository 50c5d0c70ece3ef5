//! Shared application service layer for seqflow.
//!
//! Turns project files into running kernels, stores their results and
//! parses the interactive command language used by the CLI.

pub mod compile;
pub mod console;
pub mod error;
pub mod project_service;
pub mod run_service;

pub use compile::{RunOverrides, build_model, compile_project, effective_settings};
pub use console::ConsoleCommand;
pub use error::{AppError, AppResult};
pub use project_service::{ProjectSummary, load_project, save_project, summarize, validate_project};
pub use run_service::{
    RunOptions, RunResponse, RunningProject, StoredRun, list_runs, load_run, run_project,
    start_project,
};
