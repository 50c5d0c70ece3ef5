//! Error types for the sf-app service layer.

use std::path::PathBuf;

/// Application error type wrapping the backend crates' errors for the CLI.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Project error: {0}")]
    Project(String),

    #[error("Failed to write project file: {path}")]
    ProjectFileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Compilation failed: {message}")]
    Compile { message: String },

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for sf-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub(crate) fn compile(message: impl Into<String>) -> Self {
        AppError::Compile {
            message: message.into(),
        }
    }
}

// Conversions from backend error types
impl From<sf_project::ProjectError> for AppError {
    fn from(err: sf_project::ProjectError) -> Self {
        AppError::Project(err.to_string())
    }
}

impl From<sf_project::ValidationError> for AppError {
    fn from(err: sf_project::ValidationError) -> Self {
        AppError::Project(err.to_string())
    }
}

impl From<sf_sim::SimError> for AppError {
    fn from(err: sf_sim::SimError) -> Self {
        AppError::Simulation(err.to_string())
    }
}

impl From<sf_net::NetError> for AppError {
    fn from(err: sf_net::NetError) -> Self {
        AppError::compile(err.to_string())
    }
}

impl From<sf_components::ModelError> for AppError {
    fn from(err: sf_components::ModelError) -> Self {
        AppError::compile(err.to_string())
    }
}

impl From<sf_results::ResultsError> for AppError {
    fn from(err: sf_results::ResultsError) -> Self {
        match err {
            sf_results::ResultsError::RunNotFound { run_id } => AppError::RunNotFound(run_id),
            other => AppError::Results(other.to_string()),
        }
    }
}
