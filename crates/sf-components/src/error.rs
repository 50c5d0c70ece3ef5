//! Error types for model operations.

use sf_core::CoreError;
use sf_net::NetError;
use sf_ode::OdeError;
use thiserror::Error;

/// Failure of a model operation. Any of these is fatal for the pass that
/// invoked the model.
#[derive(Error, Debug, Clone)]
pub enum ModelError {
    #[error("Non-physical value: {what}")]
    NonPhysical { what: &'static str },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Unknown field: {name}")]
    UnknownField { name: String },

    #[error("Field {name} is read-only")]
    ReadOnlyField { name: String },

    #[error("Model {name} is not bound to a network")]
    NotBound { name: String },

    #[error("Port error: {0}")]
    Port(#[from] NetError),

    #[error("Integration failed: {0}")]
    Integration(#[from] OdeError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{message}")]
    Failed { message: String },
}

pub type ModelResult<T> = Result<T, ModelError>;
