//! Error types for kernel operations.

use sf_components::ModelError;
use sf_net::NetError;
use thiserror::Error;

/// Errors surfaced by the kernel, its containers and its command channel.
#[derive(Error, Debug, Clone)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Model {name} is already registered")]
    DuplicateModel { name: String },

    #[error("Unknown model: {name}")]
    UnknownModel { name: String },

    #[error("Model {model} belongs to more than one mesh")]
    DuplicateMeshMember { model: String },

    #[error("{op} failed in model {model}: {source}")]
    Model {
        model: String,
        op: &'static str,
        #[source]
        source: ModelError,
    },

    #[error("Port wiring error: {0}")]
    Net(#[from] NetError),

    #[error("Result sink error: {message}")]
    Sink { message: String },

    #[error("Failed to spawn kernel thread: {message}")]
    Spawn { message: String },

    #[error("Kernel thread is no longer running")]
    KernelGone,

    #[error("Kernel thread panicked")]
    KernelPanicked,
}

pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    pub(crate) fn model(model: &str, op: &'static str, source: ModelError) -> Self {
        SimError::Model {
            model: model.to_string(),
            op,
            source,
        }
    }
}
