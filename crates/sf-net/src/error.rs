//! Port and wiring errors.

use sf_core::PortId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetError {
    #[error("Duplicate model name: {name}")]
    DuplicateModel { name: String },

    #[error("Unknown model: {name}")]
    UnknownModel { name: String },

    #[error("Model {model} has no port named {port}")]
    UnknownPort { model: String, port: String },

    #[error("Port {model}.{port} is an {actual}, expected an {expected}")]
    WrongDirection {
        model: String,
        port: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Port {model}.{port} is connected more than once")]
    AlreadyConnected { model: String, port: String },

    #[error("Model {model} is connected to itself")]
    SelfLoop { model: String },

    #[error("Port id {id} out of range (table has {len} ports)")]
    PortOutOfRange { id: PortId, len: usize },
}

pub type NetResult<T> = Result<T, NetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = NetError::UnknownPort {
            model: "pipe".into(),
            port: "in3".into(),
        };
        assert_eq!(err.to_string(), "Model pipe has no port named in3");
    }
}
