//! sf-components: the model contract and a small component library.
//!
//! Every component implements [`Model`]: initialization, a fixed time step,
//! a forward iteration step that may report non-convergence, a backward
//! boundary-propagation step and an optional periodic regulation step.
//!
//! The library models are deliberately simple:
//! - `PressureSource` and `FlowSink` bound the network
//! - `Pipe` and `Valve` apply quadratic pressure losses
//! - `Junction` mixes two streams and balances their pressures
//! - `Tank` integrates an ideal-gas volume with the adaptive integrator

pub mod common;
pub mod error;
pub mod fields;
pub mod junction;
pub mod pipe;
pub mod sink;
pub mod source;
pub mod tank;
pub mod traits;
pub mod valve;

// Re-exports
pub use error::{ModelError, ModelResult};
pub use fields::FieldTable;
pub use junction::Junction;
pub use pipe::Pipe;
pub use sink::FlowSink;
pub use source::PressureSource;
pub use tank::Tank;
pub use traits::{Convergence, Model, Schedule, Status, StepContext};
pub use valve::Valve;
