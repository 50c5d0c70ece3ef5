//! Adaptive ODE integration for component models.
//!
//! Provides:
//! - Runge-Kutta-Fehlberg 4(5) embedded integrator with step-size control
//! - `StateVector`, a caller-owned state container validated at construction
//! - Typed failure taxonomy (`OdeError`) for everything that stops a call

pub mod error;
pub mod rkf45;
pub mod state;

pub use error::{OdeError, OdeResult};
pub use rkf45::{Advance, Rkf45, advance};
pub use state::{MAX_STATE_DIM, StateVector, check_dimension};
