//! sf-core: shared foundation for seqflow.
//!
//! Contains:
//! - units (uom SI types + constructors)
//! - numeric (Real, tolerances, machine-precision thresholds, accuracy bounds)
//! - ids (compact IDs for models and ports)
//! - timing (wall-clock timers used for tick pacing statistics)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod timing;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use numeric::*;
pub use units::*;
