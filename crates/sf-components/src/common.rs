//! Shared helpers for component models.

use crate::error::{ModelError, ModelResult};
use sf_core::units::{MassRate, Temperature, k};
use sf_core::{ensure_in_range, ensure_positive};

/// Port ids resolved by `Model::bind`, or an error naming the unbound model.
pub fn bound<T: Copy>(ports: &Option<T>, name: &str) -> ModelResult<T> {
    ports.ok_or_else(|| ModelError::NotBound {
        name: name.to_string(),
    })
}

/// Flow-weighted mixing temperature of two streams.
///
/// Falls back to the arithmetic mean when no mass flows.
pub fn mix_temperature(m1: MassRate, t1: Temperature, m2: MassRate, t2: Temperature) -> Temperature {
    let (w1, w2) = (m1.value.abs(), m2.value.abs());
    let total = w1 + w2;
    if total <= f64::MIN_POSITIVE {
        return k(0.5 * (t1.value + t2.value));
    }
    k((w1 * t1.value + w2 * t2.value) / total)
}

/// Quadratic loss `k * mdot * |mdot|` (Pa).
pub fn quadratic_loss(k_loss: f64, mdot: f64) -> f64 {
    k_loss * mdot * mdot.abs()
}

/// Reject non-finite or negative values.
pub fn validate_non_negative(val: f64, what: &'static str) -> ModelResult<f64> {
    Ok(ensure_in_range(val, 0.0, f64::MAX, what)?)
}

/// Reject non-finite or non-positive values.
pub fn validate_positive(val: f64, what: &'static str) -> ModelResult<f64> {
    Ok(ensure_positive(val, what)?)
}
