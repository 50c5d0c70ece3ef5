//! State vectors owned by integrating models.

use crate::error::{OdeError, OdeResult};
use std::ops::{Index, IndexMut};

/// Largest state dimension the integrator accepts.
pub const MAX_STATE_DIM: usize = 20;

/// Reject dimensions outside `1..=MAX_STATE_DIM`.
pub fn check_dimension(n: usize) -> OdeResult<()> {
    if n == 0 || n > MAX_STATE_DIM {
        return Err(OdeError::DimensionOutOfRange {
            n,
            max: MAX_STATE_DIM,
        });
    }
    Ok(())
}

/// State vector sized to a model's actual dimension.
///
/// The dimension is checked once here, so integrator calls on a
/// `StateVector` cannot fail with `DimensionOutOfRange`.
#[derive(Clone, Debug, PartialEq)]
pub struct StateVector {
    values: Vec<f64>,
}

impl StateVector {
    pub fn new(values: Vec<f64>) -> OdeResult<Self> {
        check_dimension(values.len())?;
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.values
    }
}

impl Index<usize> for StateVector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.values[index]
    }
}

impl IndexMut<usize> for StateVector {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.values[index]
    }
}
