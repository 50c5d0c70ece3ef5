use crate::CoreError;

/// Floating point type used throughout the kernel.
pub type Real = f64;

/// Machine epsilon for `Real`.
pub const EPS: Real = f64::EPSILON;

/// Tolerances below `TIGHTEST_TOLERANCE` cannot be met in double precision.
pub const TIGHTEST_TOLERANCE: Real = 100.0 * EPS;

/// Absolute/relative accuracy pair.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-6,
            rel: 1e-6,
        }
    }
}

impl Tolerances {
    pub fn new(abs: Real, rel: Real) -> Self {
        Self { abs, rel }
    }

    /// True when both bounds sit below what double precision can resolve.
    pub fn too_tight(&self) -> bool {
        self.abs < TIGHTEST_TOLERANCE && self.rel < TIGHTEST_TOLERANCE
    }

    /// Mixed error weight for a value of magnitude `|y|`.
    pub fn weight(&self, y: Real) -> Real {
        self.abs + self.rel * y.abs()
    }
}

/// Step-size bounds a model integrates with.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepBounds {
    pub min: Real,
    pub max: Real,
}

impl Default for StepBounds {
    fn default() -> Self {
        Self {
            min: 1e-9,
            max: 1.0,
        }
    }
}

/// Per-model numeric accuracy: tolerances plus integrator step bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Accuracy {
    pub tol: Tolerances,
    pub step: StepBounds,
}

impl Accuracy {
    pub fn with_tolerances(tol: Tolerances) -> Self {
        Self {
            tol,
            step: StepBounds::default(),
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

pub fn ensure_positive(v: Real, what: &'static str) -> Result<Real, CoreError> {
    let v = ensure_finite(v, what)?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err(CoreError::InvalidArg { what })
    }
}

pub fn ensure_in_range(v: Real, min: Real, max: Real, what: &'static str) -> Result<Real, CoreError> {
    let v = ensure_finite(v, what)?;
    if (min..=max).contains(&v) {
        Ok(v)
    } else {
        Err(CoreError::OutOfRange {
            what,
            value: v,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn zero_tolerances_are_too_tight() {
        assert!(Tolerances::new(0.0, 0.0).too_tight());
        assert!(!Tolerances::new(0.0, 1e-6).too_tight());
        assert!(!Tolerances::default().too_tight());
    }

    #[test]
    fn range_checks() {
        assert!(ensure_in_range(0.5, 0.0, 1.0, "x").is_ok());
        assert!(matches!(
            ensure_in_range(1.5, 0.0, 1.0, "x"),
            Err(CoreError::OutOfRange { .. })
        ));
        assert!(ensure_positive(0.0, "x").is_err());
    }

    proptest! {
        #[test]
        fn nearly_equal_is_symmetric(a in -1e9f64..1e9, b in -1e9f64..1e9) {
            let tol = Tolerances::default();
            prop_assert_eq!(nearly_equal(a, b, tol), nearly_equal(b, a, tol));
        }

        #[test]
        fn weight_covers_abs_floor(y in -1e9f64..1e9) {
            let tol = Tolerances::new(1e-6, 1e-3);
            prop_assert!(tol.weight(y) >= tol.abs);
        }
    }
}
