//! Runge-Kutta-Fehlberg 4(5) integrator with adaptive step size.
//!
//! Six derivative evaluations per attempted step produce a 4th and a 5th
//! order solution. Their per-component difference is the local error
//! estimate; the 5th order solution is the one committed.

use crate::error::{OdeError, OdeResult};
use crate::state::{MAX_STATE_DIM, StateVector, check_dimension};
use sf_core::{EPS, Real, Tolerances};

/// Stage evaluations per attempted step.
const STAGES: usize = 6;

/// Step-size safety factor for the 4th-root controller.
const SAFETY: Real = 0.84;

/// Largest growth of the step after an accepted step.
const MAX_GROWTH: Real = 2.0;

/// Shrink bounds after a rejected step (the step is at least halved).
const MIN_SHRINK: Real = 0.1;
const MAX_SHRINK: Real = 0.5;

// Fehlberg tableau.
const C: [Real; STAGES] = [0.0, 1.0 / 4.0, 3.0 / 8.0, 12.0 / 13.0, 1.0, 1.0 / 2.0];

#[rustfmt::skip]
const A: [[Real; 5]; STAGES] = [
    [0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 4.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 32.0, 9.0 / 32.0, 0.0, 0.0, 0.0],
    [1932.0 / 2197.0, -7200.0 / 2197.0, 7296.0 / 2197.0, 0.0, 0.0],
    [439.0 / 216.0, -8.0, 3680.0 / 513.0, -845.0 / 4104.0, 0.0],
    [-8.0 / 27.0, 2.0, -3544.0 / 2565.0, 1859.0 / 4104.0, -11.0 / 40.0],
];

// 5th order weights.
const B5: [Real; STAGES] = [
    16.0 / 135.0,
    0.0,
    6656.0 / 12825.0,
    28561.0 / 56430.0,
    -9.0 / 50.0,
    2.0 / 55.0,
];

// B5 minus the 4th order weights.
const E: [Real; STAGES] = [
    1.0 / 360.0,
    0.0,
    -128.0 / 4275.0,
    -2197.0 / 75240.0,
    1.0 / 50.0,
    2.0 / 55.0,
];

/// Outcome of a successful `advance` call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Advance {
    /// Time reached (always the requested target).
    pub t: Real,
    /// Step size suggested for the next call.
    pub step: Real,
    /// Derivative evaluations spent.
    pub evals: usize,
    pub accepted: usize,
    pub rejected: usize,
}

/// Configured integrator: tolerances plus an evaluation budget per call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rkf45 {
    pub tol: Tolerances,
    pub max_evals: usize,
}

impl Default for Rkf45 {
    fn default() -> Self {
        Self {
            tol: Tolerances::default(),
            max_evals: 10_000,
        }
    }
}

impl Rkf45 {
    pub fn new(tol: Tolerances, max_evals: usize) -> Self {
        Self { tol, max_evals }
    }

    /// Advance a model's state vector from `t0` to `t_target`.
    pub fn advance_state<F>(
        &self,
        t0: Real,
        step_guess: Real,
        state: &mut StateVector,
        t_target: Real,
        derivative: F,
    ) -> OdeResult<Advance>
    where
        F: FnMut(Real, &[Real], &mut [Real]),
    {
        advance(
            t0,
            step_guess,
            state.as_mut_slice(),
            t_target,
            self.tol,
            self.max_evals,
            derivative,
        )
    }
}

/// Smallest step that still moves `t` in double precision.
fn min_step(t: Real) -> Real {
    16.0 * EPS * t.abs().max(1.0)
}

/// Advance `y` from `t0` to `t_target` with adaptive step-size control.
///
/// `derivative(t, y, dydt)` must be a pure function of `(t, y)` for the
/// duration of the call. On success `y` holds the solution at `t_target`;
/// on failure it holds the last accepted solution.
pub fn advance<F>(
    t0: Real,
    step_guess: Real,
    y: &mut [Real],
    t_target: Real,
    tol: Tolerances,
    max_evals: usize,
    mut derivative: F,
) -> OdeResult<Advance>
where
    F: FnMut(Real, &[Real], &mut [Real]),
{
    let n = y.len();
    check_dimension(n)?;
    if tol.too_tight() {
        return Err(OdeError::TolerancesTooTight {
            abs: tol.abs,
            rel: tol.rel,
        });
    }
    if t_target < t0 {
        return Err(OdeError::TargetUnreachable { t0, t_target });
    }

    let mut report = Advance {
        t: t0,
        step: step_guess,
        evals: 0,
        accepted: 0,
        rejected: 0,
    };
    if t_target == t0 {
        return Ok(report);
    }

    let span = t_target - t0;
    let mut h = if step_guess.is_finite() && step_guess > 0.0 {
        step_guess.min(span)
    } else {
        span
    };

    let mut k = [[0.0; MAX_STATE_DIM]; STAGES];
    let mut y_stage = [0.0; MAX_STATE_DIM];
    let mut y_new = [0.0; MAX_STATE_DIM];
    let mut t = t0;

    loop {
        let remaining = t_target - t;
        if remaining <= min_step(t) {
            // Closer than the clock can resolve: arrived.
            report.t = t_target;
            break;
        }
        let last = h >= remaining;
        if last {
            h = remaining;
        }
        let h_min = min_step(t);
        if h < h_min {
            return Err(OdeError::StepDegenerate {
                t,
                step: h,
                min: h_min,
            });
        }
        if report.evals + STAGES > max_evals {
            return Err(OdeError::BudgetExhausted {
                t,
                t_target,
                max_evals,
            });
        }

        for stage in 0..STAGES {
            for i in 0..n {
                let mut acc = 0.0;
                for (j, a) in A[stage].iter().enumerate().take(stage) {
                    acc += a * k[j][i];
                }
                y_stage[i] = y[i] + h * acc;
            }
            derivative(t + C[stage] * h, &y_stage[..n], &mut k[stage][..n]);
        }
        report.evals += STAGES;

        // q = sqrt(min_i h * w_i / |err_i|); q >= 1 accepts the step.
        let mut ratio = Real::INFINITY;
        for i in 0..n {
            let mut incr = 0.0;
            let mut err = 0.0;
            for stage in 0..STAGES {
                incr += B5[stage] * k[stage][i];
                err += E[stage] * k[stage][i];
            }
            y_new[i] = y[i] + h * incr;
            let diff = (h * err).abs();
            if !y_new[i].is_finite() || !diff.is_finite() {
                return Err(OdeError::NonFinite { t });
            }
            if diff > 0.0 {
                ratio = ratio.min(h * tol.weight(y[i].abs().max(y_new[i].abs())) / diff);
            }
        }
        let q = ratio.sqrt();

        if q >= 1.0 {
            y.copy_from_slice(&y_new[..n]);
            t = if last { t_target } else { t + h };
            report.accepted += 1;
            h *= (SAFETY * q.sqrt()).min(MAX_GROWTH);
            report.step = h;
            if last {
                report.t = t_target;
                break;
            }
        } else {
            report.rejected += 1;
            h *= (SAFETY * q.sqrt()).clamp(MIN_SHRINK, MAX_SHRINK);
            tracing::trace!(t, step = h, q, "rkf45 step rejected");
        }
    }

    Ok(report)
}
