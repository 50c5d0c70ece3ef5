//! Error types for integrator calls.

use thiserror::Error;

/// Reasons an integrator call stops before reaching its target time.
///
/// None of these are fatal to the process; the calling model decides what
/// to do, which in practice means failing its step.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OdeError {
    #[error("Tolerances too tight: abs={abs:e}, rel={rel:e} are both below machine precision")]
    TolerancesTooTight { abs: f64, rel: f64 },

    #[error("Target unreachable: t_target={t_target} lies before t0={t0}")]
    TargetUnreachable { t0: f64, t_target: f64 },

    #[error("Step degenerate at t={t}: step {step:e} below resolvable minimum {min:e}")]
    StepDegenerate { t: f64, step: f64, min: f64 },

    #[error("State dimension {n} out of range (1..={max})")]
    DimensionOutOfRange { n: usize, max: usize },

    #[error("Evaluation budget of {max_evals} exhausted at t={t} before reaching {t_target}")]
    BudgetExhausted {
        t: f64,
        t_target: f64,
        max_evals: usize,
    },

    #[error("Derivative returned a non-finite value at t={t}")]
    NonFinite { t: f64 },
}

pub type OdeResult<T> = Result<T, OdeError>;
