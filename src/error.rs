use thiserror::Error;

use crate::{
    apriori::GuessRejection, baseline::BaselineViolation, cfg::Error as ConfigError,
    detection::DetectionDefect, prelude::Duration, solver::ConvergenceFailure,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A [Detection](crate::prelude::Detection) is physically invalid.
    /// Index is 1-based, matching the boundary labels (detection1..3).
    /// The solver never starts.
    #[error("detection {index} validation error: {cause}")]
    DetectionValidation { index: usize, cause: DetectionDefect },

    /// Detections were not sampled close enough in time
    /// (only when a maximal spread was configured).
    #[error("detections are not simultaneous: {spread} spread exceeds {max}")]
    SimultaneityViolation { spread: Duration, max: Duration },

    /// Sensor / illuminator geometry is too poorly conditioned.
    /// Reported before any optimization.
    #[error("baseline constraint error: {0}")]
    BaselineConstraint(BaselineViolation),

    /// Provided initial guess is out of bounds. This is never returned by
    /// [Solver::resolve](crate::prelude::Solver::resolve), which falls back
    /// to the automatic initial guess instead.
    #[error("initial guess validation error: {0}")]
    InitialGuessValidation(GuessRejection),

    /// The solver could not satisfy the convergence tolerance: no solution.
    #[error("no solution: {0}")]
    ConvergenceFailure(ConvergenceFailure),

    /// Invalid [Config](crate::prelude::Config) setup.
    #[error("invalid configuration: {0}")]
    Config(ConfigError),
}

impl Error {
    /// Short kind identifier, used in failure records
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DetectionValidation { .. } => "DetectionValidationError",
            Self::SimultaneityViolation { .. } => "DetectionValidationError",
            Self::BaselineConstraint(_) => "BaselineConstraintError",
            Self::InitialGuessValidation(_) => "InitialGuessValidationError",
            Self::ConvergenceFailure(_) => "ConvergenceFailure",
            Self::Config(_) => "ConfigurationError",
        }
    }
}
