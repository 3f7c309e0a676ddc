use thiserror::Error;

/// Why a nonlinear solve gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveFailure {
    MaxIterations,
    SingularJacobian,
    NonFiniteResidual,
}

impl std::fmt::Display for SolveFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveFailure::MaxIterations => write!(f, "iteration limit reached"),
            SolveFailure::SingularJacobian => write!(f, "Jacobian is singular"),
            SolveFailure::NonFiniteResidual => write!(f, "residual is not finite"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{family} structure violated: {reason}")]
    StructuralViolation { family: &'static str, reason: String },

    #[error("dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{what} {value} outside [{lower}, {upper}]")]
    OutOfRange {
        what: &'static str,
        value: f64,
        lower: f64,
        upper: f64,
    },

    #[error("unknown Runge-Kutta scheme \"{0}\"")]
    UnknownScheme(String),

    #[error("storage limit {limit} exceeded: {existing} stored + {incoming} new")]
    StorageExceeded {
        limit: usize,
        existing: usize,
        incoming: usize,
    },

    #[error("requested times are not sorted")]
    UnsortedTimes,

    #[error("tableau order must be at least 1, got {0}")]
    InvalidOrder(usize),

    #[error("step size must be positive and finite, got {0}")]
    InvalidStepSize(f64),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("more than {limit} steps needed to reach the requested time")]
    MaxStepsExceeded { limit: usize },

    #[error("model evaluation failed")]
    ModelEvaluation(#[source] anyhow::Error),

    #[error("nonlinear solve did not converge after {iterations} iterations ({reason}, residual norm {residual_norm})")]
    SolveDidNotConverge {
        reason: SolveFailure,
        iterations: usize,
        residual_norm: f64,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn model(err: anyhow::Error) -> Self {
        Error::ModelEvaluation(err)
    }

    pub(crate) fn dimension(context: &'static str, expected: usize, found: usize) -> Self {
        Error::DimensionMismatch {
            context,
            expected,
            found,
        }
    }

    pub(crate) fn structural(family: &'static str, reason: impl Into<String>) -> Self {
        Error::StructuralViolation {
            family,
            reason: reason.into(),
        }
    }

    /// Index-style out-of-range helper; bounds are reported as `[0, len)`.
    pub(crate) fn index(what: &'static str, index: usize, len: usize) -> Self {
        Error::OutOfRange {
            what,
            value: index as f64,
            lower: 0.0,
            upper: len as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_values() {
        let err = Error::StorageExceeded {
            limit: 4,
            existing: 3,
            incoming: 2,
        };
        assert_eq!(err.to_string(), "storage limit 4 exceeded: 3 stored + 2 new");

        let err = Error::structural("ERK", "A[0][0] is nonzero");
        assert!(err.to_string().contains("ERK"));
        assert!(err.to_string().contains("A[0][0]"));
    }

    #[test]
    fn model_errors_keep_their_source() {
        let err = Error::model(anyhow::anyhow!("division by zero"));
        let source = std::error::Error::source(&err).expect("source should be kept");
        assert_eq!(source.to_string(), "division by zero");
    }
}
