use thiserror::Error;

/// Errors raised by the confusion model, drill sampler and lesson
/// controller. Only [`DrillError::UnknownProblemType`] and
/// [`DrillError::InvalidAnswer`] ever propagate to a caller; the other
/// variants are constructed purely so the clamp sites that encounter them
/// can log a consistent message before recovering locally.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DrillError {
    #[error("unknown problem type: {0}")]
    UnknownProblemType(String),

    #[error("selected sequence is not one of the presented choices")]
    InvalidAnswer,

    #[error("posterior shape mismatch: expected {expected}x{expected}, got {actual}x{actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Bradley-Terry MM iteration did not converge within {max_iter} iterations")]
    NonconvergentBt { max_iter: usize },

    #[error("floating-point degeneracy while constructing a Beta distribution")]
    FloatingDegeneracy,
}

pub type Result<T> = std::result::Result<T, DrillError>;
