use thiserror::Error;

/// Errors raised by the transforms and descriptor pipelines.
///
/// Every failure is detected at the offending operation and returned to the
/// caller unchanged; no operation returns a partially computed grid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GcfdError {
    /// Empty grid, wrong channel count, zero reference vector, center outside bounds.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A grid does not have the shape a precomputed artifact was built for.
    #[error("dimension mismatch: expected {expected:?}, got {got:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },

    /// Division by a near-zero norm.
    #[error("numeric degeneracy: {0}")]
    NumericDegeneracy(String),
}

impl GcfdError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        GcfdError::InvalidInput(reason.into())
    }

    pub fn dimension_mismatch(expected: (usize, usize), got: (usize, usize)) -> Self {
        GcfdError::DimensionMismatch { expected, got }
    }

    pub fn numeric_degeneracy(reason: impl Into<String>) -> Self {
        GcfdError::NumericDegeneracy(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, GcfdError>;
