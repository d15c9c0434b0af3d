//! Error taxonomy for COO tensor construction and arithmetic

use thiserror::Error;

/// Convenience alias used across both crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by construction, arithmetic and matmul over COO tensors.
///
/// Every error is fatal to the call that raised it, nothing is retried
/// internally, and operands are never mutated: callers always retain valid
/// instances after a failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed construction arguments: index-buffer divisibility, shape
    /// lengths, value-buffer length, coordinate bounds, extent overflow.
    #[error("format: {0}")]
    Format(String),

    /// Operand shapes (full or sparse) are incompatible.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    Shape {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// A coalesce-state precondition was violated.
    #[error("state: {0}")]
    State(&'static str),

    /// Stored values are required but absent, or the operands disagree on
    /// valuedness.
    #[error("value: {0}")]
    Value(&'static str),

    /// Operand kind outside the operation's dispatch set.
    #[error("unsupported operand: {0}")]
    Type(&'static str),
}

impl Error {
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    #[must_use]
    pub fn shape(expected: &[usize], got: &[usize]) -> Self {
        Self::Shape {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }
}
