//! Error type shared by all fallible operations.
//!
//! Two categories exist:
//!
//! - [`Error::ShapeMismatch`] — operand shapes violate an operation's
//!   contract. Raised when the operation is recorded, never deferred to
//!   backward time.
//! - [`Error::InvalidOperation`] — a traversal was started from a value
//!   that cannot seed it (no gradient tracking, or a missing explicit
//!   gradient on a non-scalar value).
//!
//! Both are programming-contract violations, not transient failures; no
//! graph state is mutated before the check that raises them.

use thiserror::Error;

/// Errors that can occur when recording operations or traversing the graph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Operand shapes violate the operation's contract.
    #[error("{op}: operand shapes {lhs:?} and {rhs:?} are incompatible")]
    ShapeMismatch {
        op: &'static str,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },

    /// A graph traversal was started from an unsuitable value.
    #[error("invalid operation: {reason}")]
    InvalidOperation { reason: String },
}

impl Error {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Error::InvalidOperation {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
