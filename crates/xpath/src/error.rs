//! Error types for node-set and step evaluation.
//!
//! Absence is never an error here: lookups return `Option` and empty sets are
//! ordinary results. [`StepError`] is reserved for contract violations and
//! for failures reported by the storage collaborators.

use thiserror::Error;

use crate::axis::Axis;

/// Failure reported by an [`ElementIndex`](crate::ElementIndex) implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// Reading index pages failed.
    #[error("element index I/O error in {context}: {message}")]
    Io {
        /// Operation that failed.
        context: &'static str,
        /// Stringified storage error.
        message: String,
    },
}

impl IndexError {
    pub fn io(context: &'static str, err: impl ToString) -> Self {
        Self::Io { context, message: err.to_string() }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StepError {
    /// The evaluator was asked for an axis it has no strategy for.
    #[error("unsupported axis: {0}")]
    UnsupportedAxis(Axis),

    #[error(transparent)]
    Index(#[from] IndexError),

    /// A predicate failed while filtering candidates.
    #[error("predicate evaluation failed: {message}")]
    Predicate { message: String },
}

impl StepError {
    pub fn predicate(message: impl Into<String>) -> Self {
        Self::Predicate { message: message.into() }
    }
}
