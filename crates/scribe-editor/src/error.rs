//! Errors surfaced to the host.
//!
//! Parsing never fails and well-formed transactions always apply, so the
//! variants here are about misuse: offsets outside the document, calls after
//! [`destroy`](crate::Driver::destroy), transactions built from an old
//! state, and configuration that cannot be assembled.

use scribe_model::ModelError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    /// A linear offset fell outside `0..=len`.
    #[error("offset {offset} out of range (content length {len})")]
    OutOfRange { offset: usize, len: usize },

    /// The driver was destroyed; it accepts no further calls.
    #[error("editor has been destroyed")]
    Destroyed,

    /// The transaction was derived from a state that is no longer current.
    #[error("transaction does not chain from the current state")]
    StaleTransaction,

    /// A document change did not fit the document structure.
    #[error("replace failed: {0}")]
    Replace(#[from] ModelError),

    /// The editor could not be assembled from its configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EditorError>;
