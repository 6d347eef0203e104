//! Errors raised by the document model.
//!
//! Only structural operations can fail: resolving a position outside the
//! document, replacing a range with content that does not fit, or building a
//! schema that lost a node type the rest of the vocabulary depends on. Parsing
//! markdown never fails; malformed input degrades to literal text.

use thiserror::Error;

/// A failed structural operation on a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A position fell outside `0..=size`.
    #[error("position {pos} out of range (document size {size})")]
    OutOfRange { pos: usize, size: usize },

    /// A node ended up with children its type does not accept.
    #[error("invalid content for {node}: {reason}")]
    InvalidContent {
        node: &'static str,
        reason: &'static str,
    },

    /// Two nodes with incompatible content were joined at a slice boundary.
    #[error("cannot join {sub} onto {main}")]
    Join {
        main: &'static str,
        sub: &'static str,
    },

    /// A slice is open deeper than the position it is inserted at.
    #[error("inserted content deeper than insertion position")]
    TooDeep,

    /// The open depths of a slice do not line up with the replaced range.
    #[error("inconsistent open depths")]
    InconsistentDepths,

    /// A schema was derived without a type the vocabulary requires.
    #[error("schema is missing required node type `{0}`")]
    MissingNodeType(&'static str),
}

/// Convenience alias used throughout the model.
pub type Result<T> = std::result::Result<T, ModelError>;
