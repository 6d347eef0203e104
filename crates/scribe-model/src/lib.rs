//! # scribe-model — Document model for scribe
//!
//! The immutable data the editor works on:
//!
//! - **[`schema`]** — node and mark types, and schemas that restrict them
//! - **[`node`]** — `Node`, `Fragment` and `Mark`, the persistent document tree
//! - **[`resolve`]** — `ResolvedPos`, a position with its ancestry
//! - **[`replace`]** — `Slice` and the structural replace algorithm
//! - **[`step`]** — invertible steps, position maps and `Transform`
//! - **[`markdown`]** — markdown parsing and serialization
//!
//! Positions count tokens the usual way for tree editors: entering or
//! leaving a non-leaf node is one token, each character of text is one, and
//! a leaf node is one.

pub mod error;
pub mod markdown;
pub mod node;
pub mod replace;
pub mod resolve;
pub mod schema;
pub mod step;

pub use error::{ModelError, Result};
pub use node::{Fragment, Mark, Node, NodeKind};
pub use replace::Slice;
pub use resolve::ResolvedPos;
pub use schema::{MarkSet, MarkType, NodeSet, NodeType, Schema};
pub use step::{Bias, Mapping, Step, StepMap, Transform};
