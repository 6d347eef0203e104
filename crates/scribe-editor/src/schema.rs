//! Schema composition.
//!
//! Every driver derives its own schema from the markdown base once, at
//! build time. The derived schema currently keeps the full vocabulary;
//! restricting it (say, dropping images for a comment box) only touches
//! this module.

use scribe_model::{MarkSet, Schema};

/// Derive the editing schema from `base`.
#[must_use]
pub fn compose(base: &Schema) -> Schema {
    let schema = Schema::derive(base);
    tracing::debug!(
        nodes = schema.nodes().bits(),
        marks = schema.marks().bits(),
        "composed editor schema"
    );
    schema
}

/// Derive the editing schema from `base` without the given marks.
#[must_use]
pub fn compose_without_marks(base: &Schema, marks: MarkSet) -> Schema {
    compose(base).without_marks(marks)
}
