//! Serializer/parser bridge between markdown text and documents.

use scribe_model::{Node, Schema, markdown};

/// Converts markdown to documents of one schema and back.
///
/// Both directions are total: any text parses to some valid document, and
/// every valid document serializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bridge {
    schema: Schema,
}

impl Bridge {
    #[must_use]
    pub const fn new(schema: Schema) -> Self {
        Self { schema }
    }

    #[inline]
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Parse `text`, lowering anything outside the schema.
    #[must_use]
    pub fn parse(&self, text: &str) -> Node {
        self.schema.conform(markdown::parse(text))
    }

    #[must_use]
    pub fn serialize(&self, doc: &Node) -> String {
        markdown::serialize(doc)
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new(Schema::markdown())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scribe_model::{MarkSet, NodeType};

    #[test]
    fn empty_text_is_one_empty_paragraph() {
        let doc = Bridge::default().parse("");
        assert_eq!(doc.child_count(), 1);
        assert_eq!(doc.child(0).node_type(), NodeType::Paragraph);
        assert_eq!(doc.child(0).content_size(), 0);
        assert!(doc.check().is_ok());
    }

    #[test]
    fn serialize_then_parse_is_stable() {
        let bridge = Bridge::default();
        let doc = bridge.parse("## Notes\n\n* **bold** item\n* second\n\n> quote");
        let again = bridge.parse(&bridge.serialize(&doc));
        assert_eq!(again, doc);
    }

    #[test]
    fn restricted_schema_strips_marks() {
        let schema = Schema::markdown().without_marks(MarkSet::STRONG);
        let bridge = Bridge::new(schema);
        assert_eq!(bridge.serialize(&bridge.parse("a **b** c")), "a b c");
    }

    #[test]
    fn malformed_input_still_parses() {
        let bridge = Bridge::default();
        for text in ["**unclosed", "[dangling](", "```", "> > >", "1.", "\t\t"] {
            assert!(bridge.parse(text).check().is_ok(), "{text:?}");
        }
    }
}
