//! Document vocabulary: node types, mark types and content rules.
//!
//! The vocabulary is the default markdown one: block nodes for paragraphs,
//! headings, quotes, code, rules and lists, inline nodes for text, images and
//! hard breaks, and four marks. A [`Schema`] is a subset of that vocabulary.
//! The full vocabulary is [`Schema::markdown`]; narrower schemas are derived
//! from it by removing mark or node types.
//!
//! Content rules are structural and do not depend on the schema:
//!
//! | Node                        | Content                |
//! |-----------------------------|------------------------|
//! | `doc`, `blockquote`         | `block+`               |
//! | `paragraph`, `heading`      | `inline*`              |
//! | `code_block`                | `text*` (no marks)     |
//! | `bullet_list`, `ordered_list` | `list_item+`         |
//! | `list_item`                 | `paragraph block*`     |
//! | leaves                      | nothing                |

use bitflags::bitflags;

use crate::error::{ModelError, Result};
use crate::node::{Fragment, Mark, Node, NodeKind};

// ---------------------------------------------------------------------------
// Node and mark types
// ---------------------------------------------------------------------------

/// The type of a node, without its attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeType {
    Doc,
    Paragraph,
    Blockquote,
    HorizontalRule,
    Heading,
    CodeBlock,
    OrderedList,
    BulletList,
    ListItem,
    Text,
    Image,
    HardBreak,
}

impl NodeType {
    /// Every node type, in vocabulary order.
    pub const ALL: [Self; 12] = [
        Self::Doc,
        Self::Paragraph,
        Self::Blockquote,
        Self::HorizontalRule,
        Self::Heading,
        Self::CodeBlock,
        Self::OrderedList,
        Self::BulletList,
        Self::ListItem,
        Self::Text,
        Self::Image,
        Self::HardBreak,
    ];

    /// The snake_case name used in error messages and debugging output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Doc => "doc",
            Self::Paragraph => "paragraph",
            Self::Blockquote => "blockquote",
            Self::HorizontalRule => "horizontal_rule",
            Self::Heading => "heading",
            Self::CodeBlock => "code_block",
            Self::OrderedList => "ordered_list",
            Self::BulletList => "bullet_list",
            Self::ListItem => "list_item",
            Self::Text => "text",
            Self::Image => "image",
            Self::HardBreak => "hard_break",
        }
    }

    /// True for nodes that live inside textblocks.
    #[must_use]
    pub const fn is_inline(self) -> bool {
        matches!(self, Self::Text | Self::Image | Self::HardBreak)
    }

    /// True for block-level nodes (everything except `doc` and inline nodes).
    #[must_use]
    pub const fn is_block(self) -> bool {
        !self.is_inline() && !matches!(self, Self::Doc)
    }

    /// True for blocks whose content is inline.
    #[must_use]
    pub const fn is_textblock(self) -> bool {
        matches!(self, Self::Paragraph | Self::Heading | Self::CodeBlock)
    }

    /// True for nodes that cannot have children.
    #[must_use]
    pub const fn is_leaf(self) -> bool {
        matches!(
            self,
            Self::HorizontalRule | Self::Text | Self::Image | Self::HardBreak
        )
    }

    /// True for leaves that are not text. Each occupies exactly one position.
    #[must_use]
    pub const fn is_atom(self) -> bool {
        self.is_leaf() && !matches!(self, Self::Text)
    }

    /// True for the code block, whose text is literal and unmarked.
    #[must_use]
    pub const fn is_code(self) -> bool {
        matches!(self, Self::CodeBlock)
    }

    /// Coarse content class used to decide whether two nodes can be joined.
    const fn content_class(self) -> ContentClass {
        match self {
            Self::Doc | Self::Blockquote | Self::ListItem => ContentClass::Blocks,
            Self::Paragraph | Self::Heading | Self::CodeBlock => ContentClass::Inline,
            Self::OrderedList | Self::BulletList => ContentClass::Items,
            _ => ContentClass::Nothing,
        }
    }

    /// Whether content of `other` may be spliced into a node of this type.
    #[must_use]
    pub fn compatible_content(self, other: Self) -> bool {
        self == other
            || (self.content_class() == other.content_class()
                && self.content_class() != ContentClass::Nothing)
    }

    const fn flag(self) -> NodeSet {
        match self {
            Self::Doc => NodeSet::DOC,
            Self::Paragraph => NodeSet::PARAGRAPH,
            Self::Blockquote => NodeSet::BLOCKQUOTE,
            Self::HorizontalRule => NodeSet::HORIZONTAL_RULE,
            Self::Heading => NodeSet::HEADING,
            Self::CodeBlock => NodeSet::CODE_BLOCK,
            Self::OrderedList => NodeSet::ORDERED_LIST,
            Self::BulletList => NodeSet::BULLET_LIST,
            Self::ListItem => NodeSet::LIST_ITEM,
            Self::Text => NodeSet::TEXT,
            Self::Image => NodeSet::IMAGE,
            Self::HardBreak => NodeSet::HARD_BREAK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentClass {
    Blocks,
    Inline,
    Items,
    Nothing,
}

/// The type of a mark. Declaration order is rank order: when a text node
/// carries several marks they are sorted by rank, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarkType {
    Em,
    Strong,
    Link,
    Code,
}

impl MarkType {
    /// Every mark type, in rank order.
    pub const ALL: [Self; 4] = [Self::Em, Self::Strong, Self::Link, Self::Code];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Em => "em",
            Self::Strong => "strong",
            Self::Link => "link",
            Self::Code => "code",
        }
    }

    const fn flag(self) -> MarkSet {
        match self {
            Self::Em => MarkSet::EM,
            Self::Strong => MarkSet::STRONG,
            Self::Link => MarkSet::LINK,
            Self::Code => MarkSet::CODE,
        }
    }
}

bitflags! {
    /// A set of node types.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NodeSet: u16 {
        const DOC             = 1 << 0;
        const PARAGRAPH       = 1 << 1;
        const BLOCKQUOTE      = 1 << 2;
        const HORIZONTAL_RULE = 1 << 3;
        const HEADING         = 1 << 4;
        const CODE_BLOCK      = 1 << 5;
        const ORDERED_LIST    = 1 << 6;
        const BULLET_LIST     = 1 << 7;
        const LIST_ITEM       = 1 << 8;
        const TEXT            = 1 << 9;
        const IMAGE           = 1 << 10;
        const HARD_BREAK      = 1 << 11;
    }
}

bitflags! {
    /// A set of mark types.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MarkSet: u8 {
        const EM     = 1 << 0;
        const STRONG = 1 << 1;
        const LINK   = 1 << 2;
        const CODE   = 1 << 3;
    }
}

/// Node types no schema may drop.
const REQUIRED: NodeSet = NodeSet::DOC
    .union(NodeSet::PARAGRAPH)
    .union(NodeSet::TEXT);

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// The set of node and mark types a document may contain.
///
/// Immutable once built. Derive narrower schemas with
/// [`without_marks`](Self::without_marks) and
/// [`without_nodes`](Self::without_nodes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Schema {
    nodes: NodeSet,
    marks: MarkSet,
}

impl Schema {
    /// The full markdown vocabulary.
    #[must_use]
    pub const fn markdown() -> Self {
        Self {
            nodes: NodeSet::all(),
            marks: MarkSet::all(),
        }
    }

    /// A schema with the same vocabulary as `base`.
    #[must_use]
    pub const fn derive(base: &Self) -> Self {
        Self {
            nodes: base.nodes,
            marks: base.marks,
        }
    }

    /// Remove mark types from the vocabulary.
    #[must_use]
    pub const fn without_marks(self, marks: MarkSet) -> Self {
        Self {
            nodes: self.nodes,
            marks: self.marks.difference(marks),
        }
    }

    /// Remove node types from the vocabulary.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingNodeType`] if `doc`, `paragraph` or
    /// `text` would be removed, or if a list type survives without
    /// `list_item`.
    pub fn without_nodes(self, nodes: NodeSet) -> Result<Self> {
        let remaining = self.nodes.difference(nodes);
        for ty in NodeType::ALL {
            if REQUIRED.contains(ty.flag()) && !remaining.contains(ty.flag()) {
                return Err(ModelError::MissingNodeType(ty.name()));
            }
        }
        let has_lists = remaining.intersects(NodeSet::BULLET_LIST | NodeSet::ORDERED_LIST);
        if has_lists && !remaining.contains(NodeSet::LIST_ITEM) {
            return Err(ModelError::MissingNodeType(NodeType::ListItem.name()));
        }
        Ok(Self {
            nodes: remaining,
            marks: self.marks,
        })
    }

    #[inline]
    #[must_use]
    pub const fn nodes(&self) -> NodeSet {
        self.nodes
    }

    #[inline]
    #[must_use]
    pub const fn marks(&self) -> MarkSet {
        self.marks
    }

    /// True when `ty` is part of this schema.
    #[inline]
    #[must_use]
    pub const fn allows_node(&self, ty: NodeType) -> bool {
        self.nodes.contains(ty.flag())
    }

    /// True when `ty` is part of this schema.
    #[inline]
    #[must_use]
    pub const fn allows_mark(&self, ty: MarkType) -> bool {
        self.marks.contains(ty.flag())
    }

    /// Rewrite a document so it only uses this schema's vocabulary.
    ///
    /// Disallowed marks are stripped. Disallowed nodes are lowered to the
    /// closest allowed shape: headings and code blocks become paragraphs,
    /// quotes and lists are unwrapped into their blocks, rules are dropped,
    /// images become their alt text and hard breaks become newlines.
    #[must_use]
    pub fn conform(&self, doc: Node) -> Node {
        if self.nodes == NodeSet::all() && self.marks == MarkSet::all() {
            return doc;
        }
        let blocks = self.conform_blocks(doc.content());
        Node::doc(blocks)
    }

    fn conform_blocks(&self, content: &Fragment) -> Vec<Node> {
        let mut out = Vec::new();
        for block in content.iter() {
            let ty = block.node_type();
            if self.allows_node(ty) {
                match block.kind() {
                    kind if ty.is_textblock() => {
                        let inline = self.conform_inline(block.content(), ty.is_code());
                        out.push(Node::new(kind.clone(), Fragment::from_vec(inline)));
                    }
                    NodeKind::HorizontalRule => out.push(block.clone()),
                    kind => {
                        let mut children = self.conform_blocks(block.content());
                        fix_container(ty, &mut children);
                        if !children.is_empty() {
                            out.push(Node::new(kind.clone(), Fragment::from_vec(children)));
                        }
                    }
                }
                continue;
            }
            tracing::trace!(node = ty.name(), "lowering node outside schema");
            if ty.is_textblock() {
                let inline = self.conform_inline(block.content(), ty.is_code());
                out.push(Node::paragraph(inline));
            } else if !ty.is_leaf() {
                out.extend(self.conform_blocks(block.content()));
            }
        }
        out
    }

    fn conform_inline(&self, content: &Fragment, code: bool) -> Vec<Node> {
        let mut out = Vec::new();
        for node in content.iter() {
            let marks: Vec<Mark> = if code {
                Vec::new()
            } else {
                node.marks()
                    .iter()
                    .filter(|m| self.allows_mark(m.mark_type()))
                    .cloned()
                    .collect()
            };
            match node.kind() {
                NodeKind::Text(text) => out.push(Node::text(text.clone(), marks)),
                NodeKind::Image { alt, .. } if !self.allows_node(NodeType::Image) || code => {
                    if let Some(alt) = alt.as_ref().filter(|a| !a.is_empty()) {
                        out.push(Node::text(alt.clone(), marks));
                    }
                }
                NodeKind::HardBreak if !self.allows_node(NodeType::HardBreak) || code => {
                    out.push(Node::text("\n", marks));
                }
                kind => out.push(Node::leaf(kind.clone()).with_marks(marks)),
            }
        }
        out
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::markdown()
    }
}

/// Keep containers valid after their children were conformed.
fn fix_container(ty: NodeType, children: &mut Vec<Node>) {
    match ty {
        NodeType::ListItem => {
            if children.first().is_none_or(|c| c.node_type() != NodeType::Paragraph) {
                children.insert(0, Node::paragraph(Vec::new()));
            }
        }
        NodeType::BulletList | NodeType::OrderedList => {
            children.retain(|c| c.node_type() == NodeType::ListItem);
        }
        NodeType::Blockquote if children.is_empty() => {
            children.push(Node::paragraph(Vec::new()));
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Content rules
// ---------------------------------------------------------------------------

/// Check that `content` is valid for a node of type `ty`.
///
/// # Errors
///
/// Returns [`ModelError::InvalidContent`] describing the first violated rule.
pub fn check_content(ty: NodeType, content: &Fragment) -> Result<()> {
    let fail = |reason| {
        Err(ModelError::InvalidContent {
            node: ty.name(),
            reason,
        })
    };
    let children = content.as_slice();
    match ty {
        NodeType::Doc | NodeType::Blockquote => {
            if children.is_empty() {
                return fail("expected at least one block");
            }
            if !children.iter().all(|c| c.node_type().is_block()) {
                return fail("expected only blocks");
            }
        }
        NodeType::Paragraph | NodeType::Heading => {
            if !children.iter().all(|c| c.node_type().is_inline()) {
                return fail("expected only inline content");
            }
        }
        NodeType::CodeBlock => {
            if !children.iter().all(|c| c.is_text() && c.marks().is_empty()) {
                return fail("expected unmarked text");
            }
        }
        NodeType::OrderedList | NodeType::BulletList => {
            if children.is_empty() {
                return fail("expected at least one list item");
            }
            if !children.iter().all(|c| c.node_type() == NodeType::ListItem) {
                return fail("expected only list items");
            }
        }
        NodeType::ListItem => {
            match children.first() {
                Some(first) if first.node_type() == NodeType::Paragraph => {}
                _ => return fail("expected a leading paragraph"),
            }
            if !children.iter().all(|c| c.node_type().is_block()) {
                return fail("expected only blocks");
            }
        }
        NodeType::HorizontalRule | NodeType::Text | NodeType::Image | NodeType::HardBreak => {
            if !children.is_empty() {
                return fail("leaf nodes cannot have content");
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Types --------------------------------------------------------------

    #[test]
    fn textblocks_are_blocks() {
        for ty in NodeType::ALL {
            if ty.is_textblock() {
                assert!(ty.is_block(), "{} should be a block", ty.name());
            }
        }
    }

    #[test]
    fn atoms_exclude_text() {
        assert!(NodeType::Image.is_atom());
        assert!(NodeType::HardBreak.is_atom());
        assert!(!NodeType::Text.is_atom());
        assert!(NodeType::Text.is_leaf());
    }

    #[test]
    fn compatible_content_classes() {
        assert!(NodeType::Paragraph.compatible_content(NodeType::Heading));
        assert!(NodeType::BulletList.compatible_content(NodeType::OrderedList));
        assert!(NodeType::Doc.compatible_content(NodeType::Blockquote));
        assert!(!NodeType::Paragraph.compatible_content(NodeType::Blockquote));
        assert!(!NodeType::Image.compatible_content(NodeType::HardBreak));
    }

    #[test]
    fn mark_rank_follows_declaration() {
        assert!(MarkType::Em < MarkType::Strong);
        assert!(MarkType::Link < MarkType::Code);
    }

    // -- Schema derivation --------------------------------------------------

    #[test]
    fn derive_keeps_vocabulary() {
        let base = Schema::markdown();
        assert_eq!(Schema::derive(&base), base);
    }

    #[test]
    fn without_marks_restricts() {
        let schema = Schema::markdown().without_marks(MarkSet::CODE | MarkSet::LINK);
        assert!(schema.allows_mark(MarkType::Em));
        assert!(!schema.allows_mark(MarkType::Code));
        assert!(!schema.allows_mark(MarkType::Link));
    }

    #[test]
    fn without_nodes_rejects_required() {
        let err = Schema::markdown().without_nodes(NodeSet::PARAGRAPH);
        assert_eq!(err, Err(ModelError::MissingNodeType("paragraph")));
    }

    #[test]
    fn without_nodes_rejects_orphaned_lists() {
        let err = Schema::markdown().without_nodes(NodeSet::LIST_ITEM);
        assert_eq!(err, Err(ModelError::MissingNodeType("list_item")));
    }

    #[test]
    fn without_nodes_drops_lists_together() {
        let schema = Schema::markdown()
            .without_nodes(NodeSet::LIST_ITEM | NodeSet::BULLET_LIST | NodeSet::ORDERED_LIST)
            .unwrap();
        assert!(!schema.allows_node(NodeType::BulletList));
        assert!(schema.allows_node(NodeType::Heading));
    }

    // -- Conform ------------------------------------------------------------

    #[test]
    fn conform_strips_marks() {
        let schema = Schema::markdown().without_marks(MarkSet::STRONG);
        let doc = Node::doc(vec![Node::paragraph(vec![Node::text(
            "hi",
            vec![Mark::Em, Mark::Strong],
        )])]);
        let expected = Node::doc(vec![Node::paragraph(vec![Node::text("hi", vec![Mark::Em])])]);
        assert_eq!(schema.conform(doc), expected);
    }

    #[test]
    fn conform_lowers_headings() {
        let schema = Schema::markdown().without_nodes(NodeSet::HEADING).unwrap();
        let doc = Node::doc(vec![Node::new(
            NodeKind::Heading { level: 2 },
            Fragment::from_vec(vec![Node::text("Title", vec![])]),
        )]);
        let expected = Node::doc(vec![Node::paragraph(vec![Node::text("Title", vec![])])]);
        assert_eq!(schema.conform(doc), expected);
    }

    // -- Content rules ------------------------------------------------------

    #[test]
    fn empty_doc_is_invalid() {
        assert!(check_content(NodeType::Doc, &Fragment::empty()).is_err());
    }

    #[test]
    fn list_item_needs_leading_paragraph() {
        let list = Node::new(
            NodeKind::BulletList { tight: true },
            Fragment::from_vec(vec![Node::new(
                NodeKind::ListItem,
                Fragment::from_vec(vec![Node::paragraph(vec![])]),
            )]),
        );
        let bad = Fragment::from_vec(vec![list]);
        assert!(check_content(NodeType::ListItem, &bad).is_err());
    }

    #[test]
    fn code_block_rejects_marks() {
        let marked = Fragment::from_vec(vec![Node::text("x", vec![Mark::Em])]);
        assert!(check_content(NodeType::CodeBlock, &marked).is_err());
        let plain = Fragment::from_vec(vec![Node::text("x", vec![])]);
        assert!(check_content(NodeType::CodeBlock, &plain).is_ok());
    }
}
