//! Document tree: nodes, marks and fragments.
//!
//! A document is an immutable tree of [`Node`]s. Block nodes hold a
//! [`Fragment`] of children; text nodes hold a string and a sorted set of
//! [`Mark`]s. Every edit produces a new tree; nothing here mutates in place
//! once a node is built.
//!
//! # Position space
//!
//! Positions count *slots*, not characters:
//!
//! - a text node is one slot per `char`
//! - an atom (image, hard break, horizontal rule) is one slot
//! - any other node is its content plus two slots, one for entering it and
//!   one for leaving it
//!
//! So `doc(paragraph("hi"))` has content size 4: position 0 is before the
//! paragraph, 1 is inside it before `h`, 3 is after `i`, 4 is after the
//! paragraph. Converting between this space and character offsets of the
//! serialized text is not arithmetic, it depends on the tree shape.

use std::fmt;

use crate::error::Result;
use crate::schema::{self, MarkType, NodeType};

// ---------------------------------------------------------------------------
// Mark
// ---------------------------------------------------------------------------

/// An inline formatting attribute attached to text or inline leaves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Mark {
    Em,
    Strong,
    Link { href: String, title: Option<String> },
    Code,
}

impl Mark {
    /// The attribute-free type of this mark.
    #[must_use]
    pub const fn mark_type(&self) -> MarkType {
        match self {
            Self::Em => MarkType::Em,
            Self::Strong => MarkType::Strong,
            Self::Link { .. } => MarkType::Link,
            Self::Code => MarkType::Code,
        }
    }

    /// Whether text typed at the end of this mark continues it. Links stop
    /// at their boundary; everything else extends.
    #[must_use]
    pub const fn inclusive(&self) -> bool {
        !matches!(self, Self::Link { .. })
    }

    /// Return `set` with this mark added, replacing any mark of the same
    /// type, kept in rank order.
    #[must_use]
    pub fn add_to_set(&self, set: &[Self]) -> Vec<Self> {
        let mut out: Vec<Self> = set
            .iter()
            .filter(|m| m.mark_type() != self.mark_type())
            .cloned()
            .collect();
        let at = out
            .iter()
            .position(|m| m.mark_type() > self.mark_type())
            .unwrap_or(out.len());
        out.insert(at, self.clone());
        out
    }

    /// True when `set` contains exactly this mark (attributes included).
    #[must_use]
    pub fn is_in_set(&self, set: &[Self]) -> bool {
        set.contains(self)
    }
}

/// Return `set` without any mark of type `ty`.
#[must_use]
pub fn remove_mark_type(set: &[Mark], ty: MarkType) -> Vec<Mark> {
    set.iter().filter(|m| m.mark_type() != ty).cloned().collect()
}

/// True when `set` has a mark of type `ty`.
#[must_use]
pub fn has_mark_type(set: &[Mark], ty: MarkType) -> bool {
    set.iter().any(|m| m.mark_type() == ty)
}

// ---------------------------------------------------------------------------
// NodeKind
// ---------------------------------------------------------------------------

/// A node type together with its attributes. Text nodes carry their string
/// here so that the rest of [`Node`] is uniform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Doc,
    Paragraph,
    Blockquote,
    HorizontalRule,
    Heading {
        level: u8,
    },
    CodeBlock {
        params: String,
    },
    OrderedList {
        order: u32,
        tight: bool,
    },
    BulletList {
        tight: bool,
    },
    ListItem,
    Text(String),
    Image {
        src: String,
        alt: Option<String>,
        title: Option<String>,
    },
    HardBreak,
}

impl NodeKind {
    #[must_use]
    pub const fn node_type(&self) -> NodeType {
        match self {
            Self::Doc => NodeType::Doc,
            Self::Paragraph => NodeType::Paragraph,
            Self::Blockquote => NodeType::Blockquote,
            Self::HorizontalRule => NodeType::HorizontalRule,
            Self::Heading { .. } => NodeType::Heading,
            Self::CodeBlock { .. } => NodeType::CodeBlock,
            Self::OrderedList { .. } => NodeType::OrderedList,
            Self::BulletList { .. } => NodeType::BulletList,
            Self::ListItem => NodeType::ListItem,
            Self::Text(_) => NodeType::Text,
            Self::Image { .. } => NodeType::Image,
            Self::HardBreak => NodeType::HardBreak,
        }
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A node in the document tree.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Node {
    kind: NodeKind,
    content: Fragment,
    marks: Vec<Mark>,
}

impl Node {
    // -- Construction -------------------------------------------------------

    /// A node with the given children and no marks.
    #[must_use]
    pub const fn new(kind: NodeKind, content: Fragment) -> Self {
        Self {
            kind,
            content,
            marks: Vec::new(),
        }
    }

    /// A node without children.
    #[must_use]
    pub const fn leaf(kind: NodeKind) -> Self {
        Self::new(kind, Fragment::empty())
    }

    /// A text node. `marks` are sorted into rank order.
    #[must_use]
    pub fn text(text: impl Into<String>, mut marks: Vec<Mark>) -> Self {
        marks.sort_by_key(Mark::mark_type);
        Self {
            kind: NodeKind::Text(text.into()),
            content: Fragment::empty(),
            marks,
        }
    }

    /// A document. An empty block list becomes a single empty paragraph so
    /// the result always satisfies `block+`.
    #[must_use]
    pub fn doc(mut blocks: Vec<Self>) -> Self {
        if blocks.is_empty() {
            blocks.push(Self::paragraph(Vec::new()));
        }
        Self::new(NodeKind::Doc, Fragment::from_vec(blocks))
    }

    /// A paragraph holding `inline` content.
    #[must_use]
    pub fn paragraph(inline: Vec<Self>) -> Self {
        Self::new(NodeKind::Paragraph, Fragment::from_vec(inline))
    }

    /// The same node with `marks` (sorted into rank order).
    #[must_use]
    pub fn with_marks(mut self, mut marks: Vec<Mark>) -> Self {
        marks.sort_by_key(Mark::mark_type);
        self.marks = marks;
        self
    }

    // -- Accessors ----------------------------------------------------------

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[inline]
    #[must_use]
    pub const fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    #[inline]
    #[must_use]
    pub const fn content(&self) -> &Fragment {
        &self.content
    }

    #[inline]
    #[must_use]
    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    /// The text of a text node, `None` for everything else.
    #[inline]
    #[must_use]
    pub fn text_str(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_textblock(&self) -> bool {
        self.node_type().is_textblock()
    }

    #[inline]
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.node_type().is_leaf()
    }

    #[inline]
    #[must_use]
    pub const fn is_inline(&self) -> bool {
        self.node_type().is_inline()
    }

    #[inline]
    #[must_use]
    pub const fn is_block(&self) -> bool {
        self.node_type().is_block()
    }

    /// Number of positions this node occupies in its parent.
    #[must_use]
    pub fn node_size(&self) -> usize {
        match &self.kind {
            NodeKind::Text(text) => text.chars().count(),
            _ if self.is_leaf() => 1,
            _ => self.content.size() + 2,
        }
    }

    /// Size of this node's content. Zero for leaves.
    #[inline]
    #[must_use]
    pub const fn content_size(&self) -> usize {
        self.content.size()
    }

    #[inline]
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.content.child_count()
    }

    /// The child at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    #[must_use]
    pub fn child(&self, index: usize) -> &Self {
        self.content.child(index)
    }

    #[inline]
    #[must_use]
    pub fn maybe_child(&self, index: usize) -> Option<&Self> {
        self.content.maybe_child(index)
    }

    // -- Derivation ---------------------------------------------------------

    /// Same type, attributes, and marks with new content.
    #[must_use]
    pub fn copy(&self, content: Fragment) -> Self {
        Self {
            kind: self.kind.clone(),
            content,
            marks: self.marks.clone(),
        }
    }

    /// A text node with the same marks and different text.
    #[must_use]
    pub fn with_text(&self, text: String) -> Self {
        debug_assert!(self.is_text(), "with_text on a non-text node");
        Self {
            kind: NodeKind::Text(text),
            content: Fragment::empty(),
            marks: self.marks.clone(),
        }
    }

    /// True when both nodes have the same type, attributes and marks. The
    /// text of text nodes is ignored.
    #[must_use]
    pub fn same_markup(&self, other: &Self) -> bool {
        let kind_eq = match (&self.kind, &other.kind) {
            (NodeKind::Text(_), NodeKind::Text(_)) => true,
            (a, b) => a == b,
        };
        kind_eq && self.marks == other.marks
    }

    /// The part of this node between content positions `from` and `to`.
    /// For text nodes the positions are char offsets.
    #[must_use]
    pub fn cut(&self, from: usize, to: usize) -> Self {
        if let NodeKind::Text(text) = &self.kind {
            let len = text.chars().count();
            if from == 0 && to >= len {
                return self.clone();
            }
            return self.with_text(char_slice(text, from, to).to_string());
        }
        if from == 0 && to == self.content.size() {
            return self.clone();
        }
        self.copy(self.content.cut(from, to))
    }

    /// All text in this node, concatenated without separators.
    #[must_use]
    pub fn text_content(&self) -> String {
        match &self.kind {
            NodeKind::Text(text) => text.clone(),
            _ => self.text_between(0, self.content.size(), "", None),
        }
    }

    /// Text between two content positions. Textblocks are separated by
    /// `block_separator`; atoms contribute `leaf_text` if given.
    #[must_use]
    pub fn text_between(
        &self,
        from: usize,
        to: usize,
        block_separator: &str,
        leaf_text: Option<&str>,
    ) -> String {
        let mut text = String::new();
        let mut first = true;
        self.content.nodes_between(from, to, 0, &mut |node, pos| {
            let node_text = match &node.kind {
                NodeKind::Text(s) => {
                    let start = from.max(pos) - pos;
                    char_slice(s, start, to - pos).to_string()
                }
                _ if node.node_type().is_atom() => leaf_text.unwrap_or("").to_string(),
                _ => String::new(),
            };
            if node.is_block() && (node.is_textblock() || (node.is_leaf() && !node_text.is_empty()))
            {
                if first {
                    first = false;
                } else {
                    text.push_str(block_separator);
                }
            }
            text.push_str(&node_text);
            true
        });
        text
    }

    /// Visit every descendant overlapping `[from, to)` in document order.
    /// `f` receives the node and its absolute position; returning `false`
    /// skips the node's children.
    pub fn nodes_between(&self, from: usize, to: usize, f: &mut impl FnMut(&Self, usize) -> bool) {
        self.content.nodes_between(from, to, 0, f);
    }

    /// Visit every descendant in document order.
    pub fn descendants(&self, f: &mut impl FnMut(&Self, usize) -> bool) {
        self.nodes_between(0, self.content.size(), f);
    }

    /// Check this node and all its descendants against the content rules.
    ///
    /// # Errors
    ///
    /// Returns the first content violation found.
    pub fn check(&self) -> Result<()> {
        schema::check_content(self.node_type(), &self.content)?;
        for child in self.content.iter() {
            child.check()?;
        }
        Ok(())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let NodeKind::Text(text) = &self.kind {
            if self.marks.is_empty() {
                return write!(f, "{text:?}");
            }
            let names: Vec<_> = self.marks.iter().map(|m| m.mark_type().name()).collect();
            return write!(f, "{}({text:?})", names.join("+"));
        }
        write!(f, "{}", self.node_type().name())?;
        if !self.content.is_empty() {
            f.debug_list().entries(self.content.iter()).finish()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fragment
// ---------------------------------------------------------------------------

/// An ordered run of sibling nodes with its total size cached.
///
/// Fragments are normalized on construction: adjacent text nodes with the
/// same marks are merged and empty text nodes are dropped, so two fragments
/// with the same visible content always compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Fragment {
    nodes: Vec<Node>,
    size: usize,
}

impl Fragment {
    /// The empty fragment.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            size: 0,
        }
    }

    /// Build a normalized fragment from `nodes`.
    #[must_use]
    pub fn from_vec(nodes: Vec<Node>) -> Self {
        let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
        for node in nodes {
            push_merged(&mut out, node);
        }
        let size = out.iter().map(Node::node_size).sum();
        Self { nodes: out, size }
    }

    /// A fragment with a single node.
    #[must_use]
    pub fn from_node(node: Node) -> Self {
        Self::from_vec(vec![node])
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[inline]
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The child at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    #[must_use]
    pub fn child(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    #[inline]
    #[must_use]
    pub fn maybe_child(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    #[inline]
    #[must_use]
    pub fn first_child(&self) -> Option<&Node> {
        self.nodes.first()
    }

    #[inline]
    #[must_use]
    pub fn last_child(&self) -> Option<&Node> {
        self.nodes.last()
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[Node] {
        &self.nodes
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Node> {
        self.nodes
    }

    /// The part of this fragment between positions `from` and `to`,
    /// cutting partially covered children.
    #[must_use]
    pub fn cut(&self, from: usize, to: usize) -> Self {
        if from == 0 && to == self.size {
            return self.clone();
        }
        let mut result = Vec::new();
        if to > from {
            let mut pos = 0;
            for child in &self.nodes {
                if pos >= to {
                    break;
                }
                let end = pos + child.node_size();
                if end > from {
                    let piece = if pos < from || end > to {
                        if child.is_text() {
                            child.cut(from.saturating_sub(pos), (to - pos).min(end - pos))
                        } else {
                            let inner_from = from.saturating_sub(pos + 1);
                            let inner_to = (to.saturating_sub(pos + 1)).min(child.content_size());
                            child.cut(inner_from, inner_to)
                        }
                    } else {
                        child.clone()
                    };
                    result.push(piece);
                }
                pos = end;
            }
        }
        Self::from_vec(result)
    }

    /// This fragment followed by `other`, merging text at the seam.
    #[must_use]
    pub fn append(&self, other: &Self) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut nodes = self.nodes.clone();
        nodes.extend(other.nodes.iter().cloned());
        Self::from_vec(nodes)
    }

    /// A copy with the child at `index` replaced.
    #[must_use]
    pub fn replace_child(&self, index: usize, node: Node) -> Self {
        let mut nodes = self.nodes.clone();
        nodes[index] = node;
        Self::from_vec(nodes)
    }

    /// Find the child containing position `pos`. Returns the child index
    /// and the position where that child starts. A position on a child
    /// boundary resolves to the child after it.
    #[must_use]
    pub fn find_index(&self, pos: usize) -> (usize, usize) {
        if pos == 0 {
            return (0, 0);
        }
        if pos >= self.size {
            return (self.nodes.len(), self.size);
        }
        let mut cur = 0;
        for (i, child) in self.nodes.iter().enumerate() {
            let end = cur + child.node_size();
            if end >= pos {
                if end == pos {
                    return (i + 1, end);
                }
                return (i, cur);
            }
            cur = end;
        }
        (self.nodes.len(), self.size)
    }

    /// Visit nodes overlapping `[from, to)`; `base` is the absolute
    /// position of this fragment's start.
    pub fn nodes_between(
        &self,
        from: usize,
        to: usize,
        base: usize,
        f: &mut impl FnMut(&Node, usize) -> bool,
    ) {
        let mut pos = 0;
        for child in &self.nodes {
            if pos >= to {
                break;
            }
            let end = pos + child.node_size();
            if end > from && f(child, base + pos) && child.content_size() > 0 {
                let start = pos + 1;
                child.content.nodes_between(
                    from.saturating_sub(start),
                    child.content_size().min(to.saturating_sub(start)),
                    base + start,
                    f,
                );
            }
            pos = end;
        }
    }
}

impl FromIterator<Node> for Fragment {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

/// Push `node` onto `target`, merging it into a preceding text node with
/// the same marks. Empty text is dropped.
pub(crate) fn push_merged(target: &mut Vec<Node>, node: Node) {
    if let NodeKind::Text(text) = &node.kind {
        if text.is_empty() {
            return;
        }
        if let Some(last) = target.last_mut() {
            if last.is_text() && last.marks == node.marks {
                if let NodeKind::Text(prev) = &mut last.kind {
                    prev.push_str(text);
                    return;
                }
            }
        }
    }
    target.push(node);
}

/// The chars of `s` in `[from, to)`, clamped to the string.
#[must_use]
pub fn char_slice(s: &str, from: usize, to: usize) -> &str {
    let mut indices = s.char_indices().map(|(i, _)| i).chain(std::iter::once(s.len()));
    let start = indices.clone().nth(from).unwrap_or(s.len());
    let end = if to <= from {
        start
    } else {
        indices.nth(to).unwrap_or(s.len())
    };
    &s[start..end]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn t(s: &str) -> Node {
        Node::text(s, vec![])
    }

    fn p(inline: Vec<Node>) -> Node {
        Node::paragraph(inline)
    }

    // -- Sizes --------------------------------------------------------------

    #[test]
    fn sizes_follow_position_space() {
        let doc = Node::doc(vec![p(vec![t("hi")])]);
        assert_eq!(doc.content_size(), 4);
        assert_eq!(doc.child(0).node_size(), 4);
        assert_eq!(t("héllo").node_size(), 5);
        assert_eq!(Node::leaf(NodeKind::HardBreak).node_size(), 1);
    }

    #[test]
    fn empty_doc_gets_paragraph() {
        let doc = Node::doc(vec![]);
        assert_eq!(doc.child_count(), 1);
        assert_eq!(doc.child(0).node_type(), NodeType::Paragraph);
        assert_eq!(doc.content_size(), 2);
    }

    // -- Marks --------------------------------------------------------------

    #[test]
    fn marks_sorted_by_rank() {
        let node = Node::text("x", vec![Mark::Code, Mark::Em]);
        assert_eq!(node.marks(), &[Mark::Em, Mark::Code]);
    }

    #[test]
    fn add_to_set_replaces_same_type() {
        let link_a = Mark::Link {
            href: "a".into(),
            title: None,
        };
        let link_b = Mark::Link {
            href: "b".into(),
            title: None,
        };
        let set = link_a.add_to_set(&[Mark::Em]);
        let set = link_b.add_to_set(&set);
        assert_eq!(set, vec![Mark::Em, link_b]);
    }

    #[test]
    fn remove_mark_type_filters() {
        let set = vec![Mark::Em, Mark::Strong];
        assert_eq!(remove_mark_type(&set, MarkType::Em), vec![Mark::Strong]);
        assert!(has_mark_type(&set, MarkType::Strong));
    }

    // -- Fragment normalization ---------------------------------------------

    #[test]
    fn adjacent_text_merges() {
        let frag = Fragment::from_vec(vec![t("a"), t("b"), Node::text("c", vec![Mark::Em])]);
        assert_eq!(frag.child_count(), 2);
        assert_eq!(frag.child(0).text_str(), Some("ab"));
        assert_eq!(frag.size(), 3);
    }

    #[test]
    fn empty_text_dropped() {
        let frag = Fragment::from_vec(vec![t(""), t("x")]);
        assert_eq!(frag.child_count(), 1);
    }

    // -- Cutting ------------------------------------------------------------

    #[test]
    fn cut_text_by_chars() {
        assert_eq!(t("héllo").cut(1, 3), t("él"));
    }

    #[test]
    fn cut_fragment_across_blocks() {
        let doc = Node::doc(vec![p(vec![t("ab")]), p(vec![t("cd")])]);
        // positions: 0 <p> 1 a 2 b 3 </p> 4 <p> 5 c 6 d 7 </p> 8
        let cut = doc.content().cut(2, 6);
        assert_eq!(cut, Fragment::from_vec(vec![p(vec![t("b")]), p(vec![t("c")])]));
    }

    #[test]
    fn find_index_boundaries() {
        let frag = Fragment::from_vec(vec![p(vec![t("ab")]), p(vec![t("cd")])]);
        assert_eq!(frag.find_index(0), (0, 0));
        assert_eq!(frag.find_index(2), (0, 0));
        assert_eq!(frag.find_index(4), (1, 4));
        assert_eq!(frag.find_index(8), (2, 8));
    }

    // -- Text ---------------------------------------------------------------

    #[test]
    fn text_between_separates_blocks() {
        let doc = Node::doc(vec![p(vec![t("ab")]), p(vec![t("cd")])]);
        assert_eq!(doc.text_between(0, 8, "\n", None), "ab\ncd");
        assert_eq!(doc.text_between(2, 6, "|", None), "b|c");
    }

    #[test]
    fn text_between_leaf_text() {
        let doc = Node::doc(vec![p(vec![t("a"), Node::leaf(NodeKind::HardBreak), t("b")])]);
        assert_eq!(doc.text_between(0, doc.content_size(), "", Some("\n")), "a\nb");
    }

    #[test]
    fn char_slice_clamps() {
        assert_eq!(char_slice("abc", 1, 10), "bc");
        assert_eq!(char_slice("abc", 5, 6), "");
        assert_eq!(char_slice("日本語", 1, 2), "本");
    }

    // -- Validation ---------------------------------------------------------

    #[test]
    fn check_accepts_valid_tree() {
        let doc = Node::doc(vec![p(vec![t("a")])]);
        assert!(doc.check().is_ok());
    }

    #[test]
    fn check_rejects_block_in_paragraph() {
        let doc = Node::doc(vec![p(vec![p(vec![])])]);
        assert!(doc.check().is_err());
    }
}
