//! Resolved positions: a position plus the path of ancestors around it.
//!
//! A bare `usize` position says nothing about where it sits in the tree.
//! [`ResolvedPos`] records, for every depth from the document down to the
//! innermost node containing the position, which node it is, which child
//! index the position falls at, and where that child starts. Depth 0 is the
//! document itself.

use crate::error::{ModelError, Result};
use crate::node::{Mark, Node};

/// One level of a resolved path.
#[derive(Debug, Clone, Copy)]
struct Frame<'a> {
    node: &'a Node,
    index: usize,
    /// Absolute position where the child at `index` starts.
    offset: usize,
}

/// A position resolved against a specific document.
#[derive(Debug, Clone)]
pub struct ResolvedPos<'a> {
    pos: usize,
    path: Vec<Frame<'a>>,
    parent_offset: usize,
}

impl<'a> ResolvedPos<'a> {
    /// Resolve `pos` inside `doc`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::OutOfRange`] if `pos > doc.content_size()`.
    pub fn resolve(doc: &'a Node, pos: usize) -> Result<Self> {
        let size = doc.content_size();
        if pos > size {
            return Err(ModelError::OutOfRange { pos, size });
        }
        let mut path = Vec::new();
        let mut start = 0;
        let mut parent_offset = pos;
        let mut node = doc;
        loop {
            let (index, offset) = node.content().find_index(parent_offset);
            let rem = parent_offset - offset;
            path.push(Frame {
                node,
                index,
                offset: start + offset,
            });
            if rem == 0 {
                break;
            }
            node = node.child(index);
            if node.is_text() {
                break;
            }
            parent_offset = rem - 1;
            start += offset + 1;
        }
        Ok(Self {
            pos,
            path,
            parent_offset,
        })
    }

    /// The absolute position.
    #[inline]
    #[must_use]
    pub const fn pos(&self) -> usize {
        self.pos
    }

    /// Depth of the innermost node containing the position.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    /// Offset of the position inside its parent's content.
    #[inline]
    #[must_use]
    pub const fn parent_offset(&self) -> usize {
        self.parent_offset
    }

    /// The ancestor at `depth`.
    #[inline]
    #[must_use]
    pub fn node(&self, depth: usize) -> &'a Node {
        self.path[depth].node
    }

    /// The innermost node containing the position.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> &'a Node {
        self.node(self.depth())
    }

    /// The document this position was resolved in.
    #[inline]
    #[must_use]
    pub fn doc(&self) -> &'a Node {
        self.node(0)
    }

    /// Child index the position falls at in the ancestor at `depth`.
    #[inline]
    #[must_use]
    pub fn index(&self, depth: usize) -> usize {
        self.path[depth].index
    }

    /// Index of the first child after the position in the ancestor at
    /// `depth`; differs from [`index`](Self::index) when the position is
    /// inside a text node.
    #[must_use]
    pub fn index_after(&self, depth: usize) -> usize {
        let bump = usize::from(depth != self.depth() || self.text_offset() != 0);
        self.index(depth) + bump
    }

    /// Absolute position at the start of the ancestor at `depth`'s content.
    #[must_use]
    pub fn start(&self, depth: usize) -> usize {
        if depth == 0 {
            0
        } else {
            self.path[depth - 1].offset + 1
        }
    }

    /// Absolute position at the end of the ancestor at `depth`'s content.
    #[must_use]
    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content_size()
    }

    /// Absolute position directly before the ancestor at `depth`.
    ///
    /// # Panics
    ///
    /// Panics when `depth` is 0, since nothing comes before the document.
    #[must_use]
    pub fn before(&self, depth: usize) -> usize {
        assert!(depth > 0, "there is no position before the top-level node");
        self.path[depth - 1].offset
    }

    /// Absolute position directly after the ancestor at `depth`.
    ///
    /// # Panics
    ///
    /// Panics when `depth` is 0.
    #[must_use]
    pub fn after(&self, depth: usize) -> usize {
        self.before(depth) + self.node(depth).node_size()
    }

    /// Offset into the text node the position points into, or 0 when it
    /// sits between nodes.
    #[must_use]
    pub fn text_offset(&self) -> usize {
        self.pos - self.path[self.depth()].offset
    }

    /// The node directly after the position, cut if the position is inside
    /// a text node.
    #[must_use]
    pub fn node_after(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth());
        let child = parent.maybe_child(index)?;
        let d_off = self.text_offset();
        if d_off > 0 {
            Some(child.cut(d_off, child.node_size()))
        } else {
            Some(child.clone())
        }
    }

    /// The node directly before the position, cut if the position is inside
    /// a text node.
    #[must_use]
    pub fn node_before(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth());
        let d_off = self.text_offset();
        if d_off > 0 {
            return parent.maybe_child(index).map(|child| child.cut(0, d_off));
        }
        if index == 0 {
            None
        } else {
            parent.maybe_child(index - 1).cloned()
        }
    }

    /// The deepest depth whose node contains both this position and `pos`.
    #[must_use]
    pub fn shared_depth(&self, pos: usize) -> usize {
        for depth in (1..=self.depth()).rev() {
            if self.start(depth) <= pos && self.end(depth) >= pos {
                return depth;
            }
        }
        0
    }

    /// Marks that text inserted at this position should carry: the marks of
    /// the text before it, or after it at the start of a textblock, minus
    /// non-inclusive marks that end here.
    #[must_use]
    pub fn marks(&self) -> Vec<Mark> {
        let parent = self.parent();
        let index = self.index(self.depth());
        if parent.content_size() == 0 {
            return Vec::new();
        }
        if self.text_offset() > 0 {
            return parent.child(index).marks().to_vec();
        }
        let before = index.checked_sub(1).and_then(|i| parent.maybe_child(i));
        let after = parent.maybe_child(index);
        let (main, other) = match before {
            Some(before) => (before, after),
            None => match after {
                Some(after) => (after, None),
                None => return Vec::new(),
            },
        };
        main.marks()
            .iter()
            .filter(|mark| mark.inclusive() || other.is_some_and(|o| mark.is_in_set(o.marks())))
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use crate::schema::NodeType;

    fn t(s: &str) -> Node {
        Node::text(s, vec![])
    }

    /// doc(paragraph("ab"), blockquote(paragraph("cd")))
    /// 0 <p> 1 a 2 b 3 </p> 4 <bq> 5 <p> 6 c 7 d 8 </p> 9 </bq> 10
    fn sample() -> Node {
        Node::doc(vec![
            Node::paragraph(vec![t("ab")]),
            Node::new(
                NodeKind::Blockquote,
                crate::node::Fragment::from_vec(vec![Node::paragraph(vec![t("cd")])]),
            ),
        ])
    }

    #[test]
    fn resolve_top_level() {
        let doc = sample();
        let rp = ResolvedPos::resolve(&doc, 0).unwrap();
        assert_eq!(rp.depth(), 0);
        assert_eq!(rp.index(0), 0);
        let rp = ResolvedPos::resolve(&doc, 4).unwrap();
        assert_eq!(rp.depth(), 0);
        assert_eq!(rp.index(0), 1);
    }

    #[test]
    fn resolve_inside_text() {
        let doc = sample();
        let rp = ResolvedPos::resolve(&doc, 2).unwrap();
        assert_eq!(rp.depth(), 1);
        assert_eq!(rp.parent().node_type(), NodeType::Paragraph);
        assert_eq!(rp.parent_offset(), 1);
        assert_eq!(rp.text_offset(), 1);
        assert_eq!(rp.node_before(), Some(t("a")));
        assert_eq!(rp.node_after(), Some(t("b")));
        assert_eq!(rp.index_after(1), 1);
    }

    #[test]
    fn resolve_nested() {
        let doc = sample();
        let rp = ResolvedPos::resolve(&doc, 7).unwrap();
        assert_eq!(rp.depth(), 2);
        assert_eq!(rp.start(2), 6);
        assert_eq!(rp.end(2), 8);
        assert_eq!(rp.before(2), 5);
        assert_eq!(rp.after(2), 9);
        assert_eq!(rp.before(1), 4);
        assert_eq!(rp.node(1).node_type(), NodeType::Blockquote);
    }

    #[test]
    fn resolve_out_of_range() {
        let doc = sample();
        assert_eq!(
            ResolvedPos::resolve(&doc, 11).unwrap_err(),
            ModelError::OutOfRange { pos: 11, size: 10 }
        );
    }

    #[test]
    fn shared_depth_between_blocks() {
        let doc = sample();
        let rp = ResolvedPos::resolve(&doc, 2).unwrap();
        assert_eq!(rp.shared_depth(3), 1);
        assert_eq!(rp.shared_depth(7), 0);
    }

    #[test]
    fn marks_skip_link_at_end() {
        let link = Mark::Link {
            href: "x".into(),
            title: None,
        };
        let doc = Node::doc(vec![Node::paragraph(vec![
            Node::text("a", vec![Mark::Strong, link]),
            t("b"),
        ])]);
        let rp = ResolvedPos::resolve(&doc, 2).unwrap();
        assert_eq!(rp.marks(), vec![Mark::Strong]);
    }
}
