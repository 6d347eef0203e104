//! Linear offsets ↔ document positions.
//!
//! Hosts address the editor as if it were a plain text field: an offset is
//! an index into the *flat text* of the document, where every textblock
//! contributes its characters (inline leaves count as one character each)
//! and consecutive textblocks are separated by one newline. Block
//! delimiters, list items and quote wrappers take no offsets.
//!
//! ```text
//! doc( p("ab"), blockquote( p("cd") ) )
//!
//! positions:  0 [p 1 a 2 b 3 p] 4 [bq 5 [p 6 c 7 d 8 p] 9 bq] 10
//! offsets:         0   1   2          3   4   5
//! flat text:       a   b  \n          c   d
//! ```
//!
//! The map is a bijection between `0..=len` and positions inside
//! textblocks. It is rebuilt from the document whenever one is needed, so
//! it never drifts from the tree it describes.

use ropey::Rope;
use scribe_model::{Node, NodeKind};
use unicode_width::UnicodeWidthChar;

use crate::error::{EditorError, Result};

/// Stand-in for inline leaves other than hard breaks in the flat text.
const OBJECT_REPLACEMENT: char = '\u{fffc}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    /// Document position where the textblock's content starts.
    start: usize,
    /// Content size in positions (equal to its char count in the flat text).
    size: usize,
    /// Offset of the content start.
    base: usize,
}

/// Caret location in monospace cells of the flat text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Caret {
    pub left: usize,
    pub top: usize,
    pub height: usize,
}

/// Translation table between offsets and positions for one document.
#[derive(Debug, Clone)]
pub struct OffsetMap {
    blocks: Vec<Block>,
    text: Rope,
    len: usize,
}

impl OffsetMap {
    #[must_use]
    pub fn build(doc: &Node) -> Self {
        let mut blocks: Vec<Block> = Vec::new();
        let mut flat = String::new();
        let mut base = 0;
        doc.descendants(&mut |node, pos| {
            if !node.is_textblock() {
                return true;
            }
            if !blocks.is_empty() {
                flat.push('\n');
                base += 1;
            }
            for child in node.content().iter() {
                match child.kind() {
                    NodeKind::Text(text) => flat.push_str(text),
                    NodeKind::HardBreak => flat.push('\n'),
                    _ => flat.push(OBJECT_REPLACEMENT),
                }
            }
            let size = node.content_size();
            blocks.push(Block {
                start: pos + 1,
                size,
                base,
            });
            base += size;
            false
        });
        Self {
            blocks,
            text: Rope::from_str(&flat),
            len: base,
        }
    }

    /// Number of offsets past the first, so valid offsets are `0..=len`.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The flat text the offsets index into.
    #[must_use]
    pub fn text(&self) -> String {
        self.text.to_string()
    }

    /// Reject offsets past the end.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::OutOfRange`] if `offset > len`.
    pub fn check(&self, offset: usize) -> Result<usize> {
        if offset > self.len {
            tracing::warn!(offset, len = self.len, "offset out of range");
            return Err(EditorError::OutOfRange {
                offset,
                len: self.len,
            });
        }
        Ok(offset)
    }

    /// The document position for `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::OutOfRange`] if `offset > len`.
    pub fn to_pos(&self, offset: usize) -> Result<usize> {
        self.check(offset)?;
        let index = self.blocks.partition_point(|b| b.base + b.size < offset);
        Ok(self
            .blocks
            .get(index)
            .map_or(0, |b| b.start + (offset - b.base)))
    }

    /// The offset for a document position. Positions between textblocks
    /// map to the start of the next one.
    #[must_use]
    pub fn to_offset(&self, pos: usize) -> usize {
        let index = self.blocks.partition_point(|b| b.start + b.size < pos);
        match self.blocks.get(index) {
            Some(b) if b.start <= pos => b.base + (pos - b.start),
            Some(b) => b.base,
            None => self.len,
        }
    }

    /// Where a caret at `offset` is drawn: line index and display column
    /// in the flat text.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::OutOfRange`] if `offset > len`.
    pub fn caret(&self, offset: usize) -> Result<Caret> {
        self.check(offset)?;
        let top = self.text.char_to_line(offset);
        let line_start = self.text.line_to_char(top);
        let left = self
            .text
            .slice(line_start..offset)
            .chars()
            .map(|c| c.width().unwrap_or(0))
            .sum();
        Ok(Caret {
            left,
            top,
            height: 1,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scribe_model::Fragment;

    fn t(s: &str) -> Node {
        Node::text(s, vec![])
    }

    fn p(s: &str) -> Node {
        Node::paragraph(if s.is_empty() { vec![] } else { vec![t(s)] })
    }

    fn wrap(kind: NodeKind, children: Vec<Node>) -> Node {
        Node::new(kind, Fragment::from_vec(children))
    }

    // -- Mapping ------------------------------------------------------------

    #[test]
    fn offsets_skip_block_delimiters() {
        let doc = Node::doc(vec![p("ab"), wrap(NodeKind::Blockquote, vec![p("cd")])]);
        let map = OffsetMap::build(&doc);
        assert_eq!(map.len(), 5);
        assert_eq!(map.text(), "ab\ncd");
        let positions: Vec<usize> = (0..=5).map(|o| map.to_pos(o).unwrap()).collect();
        assert_eq!(positions, vec![1, 2, 3, 6, 7, 8]);
        for (offset, pos) in positions.into_iter().enumerate() {
            assert_eq!(map.to_offset(pos), offset);
        }
    }

    #[test]
    fn positions_between_blocks_snap_forward() {
        let doc = Node::doc(vec![p("ab"), p("cd")]);
        let map = OffsetMap::build(&doc);
        assert_eq!(map.to_offset(0), 0);
        assert_eq!(map.to_offset(4), 3);
        assert_eq!(map.to_offset(8), 5);
    }

    #[test]
    fn nested_list_items() {
        let item = |s| wrap(NodeKind::ListItem, vec![p(s)]);
        let doc = Node::doc(vec![wrap(NodeKind::BulletList { tight: true }, vec![item("a"), item("b")])]);
        let map = OffsetMap::build(&doc);
        assert_eq!(map.len(), 3);
        assert_eq!(map.to_pos(0).unwrap(), 3);
        assert_eq!(map.to_pos(2).unwrap(), 8);
    }

    #[test]
    fn inline_leaves_take_one_offset() {
        let doc = Node::doc(vec![Node::paragraph(vec![
            t("a"),
            Node::leaf(NodeKind::HardBreak),
            t("b"),
            Node::leaf(NodeKind::Image {
                src: "x.png".into(),
                alt: None,
                title: None,
            }),
        ])]);
        let map = OffsetMap::build(&doc);
        assert_eq!(map.len(), 4);
        assert_eq!(map.text(), "a\nb\u{fffc}");
    }

    #[test]
    fn empty_and_rule_only_documents() {
        let map = OffsetMap::build(&Node::doc(vec![]));
        assert!(map.is_empty());
        assert_eq!(map.to_pos(0).unwrap(), 1);
        let rules = Node::doc(vec![Node::leaf(NodeKind::HorizontalRule)]);
        let map = OffsetMap::build(&rules);
        assert_eq!(map.to_pos(0).unwrap(), 0);
    }

    #[test]
    fn out_of_range_is_rejected() {
        let map = OffsetMap::build(&Node::doc(vec![p("ab")]));
        assert_eq!(map.to_pos(3).unwrap_err(), EditorError::OutOfRange { offset: 3, len: 2 });
        assert!(map.caret(9).is_err());
    }

    // -- Caret --------------------------------------------------------------

    #[test]
    fn caret_counts_lines_and_display_width() {
        let doc = Node::doc(vec![p("ab"), p("你好x")]);
        let map = OffsetMap::build(&doc);
        assert_eq!(map.caret(1).unwrap(), Caret { left: 1, top: 0, height: 1 });
        assert_eq!(map.caret(3).unwrap(), Caret { left: 0, top: 1, height: 1 });
        assert_eq!(map.caret(5).unwrap(), Caret { left: 4, top: 1, height: 1 });
    }
}
