//! Text insertion by linear offsets.
//!
//! The host hands over markdown text and a range of offsets. The range is
//! deleted, the text is parsed, and the parsed blocks are spliced into the
//! textblock at the start of the range:
//!
//! - a paragraph at either end of the parsed text *joins* the surrounding
//!   text on that side;
//! - any other block at an end splits the textblock there, and an empty
//!   half is *absorbed* (replaced) rather than left behind as an empty
//!   paragraph;
//! - when absorbing would break a content rule (a list item must start with
//!   a paragraph), the split half is *capped* with an empty paragraph
//!   instead.
//!
//! If no structural splice fits, the raw text is inserted as plain text.
//! Inside code blocks the text is always inserted literally.
//!
//! Single-line text is parsed without the whitespace that lands next to
//! existing text, which is then put back, so inserting `" and "` between two
//! words keeps both spaces. Leading whitespace at the start of a textblock is
//! markdown and is parsed with the rest (`"    code"` typed there is an
//! indented code block), and into an empty textblock the text is parsed
//! exactly as given.

use scribe_model::{Fragment, Node, NodeType, ResolvedPos, Slice};

use crate::commands::delete_range;
use crate::engine::DocumentEngine;
use crate::error::Result;
use crate::offsets::OffsetMap;
use crate::state::{EditorState, Transaction};

/// A prepared insertion.
#[derive(Debug, Clone)]
pub struct Insertion {
    pub tr: Transaction,
    /// Offset right after the inserted content, in the changed document.
    pub cursor: usize,
}

/// Replace the text between offsets `start` and `end` with `text`.
///
/// Reversed bounds are reordered. The cursor offset is computed from the
/// unchanged tail of the document: whatever followed `end` still follows
/// the new content.
///
/// # Errors
///
/// Returns [`EditorError::OutOfRange`](crate::EditorError::OutOfRange) if
/// either offset is past the end of the content.
pub fn insert_between(
    state: &EditorState,
    engine: &dyn DocumentEngine,
    start: usize,
    end: usize,
    text: &str,
) -> Result<Insertion> {
    let map = OffsetMap::build(state.doc());
    let (start, end) = (map.check(start)?, map.check(end)?);
    let (start, end) = if start <= end { (start, end) } else { (end, start) };
    let from = map.to_pos(start)?;
    let to = map.to_pos(end)?;
    let tail = map.len() - end;

    let mut tr = state.tr();
    delete_range(&mut tr, from, to)?;
    if !text.is_empty() {
        splice(&mut tr, engine, from, text)?;
    }
    let cursor = OffsetMap::build(tr.doc()).len().saturating_sub(tail);
    Ok(Insertion { tr, cursor })
}

fn splice(tr: &mut Transaction, engine: &dyn DocumentEngine, pos: usize, text: &str) -> Result<()> {
    let doc = tr.doc().clone();
    let r = doc.resolve(pos)?;
    let parent = r.parent();
    if parent.node_type().is_code() {
        tr.insert_text(text, pos, pos, Some(Vec::new()))?;
        return Ok(());
    }

    let single_line = !text.contains('\n');
    let (lead, body, trail) = if single_line {
        split_padding(text, r.parent_offset() > 0, parent.content_size() > 0)
    } else {
        ("", text, "")
    };
    let parsed = engine.parse(body);
    let blocks = parsed.content().as_slice();

    if !parent.is_textblock() {
        tr.insert(pos, parsed.content().clone())?;
        return Ok(());
    }

    if single_line && blocks.len() == 1 && blocks[0].node_type() == NodeType::Paragraph {
        let inline = blocks[0].content();
        if is_plain(inline, body) {
            tr.insert_text(text, pos, pos, None)?;
        } else {
            tr.insert(pos, with_padding(inline, lead, trail))?;
        }
        return Ok(());
    }

    for absorb in [true, false] {
        let mut attempt = tr.clone();
        match splice_blocks(&mut attempt, &r, blocks, absorb) {
            Ok(()) => {
                *tr = attempt;
                return Ok(());
            }
            Err(err) => tracing::debug!(absorb, %err, "block splice did not fit"),
        }
    }
    tracing::debug!(pos, "falling back to plain text insertion");
    tr.insert_text(text, pos, pos, None)?;
    Ok(())
}

/// Unmarked text whose content is exactly `text`.
fn is_plain(inline: &Fragment, text: &str) -> bool {
    inline.iter().all(|n| n.is_text() && n.marks().is_empty())
        && inline.iter().filter_map(Node::text_str).collect::<String>() == text
}

/// Split off the leading and trailing whitespace of `text`, each only when
/// its flag is set.
fn split_padding(text: &str, lead: bool, trail: bool) -> (&str, &str, &str) {
    let start = if lead { text.len() - text.trim_start().len() } else { 0 };
    let (lead, rest) = text.split_at(start);
    let end = if trail { rest.trim_end().len() } else { rest.len() };
    let (body, trail) = rest.split_at(end);
    (lead, body, trail)
}

/// `inline` between the given runs of whitespace.
fn with_padding(inline: &Fragment, lead: &str, trail: &str) -> Fragment {
    let mut nodes = Vec::with_capacity(inline.child_count() + 2);
    if !lead.is_empty() {
        nodes.push(Node::text(lead, Vec::new()));
    }
    nodes.extend(inline.iter().cloned());
    if !trail.is_empty() {
        nodes.push(Node::text(trail, Vec::new()));
    }
    Fragment::from_vec(nodes)
}

fn splice_blocks(tr: &mut Transaction, r: &ResolvedPos<'_>, blocks: &[Node], absorb: bool) -> Result<()> {
    let depth = r.depth();
    let is_paragraph = |n: Option<&Node>| n.is_some_and(|n| n.node_type() == NodeType::Paragraph);
    let mut nodes = blocks.to_vec();
    let (mut from, mut to) = (r.pos(), r.pos());
    let (mut open_start, mut open_end) = (1, 1);

    if !is_paragraph(blocks.first()) {
        if absorb && r.parent_offset() == 0 {
            from = r.before(depth);
            open_start = 0;
        } else {
            nodes.insert(0, Node::paragraph(Vec::new()));
        }
    }
    if !is_paragraph(blocks.last()) {
        if absorb && r.parent_offset() == r.parent().content_size() {
            to = r.after(depth);
            open_end = 0;
        } else {
            nodes.push(Node::paragraph(Vec::new()));
        }
    }
    tr.replace(from, to, Slice::new(Fragment::from_vec(nodes), open_start, open_end))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MarkdownEngine;
    use crate::error::EditorError;
    use crate::plugins::PluginSet;
    use pretty_assertions::assert_eq;
    use scribe_model::{Mark, NodeKind, Schema};
    use std::rc::Rc;

    fn state(src: &str) -> EditorState {
        let engine = MarkdownEngine::default();
        EditorState::create(engine.parse(src), Schema::markdown(), Rc::new(PluginSet::new()), false)
    }

    fn insert(src: &str, start: usize, end: usize, text: &str) -> (Node, usize) {
        let s = state(src);
        let out = insert_between(&s, &MarkdownEngine::default(), start, end, text).unwrap();
        let next = s.apply(&out.tr).unwrap();
        assert!(next.doc().check().is_ok());
        (next.doc().clone(), out.cursor)
    }

    fn p(s: &str) -> Node {
        Node::paragraph(if s.is_empty() { vec![] } else { vec![Node::text(s, vec![])] })
    }

    // -- Plain text ---------------------------------------------------------

    #[test]
    fn plain_text_into_empty_document() {
        let (doc, cursor) = insert("", 0, 0, "hello");
        assert_eq!(doc, Node::doc(vec![p("hello")]));
        assert_eq!(cursor, 5);
    }

    #[test]
    fn surrounding_whitespace_is_kept() {
        let (doc, cursor) = insert("ab", 1, 1, " x ");
        assert_eq!(doc.text_content(), "a x b");
        assert_eq!(cursor, 4);
    }

    #[test]
    fn reversed_bounds_replace_the_range() {
        let (doc, cursor) = insert("abcd", 3, 1, "X");
        assert_eq!(doc.text_content(), "aXd");
        assert_eq!(cursor, 2);
    }

    #[test]
    fn empty_text_deletes() {
        let (doc, cursor) = insert("abcd", 1, 3, "");
        assert_eq!(doc.text_content(), "ad");
        assert_eq!(cursor, 1);
    }

    #[test]
    fn replacing_across_blocks_joins_them() {
        let (doc, cursor) = insert("ab\n\ncd", 1, 4, "X");
        assert_eq!(doc, Node::doc(vec![p("aXd")]));
        assert_eq!(cursor, 2);
    }

    // -- Markup -------------------------------------------------------------

    #[test]
    fn inline_markup_becomes_marks() {
        let (doc, cursor) = insert("ab", 1, 1, "**x**");
        let para = doc.child(0);
        assert_eq!(para.text_content(), "axb");
        assert_eq!(para.child(1).marks(), &[Mark::Strong]);
        assert_eq!(cursor, 2);
    }

    #[test]
    fn paragraphs_join_both_sides() {
        let (doc, cursor) = insert("abcd", 2, 2, "x\n\ny");
        assert_eq!(doc, Node::doc(vec![p("abx"), p("ycd")]));
        assert_eq!(cursor, 5);
    }

    #[test]
    fn heading_absorbs_empty_paragraph() {
        let (doc, cursor) = insert("", 0, 0, "# Title");
        assert_eq!(doc.child_count(), 1);
        assert_eq!(doc.child(0).kind(), &NodeKind::Heading { level: 1 });
        assert_eq!(cursor, 5);
    }

    #[test]
    fn rule_splits_paragraph() {
        let (doc, cursor) = insert("abcd", 2, 2, "---");
        assert_eq!(doc, Node::doc(vec![p("ab"), Node::leaf(NodeKind::HorizontalRule), p("cd")]));
        assert_eq!(cursor, 3);
    }

    #[test]
    fn list_item_keeps_leading_paragraph() {
        let (doc, _) = insert("* ab", 0, 0, "# H");
        let item = doc.child(0).child(0);
        assert_eq!(item.child(0), &p(""));
        assert_eq!(item.child(1).node_type(), NodeType::Heading);
        assert_eq!(doc.text_content(), "Hab");
    }

    #[test]
    fn code_blocks_take_text_literally() {
        let (doc, cursor) = insert("```\nab\n```", 1, 1, "# x");
        assert_eq!(doc.child(0).node_type(), NodeType::CodeBlock);
        assert_eq!(doc.text_content(), "a# xb");
        assert_eq!(cursor, 4);
    }

    #[test]
    fn indented_text_at_block_start_is_code() {
        let (doc, cursor) = insert("", 0, 0, "    code");
        assert_eq!(doc, MarkdownEngine::default().parse("    code"));
        assert_eq!(doc.child(0).node_type(), NodeType::CodeBlock);
        assert_eq!(cursor, 4);
    }

    #[test]
    fn padded_markup_into_empty_document_matches_parse() {
        let (doc, _) = insert("", 0, 0, " **b** ");
        assert_eq!(doc, MarkdownEngine::default().parse(" **b** "));
        assert_eq!(doc, Node::doc(vec![Node::paragraph(vec![Node::text("b", vec![Mark::Strong])])]));
    }

    #[test]
    fn padded_markup_mid_paragraph_keeps_spaces() {
        let (doc, cursor) = insert("ab", 1, 1, " **x** ");
        let para = doc.child(0);
        assert_eq!(para.text_content(), "a x b");
        assert_eq!(para.child(1).marks(), &[Mark::Strong]);
        assert_eq!(cursor, 4);
    }

    #[test]
    fn indentation_inside_text_stays_text() {
        let (doc, _) = insert("ab", 1, 1, "    code");
        assert_eq!(doc, Node::doc(vec![p("a    codeb")]));
    }

    // -- Errors -------------------------------------------------------------

    #[test]
    fn out_of_range_offset_is_rejected() {
        let s = state("abcd");
        let err = insert_between(&s, &MarkdownEngine::default(), 0, 9, "x").unwrap_err();
        assert_eq!(err, EditorError::OutOfRange { offset: 9, len: 4 });
    }
}
