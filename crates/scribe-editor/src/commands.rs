//! Editing commands.
//!
//! A command looks at an [`EditorState`] and either declines
//! ([`Outcome::Pass`]) or produces a transaction. Keymaps chain commands:
//! the first one that does not pass wins. Commands never mutate anything
//! themselves, so trying one is free.
//!
//! The structural helpers taking a `&mut Transaction` (`delete_range`,
//! `wrap_range`, `set_block_type`, list lifting and sinking) are shared with
//! the input rules, which first delete the typed trigger and then reshape
//! the block.
//!
//! # Positions
//!
//! Structural edits here rebuild the smallest enclosing node and replace it
//! wholesale. A replace maps positions inside the replaced range to its
//! edge, so these helpers compute the new selection themselves instead of
//! relying on step mapping.

use std::rc::Rc;

use scribe_model::node::{has_mark_type, remove_mark_type};
use scribe_model::{Fragment, Mark, Node, NodeKind, NodeType, Slice};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::Result;
use crate::state::{EditorState, Selection, Transaction, textblock_ranges};

// ---------------------------------------------------------------------------
// Command plumbing
// ---------------------------------------------------------------------------

/// What a command decided.
#[derive(Debug)]
pub enum Outcome {
    /// Not applicable; let the next command try.
    Pass,
    /// Consumed without changing state.
    Handled,
    /// Dispatch this transaction.
    Apply(Transaction),
    /// Hand the current content to the host's submit callback.
    Submit,
}

impl Outcome {
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// A bindable command.
pub type Command = Rc<dyn Fn(&EditorState) -> Outcome>;

/// Wrap a function as a [`Command`].
pub fn command(f: impl Fn(&EditorState) -> Outcome + 'static) -> Command {
    Rc::new(f)
}

/// Try `commands` in order; the first that does not pass wins.
pub fn chain(commands: &[fn(&EditorState) -> Outcome], state: &EditorState) -> Outcome {
    commands
        .iter()
        .map(|cmd| cmd(state))
        .find(|outcome| !outcome.is_pass())
        .unwrap_or(Outcome::Pass)
}

/// Build a transaction with `f`; `Ok(false)` and errors both pass.
fn run(
    state: &EditorState,
    name: &'static str,
    f: impl FnOnce(&mut Transaction) -> Result<bool>,
) -> Outcome {
    let mut tr = state.tr();
    match f(&mut tr) {
        Ok(true) => Outcome::Apply(tr),
        Ok(false) => Outcome::Pass,
        Err(err) => {
            tracing::debug!(command = name, %err, "command not applicable");
            Outcome::Pass
        }
    }
}

// ---------------------------------------------------------------------------
// Enter
// ---------------------------------------------------------------------------

/// `Enter`: newline in code, split the list item, or split the block.
#[must_use]
pub fn enter(state: &EditorState) -> Outcome {
    chain(&[newline_in_code, split_list_item, split_block], state)
}

/// Insert a literal newline inside a code block.
#[must_use]
pub fn newline_in_code(state: &EditorState) -> Outcome {
    run(state, "newline_in_code", |tr| {
        let sel = tr.selection();
        if !tr.doc().resolve(sel.from())?.parent().node_type().is_code() {
            return Ok(false);
        }
        tr.insert_text("\n", sel.from(), sel.to(), Some(Vec::new()))?;
        tr.scroll_into_view();
        Ok(true)
    })
}

/// Split the textblock at the cursor. Splitting at the end of a heading
/// starts a paragraph.
#[must_use]
pub fn split_block(state: &EditorState) -> Outcome {
    run(state, "split_block", |tr| {
        let sel = tr.selection();
        {
            let parent = tr.doc().resolve(sel.from())?.parent();
            if !parent.is_textblock() || parent.node_type().is_code() {
                return Ok(false);
            }
        }
        delete_range(tr, sel.from(), sel.to())?;
        let pos = tr.selection().from();
        let slice = {
            let r = tr.doc().resolve(pos)?;
            let parent = r.parent();
            if !parent.is_textblock() {
                return Ok(false);
            }
            let first = parent.copy(Fragment::empty());
            let second = if r.parent_offset() == parent.content_size() {
                Node::paragraph(Vec::new())
            } else {
                first.clone()
            };
            Slice::new(Fragment::from_vec(vec![first, second]), 1, 1)
        };
        tr.replace(pos, pos, slice)?;
        tr.set_selection(Selection::cursor(pos + 2)).scroll_into_view();
        Ok(true)
    })
}

/// Split the list item at the cursor. In an empty item, leave the list
/// instead.
#[must_use]
pub fn split_list_item(state: &EditorState) -> Outcome {
    run(state, "split_list_item", |tr| {
        let sel = tr.selection();
        let (from, to) = (sel.from(), sel.to());
        let (empty_item, slice) = {
            let r = tr.doc().resolve(from)?;
            let d = r.depth();
            if d < 2 || r.node(d - 1).node_type() != NodeType::ListItem {
                return Ok(false);
            }
            let parent = r.parent();
            if !parent.is_textblock() || parent.node_type().is_code() || to > r.end(d) {
                return Ok(false);
            }
            let item = r.node(d - 1);
            let empty_item =
                parent.content_size() == 0 && from == to && item.child_count() == 1;
            let first = parent.copy(Fragment::empty());
            let second = if r.parent_offset() == parent.content_size() {
                Node::paragraph(Vec::new())
            } else {
                first.clone()
            };
            let items = vec![
                item.copy(Fragment::from_node(first)),
                item.copy(Fragment::from_node(second)),
            ];
            (empty_item, Slice::new(Fragment::from_vec(items), 2, 2))
        };
        if empty_item {
            return lift_list_item_at(tr, from);
        }
        delete_range(tr, from, to)?;
        tr.replace(from, from, slice)?;
        tr.set_selection(Selection::cursor(from + 4)).scroll_into_view();
        Ok(true)
    })
}

// ---------------------------------------------------------------------------
// Deletion
// ---------------------------------------------------------------------------

/// `Backspace`: delete the selection, the previous grapheme, or join with
/// the block before.
#[must_use]
pub fn backspace(state: &EditorState) -> Outcome {
    chain(&[delete_selection, delete_char_backward, join_backward], state)
}

/// `Delete`: delete the selection, the next grapheme, or join with the
/// block after.
#[must_use]
pub fn delete(state: &EditorState) -> Outcome {
    chain(&[delete_selection, delete_char_forward, join_forward], state)
}

#[must_use]
pub fn delete_selection(state: &EditorState) -> Outcome {
    run(state, "delete_selection", |tr| {
        let sel = tr.selection();
        if sel.is_empty() {
            return Ok(false);
        }
        delete_range(tr, sel.from(), sel.to())?;
        tr.set_selection(Selection::cursor(sel.from())).scroll_into_view();
        Ok(true)
    })
}

/// Delete the grapheme cluster before the cursor.
#[must_use]
pub fn delete_char_backward(state: &EditorState) -> Outcome {
    run(state, "delete_char_backward", |tr| {
        let pos = tr.selection().head();
        let len = {
            let r = tr.doc().resolve(pos)?;
            if !r.parent().is_textblock() || r.parent_offset() == 0 {
                return Ok(false);
            }
            let before = inline_text(r.parent(), 0, r.parent_offset());
            before
                .graphemes(true)
                .next_back()
                .map_or(1, |g| g.chars().count())
        };
        tr.delete(pos - len, pos)?;
        tr.scroll_into_view();
        Ok(true)
    })
}

/// Delete the grapheme cluster after the cursor.
#[must_use]
pub fn delete_char_forward(state: &EditorState) -> Outcome {
    run(state, "delete_char_forward", |tr| {
        let pos = tr.selection().head();
        let len = {
            let r = tr.doc().resolve(pos)?;
            let parent = r.parent();
            if !parent.is_textblock() || r.parent_offset() == parent.content_size() {
                return Ok(false);
            }
            let after = inline_text(parent, r.parent_offset(), parent.content_size());
            after.graphemes(true).next().map_or(1, |g| g.chars().count())
        };
        tr.delete(pos, pos + len)?;
        tr.scroll_into_view();
        Ok(true)
    })
}

/// At the start of a textblock: join it onto the end of the textblock
/// before, delete a rule before it, or lift it out of its quote or list
/// item when it comes first there.
#[must_use]
pub fn join_backward(state: &EditorState) -> Outcome {
    run(state, "join_backward", |tr| {
        let sel = tr.selection();
        if !sel.is_empty() {
            return Ok(false);
        }
        let pos = sel.from();
        let doc = tr.doc().clone();
        let r = doc.resolve(pos)?;
        let d = r.depth();
        if d == 0 || !r.parent().is_textblock() || r.parent_offset() != 0 {
            return Ok(false);
        }
        let index = r.index(d - 1);
        if index == 0 {
            if d < 2 {
                return Ok(false);
            }
            return match r.node(d - 1).node_type() {
                NodeType::ListItem => lift_list_item_at(tr, pos),
                NodeType::Blockquote => lift_out_of_quote(tr, pos),
                _ => Ok(false),
            };
        }
        let prev = r.node(d - 1).child(index - 1);
        let before = r.before(d);
        let prev_start = before - prev.node_size();
        if prev.is_leaf() {
            tr.delete(prev_start, before)?;
            return Ok(true);
        }
        let Some(target_end) = last_textblock_end(prev, prev_start) else {
            return Ok(false);
        };
        let target_is_code = doc.resolve(target_end)?.parent().node_type().is_code();
        let moved = movable_content(r.parent(), target_is_code);
        tr.delete(before, r.after(d))?;
        if moved.size() > 0 {
            tr.insert(target_end, moved)?;
        }
        tr.set_selection(Selection::cursor(target_end)).scroll_into_view();
        Ok(true)
    })
}

/// At the end of a textblock: pull the next textblock's content in, or
/// delete a rule after it.
#[must_use]
pub fn join_forward(state: &EditorState) -> Outcome {
    run(state, "join_forward", |tr| {
        let sel = tr.selection();
        if !sel.is_empty() {
            return Ok(false);
        }
        let pos = sel.from();
        let doc = tr.doc().clone();
        let r = doc.resolve(pos)?;
        let d = r.depth();
        let parent = r.parent();
        if d == 0 || !parent.is_textblock() || r.parent_offset() != parent.content_size() {
            return Ok(false);
        }
        let Some(next) = r.node(d - 1).maybe_child(r.index(d - 1) + 1) else {
            return Ok(false);
        };
        let next_start = r.after(d);
        if next.is_leaf() {
            tr.delete(next_start, next_start + 1)?;
            return Ok(true);
        }
        let source_pos = if next.is_textblock() {
            next_start + 1
        } else {
            match textblock_ranges(next).first() {
                Some(&(start, _)) => next_start + 1 + start,
                None => return Ok(false),
            }
        };
        let rs = doc.resolve(source_pos)?;
        let moved = movable_content(rs.parent(), parent.node_type().is_code());
        // Deleting the source may empty its wrappers; take those along.
        let mut depth = rs.depth();
        while depth > d && rs.node(depth - 1).child_count() == 1 {
            depth -= 1;
        }
        tr.delete(rs.before(depth), rs.after(depth))?;
        if moved.size() > 0 {
            tr.insert(pos, moved)?;
        }
        tr.set_selection(Selection::cursor(pos)).scroll_into_view();
        Ok(true)
    })
}

/// Delete `from..to`. When the range crosses blocks of different depth and
/// cannot be joined, the text at both ends and the whole blocks between
/// them are removed and the block structure at the ends is kept.
///
/// # Errors
///
/// Fails if the positions are out of range.
pub fn delete_range(tr: &mut Transaction, from: usize, to: usize) -> Result<()> {
    if from >= to {
        return Ok(());
    }
    if tr.delete(from, to).is_ok() {
        return Ok(());
    }
    let doc = tr.doc().clone();
    let rf = doc.resolve(from)?;
    let rt = doc.resolve(to)?;
    let from_end = if rf.parent().is_textblock() { rf.end(rf.depth()) } else { from };
    let to_start = if rt.parent().is_textblock() { rt.start(rt.depth()) } else { to };
    let shared = rf.shared_depth(to);
    tracing::debug!(from, to, shared, "deleting range piecewise");
    if to_start < to {
        tr.delete(to_start, to)?;
    }
    if rf.depth() > shared && rt.depth() > shared {
        let (a, b) = (rf.after(shared + 1), rt.before(shared + 1));
        if a < b {
            tr.delete(a, b)?;
        }
    }
    if from < from_end {
        tr.delete(from, from_end)?;
    }
    Ok(())
}

/// Select the text of the whole document.
#[must_use]
pub fn select_all(state: &EditorState) -> Outcome {
    let ranges = textblock_ranges(state.doc());
    let (Some(first), Some(last)) = (ranges.first(), ranges.last()) else {
        return Outcome::Pass;
    };
    let mut tr = state.tr();
    tr.set_selection(Selection::new(first.0, last.1));
    Outcome::Apply(tr)
}

// ---------------------------------------------------------------------------
// Marks
// ---------------------------------------------------------------------------

/// Toggle `mark` on the selection. With an empty selection the mark is
/// toggled in the stored marks for the next typed text.
#[must_use]
pub fn toggle_mark(mark: Mark) -> Command {
    command(move |state| {
        if !state.schema().allows_mark(mark.mark_type()) {
            return Outcome::Pass;
        }
        run(state, "toggle_mark", |tr| toggle_mark_in(tr, &mark))
    })
}

fn toggle_mark_in(tr: &mut Transaction, mark: &Mark) -> Result<bool> {
    let sel = tr.selection();
    let ty = mark.mark_type();
    if sel.is_empty() {
        let current = {
            let r = tr.doc().resolve(sel.from())?;
            if !r.parent().is_textblock() || r.parent().node_type().is_code() {
                return Ok(false);
            }
            tr.stored_marks().map_or_else(|| r.marks(), <[Mark]>::to_vec)
        };
        let next = if has_mark_type(&current, ty) {
            remove_mark_type(&current, ty)
        } else {
            mark.add_to_set(&current)
        };
        tr.set_stored_marks(Some(next));
        return Ok(true);
    }

    let doc = tr.doc().clone();
    let mut pieces = Vec::new();
    for (start, end) in textblock_ranges(&doc) {
        let (a, b) = (start.max(sel.from()), end.min(sel.to()));
        if a >= b {
            continue;
        }
        let block = doc.resolve(start)?.parent();
        if block.node_type().is_code() {
            continue;
        }
        pieces.push((a, b, block.content().cut(a - start, b - start)));
    }
    if pieces.is_empty() {
        return Ok(false);
    }
    let remove = pieces
        .iter()
        .all(|(_, _, frag)| frag.iter().all(|n| has_mark_type(n.marks(), ty)));
    for (a, b, frag) in pieces.into_iter().rev() {
        let nodes: Vec<Node> = frag
            .iter()
            .map(|n| {
                let marks = if remove {
                    remove_mark_type(n.marks(), ty)
                } else {
                    mark.add_to_set(n.marks())
                };
                n.clone().with_marks(marks)
            })
            .collect();
        tr.replace(a, b, Slice::closed(Fragment::from_vec(nodes)))?;
    }
    tr.set_selection(sel);
    Ok(true)
}

// ---------------------------------------------------------------------------
// Block types
// ---------------------------------------------------------------------------

/// Turn the textblocks in the selection into `kind`.
#[must_use]
pub fn set_block(kind: NodeKind) -> Command {
    command(move |state| {
        if !state.schema().allows_node(kind.node_type()) {
            return Outcome::Pass;
        }
        run(state, "set_block", |tr| {
            let sel = tr.selection();
            set_block_type(tr, sel.from(), sel.to(), &kind)
        })
    })
}

/// Change every textblock touching `from..=to` into `kind`, keeping the
/// selection at the same place in the text.
///
/// # Errors
///
/// Fails when the new type is not allowed where a block sits, e.g. a
/// heading as the first child of a list item.
pub fn set_block_type(tr: &mut Transaction, from: usize, to: usize, kind: &NodeKind) -> Result<bool> {
    let doc = tr.doc().clone();
    let mut targets = Vec::new();
    for (start, end) in textblock_ranges(&doc) {
        if end < from || start > to {
            continue;
        }
        let block = doc.resolve(start)?.parent();
        if block.kind() == kind {
            continue;
        }
        targets.push((start - 1, block.clone(), retyped(block, kind)));
    }
    if targets.is_empty() {
        return Ok(false);
    }
    let sel = tr.selection();
    for (before, old, new) in targets.iter().rev() {
        tr.replace(
            *before,
            before + old.node_size(),
            Slice::closed(Fragment::from_node(new.clone())),
        )?;
    }
    let relocate = |p: usize| {
        let (mut added, mut removed) = (0, 0);
        for (before, old, new) in &targets {
            let start = before + 1;
            if p < start {
                break;
            }
            if p <= start + old.content_size() {
                return start + added - removed + (p - start).min(new.content_size());
            }
            added += new.node_size();
            removed += old.node_size();
        }
        p + added - removed
    };
    tr.set_selection(Selection::new(relocate(sel.anchor()), relocate(sel.head())));
    Ok(true)
}

/// `block` with a new type. Code blocks only hold plain text.
fn retyped(block: &Node, kind: &NodeKind) -> Node {
    if kind.node_type().is_code() {
        return Node::new(kind.clone(), movable_content(block, true));
    }
    Node::new(kind.clone(), block.content().clone())
}

// ---------------------------------------------------------------------------
// Wrapping
// ---------------------------------------------------------------------------

/// A container blocks can be wrapped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrapper {
    Blockquote,
    BulletList,
    /// An ordered list starting at the given number.
    OrderedList(u32),
}

/// Wrap the blocks in the selection.
#[must_use]
pub fn wrap_in(wrapper: Wrapper) -> Command {
    command(move |state| {
        run(state, "wrap_in", |tr| {
            let sel = tr.selection();
            wrap_range(tr, sel.from(), sel.to(), wrapper)
        })
    })
}

/// Wrap the sibling blocks spanning `from..to` in `wrapper`. Lists wrap
/// each block in its own item and join a directly preceding list of the
/// same kind.
///
/// # Errors
///
/// Fails when the wrapper is not allowed where the blocks sit.
pub fn wrap_range(tr: &mut Transaction, from: usize, to: usize, wrapper: Wrapper) -> Result<bool> {
    let doc = tr.doc().clone();
    let rf = doc.resolve(from)?;
    let rt = doc.resolve(to)?;
    let mut d = rf.shared_depth(to);
    if rf.node(d).is_textblock() {
        if d == 0 {
            return Ok(false);
        }
        d -= 1;
    }
    if rf.depth() <= d || rt.depth() <= d {
        return Ok(false);
    }
    let container = rf.node(d);
    let (first, last) = (rf.index(d), rt.index(d));
    let children = &container.content().as_slice()[first..=last];
    let range_start = rf.before(d + 1);
    let range_end = rt.after(d + 1);

    // Old and new start of each wrapped child, for relocating the selection.
    let mut moves = Vec::with_capacity(children.len());
    let mut old = range_start;
    let (replace_from, wrapped, mut new) = match wrapper {
        Wrapper::Blockquote => {
            let quote = Node::new(NodeKind::Blockquote, Fragment::from_vec(children.to_vec()));
            (range_start, quote, range_start + 1)
        }
        Wrapper::BulletList | Wrapper::OrderedList(_) => {
            if !children.iter().all(|c| c.node_type() == NodeType::Paragraph) {
                return Ok(false);
            }
            let items: Vec<Node> = children
                .iter()
                .map(|c| Node::new(NodeKind::ListItem, Fragment::from_node(c.clone())))
                .collect();
            let prev = first.checked_sub(1).map(|i| container.child(i));
            match prev.filter(|p| joins_list(p, wrapper)) {
                Some(prev) => {
                    let prev_start = range_start - prev.node_size();
                    let mut all: Vec<Node> = prev.content().iter().cloned().collect();
                    all.extend(items);
                    let merged = prev.copy(Fragment::from_vec(all));
                    (prev_start, merged, prev_start + 1 + prev.content_size() + 1)
                }
                None => {
                    let kind = match wrapper {
                        Wrapper::OrderedList(order) => NodeKind::OrderedList { order, tight: true },
                        _ => NodeKind::BulletList { tight: true },
                    };
                    let list = Node::new(kind, Fragment::from_vec(items));
                    (range_start, list, range_start + 2)
                }
            }
        }
    };
    let item_gap = usize::from(wrapper != Wrapper::Blockquote) * 2;
    for child in children {
        moves.push((old, new, child.node_size()));
        old += child.node_size();
        new += child.node_size() + item_gap;
    }

    let sel = tr.selection();
    tr.replace(replace_from, range_end, Slice::closed(Fragment::from_node(wrapped)))?;
    let relocate = |p: usize| {
        moves
            .iter()
            .find(|(old, _, size)| *old <= p && p <= old + size)
            .map_or(p, |(old, new, _)| new + (p - old))
    };
    tr.set_selection(Selection::new(relocate(sel.anchor()), relocate(sel.head())));
    Ok(true)
}

fn joins_list(prev: &Node, wrapper: Wrapper) -> bool {
    match (prev.kind(), wrapper) {
        (NodeKind::BulletList { .. }, Wrapper::BulletList) => true,
        (NodeKind::OrderedList { order, .. }, Wrapper::OrderedList(n)) => {
            u32::try_from(prev.child_count()).is_ok_and(|count| order.saturating_add(count) == n)
        }
        _ => false,
    }
}

/// Move the first block of a blockquote out in front of it.
fn lift_out_of_quote(tr: &mut Transaction, pos: usize) -> Result<bool> {
    let doc = tr.doc().clone();
    let r = doc.resolve(pos)?;
    let d = r.depth();
    let quote = r.node(d - 1);
    let rel = pos - r.before(d);
    let mut out = vec![r.parent().clone()];
    let rest: Vec<Node> = quote.content().iter().skip(1).cloned().collect();
    if !rest.is_empty() {
        out.push(quote.copy(Fragment::from_vec(rest)));
    }
    let quote_start = r.before(d - 1);
    tr.replace(quote_start, r.after(d - 1), Slice::closed(Fragment::from_vec(out)))?;
    tr.set_selection(Selection::cursor(quote_start + rel));
    Ok(true)
}

// ---------------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------------

/// Indent the list item at the cursor into the item before it.
#[must_use]
pub fn sink_list_item(state: &EditorState) -> Outcome {
    run(state, "sink_list_item", |tr| {
        let pos = tr.selection().head();
        sink_list_item_at(tr, pos)
    })
}

/// Outdent the list item at the cursor, or move it out of the list.
#[must_use]
pub fn lift_list_item(state: &EditorState) -> Outcome {
    run(state, "lift_list_item", |tr| {
        let pos = tr.selection().head();
        lift_list_item_at(tr, pos)
    })
}

/// Depth of the innermost list item around `pos`.
fn item_depth(r: &scribe_model::ResolvedPos<'_>) -> Option<usize> {
    (1..=r.depth())
        .rev()
        .find(|&d| r.node(d).node_type() == NodeType::ListItem)
}

/// Make the item at `pos` the last child of a list nested in the previous
/// item.
///
/// # Errors
///
/// Fails if `pos` is out of range.
pub fn sink_list_item_at(tr: &mut Transaction, pos: usize) -> Result<bool> {
    let doc = tr.doc().clone();
    let r = doc.resolve(pos)?;
    let Some(di) = item_depth(&r) else {
        return Ok(false);
    };
    let index = r.index(di - 1);
    if index == 0 {
        return Ok(false);
    }
    let item = r.node(di);
    let list = r.node(di - 1);
    let prev = list.child(index - 1);
    let rel = pos - r.start(di);

    let mut prev_children: Vec<Node> = prev.content().iter().cloned().collect();
    let nested_same = prev
        .content()
        .last_child()
        .filter(|last| last.node_type() == list.node_type());
    // offset of the moved item's content from the start of the new prev item
    let item_offset = match nested_same {
        Some(nested) => {
            let mut items: Vec<Node> = nested.content().iter().cloned().collect();
            items.push(item.clone());
            let offset = 1 + prev.content_size() - nested.node_size() + 1 + nested.content_size() + 1;
            if let Some(last) = prev_children.last_mut() {
                *last = nested.copy(Fragment::from_vec(items));
            }
            offset
        }
        None => {
            let kind = match list.kind() {
                NodeKind::OrderedList { tight, .. } => NodeKind::OrderedList {
                    order: 1,
                    tight: *tight,
                },
                other => other.clone(),
            };
            prev_children.push(Node::new(kind, Fragment::from_node(item.clone())));
            1 + prev.content_size() + 1 + 1
        }
    };
    let new_prev = prev.copy(Fragment::from_vec(prev_children));
    let mut children: Vec<Node> = list.content().iter().cloned().collect();
    children[index - 1] = new_prev;
    children.remove(index);
    let list_start = r.before(di - 1);
    let prefix: usize = list.content().iter().take(index - 1).map(Node::node_size).sum();
    tr.replace(
        list_start,
        r.after(di - 1),
        Slice::closed(Fragment::from_node(list.copy(Fragment::from_vec(children)))),
    )?;
    tr.set_selection(Selection::cursor(list_start + 1 + prefix + item_offset + rel));
    Ok(true)
}

/// Outdent the item at `pos` into the enclosing list, or, at the top level,
/// split the list around it and unwrap its blocks.
///
/// # Errors
///
/// Fails if `pos` is out of range or the result is invalid where the list
/// sits.
pub fn lift_list_item_at(tr: &mut Transaction, pos: usize) -> Result<bool> {
    let doc = tr.doc().clone();
    let r = doc.resolve(pos)?;
    let Some(di) = item_depth(&r) else {
        return Ok(false);
    };
    let item = r.node(di);
    let list = r.node(di - 1);
    let index = r.index(di - 1);
    let rel = pos - r.start(di);
    let head: Vec<Node> = list.content().iter().take(index).cloned().collect();
    let tail: Vec<Node> = list.content().iter().skip(index + 1).cloned().collect();

    if di >= 3 && r.node(di - 2).node_type() == NodeType::ListItem {
        let parent_item = r.node(di - 2);
        let outer = r.node(di - 3);
        let parent_index = r.index(di - 3);
        let list_index = r.index(di - 2);

        let mut lifted: Vec<Node> = item.content().iter().cloned().collect();
        if !tail.is_empty() {
            lifted.push(list.copy(Fragment::from_vec(tail)));
        }
        let lifted = item.copy(Fragment::from_vec(lifted));

        let mut parent_children: Vec<Node> = parent_item.content().iter().cloned().collect();
        if head.is_empty() {
            parent_children.remove(list_index);
        } else {
            parent_children[list_index] = list.copy(Fragment::from_vec(head));
        }
        let new_parent = parent_item.copy(Fragment::from_vec(parent_children));
        let new_parent_size = new_parent.node_size();

        let mut outer_children: Vec<Node> = outer.content().iter().cloned().collect();
        outer_children[parent_index] = new_parent;
        outer_children.insert(parent_index + 1, lifted);
        let outer_start = r.before(di - 3);
        let prefix: usize = outer.content().iter().take(parent_index).map(Node::node_size).sum();
        tr.replace(
            outer_start,
            r.after(di - 3),
            Slice::closed(Fragment::from_node(outer.copy(Fragment::from_vec(outer_children)))),
        )?;
        tr.set_selection(Selection::cursor(outer_start + 1 + prefix + new_parent_size + 1 + rel));
        return Ok(true);
    }

    let list_start = r.before(di - 1);
    let mut out = Vec::new();
    let mut lead = 0;
    if !head.is_empty() {
        let head_list = list.copy(Fragment::from_vec(head));
        lead = head_list.node_size();
        out.push(head_list);
    }
    out.extend(item.content().iter().cloned());
    if !tail.is_empty() {
        let kind = match list.kind() {
            NodeKind::OrderedList { order, tight } => NodeKind::OrderedList {
                order: order.saturating_add(u32::try_from(index + 1).unwrap_or(u32::MAX)),
                tight: *tight,
            },
            other => other.clone(),
        };
        out.push(Node::new(kind, Fragment::from_vec(tail)));
    }
    tr.replace(list_start, r.after(di - 1), Slice::closed(Fragment::from_vec(out)))?;
    tr.set_selection(Selection::cursor(list_start + lead + rel));
    Ok(true)
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Split the textblock at the cursor and put a horizontal rule in between.
/// The cursor lands at the start of the text after the rule, in a fresh
/// paragraph when there is none.
#[must_use]
pub fn insert_horizontal_rule(state: &EditorState) -> Outcome {
    if !state.schema().allows_node(NodeType::HorizontalRule) {
        return Outcome::Pass;
    }
    run(state, "insert_horizontal_rule", |tr| {
        let sel = tr.selection();
        delete_range(tr, sel.from(), sel.to())?;
        let doc = tr.doc().clone();
        let r = doc.resolve(sel.from())?;
        let d = r.depth();
        let block = r.parent();
        if d == 0 || !block.is_textblock() || block.node_type().is_code() {
            return Ok(false);
        }
        let offset = r.parent_offset();
        let rest = block.content().cut(offset, block.content_size());
        let mut nodes = Vec::with_capacity(3);
        if offset > 0 {
            nodes.push(block.copy(block.content().cut(0, offset)));
        }
        nodes.push(Node::leaf(NodeKind::HorizontalRule));
        nodes.push(if offset > 0 && rest.size() == 0 {
            Node::paragraph(Vec::new())
        } else {
            block.copy(rest)
        });
        let before = r.before(d);
        tr.replace(before, r.after(d), Slice::closed(Fragment::from_vec(nodes)))?;
        let head = if offset > 0 { offset + 2 } else { 0 };
        tr.set_selection(Selection::cursor(before + head + 2)).scroll_into_view();
        Ok(true)
    })
}

// ---------------------------------------------------------------------------
// Joining and selecting
// ---------------------------------------------------------------------------

/// `Alt-ArrowUp`: join the innermost block around the selection with the
/// block of the same type right before it.
#[must_use]
pub fn join_up(state: &EditorState) -> Outcome {
    run(state, "join_up", |tr| {
        let from = tr.selection().from();
        match join_point(tr.doc(), from, true)? {
            Some(point) => join_at(tr, point),
            None => Ok(false),
        }
    })
}

/// `Alt-ArrowDown`: join the innermost block around the selection with the
/// block of the same type right after it.
#[must_use]
pub fn join_down(state: &EditorState) -> Outcome {
    run(state, "join_down", |tr| {
        let to = tr.selection().to();
        match join_point(tr.doc(), to, false)? {
            Some(point) => join_at(tr, point),
            None => Ok(false),
        }
    })
}

/// Containers join; textblocks and leaves do not.
fn joinable(a: &Node, b: &Node) -> bool {
    !a.is_leaf() && !a.is_textblock() && a.node_type() == b.node_type()
}

/// The boundary between the innermost ancestor of `pos` and a joinable
/// sibling above (`up`) or below it.
fn join_point(doc: &Node, pos: usize, up: bool) -> Result<Option<usize>> {
    let r = doc.resolve(pos)?;
    for d in (1..=r.depth()).rev() {
        let parent = r.node(d - 1);
        let index = r.index(d - 1);
        let node = r.node(d);
        let (before, after, point) = if up {
            let before = index.checked_sub(1).and_then(|i| parent.maybe_child(i));
            (before, Some(node), r.before(d))
        } else {
            (Some(node), parent.maybe_child(index + 1), r.after(d))
        };
        if let (Some(before), Some(after)) = (before, after) {
            if joinable(before, after) {
                return Ok(Some(point));
            }
        }
    }
    Ok(None)
}

/// Merge the two nodes meeting at `point` into the first one.
fn join_at(tr: &mut Transaction, point: usize) -> Result<bool> {
    let doc = tr.doc().clone();
    let r = doc.resolve(point)?;
    let parent = r.parent();
    let index = r.index(r.depth());
    let before = index.checked_sub(1).and_then(|i| parent.maybe_child(i));
    let (Some(before), Some(after)) = (before, parent.maybe_child(index)) else {
        return Ok(false);
    };
    let mut content: Vec<Node> = before.content().iter().cloned().collect();
    content.extend(after.content().iter().cloned());
    let joined = before.copy(Fragment::from_vec(content));
    let sel = tr.selection();
    tr.replace(
        point - before.node_size(),
        point + after.node_size(),
        Slice::closed(Fragment::from_node(joined)),
    )?;
    // the closing and opening tokens at the seam are gone
    let relocate = |p: usize| if p > point { p - 2 } else { p };
    tr.set_selection(Selection::new(relocate(sel.anchor()), relocate(sel.head())))
        .scroll_into_view();
    Ok(true)
}

/// `Escape`: widen the selection to the text of the innermost block around
/// it that it does not already cover.
#[must_use]
pub fn select_parent_node(state: &EditorState) -> Outcome {
    let sel = state.selection();
    let Ok(r) = state.doc().resolve(sel.from()) else {
        return Outcome::Pass;
    };
    for d in (1..=r.shared_depth(sel.to())).rev() {
        let node = r.node(d);
        let start = r.start(d);
        let span = if node.is_textblock() {
            Some((start, r.end(d)))
        } else {
            let ranges = textblock_ranges(node);
            ranges
                .first()
                .zip(ranges.last())
                .map(|(first, last)| (start + first.0, start + last.1))
        };
        if let Some((from, to)) = span.filter(|&span| span != (sel.from(), sel.to())) {
            let mut tr = state.tr();
            tr.set_selection(Selection::new(from, to));
            return Outcome::Apply(tr);
        }
    }
    Outcome::Pass
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Text of a textblock's content between two content offsets, one char per
/// position.
fn inline_text(block: &Node, from: usize, to: usize) -> String {
    block.text_between(from, to, "", Some("\u{fffc}"))
}

/// End of the content of the last textblock inside `node`, which starts at
/// `start`.
fn last_textblock_end(node: &Node, start: usize) -> Option<usize> {
    if node.is_textblock() {
        return Some(start + 1 + node.content_size());
    }
    textblock_ranges(node).last().map(|&(_, end)| start + 1 + end)
}

/// A textblock's inline content, flattened to plain text when it is going
/// into a code block.
fn movable_content(block: &Node, into_code: bool) -> Fragment {
    if !into_code {
        return block.content().clone();
    }
    let text = inline_text(block, 0, block.content_size()).replace('\u{fffc}', "");
    if text.is_empty() {
        Fragment::empty()
    } else {
        Fragment::from_node(Node::text(text, Vec::new()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
