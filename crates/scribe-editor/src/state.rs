//! Editor state and transactions.
//!
//! An [`EditorState`] is a value: the document, the selection, marks stored
//! for the next typed text, and the per-plugin fields. It never changes in
//! place. A [`Transaction`] is started from a state, collects steps and
//! metadata, and [`EditorState::apply`] turns it into the next state.
//!
//! Every state carries a version number. A transaction remembers the
//! version it was started from and applying it to any other state fails
//! with [`EditorError::StaleTransaction`], so changes always chain from the
//! state they were computed against.

use std::collections::HashMap;
use std::rc::Rc;

use scribe_model::{Bias, Fragment, Mark, Node, Schema, Slice, Step, StepMap, Transform};

use crate::error::{EditorError, Result};
use crate::plugins::input_rules::RuleInput;
use crate::plugins::{PluginFields, PluginSet};

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// A text selection in document positions. `anchor` stays put while
/// extending; `head` moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Selection {
    anchor: usize,
    head: usize,
}

impl Selection {
    #[must_use]
    pub const fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    /// A collapsed selection at `pos`.
    #[must_use]
    pub const fn cursor(pos: usize) -> Self {
        Self::new(pos, pos)
    }

    #[inline]
    #[must_use]
    pub const fn anchor(&self) -> usize {
        self.anchor
    }

    #[inline]
    #[must_use]
    pub const fn head(&self) -> usize {
        self.head
    }

    /// The lower bound.
    #[inline]
    #[must_use]
    pub const fn from(&self) -> usize {
        if self.anchor < self.head { self.anchor } else { self.head }
    }

    /// The upper bound.
    #[inline]
    #[must_use]
    pub const fn to(&self) -> usize {
        if self.anchor > self.head { self.anchor } else { self.head }
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    /// Map both ends through `map`, then move them into the nearest
    /// textblock of `doc`.
    #[must_use]
    pub fn map(self, map: &StepMap, doc: &Node) -> Self {
        let anchor = map.map(self.anchor, Bias::Right);
        let head = map.map(self.head, Bias::Right);
        Self::new(text_pos_near(doc, anchor, Bias::Right), text_pos_near(doc, head, Bias::Right))
    }
}

// ---------------------------------------------------------------------------
// Textblock helpers
// ---------------------------------------------------------------------------

/// Content ranges `(start, end)` of every textblock, in document order.
#[must_use]
pub fn textblock_ranges(doc: &Node) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    doc.descendants(&mut |node, pos| {
        if node.is_textblock() {
            out.push((pos + 1, pos + 1 + node.content_size()));
            return false;
        }
        true
    });
    out
}

/// The position inside a textblock closest to `pos`. Between blocks,
/// `bias` picks the following (`Right`) or preceding (`Left`) textblock.
/// A document without textblocks keeps `pos`, clamped to its size.
#[must_use]
pub fn text_pos_near(doc: &Node, pos: usize, bias: Bias) -> usize {
    let ranges = textblock_ranges(doc);
    let mut before = None;
    let mut after = None;
    for &(start, end) in &ranges {
        if start <= pos && pos <= end {
            return pos;
        }
        if end < pos {
            before = Some(end);
        } else if after.is_none() {
            after = Some(start);
        }
    }
    let pick = match bias {
        Bias::Right => after.or(before),
        Bias::Left => before.or(after),
    };
    pick.unwrap_or_else(|| pos.min(doc.content_size()))
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Well-known metadata keys.
pub mod meta {
    /// `Flag`: the disabled state plugins should observe.
    pub const DISABLED: &str = "disabled";
    /// `Flag(false)` keeps a transaction out of the undo history.
    pub const ADD_TO_HISTORY: &str = "addToHistory";
    /// `Tag("undo")` or `Tag("redo")` on transactions built by the history.
    pub const HISTORY: &str = "history";
    /// `Pos`: drop cursor position, `None` to hide it.
    pub const DROP_CURSOR: &str = "dropCursor";
    /// `Tag`: what produced the transaction (`"typing"`, `"drop"`, `"key"`).
    pub const UI_EVENT: &str = "uiEvent";
}

/// A metadata value attached to a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meta {
    Flag(bool),
    Pos(Option<usize>),
    Tag(&'static str),
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A pending change to an [`EditorState`].
#[derive(Debug, Clone)]
pub struct Transaction {
    transform: Transform,
    base_version: u64,
    selection: Selection,
    selection_set: bool,
    stored_marks: Option<Vec<Mark>>,
    meta: HashMap<&'static str, Meta>,
    rule_input: Option<RuleInput>,
    scroll: bool,
}

impl Transaction {
    fn new(state: &EditorState) -> Self {
        Self {
            transform: Transform::new(state.doc.clone()),
            base_version: state.version,
            selection: state.selection,
            selection_set: false,
            stored_marks: state.stored_marks.clone(),
            meta: HashMap::new(),
            rule_input: None,
            scroll: false,
        }
    }

    /// The document after every step so far.
    #[inline]
    #[must_use]
    pub const fn doc(&self) -> &Node {
        self.transform.doc()
    }

    #[inline]
    #[must_use]
    pub const fn transform(&self) -> &Transform {
        &self.transform
    }

    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        self.transform.steps()
    }

    #[inline]
    #[must_use]
    pub fn doc_changed(&self) -> bool {
        self.transform.doc_changed()
    }

    /// The selection, mapped through every step so far.
    #[inline]
    #[must_use]
    pub const fn selection(&self) -> Selection {
        self.selection
    }

    #[inline]
    #[must_use]
    pub const fn selection_set(&self) -> bool {
        self.selection_set
    }

    // -- Steps --------------------------------------------------------------

    /// Apply `step`. The selection is mapped through it and stored marks
    /// are cleared.
    ///
    /// # Errors
    ///
    /// Returns the step's failure; the transaction is left unchanged.
    pub fn step(&mut self, step: Step) -> Result<&mut Self> {
        let map = step.map();
        self.transform.step(step)?;
        self.selection = self.selection.map(&map, self.transform.doc());
        self.stored_marks = None;
        Ok(self)
    }

    /// Replace `from..to` with `slice`. A no-op replace adds no step.
    ///
    /// # Errors
    ///
    /// See [`step`](Self::step).
    pub fn replace(&mut self, from: usize, to: usize, slice: Slice) -> Result<&mut Self> {
        if from == to && slice.size() == 0 {
            return Ok(self);
        }
        self.step(Step::replace(from, to, slice))
    }

    /// Delete `from..to`.
    ///
    /// # Errors
    ///
    /// See [`step`](Self::step).
    pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Self> {
        self.replace(from, to, Slice::empty())
    }

    /// Insert closed `content` at `pos`.
    ///
    /// # Errors
    ///
    /// See [`step`](Self::step).
    pub fn insert(&mut self, pos: usize, content: Fragment) -> Result<&mut Self> {
        self.replace(pos, pos, Slice::closed(content))
    }

    /// Replace `from..to` with `text`. Without explicit `marks` the text
    /// takes the stored marks, or the marks at `from`.
    ///
    /// # Errors
    ///
    /// See [`step`](Self::step).
    pub fn insert_text(
        &mut self,
        text: &str,
        from: usize,
        to: usize,
        marks: Option<Vec<Mark>>,
    ) -> Result<&mut Self> {
        if text.is_empty() {
            return self.delete(from, to);
        }
        let marks = match marks {
            Some(marks) => marks,
            None => match &self.stored_marks {
                Some(stored) => stored.clone(),
                None => self.doc().resolve(from)?.marks(),
            },
        };
        let node = Node::text(text, marks);
        self.replace(from, to, Slice::closed(Fragment::from_node(node)))
    }

    // -- Selection, marks, metadata -----------------------------------------

    /// Set the selection. Stored marks are cleared.
    pub fn set_selection(&mut self, selection: Selection) -> &mut Self {
        self.selection = selection;
        self.selection_set = true;
        self.stored_marks = None;
        self
    }

    /// Marks for the next typed text, `None` to use the marks at the cursor.
    pub fn set_stored_marks(&mut self, marks: Option<Vec<Mark>>) -> &mut Self {
        self.stored_marks = marks;
        self
    }

    #[must_use]
    pub fn stored_marks(&self) -> Option<&[Mark]> {
        self.stored_marks.as_deref()
    }

    pub fn set_meta(&mut self, key: &'static str, value: Meta) -> &mut Self {
        self.meta.insert(key, value);
        self
    }

    #[must_use]
    pub fn meta(&self, key: &str) -> Option<Meta> {
        self.meta.get(key).copied()
    }

    /// Mark this as an input rule's transaction, replacing `input`.
    pub fn set_rule_input(&mut self, input: RuleInput) -> &mut Self {
        self.rule_input = Some(input);
        self
    }

    #[must_use]
    pub const fn rule_input(&self) -> Option<&RuleInput> {
        self.rule_input.as_ref()
    }

    /// Ask the surface to bring the selection into view.
    pub const fn scroll_into_view(&mut self) -> &mut Self {
        self.scroll = true;
        self
    }

    #[must_use]
    pub const fn scrolled_into_view(&self) -> bool {
        self.scroll
    }
}

// ---------------------------------------------------------------------------
// EditorState
// ---------------------------------------------------------------------------

/// The complete, immutable state of an editor.
#[derive(Debug, Clone)]
pub struct EditorState {
    doc: Node,
    selection: Selection,
    stored_marks: Option<Vec<Mark>>,
    schema: Schema,
    plugins: Rc<PluginSet>,
    fields: PluginFields,
    version: u64,
}

impl EditorState {
    /// A fresh state holding `doc` with the cursor in its first textblock.
    #[must_use]
    pub fn create(doc: Node, schema: Schema, plugins: Rc<PluginSet>, disabled: bool) -> Self {
        let cursor = text_pos_near(&doc, 0, Bias::Right);
        let fields = plugins.init_fields(disabled);
        Self {
            doc,
            selection: Selection::cursor(cursor),
            stored_marks: None,
            schema,
            plugins,
            fields,
            version: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn doc(&self) -> &Node {
        &self.doc
    }

    #[inline]
    #[must_use]
    pub const fn selection(&self) -> Selection {
        self.selection
    }

    #[must_use]
    pub fn stored_marks(&self) -> Option<&[Mark]> {
        self.stored_marks.as_deref()
    }

    #[inline]
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    #[inline]
    #[must_use]
    pub fn plugins(&self) -> &PluginSet {
        &self.plugins
    }

    #[inline]
    #[must_use]
    pub const fn fields(&self) -> &PluginFields {
        &self.fields
    }

    /// Incremented by every applied transaction.
    #[inline]
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Start a transaction from this state.
    #[must_use]
    pub fn tr(&self) -> Transaction {
        Transaction::new(self)
    }

    /// The state after `tr`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::StaleTransaction`] if `tr` was not started
    /// from this state.
    pub fn apply(&self, tr: &Transaction) -> Result<Self> {
        if tr.base_version != self.version {
            tracing::warn!(
                expected = self.version,
                got = tr.base_version,
                "rejecting stale transaction"
            );
            return Err(EditorError::StaleTransaction);
        }
        let mut fields = self.fields.clone();
        self.plugins.apply_fields(tr, self, &mut fields);
        Ok(Self {
            doc: tr.doc().clone(),
            selection: tr.selection,
            stored_marks: tr.stored_marks.clone(),
            schema: self.schema,
            plugins: Rc::clone(&self.plugins),
            fields,
            version: self.version + 1,
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
    use scribe_model::NodeKind;

    fn p(s: &str) -> Node {
        Node::paragraph(if s.is_empty() { vec![] } else { vec![Node::text(s, vec![])] })
    }

    fn state(doc: Node) -> EditorState {
        EditorState::create(doc, Schema::markdown(), Rc::new(PluginSet::new()), false)
    }

    // -- Selection ----------------------------------------------------------

    #[test]
    fn selection_bounds_are_ordered() {
        let sel = Selection::new(7, 3);
        assert_eq!((sel.from(), sel.to()), (3, 7));
        assert!(!sel.is_empty());
        assert!(Selection::cursor(4).is_empty());
    }

    #[test]
    fn text_pos_near_skips_block_boundaries() {
        let doc = Node::doc(vec![p("ab"), Node::leaf(NodeKind::HorizontalRule), p("cd")]);
        // p("ab") content is 1..3, the rule sits at 4, p("cd") content 6..8
        assert_eq!(textblock_ranges(&doc), vec![(1, 3), (6, 8)]);
        assert_eq!(text_pos_near(&doc, 2, Bias::Right), 2);
        assert_eq!(text_pos_near(&doc, 0, Bias::Right), 1);
        assert_eq!(text_pos_near(&doc, 4, Bias::Right), 6);
        assert_eq!(text_pos_near(&doc, 4, Bias::Left), 3);
        assert_eq!(text_pos_near(&doc, 9, Bias::Right), 8);
    }

    // -- Transactions -------------------------------------------------------

    #[test]
    fn create_puts_cursor_in_first_textblock() {
        let s = state(Node::doc(vec![p("hi")]));
        assert_eq!(s.selection(), Selection::cursor(1));
        assert_eq!(s.version(), 0);
    }

    #[test]
    fn insert_text_maps_selection() {
        let s = state(Node::doc(vec![p("hi")]));
        let mut tr = s.tr();
        tr.insert_text("ab", 1, 1, None).unwrap();
        assert_eq!(tr.selection(), Selection::cursor(3));
        let next = s.apply(&tr).unwrap();
        assert_eq!(next.doc(), &Node::doc(vec![p("abhi")]));
        assert_eq!(next.version(), 1);
    }

    #[test]
    fn typed_text_inherits_marks() {
        let doc = Node::doc(vec![Node::paragraph(vec![Node::text("b", vec![Mark::Strong])])]);
        let s = state(doc);
        let mut tr = s.tr();
        tr.insert_text("c", 2, 2, None).unwrap();
        let expected = Node::doc(vec![Node::paragraph(vec![Node::text("bc", vec![Mark::Strong])])]);
        assert_eq!(tr.doc(), &expected);
    }

    #[test]
    fn stored_marks_override_and_clear_on_step() {
        let s = state(Node::doc(vec![p("a")]));
        let mut tr = s.tr();
        tr.set_stored_marks(Some(vec![Mark::Em]));
        tr.insert_text("b", 2, 2, None).unwrap();
        assert!(tr.stored_marks().is_none());
        let expected = Node::doc(vec![Node::paragraph(vec![
            Node::text("a", vec![]),
            Node::text("b", vec![Mark::Em]),
        ])]);
        assert_eq!(tr.doc(), &expected);
    }

    #[test]
    fn stale_transaction_is_rejected() {
        let s = state(Node::doc(vec![p("a")]));
        let tr = s.tr();
        let next = s.apply(&tr).unwrap();
        assert_eq!(next.apply(&tr).unwrap_err(), EditorError::StaleTransaction);
    }

    #[test]
    fn failed_step_keeps_transaction() {
        let s = state(Node::doc(vec![p("a")]));
        let mut tr = s.tr();
        assert!(tr.delete(0, 99).is_err());
        assert!(!tr.doc_changed());
        assert_eq!(tr.selection(), s.selection());
    }

    #[test]
    fn meta_round_trip() {
        let s = state(Node::doc(vec![p("")]));
        let mut tr = s.tr();
        tr.set_meta(meta::DISABLED, Meta::Flag(true)).scroll_into_view();
        assert_eq!(tr.meta(meta::DISABLED), Some(Meta::Flag(true)));
        assert_eq!(tr.meta(meta::HISTORY), None);
        assert!(tr.scrolled_into_view());
    }
}
