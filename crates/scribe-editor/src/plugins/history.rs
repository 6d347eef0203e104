//! Undo/redo history.
//!
//! Every document-changing transaction is recorded as an [`Event`]: the
//! inverted steps that take the document back, plus the selection to
//! restore. Events sit on two stacks. Undo pops the `done` stack, applies
//! its steps and pushes the inverse of *that* onto `undone`; redo is the
//! mirror image. Any new edit clears the redo stack (no branching history).
//!
//! Consecutive typing is grouped: a transaction tagged
//! `uiEvent = "typing"` merges into the previous event when that event was
//! typing too and the cursor has not moved since.
//!
//! Transactions tagged `addToHistory = false` are not recorded. Because the
//! stored steps no longer apply to the changed document, both stacks are
//! dropped when such a transaction changes the document.

use crate::commands::Outcome;
use crate::state::{EditorState, Meta, Selection, Transaction, meta};
use scribe_model::Step;

const UNDO: &str = "undo";
const REDO: &str = "redo";
const TYPING: &str = "typing";

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A group of changes that undo and redo as one unit.
#[derive(Debug, Clone)]
struct Event {
    /// Steps that revert the change, in application order.
    steps: Vec<Step>,
    /// Selection to restore once `steps` are applied.
    selection: Selection,
    /// Selection right after the change; typing continues from here.
    after: Selection,
    typing: bool,
}

// ---------------------------------------------------------------------------
// HistoryState
// ---------------------------------------------------------------------------

/// Undo and redo stacks for one editor.
#[derive(Debug, Clone)]
pub struct HistoryState {
    done: Vec<Event>,
    undone: Vec<Event>,
    depth: usize,
}

impl HistoryState {
    /// An empty history keeping at most `depth` undo events.
    #[must_use]
    pub const fn new(depth: usize) -> Self {
        Self {
            done: Vec::new(),
            undone: Vec::new(),
            depth,
        }
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.done.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    /// Number of events on the undo stack.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.done.len()
    }

    /// Number of events on the redo stack.
    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.undone.len()
    }

    /// Update the stacks for `tr`, applied to `old`.
    pub(crate) fn apply(&mut self, tr: &Transaction, old: &EditorState) {
        if let Some(Meta::Tag(direction @ (UNDO | REDO))) = tr.meta(meta::HISTORY) {
            let (from, to) = if direction == UNDO {
                (&mut self.done, &mut self.undone)
            } else {
                (&mut self.undone, &mut self.done)
            };
            if from.pop().is_some() {
                match invert(tr) {
                    Some(steps) => to.push(Event {
                        steps,
                        selection: old.selection(),
                        after: tr.selection(),
                        typing: false,
                    }),
                    None => self.clear(),
                }
            }
            return;
        }
        if !tr.doc_changed() {
            return;
        }
        if tr.meta(meta::ADD_TO_HISTORY) == Some(Meta::Flag(false)) {
            self.clear();
            return;
        }
        let Some(steps) = invert(tr) else {
            self.clear();
            return;
        };
        self.undone.clear();
        let typing = tr.meta(meta::UI_EVENT) == Some(Meta::Tag(TYPING));
        let merge = self
            .done
            .last_mut()
            .filter(|last| typing && last.typing && last.after == old.selection());
        if let Some(last) = merge {
            let older = std::mem::replace(&mut last.steps, steps);
            last.steps.extend(older);
            last.after = tr.selection();
            return;
        }
        self.done.push(Event {
            steps,
            selection: old.selection(),
            after: tr.selection(),
            typing,
        });
        if self.done.len() > self.depth {
            let excess = self.done.len() - self.depth;
            self.done.drain(..excess);
        }
    }

    fn clear(&mut self) {
        self.done.clear();
        self.undone.clear();
    }
}

/// The steps that revert `tr`, latest first.
pub(crate) fn invert(tr: &Transaction) -> Option<Vec<Step>> {
    let transform = tr.transform();
    let inverted: Result<Vec<Step>, _> = transform
        .steps()
        .iter()
        .zip(transform.docs())
        .rev()
        .map(|(step, doc)| step.invert(doc))
        .collect();
    match inverted {
        Ok(steps) => Some(steps),
        Err(err) => {
            tracing::warn!(%err, "cannot invert transaction, dropping history");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Revert the last event.
#[must_use]
pub fn undo(state: &EditorState) -> Outcome {
    replay(state, UNDO)
}

/// Reapply the last undone event.
#[must_use]
pub fn redo(state: &EditorState) -> Outcome {
    replay(state, REDO)
}

fn replay(state: &EditorState, direction: &'static str) -> Outcome {
    let Some(history) = state.fields().history.as_ref() else {
        return Outcome::Pass;
    };
    let stack = if direction == UNDO { &history.done } else { &history.undone };
    let Some(event) = stack.last() else {
        return Outcome::Pass;
    };
    let mut tr = state.tr();
    for step in &event.steps {
        if let Err(err) = tr.step(step.clone()) {
            tracing::warn!(direction, %err, "history step no longer applies");
            return Outcome::Pass;
        }
    }
    tr.set_selection(event.selection)
        .set_meta(meta::HISTORY, Meta::Tag(direction))
        .set_meta(meta::ADD_TO_HISTORY, Meta::Flag(false))
        .scroll_into_view();
    Outcome::Apply(tr)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{Plugin, PluginSet};
    use pretty_assertions::assert_eq;
    use scribe_model::{Node, Schema};
    use std::rc::Rc;

    fn p(s: &str) -> Node {
        Node::paragraph(if s.is_empty() { vec![] } else { vec![Node::text(s, vec![])] })
    }

    fn state(text: &str, depth: usize) -> EditorState {
        let mut plugins = PluginSet::new();
        plugins.add("history", Plugin::History { depth }).unwrap();
        EditorState::create(Node::doc(vec![p(text)]), Schema::markdown(), Rc::new(plugins), false)
    }

    fn type_text(s: &EditorState, text: &str) -> EditorState {
        let sel = s.selection();
        let mut tr = s.tr();
        tr.insert_text(text, sel.from(), sel.to(), None).unwrap();
        tr.set_meta(meta::UI_EVENT, Meta::Tag(TYPING));
        s.apply(&tr).unwrap()
    }

    fn run(s: &EditorState, outcome: Outcome) -> EditorState {
        match outcome {
            Outcome::Apply(tr) => s.apply(&tr).unwrap(),
            other => panic!("expected a transaction, got {other:?}"),
        }
    }

    fn history(s: &EditorState) -> &HistoryState {
        s.fields().history.as_ref().unwrap()
    }

    fn text(s: &EditorState) -> String {
        s.doc().text_content()
    }

    // -- Basic undo/redo ----------------------------------------------------

    #[test]
    fn undo_restores_document_and_selection() {
        let s = state("ab", 10);
        let mut tr = s.tr();
        tr.insert_text("X", 1, 1, None).unwrap();
        let edited = s.apply(&tr).unwrap();
        assert_eq!(text(&edited), "Xab");
        assert_eq!(edited.selection(), Selection::cursor(2));

        let undone = run(&edited, undo(&edited));
        assert_eq!(text(&undone), "ab");
        assert_eq!(undone.selection(), s.selection());
        assert!(!history(&undone).can_undo());
        assert!(history(&undone).can_redo());

        let redone = run(&undone, redo(&undone));
        assert_eq!(text(&redone), "Xab");
        assert_eq!(redone.selection(), Selection::cursor(2));
        assert_eq!(history(&redone).undo_depth(), 1);
    }

    #[test]
    fn nothing_to_undo_passes() {
        let s = state("ab", 10);
        assert!(undo(&s).is_pass());
        assert!(redo(&s).is_pass());
    }

    #[test]
    fn selection_only_changes_are_not_recorded() {
        let s = state("ab", 10);
        let mut tr = s.tr();
        tr.set_selection(Selection::cursor(2));
        let moved = s.apply(&tr).unwrap();
        assert_eq!(history(&moved).undo_depth(), 0);
    }

    // -- Grouping -----------------------------------------------------------

    #[test]
    fn consecutive_typing_is_one_event() {
        let s = state("", 10);
        let typed = type_text(&type_text(&type_text(&s, "a"), "b"), "c");
        assert_eq!(text(&typed), "abc");
        assert_eq!(history(&typed).undo_depth(), 1);
        let undone = run(&typed, undo(&typed));
        assert_eq!(text(&undone), "");
    }

    #[test]
    fn moving_the_cursor_breaks_the_group() {
        let s = state("", 10);
        let typed = type_text(&type_text(&s, "a"), "b");
        let mut tr = typed.tr();
        tr.set_selection(Selection::cursor(1));
        let moved = typed.apply(&tr).unwrap();
        let more = type_text(&moved, "c");
        assert_eq!(text(&more), "cab");
        assert_eq!(history(&more).undo_depth(), 2);
        let undone = run(&more, undo(&more));
        assert_eq!(text(&undone), "ab");
    }

    #[test]
    fn new_edit_clears_redo() {
        let s = state("", 10);
        let typed = type_text(&s, "a");
        let undone = run(&typed, undo(&typed));
        let retyped = type_text(&undone, "b");
        assert!(!history(&retyped).can_redo());
    }

    // -- Limits -------------------------------------------------------------

    #[test]
    fn depth_limits_undo_stack() {
        let mut s = state("", 2);
        for i in 0..4 {
            let mut tr = s.tr();
            let end = s.doc().content_size() - 1;
            tr.insert_text(&i.to_string(), end, end, None).unwrap();
            s = s.apply(&tr).unwrap();
        }
        assert_eq!(text(&s), "0123");
        assert_eq!(history(&s).undo_depth(), 2);
        let once = run(&s, undo(&s));
        let twice = run(&once, undo(&once));
        assert_eq!(text(&twice), "01");
        assert!(undo(&twice).is_pass());
    }

    #[test]
    fn untracked_change_drops_history() {
        let s = type_text(&state("", 10), "a");
        let mut tr = s.tr();
        tr.insert_text("z", 1, 1, None).unwrap();
        tr.set_meta(meta::ADD_TO_HISTORY, Meta::Flag(false));
        let next = s.apply(&tr).unwrap();
        assert!(!history(&next).can_undo());
    }
}
