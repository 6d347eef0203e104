//! The transaction dispatcher.
//!
//! Every change to the editor, whether it comes from a key, typed text or a
//! host API call, ends up in [`Dispatcher::dispatch`]:
//!
//! 1. apply the transaction to the current state
//! 2. install the result as the current state
//! 3. redraw the surface
//! 4. serialize the document and hand the text to the input callback
//!
//! Dispatch is synchronous. The input callback is a plain closure with no
//! handle back to the driver, so it cannot dispatch while a dispatch is in
//! progress. Each dispatched transaction produces exactly one callback
//! call; nothing is batched or merged.

use std::fmt;

use crate::config::InputCallback;
use crate::engine::DocumentEngine;
use crate::error::Result;
use crate::state::{EditorState, Transaction};
use crate::surface::Surface;

/// Owner of the current [`EditorState`].
pub struct Dispatcher {
    state: EditorState,
    on_input: Option<InputCallback>,
    dispatched: u64,
}

impl Dispatcher {
    #[must_use]
    pub fn new(state: EditorState, on_input: Option<InputCallback>) -> Self {
        Self {
            state,
            on_input,
            dispatched: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn state(&self) -> &EditorState {
        &self.state
    }

    /// Number of transactions dispatched so far.
    #[inline]
    #[must_use]
    pub const fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Apply `tr`, install the new state, redraw, and notify the host.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::StaleTransaction`](crate::EditorError::StaleTransaction)
    /// if `tr` was not started from the current state. Nothing changes in
    /// that case.
    pub fn dispatch(
        &mut self,
        engine: &dyn DocumentEngine,
        surface: &mut dyn Surface,
        tr: &Transaction,
    ) -> Result<()> {
        let next = engine.apply_transaction(&self.state, tr)?;
        self.state = next;
        engine.render(&self.state, surface);
        let text = engine.serialize(self.state.doc());
        self.dispatched += 1;
        tracing::trace!(
            seq = self.dispatched,
            steps = tr.steps().len(),
            doc_size = self.state.doc().content_size(),
            anchor = self.state.selection().anchor(),
            head = self.state.selection().head(),
            "dispatched"
        );
        if let Some(on_input) = self.on_input.as_mut() {
            on_input(&text);
        }
        Ok(())
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("version", &self.state.version())
            .field("dispatched", &self.dispatched)
            .field("on_input", &self.on_input.is_some())
            .finish_non_exhaustive()
    }
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
    use crate::surface::HeadlessSurface;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn setup(text: &str) -> (MarkdownEngine, Dispatcher, Rc<RefCell<Vec<String>>>) {
        let engine = MarkdownEngine::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let state = EditorState::create(engine.parse(text), *engine.schema(), Rc::new(PluginSet::new()), false);
        let on_input: InputCallback = Box::new(move |text: &str| log.borrow_mut().push(text.to_string()));
        (engine, Dispatcher::new(state, Some(on_input)), seen)
    }

    // -- Ordering -----------------------------------------------------------

    #[test]
    fn every_dispatch_notifies_once_in_order() {
        let (engine, mut dispatcher, seen) = setup("");
        let mut surface = HeadlessSurface::new();

        let mut t1 = dispatcher.state().tr();
        t1.insert_text("a", 1, 1, None).unwrap();
        dispatcher.dispatch(&engine, &mut surface, &t1).unwrap();

        let mut t2 = dispatcher.state().tr();
        t2.insert_text("b", 2, 2, None).unwrap();
        dispatcher.dispatch(&engine, &mut surface, &t2).unwrap();

        assert_eq!(*seen.borrow(), vec!["a".to_string(), "ab".to_string()]);
        assert_eq!(dispatcher.dispatched(), 2);
        assert_eq!(surface.calls().len(), 2);
    }

    #[test]
    fn selection_only_transactions_still_notify() {
        let (engine, mut dispatcher, seen) = setup("ab");
        let mut tr = dispatcher.state().tr();
        tr.set_selection(crate::state::Selection::cursor(2));
        dispatcher.dispatch(&engine, &mut HeadlessSurface::new(), &tr).unwrap();
        assert_eq!(*seen.borrow(), vec!["ab".to_string()]);
    }

    // -- Failure ------------------------------------------------------------

    #[test]
    fn stale_transaction_changes_nothing() {
        let (engine, mut dispatcher, seen) = setup("ab");
        let mut surface = HeadlessSurface::new();
        let stale = dispatcher.state().tr();
        dispatcher.dispatch(&engine, &mut surface, &stale).unwrap();
        let version = dispatcher.state().version();

        let err = dispatcher.dispatch(&engine, &mut surface, &stale).unwrap_err();
        assert_eq!(err, EditorError::StaleTransaction);
        assert_eq!(dispatcher.state().version(), version);
        assert_eq!(seen.borrow().len(), 1);
    }
}
