//! The driver facade.
//!
//! A [`Driver`] is what the host holds. It owns the engine, the surface,
//! the dispatcher and the callbacks, and exposes the editor to the host as
//! if it were a plain text input: positions are linear offsets into the
//! flat text (see [`crate::offsets`]), and content goes in and out as
//! markdown.
//!
//! Every change funnels through the dispatcher, so the input callback sees
//! every transaction exactly once, in order.
//!
//! # Errors
//!
//! Offsets past the end of the content are rejected with
//! [`EditorError::OutOfRange`] by every operation that takes one. Once
//! [`destroy`](Driver::destroy) has run, every operation (including a
//! second `destroy`) returns [`EditorError::Destroyed`].
//!
//! # Disabled state
//!
//! [`set_disabled`](Driver::set_disabled) only records a flag. User input
//! (keys, typed text, drops) is refused while it is set; the programmatic
//! API keeps working.

use std::fmt;
use std::rc::Rc;

use scribe_model::Schema;

use crate::commands::{Outcome, delete_range};
use crate::config::{EditorConfig, SubmitCallback};
use crate::dispatch::Dispatcher;
use crate::engine::{DocumentEngine, MarkdownEngine};
use crate::error::{EditorError, Result};
use crate::keys::KeyEvent;
use crate::mutate;
use crate::offsets::{Caret, OffsetMap};
use crate::plugins::{build_pipeline, history};
use crate::schema;
use crate::state::{EditorState, Meta, Selection, Transaction, meta};
use crate::surface::Surface;

struct Inner {
    engine: Box<dyn DocumentEngine>,
    surface: Box<dyn Surface>,
    dispatcher: Dispatcher,
    on_submit: Option<SubmitCallback>,
    generation: u64,
}

impl Inner {
    const fn state(&self) -> &EditorState {
        self.dispatcher.state()
    }

    fn offsets(&self) -> OffsetMap {
        OffsetMap::build(self.state().doc())
    }

    fn dispatch(&mut self, tr: &Transaction) -> Result<()> {
        self.dispatcher.dispatch(&*self.engine, &mut *self.surface, tr)
    }

    fn allows_input(&self) -> bool {
        let state = self.state();
        state.plugins().allows_input(state)
    }
}

/// The host-facing editor.
pub struct Driver {
    inner: Option<Inner>,
}

impl Driver {
    /// Mount an editor on `surface`, using the markdown engine.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Config`] if the plugin pipeline cannot be
    /// assembled.
    pub fn build(surface: impl Surface + 'static, config: EditorConfig) -> Result<Self> {
        let schema = schema::compose(&Schema::markdown());
        Self::with_engine(MarkdownEngine::new(schema), surface, config)
    }

    /// Mount an editor on `surface`, backed by `engine`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Config`] if the plugin pipeline cannot be
    /// assembled.
    pub fn with_engine(
        engine: impl DocumentEngine + 'static,
        surface: impl Surface + 'static,
        config: EditorConfig,
    ) -> Result<Self> {
        let plugins = build_pipeline(engine.schema(), &config)?;
        let EditorConfig {
            value,
            disabled,
            on_input,
            on_submit,
            class_names,
            generation,
            ..
        } = config;

        let doc = engine.parse(&value);
        let state = EditorState::create(doc, *engine.schema(), Rc::new(plugins), disabled);
        let mut surface: Box<dyn Surface> = Box::new(surface);
        surface.mount(&class_names);
        engine.render(&state, &mut *surface);
        tracing::debug!(
            generation,
            disabled,
            doc_size = state.doc().content_size(),
            "editor built"
        );

        Ok(Self {
            inner: Some(Inner {
                engine: Box::new(engine),
                surface,
                dispatcher: Dispatcher::new(state, on_input),
                on_submit,
                generation,
            }),
        })
    }

    fn live(&self) -> Result<&Inner> {
        self.inner.as_ref().ok_or(EditorError::Destroyed)
    }

    fn live_mut(&mut self) -> Result<&mut Inner> {
        self.inner.as_mut().ok_or(EditorError::Destroyed)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns [`EditorError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn focus(&mut self) -> Result<()> {
        self.live_mut()?.surface.focus();
        Ok(())
    }

    /// Release the surface. The driver is inert afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Destroyed`] if already destroyed.
    pub fn destroy(&mut self) -> Result<()> {
        let mut inner = self.inner.take().ok_or(EditorError::Destroyed)?;
        inner.surface.destroy();
        tracing::debug!(
            generation = inner.generation,
            dispatched = inner.dispatcher.dispatched(),
            "editor destroyed"
        );
        Ok(())
    }

    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.inner.is_none()
    }

    /// Record the disabled flag. The document is not touched.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn set_disabled(&mut self, disabled: bool) -> Result<()> {
        let inner = self.live_mut()?;
        let mut tr = inner.state().tr();
        tr.set_meta(meta::DISABLED, Meta::Flag(disabled));
        inner.dispatch(&tr)
    }

    /// # Errors
    ///
    /// Returns [`EditorError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn is_disabled(&self) -> Result<bool> {
        Ok(self.live()?.state().fields().disabled)
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// The selection as ordered offsets `(from, to)`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn selection_range(&self) -> Result<(usize, usize)> {
        let inner = self.live()?;
        let map = inner.offsets();
        let selection = inner.state().selection();
        Ok((map.to_offset(selection.from()), map.to_offset(selection.to())))
    }

    /// Select from offset `anchor` to offset `head`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::OutOfRange`] if either offset is past the
    /// end, or [`EditorError::Destroyed`].
    pub fn set_selection_range(&mut self, anchor: usize, head: usize) -> Result<()> {
        let inner = self.live_mut()?;
        let map = inner.offsets();
        let selection = Selection::new(map.to_pos(anchor)?, map.to_pos(head)?);
        let mut tr = inner.state().tr();
        tr.set_selection(selection);
        inner.dispatch(&tr)
    }

    /// Collapse the selection at `offset` and take focus.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::OutOfRange`] if `offset` is past the end, or
    /// [`EditorError::Destroyed`].
    pub fn move_cursor_to(&mut self, offset: usize) -> Result<()> {
        let inner = self.live_mut()?;
        let pos = inner.offsets().to_pos(offset)?;
        let mut tr = inner.state().tr();
        tr.set_selection(Selection::cursor(pos)).scroll_into_view();
        inner.dispatch(&tr)?;
        inner.surface.focus();
        Ok(())
    }

    /// Where a caret at `offset` is drawn, in cells of the flat text.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::OutOfRange`] if `offset` is past the end, or
    /// [`EditorError::Destroyed`].
    pub fn caret_coordinates(&self, offset: usize) -> Result<Caret> {
        self.live()?.offsets().caret(offset)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Replace the text between offsets `start` and `end` with parsed
    /// `text`, then move the cursor right after it.
    ///
    /// This dispatches two transactions: the change, then the cursor move.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::OutOfRange`] if either offset is past the
    /// end, or [`EditorError::Destroyed`].
    pub fn insert_between(&mut self, start: usize, end: usize, text: &str) -> Result<()> {
        let inner = self.live_mut()?;
        let insertion = mutate::insert_between(inner.state(), &*inner.engine, start, end, text)?;
        inner.dispatch(&insertion.tr)?;
        self.move_cursor_to(insertion.cursor)
    }

    /// Insert `text` at `offset`.
    ///
    /// # Errors
    ///
    /// See [`insert_between`](Self::insert_between).
    pub fn insert_at(&mut self, offset: usize, text: &str) -> Result<()> {
        self.insert_between(offset, offset, text)
    }

    /// Insert `text` at the cursor. A non-empty selection is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn insert_at_cursor(&mut self, text: &str) -> Result<()> {
        let (from, to) = self.selection_range()?;
        self.insert_between(from, to, text)
    }

    /// Replace everything from offset `start` up to the cursor with `text`.
    ///
    /// # Errors
    ///
    /// See [`insert_between`](Self::insert_between).
    pub fn replace_before_cursor(&mut self, start: usize, text: &str) -> Result<()> {
        let (from, _) = self.selection_range()?;
        self.insert_between(start, from, text)
    }

    // -----------------------------------------------------------------------
    // User input
    // -----------------------------------------------------------------------

    /// Offer a key press to the keymaps. Returns whether it was handled.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn handle_key(&mut self, event: KeyEvent) -> Result<bool> {
        let inner = self.live_mut()?;
        if !inner.allows_input() {
            tracing::trace!(?event, "key refused while disabled");
            return Ok(false);
        }
        let state = inner.state();
        let outcome = state.plugins().handle_key(state, &event);
        match outcome {
            Outcome::Pass => Ok(false),
            Outcome::Handled => Ok(true),
            Outcome::Apply(tr) => inner.dispatch(&tr).map(|()| true),
            Outcome::Submit => {
                if let Some(on_submit) = inner.on_submit.as_mut() {
                    on_submit();
                }
                Ok(true)
            }
        }
    }

    /// Type `text` over the selection. Input rules get the first chance to
    /// turn it into something else.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn handle_text_input(&mut self, text: &str) -> Result<bool> {
        let inner = self.live_mut()?;
        if !inner.allows_input() || text.is_empty() {
            return Ok(false);
        }
        let state = inner.state();
        let selection = state.selection();
        let (from, to) = (selection.from(), selection.to());
        let tr = match state.plugins().handle_text_input(state, from, to, text) {
            Some(tr) => tr,
            None => {
                let mut tr = state.tr();
                delete_range(&mut tr, from, to)?;
                tr.insert_text(text, from, from, None)?;
                tr.set_meta(meta::UI_EVENT, Meta::Tag("typing")).scroll_into_view();
                tr
            }
        };
        inner.dispatch(&tr).map(|()| true)
    }

    /// Show the drop indicator at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::OutOfRange`] if `offset` is past the end, or
    /// [`EditorError::Destroyed`].
    pub fn drag_over(&mut self, offset: usize) -> Result<bool> {
        let inner = self.live_mut()?;
        if !inner.allows_input() {
            return Ok(false);
        }
        let pos = inner.offsets().to_pos(offset)?;
        if inner.state().fields().drop_cursor == Some(pos) {
            return Ok(true);
        }
        let mut tr = inner.state().tr();
        tr.set_meta(meta::DROP_CURSOR, Meta::Pos(Some(pos)));
        inner.dispatch(&tr).map(|()| true)
    }

    /// Hide the drop indicator.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn drag_leave(&mut self) -> Result<()> {
        let inner = self.live_mut()?;
        if inner.state().fields().drop_cursor.is_none() {
            return Ok(());
        }
        let mut tr = inner.state().tr();
        tr.set_meta(meta::DROP_CURSOR, Meta::Pos(None));
        inner.dispatch(&tr)
    }

    /// Drop `text` at `offset`: it is parsed and inserted there, and the
    /// drop indicator goes away.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::OutOfRange`] if `offset` is past the end, or
    /// [`EditorError::Destroyed`].
    pub fn drop_text(&mut self, offset: usize, text: &str) -> Result<bool> {
        let inner = self.live_mut()?;
        if !inner.allows_input() {
            return Ok(false);
        }
        let mut insertion = mutate::insert_between(inner.state(), &*inner.engine, offset, offset, text)?;
        insertion.tr.set_meta(meta::DROP_CURSOR, Meta::Pos(None));
        inner.dispatch(&insertion.tr)?;
        self.move_cursor_to(insertion.cursor).map(|()| true)
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Undo the last change. Returns whether there was one.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn undo(&mut self) -> Result<bool> {
        self.replay(history::undo)
    }

    /// Redo the last undone change. Returns whether there was one.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn redo(&mut self) -> Result<bool> {
        self.replay(history::redo)
    }

    fn replay(&mut self, command: fn(&EditorState) -> Outcome) -> Result<bool> {
        let inner = self.live_mut()?;
        let outcome = command(inner.state());
        match outcome {
            Outcome::Apply(tr) => inner.dispatch(&tr).map(|()| true),
            _ => Ok(false),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The document serialized to markdown.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn content(&self) -> Result<String> {
        let inner = self.live()?;
        Ok(inner.engine.serialize(inner.state().doc()))
    }

    /// The flat text that offsets index into.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn flat_text(&self) -> Result<String> {
        Ok(self.live()?.offsets().text())
    }

    /// The generation the host passed in its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn generation(&self) -> Result<u64> {
        Ok(self.live()?.generation)
    }

    /// # Errors
    ///
    /// Returns [`EditorError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn state(&self) -> Result<&EditorState> {
        Ok(self.live()?.state())
    }

    /// Plugin names in priority order.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn plugin_names(&self) -> Result<Vec<&'static str>> {
        Ok(self.live()?.state().plugins().names().collect())
    }

    /// Number of transactions dispatched since the editor was built.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn dispatched(&self) -> Result<u64> {
        Ok(self.live()?.dispatcher.dispatched())
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(inner) => f
                .debug_struct("Driver")
                .field("generation", &inner.generation)
                .field("dispatcher", &inner.dispatcher)
                .finish_non_exhaustive(),
            None => f.write_str("Driver(destroyed)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
