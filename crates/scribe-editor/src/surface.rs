//! Rendering surfaces.
//!
//! A [`Surface`] is whatever displays the editor: a DOM node, a terminal
//! pane, or nothing at all in tests. The driver calls its methods in this
//! order over the editor's life:
//!
//! 1. [`mount`](Surface::mount) once, at build time
//! 2. [`update`](Surface::update) after every applied transaction, and
//!    once right after mounting
//! 3. [`focus`](Surface::focus) whenever the host or a selection change
//!    asks for it
//! 4. [`destroy`](Surface::destroy) once, when the driver is destroyed
//!
//! Only [`update`](Surface::update) is required.

use std::cell::RefCell;
use std::rc::Rc;

use crate::plugins::Decoration;
use crate::state::{EditorState, Selection};

/// Something that can display editor state.
pub trait Surface {
    /// Attach to the host with the given presentation classes.
    fn mount(&mut self, _classes: &[String]) {}

    /// Redraw for `state`.
    fn update(&mut self, state: &EditorState, decorations: &[Decoration]);

    /// Take input focus.
    fn focus(&mut self) {}

    /// Detach and release resources.
    fn destroy(&mut self) {}
}

// ---------------------------------------------------------------------------
// HeadlessSurface
// ---------------------------------------------------------------------------

/// One call received by a [`HeadlessSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    Mount(Vec<String>),
    Update {
        doc_size: usize,
        selection: Selection,
        decorations: Vec<Decoration>,
    },
    Focus,
    Destroy,
}

/// A surface that draws nothing and records every call.
///
/// Clones share the same log, so a test can keep one handle while the
/// driver owns another.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    calls: Rc<RefCell<Vec<SurfaceCall>>>,
}

impl HeadlessSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.borrow().clone()
    }

    /// The most recent update, if any.
    #[must_use]
    pub fn last_update(&self) -> Option<SurfaceCall> {
        self.calls
            .borrow()
            .iter()
            .rev()
            .find(|call| matches!(call, SurfaceCall::Update { .. }))
            .cloned()
    }

    fn record(&self, call: SurfaceCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl Surface for HeadlessSurface {
    fn mount(&mut self, classes: &[String]) {
        self.record(SurfaceCall::Mount(classes.to_vec()));
    }

    fn update(&mut self, state: &EditorState, decorations: &[Decoration]) {
        self.record(SurfaceCall::Update {
            doc_size: state.doc().content_size(),
            selection: state.selection(),
            decorations: decorations.to_vec(),
        });
    }

    fn focus(&mut self) {
        self.record(SurfaceCall::Focus);
    }

    fn destroy(&mut self) {
        self.record(SurfaceCall::Destroy);
    }
}
