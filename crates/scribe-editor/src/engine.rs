//! The document engine capability.
//!
//! Everything the driver needs from the structured-document engine goes
//! through [`DocumentEngine`]: parsing and serializing text, applying
//! transactions, and drawing a state onto a [`Surface`]. [`MarkdownEngine`]
//! is the implementation backed by `scribe-model`; tests may substitute
//! their own.

use scribe_model::{Node, Schema};

use crate::bridge::Bridge;
use crate::error::Result;
use crate::state::{EditorState, Transaction};
use crate::surface::Surface;

pub trait DocumentEngine {
    /// The schema documents conform to.
    fn schema(&self) -> &Schema;

    /// Parse source text. Never fails; malformed input gives a best-effort
    /// document.
    fn parse(&self, text: &str) -> Node;

    fn serialize(&self, doc: &Node) -> String;

    /// The state after `tr`.
    ///
    /// # Errors
    ///
    /// Fails if `tr` was not derived from `state`.
    fn apply_transaction(&self, state: &EditorState, tr: &Transaction) -> Result<EditorState>;

    /// Draw `state`, with its plugin decorations, onto `surface`.
    fn render(&self, state: &EditorState, surface: &mut dyn Surface) {
        let decorations = state.plugins().decorations(state);
        surface.update(state, &decorations);
    }
}

/// The markdown-backed engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownEngine {
    bridge: Bridge,
}

impl MarkdownEngine {
    #[must_use]
    pub const fn new(schema: Schema) -> Self {
        Self {
            bridge: Bridge::new(schema),
        }
    }

    #[inline]
    #[must_use]
    pub const fn bridge(&self) -> &Bridge {
        &self.bridge
    }
}

impl DocumentEngine for MarkdownEngine {
    fn schema(&self) -> &Schema {
        self.bridge.schema()
    }

    fn parse(&self, text: &str) -> Node {
        self.bridge.parse(text)
    }

    fn serialize(&self, doc: &Node) -> String {
        self.bridge.serialize(doc)
    }

    fn apply_transaction(&self, state: &EditorState, tr: &Transaction) -> Result<EditorState> {
        state.apply(tr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EditorError;
    use crate::plugins::{Decoration, Plugin, PluginSet};
    use crate::surface::{HeadlessSurface, SurfaceCall};
    use std::rc::Rc;

    fn state(engine: &MarkdownEngine, text: &str, plugins: PluginSet) -> EditorState {
        EditorState::create(engine.parse(text), *engine.schema(), Rc::new(plugins), false)
    }

    #[test]
    fn render_passes_decorations() {
        let engine = MarkdownEngine::default();
        let mut plugins = PluginSet::new();
        plugins.add("placeholder", Plugin::Placeholder("Type here".into())).unwrap();
        let s = state(&engine, "", plugins);
        let recorder = HeadlessSurface::new();
        engine.render(&s, &mut recorder.clone());
        let Some(SurfaceCall::Update { decorations, .. }) = recorder.last_update() else {
            panic!("no update recorded");
        };
        assert_eq!(decorations, vec![Decoration::Placeholder("Type here".into())]);
    }

    #[test]
    fn stale_transactions_are_refused() {
        let engine = MarkdownEngine::default();
        let s = state(&engine, "ab", PluginSet::new());
        let tr = s.tr();
        let next = engine.apply_transaction(&s, &tr).unwrap();
        assert_eq!(engine.serialize(next.doc()), "ab");
        assert_eq!(
            engine.apply_transaction(&next, &tr).unwrap_err(),
            EditorError::StaleTransaction
        );
    }
}
