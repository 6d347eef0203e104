//! Plugin pipeline.
//!
//! A [`PluginSet`] is an ordered list of named behaviors, fixed when the
//! editor is built. Order is priority: key events and typed text are
//! offered to plugins first-to-last and the first one that handles them
//! wins, so two keymaps binding the same chord resolve to the one added
//! earlier. Names are unique and only serve to identify plugins in logs
//! and diagnostics.
//!
//! Plugins keep their state in [`PluginFields`], which lives inside every
//! [`EditorState`] and is recomputed by [`PluginSet::apply_fields`] as each
//! transaction is applied.
//!
//! [`build_pipeline`] assembles the fixed editor pipeline:
//!
//! | #  | name                      | behavior                                  |
//! |----|---------------------------|-------------------------------------------|
//! | 1  | `markdownInputrules`      | markdown shortcuts while typing, undoable |
//! | 2  | `listIndentationKeybinds` | `Ctrl-m` / `Ctrl-Shift-m` list indent     |
//! | 3  | `markdownKeybinds`        | formatting, joins, rules, rule undo       |
//! | 4  | `submit`                  | `Mod-Enter` submits                       |
//! | 5  | `shiftEnterSameAsEnter`   | `Shift-Enter` acts as `Enter`             |
//! | 6  | `baseKeymap`              | newline, deletion, selection              |
//! | 7  | `placeholder`             | placeholder while the document is empty   |
//! | 8  | `history`                 | undo/redo stacks                          |
//! | 9  | `historyKeymap`           | `Mod-z`, `Mod-y`, `Mod-Shift-z`           |
//! | 10 | `disabled`                | refuse user input while disabled          |
//! | 11 | `dropCursor`              | drop target indicator                     |

pub mod history;
pub mod input_rules;
pub mod keymap;

use std::fmt;

use scribe_model::{Bias, NodeType, Schema};

pub use history::HistoryState;
pub use input_rules::{AppliedRule, InputRules};
pub use keymap::Keymap;

use crate::commands::Outcome;
use crate::config::EditorConfig;
use crate::error::{EditorError, Result};
use crate::keys::KeyEvent;
use crate::state::{EditorState, Meta, Transaction, meta};

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

/// One behavior in the pipeline.
#[derive(Debug, Clone)]
pub enum Plugin {
    InputRules(InputRules),
    Keymap(Keymap),
    /// Text shown while the document is empty.
    Placeholder(String),
    History { depth: usize },
    Disabled,
    DropCursor,
}

/// Presentation hints derived from plugin state, handed to the surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoration {
    Placeholder(String),
    /// A drop target indicator at a document position.
    DropCursor(usize),
}

/// Per-plugin state carried by every [`EditorState`].
#[derive(Debug, Clone, Default)]
pub struct PluginFields {
    /// Mirrors the last `disabled` meta.
    pub disabled: bool,
    /// Present when a history plugin is installed.
    pub history: Option<HistoryState>,
    /// Document position of an active drag.
    pub drop_cursor: Option<usize>,
    /// The input rule applied by the last transaction, if nothing happened
    /// since.
    pub input_rule: Option<AppliedRule>,
}

// ---------------------------------------------------------------------------
// PluginSet
// ---------------------------------------------------------------------------

/// Ordered, uniquely named plugins.
#[derive(Clone, Default)]
pub struct PluginSet {
    entries: Vec<(&'static str, Plugin)>,
}

impl PluginSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `plugin` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Config`] if `name` is already taken.
    pub fn add(&mut self, name: &'static str, plugin: Plugin) -> Result<&mut Self> {
        if self.entries.iter().any(|(n, _)| *n == name) {
            return Err(EditorError::Config(format!("duplicate plugin `{name}`")));
        }
        tracing::debug!(plugin = name, position = self.entries.len(), "adding plugin");
        self.entries.push((name, plugin));
        Ok(self)
    }

    /// Plugin names in priority order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Plugin)> {
        self.entries.iter().map(|(name, plugin)| (*name, plugin))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn plugins(&self) -> impl Iterator<Item = &Plugin> {
        self.entries.iter().map(|(_, plugin)| plugin)
    }

    fn has(&self, f: impl Fn(&Plugin) -> bool) -> bool {
        self.plugins().any(f)
    }

    // -- State --------------------------------------------------------------

    /// Initial plugin state for a new editor.
    #[must_use]
    pub fn init_fields(&self, disabled: bool) -> PluginFields {
        let history = self.plugins().find_map(|plugin| match plugin {
            Plugin::History { depth } => Some(HistoryState::new(*depth)),
            _ => None,
        });
        PluginFields {
            disabled: disabled && self.has(|p| matches!(p, Plugin::Disabled)),
            history,
            drop_cursor: None,
            input_rule: None,
        }
    }

    /// Update `fields` for `tr`, applied to `old`.
    pub fn apply_fields(&self, tr: &Transaction, old: &EditorState, fields: &mut PluginFields) {
        for plugin in self.plugins() {
            match plugin {
                Plugin::Disabled => {
                    if let Some(Meta::Flag(flag)) = tr.meta(meta::DISABLED) {
                        fields.disabled = flag;
                    }
                }
                Plugin::History { .. } => {
                    if let Some(history) = fields.history.as_mut() {
                        history.apply(tr, old);
                    }
                }
                Plugin::DropCursor => match tr.meta(meta::DROP_CURSOR) {
                    Some(Meta::Pos(pos)) => fields.drop_cursor = pos,
                    _ if tr.doc_changed() => {
                        let mapping = tr.transform().mapping();
                        fields.drop_cursor = fields.drop_cursor.map(|pos| mapping.map(pos, Bias::Right));
                    }
                    _ => {}
                },
                Plugin::InputRules(_) => {
                    if tr.rule_input().is_some() {
                        fields.input_rule = AppliedRule::record(tr);
                    } else if tr.doc_changed() || tr.selection_set() {
                        fields.input_rule = None;
                    }
                }
                Plugin::Keymap(_) | Plugin::Placeholder(_) => {}
            }
        }
    }

    // -- Input --------------------------------------------------------------

    /// False while a disabled plugin is set; user input is then refused.
    #[must_use]
    pub fn allows_input(&self, state: &EditorState) -> bool {
        !(state.fields().disabled && self.has(|p| matches!(p, Plugin::Disabled)))
    }

    /// Offer `event` to the keymaps in order.
    #[must_use]
    pub fn handle_key(&self, state: &EditorState, event: &KeyEvent) -> Outcome {
        for (name, plugin) in self.iter() {
            if let Plugin::Keymap(keymap) = plugin {
                let outcome = keymap.handle(state, event);
                if !outcome.is_pass() {
                    tracing::trace!(plugin = name, ?event, "key handled");
                    return outcome;
                }
            }
        }
        Outcome::Pass
    }

    /// Offer typed `text` over `from..to` to the input rules in order.
    #[must_use]
    pub fn handle_text_input(&self, state: &EditorState, from: usize, to: usize, text: &str) -> Option<Transaction> {
        self.plugins().find_map(|plugin| match plugin {
            Plugin::InputRules(rules) => rules.handle(state, from, to, text),
            _ => None,
        })
    }

    // -- Presentation -------------------------------------------------------

    /// Decorations the surface should draw for `state`.
    #[must_use]
    pub fn decorations(&self, state: &EditorState) -> Vec<Decoration> {
        let mut out = Vec::new();
        for plugin in self.plugins() {
            match plugin {
                Plugin::Placeholder(text) if !text.is_empty() && is_empty_doc(state) => {
                    out.push(Decoration::Placeholder(text.clone()));
                }
                Plugin::DropCursor => {
                    if let Some(pos) = state.fields().drop_cursor {
                        out.push(Decoration::DropCursor(pos));
                    }
                }
                _ => {}
            }
        }
        out
    }
}

impl fmt::Debug for PluginSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// A document holding one empty paragraph.
fn is_empty_doc(state: &EditorState) -> bool {
    let doc = state.doc();
    doc.child_count() == 1
        && doc.child(0).node_type() == NodeType::Paragraph
        && doc.child(0).content_size() == 0
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Assemble the editor pipeline for `schema` and `config`.
///
/// # Errors
///
/// Returns [`EditorError::Config`] if a plugin fails to build.
pub fn build_pipeline(schema: &Schema, config: &EditorConfig) -> Result<PluginSet> {
    let mut set = PluginSet::new();
    set.add("markdownInputrules", Plugin::InputRules(InputRules::markdown(schema)?))?
        .add("listIndentationKeybinds", Plugin::Keymap(keymap::list_indentation()?))?
        .add("markdownKeybinds", Plugin::Keymap(keymap::markdown(schema)?))?
        .add("submit", Plugin::Keymap(keymap::submit()?))?
        .add("shiftEnterSameAsEnter", Plugin::Keymap(keymap::shift_enter()?))?
        .add("baseKeymap", Plugin::Keymap(keymap::base()?))?
        .add(
            "placeholder",
            Plugin::Placeholder(config.placeholder.clone().unwrap_or_default()),
        )?
        .add(
            "history",
            Plugin::History {
                depth: config.history_depth,
            },
        )?
        .add("historyKeymap", Plugin::Keymap(keymap::history()?))?
        .add("disabled", Plugin::Disabled)?
        .add("dropCursor", Plugin::DropCursor)?;
    tracing::debug!(plugins = set.len(), "plugin pipeline built");
    Ok(set)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
