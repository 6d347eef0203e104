//! Keymaps and the catalog of built-in bindings.
//!
//! A [`Keymap`] maps chords to commands. Within one keymap each chord is
//! bound once; across keymaps the pipeline order decides, and a command
//! that passes lets later keymaps see the key.

use std::fmt;

use scribe_model::{Mark, NodeKind, Schema};

use crate::commands::{self, Command, Outcome, Wrapper, command};
use crate::error::{EditorError, Result};
use crate::keys::{KeyChord, KeyEvent};
use crate::plugins::{history, input_rules};
use crate::state::EditorState;

/// Chord-to-command bindings.
#[derive(Default, Clone)]
pub struct Keymap {
    bindings: Vec<(KeyChord, Command)>,
}

impl Keymap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `chord` (e.g. `"Mod-b"`) to `cmd`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Config`] if the chord does not parse or is
    /// already bound in this keymap.
    pub fn bind(mut self, chord: &str, cmd: Command) -> Result<Self> {
        let parsed = KeyChord::parse(chord)?;
        if self.bindings.iter().any(|(c, _)| *c == parsed) {
            return Err(EditorError::Config(format!("`{chord}` bound twice")));
        }
        self.bindings.push((parsed, cmd));
        Ok(self)
    }

    /// Run the command bound to `event`, if any.
    #[must_use]
    pub fn handle(&self, state: &EditorState, event: &KeyEvent) -> Outcome {
        self.bindings
            .iter()
            .find(|(chord, _)| chord.matches(event))
            .map_or(Outcome::Pass, |(_, cmd)| cmd(state))
    }

    pub fn chords(&self) -> impl Iterator<Item = &KeyChord> {
        self.bindings.iter().map(|(chord, _)| chord)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl fmt::Debug for Keymap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.bindings.iter().map(|(chord, _)| chord.to_string()))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// `Ctrl-m` indents the list item, `Ctrl-Shift-m` outdents it.
///
/// # Errors
///
/// Only if a chord in the table fails to parse.
pub fn list_indentation() -> Result<Keymap> {
    Keymap::new()
        .bind("Ctrl-m", command(commands::sink_list_item))?
        .bind("Ctrl-Shift-m", command(commands::lift_list_item))
}

/// Formatting bindings for the marks and nodes `schema` allows.
///
/// # Errors
///
/// Only if a chord in the table fails to parse.
pub fn markdown(schema: &Schema) -> Result<Keymap> {
    let mut keymap = Keymap::new();
    for (chord, mark) in [("Mod-b", Mark::Strong), ("Mod-i", Mark::Em), ("Mod-`", Mark::Code)] {
        if schema.allows_mark(mark.mark_type()) {
            keymap = keymap.bind(chord, commands::toggle_mark(mark))?;
        }
    }
    keymap = keymap
        .bind("Shift-Ctrl-0", commands::set_block(NodeKind::Paragraph))?
        .bind(
            "Shift-Ctrl-\\",
            commands::set_block(NodeKind::CodeBlock {
                params: String::new(),
            }),
        )?
        .bind("Ctrl->", commands::wrap_in(Wrapper::Blockquote))?
        .bind("Shift-Ctrl-8", commands::wrap_in(Wrapper::BulletList))?
        .bind("Shift-Ctrl-9", commands::wrap_in(Wrapper::OrderedList(1)))?
        .bind("Mod-[", command(commands::lift_list_item))?
        .bind("Mod-]", command(commands::sink_list_item))?
        .bind("Enter", command(commands::split_list_item))?
        .bind("Backspace", command(input_rules::undo_input_rule))?
        .bind("Mod-_", command(commands::insert_horizontal_rule))?
        .bind("Alt-ArrowUp", command(commands::join_up))?
        .bind("Alt-ArrowDown", command(commands::join_down))?;
    for level in 1..=6_u8 {
        keymap = keymap.bind(
            &format!("Shift-Ctrl-{level}"),
            commands::set_block(NodeKind::Heading { level }),
        )?;
    }
    Ok(keymap)
}

/// `Mod-Enter` hands the content to the submit callback.
///
/// # Errors
///
/// Only if a chord in the table fails to parse.
pub fn submit() -> Result<Keymap> {
    Keymap::new().bind("Mod-Enter", command(|_| Outcome::Submit))
}

/// `Shift-Enter` behaves like `Enter`.
///
/// # Errors
///
/// Only if a chord in the table fails to parse.
pub fn shift_enter() -> Result<Keymap> {
    Keymap::new().bind("Shift-Enter", command(commands::enter))
}

/// Basic editing: newlines, deletion, select-all, and `Escape` to select
/// the enclosing block.
///
/// # Errors
///
/// Only if a chord in the table fails to parse.
pub fn base() -> Result<Keymap> {
    Keymap::new()
        .bind("Enter", command(commands::enter))?
        .bind("Backspace", command(commands::backspace))?
        .bind("Mod-Backspace", command(commands::backspace))?
        .bind("Shift-Backspace", command(commands::backspace))?
        .bind("Delete", command(commands::delete))?
        .bind("Mod-Delete", command(commands::delete))?
        .bind("Mod-a", command(commands::select_all))?
        .bind("Escape", command(commands::select_parent_node))
}

/// `Mod-z` undoes, `Mod-y` and `Mod-Shift-z` redo.
///
/// # Errors
///
/// Only if a chord in the table fails to parse.
pub fn history() -> Result<Keymap> {
    Keymap::new()
        .bind("Mod-z", command(history::undo))?
        .bind("Mod-y", command(history::redo))?
        .bind("Mod-Shift-z", command(history::redo))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
