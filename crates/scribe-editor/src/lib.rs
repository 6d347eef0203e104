//! # scribe-editor — Editor core for scribe
//!
//! Wraps the document model in something a host can treat as a text input:
//!
//! - **[`driver`]** — `Driver`, the host-facing facade and its lifecycle
//! - **[`dispatch`]** — the transaction loop: apply, install, render, notify
//! - **[`offsets`]** — linear offsets ↔ document positions, caret cells
//! - **[`mutate`]** — inserting parsed markdown over an offset range
//! - **[`state`]** — `EditorState`, `Transaction`, `Selection`
//! - **[`plugins`]** — the ordered plugin pipeline (keymaps, input rules,
//!   history, placeholder, disabled state, drop cursor)
//! - **[`commands`]** — editing commands bound by the keymaps
//! - **[`engine`]** — the `DocumentEngine` capability and its markdown
//!   implementation
//! - **[`bridge`]** / **[`schema`]** — markdown ↔ document, schema derivation
//! - **[`surface`]** — what the editor is drawn on
//! - **[`keys`]** — key events and chord parsing
//! - **[`config`]** / **[`error`]** — the configuration bundle and errors

pub mod bridge;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod engine;
pub mod error;
pub mod keys;
pub mod mutate;
pub mod offsets;
pub mod plugins;
pub mod schema;
pub mod state;
pub mod surface;

pub use config::EditorConfig;
pub use driver::Driver;
pub use engine::{DocumentEngine, MarkdownEngine};
pub use error::{EditorError, Result};
pub use keys::{KeyCode, KeyEvent, Modifiers};
pub use offsets::{Caret, OffsetMap};
pub use state::{EditorState, Selection, Transaction};
pub use surface::{HeadlessSurface, Surface, SurfaceCall};
