//! Markdown conversion in both directions, backed by comrak's CommonMark
//! parser and formatter.
//!
//! [`parse`] is total: any string produces a valid document, with syntax it
//! does not recognize left as literal text. [`serialize`] writes a document
//! back out so that parsing the output yields the same tree. Formatting is
//! normalized along the way (`*` bullets, `*`/`**` emphasis, fenced code),
//! so `serialize(parse(s))` is equivalent to `s` but not byte-identical.

mod parse;
mod serialize;

use comrak::{ListStyleType, Options, RenderOptions};

pub use parse::parse;
pub use serialize::serialize;

/// The comment comrak writes between two lists that would otherwise merge.
const END_LIST_MARKER: &str = "<!-- end list -->";

fn options() -> Options<'static> {
    Options {
        render: RenderOptions {
            list_style: ListStyleType::Star,
            prefer_fenced: true,
            ..RenderOptions::default()
        },
        ..Options::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
