//! Property tests for the host-facing contract.

use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;
use scribe_editor::{DocumentEngine, Driver, EditorConfig, HeadlessSurface, KeyCode, KeyEvent, MarkdownEngine};

fn editor(value: &str) -> Driver {
    Driver::build(HeadlessSurface::new(), EditorConfig::new(value)).unwrap()
}

/// A line of lowercase words separated by single spaces.
fn arb_words() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z]{1,6}", 1..5).prop_map(|words| words.join(" "))
}

/// A word that may carry markdown punctuation, or a span of emphasis or
/// code around a plain word.
fn arb_token() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-z0-9#>+.-]{1,6}",
        1 => "[a-z0-9]{1,4}".prop_map(|w| format!("*{w}*")),
        1 => "[a-z0-9]{1,4}".prop_map(|w| format!("**{w}**")),
        1 => "[a-z0-9]{1,4}".prop_map(|w| format!("_{w}_")),
        1 => "[a-z0-9]{1,4}".prop_map(|w| format!("`{w}`")),
        1 => prop::sample::select(vec!["*", "_", "\t", "--", "1."]).prop_map(String::from),
    ]
}

/// Inline text: a plain first word so the line opens no block by itself.
fn arb_inline() -> impl Strategy<Value = String> {
    ("[a-z]{1,6}", prop::collection::vec(arb_token(), 0..5)).prop_map(|(first, rest)| {
        let mut line = first;
        for token in rest {
            line.push(' ');
            line.push_str(&token);
        }
        line
    })
}

/// How a source line may open. Lists are left out.
fn arb_prefix() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["", "", "", " ", "  ", "   ", "# ", "### ", "> ", "    ", "\t"])
}

/// Like [`arb_prefix`], with list markers.
fn arb_block_prefix() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        3 => arb_prefix(),
        1 => prop::sample::select(vec!["* ", "- ", "+ ", "1. ", "3. ", "  - ", "> * "]),
    ]
}

fn arb_lines(prefix: BoxedStrategy<&'static str>) -> impl Strategy<Value = String> {
    let line = prop_oneof![
        8 => (prefix, arb_inline()).prop_map(|(prefix, body)| format!("{prefix}{body}")),
        1 => Just("---".to_string()),
    ]
    .boxed();
    let sep = prop::sample::select(vec!["\n", "\n\n"]);
    (line.clone(), prop::collection::vec((sep, line), 0..4)).prop_map(|(first, rest)| {
        let mut text = first;
        for (sep, line) in rest {
            text.push_str(sep);
            text.push_str(&line);
        }
        text
    })
}

/// Paragraphs, headings, quotes and code; no lists.
fn arb_text() -> impl Strategy<Value = String> {
    arb_lines(arb_prefix().boxed())
}

/// Markdown source using every block the editor knows.
fn arb_source() -> impl Strategy<Value = String> {
    arb_lines(arb_block_prefix().boxed())
}

proptest! {
    /// Inserting text into an empty editor gives the document the text
    /// parses to.
    #[test]
    fn prop_insert_into_empty_matches_parse(text in arb_source()) {
        let mut driver = editor("");
        driver.insert_at(0, &text).unwrap();
        let engine = MarkdownEngine::default();
        let state = driver.state().unwrap();
        prop_assert_eq!(state.doc(), &engine.parse(&text));
        prop_assert_eq!(driver.content().unwrap(), engine.serialize(&engine.parse(&text)));
    }

    /// Parsed documents survive being written out and read back.
    #[test]
    fn prop_parse_serialize_parse_is_stable(text in arb_source()) {
        let engine = MarkdownEngine::default();
        let doc = engine.parse(&text);
        let out = engine.serialize(&doc);
        prop_assert_eq!(&engine.parse(&out), &doc, "source {:?} written as {:?}", text, out);
    }

    /// Documents built by insertions survive a serialize/parse round trip.
    #[test]
    fn prop_round_trip_after_insertions(
        edits in prop::collection::vec((any::<usize>(), arb_text()), 1..6),
    ) {
        let mut driver = editor("");
        for (at, text) in edits {
            let len = driver.flat_text().unwrap().chars().count();
            driver.insert_at(at % (len + 1), &text).unwrap();
        }
        let engine = MarkdownEngine::default();
        let state = driver.state().unwrap();
        let reparsed = engine.parse(&engine.serialize(state.doc()));
        prop_assert_eq!(&reparsed, state.doc());
    }

    /// Typing character by character, input rules included, never builds
    /// a document that markdown cannot hold.
    #[test]
    fn prop_typed_text_round_trips(
        prefix in arb_block_prefix(),
        lines in prop::collection::vec(arb_inline(), 1..4),
    ) {
        let mut driver = editor("");
        for (i, line) in lines.iter().enumerate() {
            if i == 0 {
                for c in prefix.chars() {
                    prop_assert!(driver.handle_text_input(&c.to_string()).unwrap());
                }
            } else {
                driver.handle_key(KeyEvent::plain(KeyCode::Enter)).unwrap();
            }
            for c in line.chars() {
                prop_assert!(driver.handle_text_input(&c.to_string()).unwrap());
            }
        }
        let engine = MarkdownEngine::default();
        let state = driver.state().unwrap();
        let out = driver.content().unwrap();
        prop_assert_eq!(&out, &engine.serialize(state.doc()));
        prop_assert_eq!(&engine.parse(&out), state.doc(), "typed text written as {:?}", out);
    }

    /// The host hears about every transaction, and the last thing it hears
    /// is the current content.
    #[test]
    fn prop_every_dispatch_notifies(lines in prop::collection::vec(arb_words(), 1..6)) {
        let calls = Rc::new(Cell::new(0_u64));
        let last = Rc::new(std::cell::RefCell::new(String::new()));
        let (count, text) = (Rc::clone(&calls), Rc::clone(&last));
        let config = EditorConfig::new("").with_on_input(move |t| {
            count.set(count.get() + 1);
            *text.borrow_mut() = t.to_string();
        });
        let mut driver = Driver::build(HeadlessSurface::new(), config).unwrap();
        for line in &lines {
            driver.insert_at_cursor(line).unwrap();
        }
        prop_assert_eq!(calls.get(), driver.dispatched().unwrap());
        prop_assert_eq!(calls.get(), 2 * lines.len() as u64);
        prop_assert_eq!(last.borrow().clone(), driver.content().unwrap());
    }

    /// Selections come back ordered.
    #[test]
    fn prop_selection_is_ordered(a in 0_usize..=8, b in 0_usize..=8) {
        let mut driver = editor("abc\n\n> defg");
        driver.set_selection_range(a, b).unwrap();
        prop_assert_eq!(driver.selection_range().unwrap(), (a.min(b), a.max(b)));
    }

    /// Toggling the disabled flag never touches the content.
    #[test]
    fn prop_disabled_is_content_neutral(text in arb_source(), flag in any::<bool>()) {
        let mut driver = editor(&text);
        let before = driver.content().unwrap();
        driver.set_disabled(flag).unwrap();
        prop_assert_eq!(driver.content().unwrap(), before);
        prop_assert_eq!(driver.is_disabled().unwrap(), flag);
    }

    /// Offsets past the end are rejected, whatever the operation.
    #[test]
    fn prop_out_of_range_is_rejected(text in arb_source(), extra in 1_usize..10) {
        let mut driver = editor(&text);
        let len = driver.flat_text().unwrap().chars().count();
        let bad = len + extra;
        prop_assert!(driver.insert_at(bad, "x").is_err());
        prop_assert!(driver.move_cursor_to(bad).is_err());
        prop_assert!(driver.set_selection_range(0, bad).is_err());
        prop_assert!(driver.caret_coordinates(bad).is_err());
        prop_assert_eq!(driver.dispatched().unwrap(), 0);
    }
}
