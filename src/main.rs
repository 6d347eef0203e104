// SPDX-License-Identifier: MIT
//
// scribe — a headless host for the scribe editing surface.
//
// The binary stands in for a composer UI: it mounts a Driver on a console
// surface and replays an editing script, one command per line, read from
// the file named on the command line or from stdin.
//
//   script line → ScriptCommand → Driver call → dispatch → on_input
//
// Commands:
//
//   insert <offset> <text>         insert parsed text at an offset
//   between <start> <end> <text>   replace an offset range with text
//   at-cursor <text>               insert at the cursor, replacing a selection
//   before-cursor <start> <text>   replace from an offset up to the cursor
//   cursor <offset>                collapse the selection at an offset
//   select <anchor> <head>         select an offset range
//   type <text>                    type text one character at a time
//   key <chord>                    press a key chord, e.g. `Mod-b`, `Enter`
//   drag <offset> | leave          move or clear the drop indicator
//   drop <offset> <text>           drop text at an offset
//   undo | redo | focus | destroy
//   disable | enable
//   print | flat | selection       write content, flat text or selection
//   caret <offset>                 write caret cell coordinates
//
// Text arguments understand `\n`, `\t` and `\\`. Blank lines and lines
// starting with `#` are skipped. The initial content is taken from
// SCRIBE_VALUE. Logs go to stderr, filtered by RUST_LOG.

use std::cell::RefCell;
use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::process;
use std::rc::Rc;

use regex::Regex;
use scribe_editor::keys::KeyChord;
use scribe_editor::plugins::Decoration;
use scribe_editor::{Driver, EditorConfig, EditorError, EditorState, Surface};
use tracing_subscriber::EnvFilter;

// ─── Console surface ────────────────────────────────────────────────────────

/// A surface that reports what it would draw through the log.
struct ConsoleSurface;

impl Surface for ConsoleSurface {
    fn mount(&mut self, classes: &[String]) {
        tracing::info!(?classes, "mounted");
    }

    fn update(&mut self, state: &EditorState, decorations: &[Decoration]) {
        let selection = state.selection();
        tracing::debug!(
            version = state.version(),
            doc_size = state.doc().content_size(),
            anchor = selection.anchor(),
            head = selection.head(),
            ?decorations,
            "render"
        );
    }

    fn focus(&mut self) {
        tracing::debug!("focus");
    }

    fn destroy(&mut self) {
        tracing::info!("unmounted");
    }
}

// ─── Script commands ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScriptCommand {
    /// `insert <offset> <text>`
    Insert { offset: usize, text: String },
    /// `between <start> <end> <text>`
    Between { start: usize, end: usize, text: String },
    /// `at-cursor <text>`
    AtCursor(String),
    /// `before-cursor <start> <text>`
    BeforeCursor { start: usize, text: String },
    Cursor(usize),
    Select { anchor: usize, head: usize },
    /// Typed one character at a time, so input rules fire.
    Type(String),
    Key(KeyChord),
    Drag(usize),
    Leave,
    Drop { offset: usize, text: String },
    Undo,
    Redo,
    Focus,
    Destroy,
    Disable(bool),
    Print,
    Flat,
    Selection,
    Caret(usize),
}

/// Line parser for editing scripts.
struct ScriptParser {
    line: Regex,
    one_offset: Regex,
    two_offsets: Regex,
    offset_text: Regex,
    two_offsets_text: Regex,
}

impl ScriptParser {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            line: Regex::new(r"^(?P<cmd>[a-z-]+)(?: (?P<args>.*))?$")?,
            one_offset: Regex::new(r"^(\d+)$")?,
            two_offsets: Regex::new(r"^(\d+)\s+(\d+)$")?,
            offset_text: Regex::new(r"^(\d+) (.*)$")?,
            two_offsets_text: Regex::new(r"^(\d+)\s+(\d+) (.*)$")?,
        })
    }

    /// Parse one script line. Blank lines and comments give `None`.
    fn parse(&self, raw: &str) -> Result<Option<ScriptCommand>, String> {
        let line = raw.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            return Ok(None);
        }
        let caps = self
            .line
            .captures(line.trim_start())
            .ok_or_else(|| format!("cannot read `{line}`"))?;
        let cmd = caps.name("cmd").map_or("", |m| m.as_str());
        let args = caps.name("args").map_or("", |m| m.as_str());

        let command = match cmd {
            "insert" => {
                let (offset, text) = self.offset_and_text(args)?;
                ScriptCommand::Insert { offset, text }
            }
            "between" => {
                let caps = self
                    .two_offsets_text
                    .captures(args)
                    .ok_or("expected `<start> <end> <text>`")?;
                ScriptCommand::Between {
                    start: number(&caps[1])?,
                    end: number(&caps[2])?,
                    text: unescape(&caps[3]),
                }
            }
            "at-cursor" => ScriptCommand::AtCursor(unescape(args)),
            "before-cursor" => {
                let (start, text) = self.offset_and_text(args)?;
                ScriptCommand::BeforeCursor { start, text }
            }
            "cursor" => ScriptCommand::Cursor(self.offset(args)?),
            "select" => {
                let caps = self
                    .two_offsets
                    .captures(args)
                    .ok_or("expected `<anchor> <head>`")?;
                ScriptCommand::Select {
                    anchor: number(&caps[1])?,
                    head: number(&caps[2])?,
                }
            }
            "type" => ScriptCommand::Type(unescape(args)),
            "key" => ScriptCommand::Key(KeyChord::parse(args.trim()).map_err(|e| e.to_string())?),
            "drag" => ScriptCommand::Drag(self.offset(args)?),
            "leave" => ScriptCommand::Leave,
            "drop" => {
                let (offset, text) = self.offset_and_text(args)?;
                ScriptCommand::Drop { offset, text }
            }
            "undo" => ScriptCommand::Undo,
            "redo" => ScriptCommand::Redo,
            "focus" => ScriptCommand::Focus,
            "destroy" => ScriptCommand::Destroy,
            "disable" => ScriptCommand::Disable(true),
            "enable" => ScriptCommand::Disable(false),
            "print" => ScriptCommand::Print,
            "flat" => ScriptCommand::Flat,
            "selection" => ScriptCommand::Selection,
            "caret" => ScriptCommand::Caret(self.offset(args)?),
            other => return Err(format!("unknown command `{other}`")),
        };
        Ok(Some(command))
    }

    fn offset(&self, args: &str) -> Result<usize, String> {
        let caps = self
            .one_offset
            .captures(args.trim())
            .ok_or("expected an offset")?;
        number(&caps[1])
    }

    fn offset_and_text(&self, args: &str) -> Result<(usize, String), String> {
        let caps = self
            .offset_text
            .captures(args)
            .ok_or("expected `<offset> <text>`")?;
        Ok((number(&caps[1])?, unescape(&caps[2])))
    }
}

fn number(digits: &str) -> Result<usize, String> {
    digits.parse().map_err(|e| format!("bad offset `{digits}`: {e}"))
}

/// Expand `\n`, `\t` and `\\`. Other escapes are kept as written.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

// ─── Runner ─────────────────────────────────────────────────────────────────

/// Apply one command, writing any report to `out`.
fn execute(driver: &mut Driver, command: ScriptCommand, out: &mut dyn Write) -> Result<(), String> {
    let io_err = |e: io::Error| e.to_string();
    let report = |e: EditorError| e.to_string();
    match command {
        ScriptCommand::Insert { offset, text } => driver.insert_at(offset, &text).map_err(report)?,
        ScriptCommand::Between { start, end, text } => {
            driver.insert_between(start, end, &text).map_err(report)?;
        }
        ScriptCommand::AtCursor(text) => driver.insert_at_cursor(&text).map_err(report)?,
        ScriptCommand::BeforeCursor { start, text } => {
            driver.replace_before_cursor(start, &text).map_err(report)?;
        }
        ScriptCommand::Cursor(offset) => driver.move_cursor_to(offset).map_err(report)?,
        ScriptCommand::Select { anchor, head } => {
            driver.set_selection_range(anchor, head).map_err(report)?;
        }
        ScriptCommand::Type(text) => {
            for c in text.chars() {
                if !driver.handle_text_input(&c.to_string()).map_err(report)? {
                    tracing::warn!(%c, "typed text refused");
                }
            }
        }
        ScriptCommand::Key(chord) => {
            if !driver.handle_key(chord.to_event()).map_err(report)? {
                tracing::info!(%chord, "key not handled");
            }
        }
        ScriptCommand::Drag(offset) => {
            driver.drag_over(offset).map_err(report)?;
        }
        ScriptCommand::Leave => driver.drag_leave().map_err(report)?,
        ScriptCommand::Drop { offset, text } => {
            driver.drop_text(offset, &text).map_err(report)?;
        }
        ScriptCommand::Undo => {
            driver.undo().map_err(report)?;
        }
        ScriptCommand::Redo => {
            driver.redo().map_err(report)?;
        }
        ScriptCommand::Focus => driver.focus().map_err(report)?,
        ScriptCommand::Destroy => driver.destroy().map_err(report)?,
        ScriptCommand::Disable(flag) => driver.set_disabled(flag).map_err(report)?,
        ScriptCommand::Print => {
            writeln!(out, "{}", driver.content().map_err(report)?).map_err(io_err)?;
        }
        ScriptCommand::Flat => {
            writeln!(out, "{:?}", driver.flat_text().map_err(report)?).map_err(io_err)?;
        }
        ScriptCommand::Selection => {
            let (from, to) = driver.selection_range().map_err(report)?;
            writeln!(out, "{from}..{to}").map_err(io_err)?;
        }
        ScriptCommand::Caret(offset) => {
            let caret = driver.caret_coordinates(offset).map_err(report)?;
            writeln!(out, "left={} top={} height={}", caret.left, caret.top, caret.height)
                .map_err(io_err)?;
        }
    }
    Ok(())
}

/// Run `script` against `driver`. Stops at the first failing line.
fn run_script(driver: &mut Driver, script: &str, out: &mut dyn Write) -> Result<(), String> {
    let parser = ScriptParser::new().map_err(|e| e.to_string())?;
    for (index, line) in script.lines().enumerate() {
        let lineno = index + 1;
        let Some(command) = parser.parse(line).map_err(|e| format!("line {lineno}: {e}"))? else {
            continue;
        };
        tracing::trace!(lineno, ?command, "running");
        execute(driver, command, out).map_err(|e| format!("line {lineno}: {e}"))?;
    }
    Ok(())
}

fn read_script(args: &[String]) -> io::Result<String> {
    match args.get(1).map(String::as_str) {
        Some(path) if path != "-" => fs::read_to_string(path),
        _ => {
            let mut script = String::new();
            io::stdin().read_to_string(&mut script)?;
            Ok(script)
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let script = read_script(&args).unwrap_or_else(|e| {
        eprintln!("scribe: cannot read script: {e}");
        process::exit(1);
    });

    let inputs = Rc::new(RefCell::new(0_u64));
    let counter = Rc::clone(&inputs);
    let config = EditorConfig::new(env::var("SCRIBE_VALUE").unwrap_or_default())
        .with_placeholder("Write something…")
        .with_class_names(["scribe", "console"])
        .with_on_input(move |text| {
            *counter.borrow_mut() += 1;
            tracing::debug!(len = text.len(), "content changed");
        })
        .with_on_submit(|| tracing::info!("submitted"));

    let mut driver = Driver::build(ConsoleSurface, config).unwrap_or_else(|e| {
        eprintln!("scribe: failed to build editor: {e}");
        process::exit(1);
    });

    let mut stdout = io::stdout().lock();
    if let Err(e) = run_script(&mut driver, &script, &mut stdout) {
        eprintln!("scribe: {e}");
        process::exit(1);
    }
    tracing::info!(inputs = *inputs.borrow(), "script finished");
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_editor::HeadlessSurface;

    fn parse(line: &str) -> Option<ScriptCommand> {
        ScriptParser::new().unwrap().parse(line).unwrap()
    }

    fn run(value: &str, script: &str) -> Result<String, String> {
        let mut driver = Driver::build(HeadlessSurface::new(), EditorConfig::new(value)).unwrap();
        let mut out = Vec::new();
        run_script(&mut driver, script, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    // ── Parsing ───────────────────────────────────────────────────────────

    #[test]
    fn parses_offsets_and_text() {
        assert_eq!(
            parse("insert 3 a b"),
            Some(ScriptCommand::Insert { offset: 3, text: "a b".into() })
        );
        assert_eq!(
            parse("between 1 4 x\\ny"),
            Some(ScriptCommand::Between { start: 1, end: 4, text: "x\ny".into() })
        );
        assert_eq!(parse("select 4 1"), Some(ScriptCommand::Select { anchor: 4, head: 1 }));
        assert_eq!(parse("disable"), Some(ScriptCommand::Disable(true)));
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("   # a comment"), None);
    }

    #[test]
    fn rejects_bad_lines() {
        let parser = ScriptParser::new().unwrap();
        assert!(parser.parse("explode").is_err());
        assert!(parser.parse("cursor x").is_err());
        assert!(parser.parse("key Hyper-q").is_err());
        assert!(parser.parse("insert 2").is_err());
    }

    #[test]
    fn unescape_known_sequences_only() {
        assert_eq!(unescape(r"a\nb\tc\\d\q"), "a\nb\tc\\d\\q");
        assert_eq!(unescape("trailing\\"), "trailing\\");
    }

    // ── Running ───────────────────────────────────────────────────────────

    #[test]
    fn script_edits_and_reports() {
        let script = "\
# start from nothing
insert 0 hello
type  world
selection
key Mod-z
print
caret 5
";
        let out = run("", script).unwrap();
        assert_eq!(out, "11..11\nhello\nleft=5 top=0 height=1\n");
    }

    #[test]
    fn failing_line_is_reported() {
        let err = run("ab", "cursor 1\ncursor 9\nprint\n").unwrap_err();
        assert!(err.starts_with("line 2:"), "{err}");
    }

    #[test]
    fn destroyed_editor_stops_the_script() {
        let err = run("ab", "destroy\nprint\n").unwrap_err();
        assert!(err.contains("destroyed"), "{err}");
    }
}
