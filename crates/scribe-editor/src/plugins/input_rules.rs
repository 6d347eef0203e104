//! Markdown input rules.
//!
//! When text is typed, the textblock's text before the cursor plus the new
//! text is matched against each rule's pattern. Every pattern is anchored
//! at the end (`$`), so a rule fires at the moment its last character is
//! typed. The first rule that matches *and* produces a valid transaction
//! wins; that transaction replaces the plain insertion.
//!
//! | pattern                   | effect                                  |
//! |---------------------------|-----------------------------------------|
//! | `--`                      | em dash                                 |
//! | `...`                     | ellipsis                                |
//! | `"` / `'`                 | curly quotes, opening or closing        |
//! | `> ` at block start       | wrap in blockquote                      |
//! | `- ` `+ ` `* `            | wrap in bullet list                     |
//! | `N. `                     | wrap in ordered list starting at `N`    |
//! | `` ``` ``                 | turn into code block                    |
//! | `#`..`######` + space     | turn into heading of that level         |
//!
//! Rules never fire inside code blocks.
//!
//! The transaction of a rule that fires remembers the typed text it
//! replaced. Until the next change, [`undo_input_rule`] (bound to
//! `Backspace`) reverts the rule and inserts that text as typed.

use regex::{Captures, Regex};
use scribe_model::{NodeKind, NodeType, Schema, Step};

use crate::commands::{Outcome, Wrapper, set_block_type, wrap_range};
use crate::error::{EditorError, Result};
use crate::plugins::history;
use crate::state::{EditorState, Selection, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    /// Replace the match, or only its first group when it has one.
    Text(&'static str),
    Wrap(Wrapper),
    /// Ordered list numbered from the first group.
    OrderedList,
    CodeBlock,
    /// Heading whose level is the length of the first group.
    Heading,
}

#[derive(Debug, Clone)]
struct InputRule {
    name: &'static str,
    pattern: Regex,
    action: Action,
}

/// An ordered set of input rules.
#[derive(Debug, Clone, Default)]
pub struct InputRules {
    rules: Vec<InputRule>,
}

const QUOTE_OPENERS: &str = r#"(?:^|[\s{\[(<'"‘“])"#;

impl InputRules {
    /// The markdown rule set, limited to the nodes `schema` allows.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Config`] if a pattern fails to compile.
    pub fn markdown(schema: &Schema) -> Result<Self> {
        let mut table: Vec<(&'static str, String, Action)> = vec![
            ("emDash", "--$".into(), Action::Text("—")),
            ("ellipsis", r"\.\.\.$".into(), Action::Text("…")),
            ("openDoubleQuote", format!(r#"{QUOTE_OPENERS}(")$"#), Action::Text("“")),
            ("closeDoubleQuote", r#""$"#.into(), Action::Text("”")),
            ("openSingleQuote", format!("{QUOTE_OPENERS}(')$"), Action::Text("‘")),
            ("closeSingleQuote", "'$".into(), Action::Text("’")),
        ];
        let blocks = [
            (NodeType::Blockquote, "blockquote", r"^\s*>\s$", Action::Wrap(Wrapper::Blockquote)),
            (NodeType::OrderedList, "orderedList", r"^(\d+)\.\s$", Action::OrderedList),
            (NodeType::BulletList, "bulletList", r"^\s*([-+*])\s$", Action::Wrap(Wrapper::BulletList)),
            (NodeType::CodeBlock, "codeBlock", r"^```$", Action::CodeBlock),
            (NodeType::Heading, "heading", r"^(#{1,6})\s$", Action::Heading),
        ];
        for (ty, name, pattern, action) in blocks {
            if schema.allows_node(ty) {
                table.push((name, pattern.into(), action));
            }
        }
        let rules = table
            .into_iter()
            .map(|(name, pattern, action)| {
                let pattern = Regex::new(&pattern)
                    .map_err(|e| EditorError::Config(format!("input rule `{name}`: {e}")))?;
                Ok(InputRule {
                    name,
                    pattern,
                    action,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The transaction for typing `text` over `from..to`, if a rule fires.
    #[must_use]
    pub fn handle(&self, state: &EditorState, from: usize, to: usize, text: &str) -> Option<Transaction> {
        let r = state.doc().resolve(from).ok()?;
        let parent = r.parent();
        if !parent.is_textblock() || parent.node_type().is_code() || to > r.end(r.depth()) {
            return None;
        }
        let mut before = parent.text_between(0, r.parent_offset(), "", Some("\u{fffc}"));
        before.push_str(text);
        let typed = text.chars().count();
        self.rules.iter().find_map(|rule| {
            let caps = rule.pattern.captures(&before)?;
            let matched = before[caps.get(0)?.start()..].chars().count();
            let start = from.checked_sub(matched.checked_sub(typed)?)?;
            let mut tr = state.tr();
            match apply(&mut tr, rule.action, &caps, start, to) {
                Ok(true) => {
                    tracing::debug!(rule = rule.name, start, "input rule fired");
                    tr.set_rule_input(RuleInput {
                        from,
                        to,
                        text: text.to_string(),
                    });
                    Some(tr)
                }
                Ok(false) => None,
                Err(err) => {
                    tracing::debug!(rule = rule.name, %err, "input rule did not apply");
                    None
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Undo
// ---------------------------------------------------------------------------

/// What the user typed before a rule turned it into something else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleInput {
    pub from: usize,
    pub to: usize,
    pub text: String,
}

/// A rule application that can still be taken back.
#[derive(Debug, Clone)]
pub struct AppliedRule {
    /// Steps reverting the rule, latest first.
    steps: Vec<Step>,
    input: RuleInput,
}

impl AppliedRule {
    pub(crate) fn record(tr: &Transaction) -> Option<Self> {
        let input = tr.rule_input()?.clone();
        let steps = history::invert(tr)?;
        Some(Self { steps, input })
    }

    #[must_use]
    pub const fn input(&self) -> &RuleInput {
        &self.input
    }
}

/// Revert the input rule applied by the last transaction and insert the
/// typed text in its place.
#[must_use]
pub fn undo_input_rule(state: &EditorState) -> Outcome {
    let Some(applied) = state.fields().input_rule.as_ref() else {
        return Outcome::Pass;
    };
    let RuleInput { from, to, text } = &applied.input;
    let mut tr = state.tr();
    for step in &applied.steps {
        if let Err(err) = tr.step(step.clone()) {
            tracing::debug!(%err, "input rule no longer reverts");
            return Outcome::Pass;
        }
    }
    if let Err(err) = tr.insert_text(text, *from, *to, None) {
        tracing::debug!(%err, "typed text no longer fits");
        return Outcome::Pass;
    }
    tr.set_selection(Selection::cursor(from + text.chars().count()))
        .scroll_into_view();
    Outcome::Apply(tr)
}

fn apply(tr: &mut Transaction, action: Action, caps: &Captures<'_>, start: usize, end: usize) -> Result<bool> {
    match action {
        Action::Text(replacement) => {
            let (mut start, mut insert) = (start, replacement.to_string());
            if let (Some(whole), Some(group)) = (caps.get(0), caps.get(1)) {
                start += whole.as_str()[..group.start() - whole.start()].chars().count();
                insert.push_str(&whole.as_str()[group.end() - whole.start()..]);
            }
            tr.insert_text(&insert, start, end, None)?;
            Ok(true)
        }
        Action::Wrap(wrapper) => {
            tr.delete(start, end)?;
            wrap_range(tr, start, start, wrapper)
        }
        Action::OrderedList => {
            let order = caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(1);
            tr.delete(start, end)?;
            wrap_range(tr, start, start, Wrapper::OrderedList(order))
        }
        Action::CodeBlock => {
            tr.delete(start, end)?;
            set_block_type(tr, start, start, &NodeKind::CodeBlock { params: String::new() })
        }
        Action::Heading => {
            let level = caps
                .get(1)
                .and_then(|m| u8::try_from(m.as_str().len()).ok())
                .unwrap_or(1);
            tr.delete(start, end)?;
            set_block_type(tr, start, start, &NodeKind::Heading { level })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{Plugin, PluginSet};
    use pretty_assertions::assert_eq;
    use scribe_model::{MarkSet, Node, NodeSet};
    use std::rc::Rc;

    fn rules() -> InputRules {
        InputRules::markdown(&Schema::markdown()).unwrap()
    }

    fn inline(text: &str) -> Vec<Node> {
        if text.is_empty() { vec![] } else { vec![Node::text(text, vec![])] }
    }

    /// Type `text` at the end of `block`, the only block of the document.
    fn type_in(block: Node, text: &str) -> Option<EditorState> {
        let end = 1 + block.content_size();
        let s = EditorState::create(
            Node::doc(vec![block]),
            Schema::markdown(),
            Rc::new(PluginSet::new()),
            false,
        );
        let mut tr = s.tr();
        tr.set_selection(Selection::cursor(end));
        let s = s.apply(&tr).unwrap();
        rules()
            .handle(&s, end, end, text)
            .map(|tr| s.apply(&tr).unwrap())
    }

    /// Type `text` after the paragraph text `before`.
    fn type_into(before: &str, text: &str) -> Option<EditorState> {
        type_in(Node::paragraph(inline(before)), text)
    }

    // -- Text rules ---------------------------------------------------------

    #[test]
    fn dashes_and_ellipsis() {
        assert_eq!(type_into("a-", "-").unwrap().doc().text_content(), "a—");
        assert_eq!(type_into("wait..", ".").unwrap().doc().text_content(), "wait…");
        assert!(type_into("a", "-").is_none());
    }

    #[test]
    fn smart_quotes_open_and_close() {
        let opened = type_into("say ", "\"").unwrap();
        assert_eq!(opened.doc().text_content(), "say “");
        let closed = type_into("say “hi", "\"").unwrap();
        assert_eq!(closed.doc().text_content(), "say “hi”");
        assert_eq!(type_into("it", "'").unwrap().doc().text_content(), "it’");
        assert_eq!(type_into("(", "'").unwrap().doc().text_content(), "(‘");
    }

    #[test]
    fn cursor_follows_replacement() {
        let s = type_into("a-", "-").unwrap();
        assert_eq!(s.selection(), Selection::cursor(3));
    }

    // -- Block rules --------------------------------------------------------

    #[test]
    fn quote_and_lists() {
        let quoted = type_into(">", " ").unwrap();
        assert_eq!(quoted.doc().child(0).node_type(), NodeType::Blockquote);
        assert_eq!(quoted.selection(), Selection::cursor(2));

        let bullets = type_into("-", " ").unwrap();
        assert_eq!(bullets.doc().child(0).node_type(), NodeType::BulletList);
        assert_eq!(bullets.selection(), Selection::cursor(3));

        let ordered = type_into("7.", " ").unwrap();
        assert_eq!(
            ordered.doc().child(0).kind(),
            &NodeKind::OrderedList { order: 7, tight: true }
        );
    }

    #[test]
    fn headings_and_code() {
        let heading = type_into("###", " ").unwrap();
        assert_eq!(heading.doc().child(0).kind(), &NodeKind::Heading { level: 3 });
        assert_eq!(heading.doc().child(0).content_size(), 0);

        let code = type_into("``", "`").unwrap();
        assert_eq!(code.doc().child(0).node_type(), NodeType::CodeBlock);
        assert!(type_into("#######", " ").is_none());
    }

    #[test]
    fn block_rules_need_block_start() {
        assert!(type_into("a >", " ").is_none());
        assert!(type_into("x -", " ").is_none());
    }

    #[test]
    fn no_rules_in_code() {
        let code = Node::new(
            NodeKind::CodeBlock { params: String::new() },
            scribe_model::Fragment::from_vec(inline("a-")),
        );
        assert!(type_in(code, "-").is_none());
    }

    #[test]
    fn restricted_schema_drops_block_rules() {
        let schema = Schema::markdown()
            .without_nodes(NodeSet::HEADING | NodeSet::CODE_BLOCK)
            .unwrap()
            .without_marks(MarkSet::empty());
        assert_eq!(InputRules::markdown(&schema).unwrap().len(), rules().len() - 2);
    }

    // -- Undo ---------------------------------------------------------------

    /// Type `text` through a pipeline holding the markdown rules.
    fn typed(before: &str, text: &str) -> EditorState {
        let mut plugins = PluginSet::new();
        plugins.add("rules", Plugin::InputRules(rules())).unwrap();
        let s = EditorState::create(
            Node::doc(vec![Node::paragraph(inline(before))]),
            Schema::markdown(),
            Rc::new(plugins),
            false,
        );
        let end = 1 + before.chars().count();
        let mut tr = s.tr();
        tr.set_selection(Selection::cursor(end));
        let s = s.apply(&tr).unwrap();
        let tr = rules().handle(&s, end, end, text).unwrap();
        s.apply(&tr).unwrap()
    }

    fn undone(s: &EditorState) -> EditorState {
        match undo_input_rule(s) {
            Outcome::Apply(tr) => s.apply(&tr).unwrap(),
            other => panic!("nothing undone: {other:?}"),
        }
    }

    #[test]
    fn undo_restores_typed_text() {
        let s = typed("a-", "-");
        assert_eq!(s.doc().text_content(), "a—");
        assert_eq!(s.fields().input_rule.as_ref().unwrap().input().text, "-");
        let back = undone(&s);
        assert_eq!(back.doc().text_content(), "a--");
        assert_eq!(back.selection(), Selection::cursor(4));
        assert!(back.fields().input_rule.is_none());
    }

    #[test]
    fn undo_unwraps_block_rule() {
        let s = typed("#", " ");
        assert_eq!(s.doc().child(0).kind(), &NodeKind::Heading { level: 1 });
        let back = undone(&s);
        assert_eq!(back.doc().child(0), &Node::paragraph(inline("# ")));
        assert_eq!(back.selection(), Selection::cursor(3));
    }

    #[test]
    fn any_other_change_forgets_the_rule() {
        let s = typed("a-", "-");
        let mut tr = s.tr();
        tr.set_selection(Selection::cursor(1));
        let moved = s.apply(&tr).unwrap();
        assert!(undo_input_rule(&moved).is_pass());
    }
}
