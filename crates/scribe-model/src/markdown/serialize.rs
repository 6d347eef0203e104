//! Document to markdown.
//!
//! The document is rebuilt as a comrak tree and written with comrak's
//! CommonMark formatter. Flat marks are nested back into inline containers,
//! longest-running mark outermost. Text that markdown would otherwise
//! reinterpret is protected on the way in:
//!
//! - spaces and tabs at the edges of a line are written as character
//!   references, since CommonMark strips them;
//! - whitespace at the inner edge of emphasis moves outside the delimiter;
//! - a word character outside emphasis whose inner edge is punctuation is
//!   written as a reference, or the delimiter would not count as one;
//! - a leading `~` is escaped (comrak leaves it alone, but three of them
//!   open a fence) and so is every `&`.

use std::cmp::Reverse;

use comrak::nodes::{AstNode, ListDelimType, ListType, NodeCode, NodeCodeBlock, NodeHeading, NodeLink, NodeList, NodeValue};
use comrak::{Arena, format_commonmark};

use crate::node::{Fragment, Mark, Node, NodeKind, has_mark_type, remove_mark_type};
use crate::schema::MarkType;

use super::options;

/// Serialize `doc` to markdown.
#[must_use]
pub fn serialize(doc: &Node) -> String {
    let arena = Arena::new();
    let tree = Tree { arena: &arena };
    let root = tree.alloc(NodeValue::Document);
    tree.blocks(root, doc.content());

    let mut out = Vec::new();
    if let Err(err) = format_commonmark(root, &options(), &mut out) {
        tracing::warn!(%err, "markdown formatter failed");
    }
    let text = String::from_utf8_lossy(&out);
    text.trim_end_matches('\n').to_string()
}

struct Tree<'a> {
    arena: &'a Arena<AstNode<'a>>,
}

impl<'a> Tree<'a> {
    fn alloc(&self, value: NodeValue) -> &'a AstNode<'a> {
        self.arena.alloc(value.into())
    }

    fn append(&self, parent: &'a AstNode<'a>, value: NodeValue) -> &'a AstNode<'a> {
        let child = self.alloc(value);
        parent.append(child);
        child
    }

    // -- Blocks -------------------------------------------------------------

    fn blocks(&self, parent: &'a AstNode<'a>, content: &Fragment) {
        for block in content.iter() {
            self.block(parent, block);
        }
    }

    fn block(&self, parent: &'a AstNode<'a>, node: &Node) {
        match node.kind() {
            // an empty paragraph has no markdown form
            NodeKind::Paragraph if node.content().is_empty() => {}
            NodeKind::Paragraph => {
                let paragraph = self.append(parent, NodeValue::Paragraph);
                self.inline(paragraph, node.content(), false);
            }
            NodeKind::Heading { level } => {
                let heading = self.append(
                    parent,
                    NodeValue::Heading(NodeHeading {
                        level: (*level).clamp(1, 6),
                        setext: false,
                    }),
                );
                self.inline(heading, node.content(), true);
            }
            NodeKind::Blockquote => {
                let quote = self.append(parent, NodeValue::BlockQuote);
                self.blocks(quote, node.content());
            }
            NodeKind::CodeBlock { params } => {
                let mut literal = node.text_content();
                literal.push('\n');
                self.append(
                    parent,
                    NodeValue::CodeBlock(NodeCodeBlock {
                        fenced: true,
                        fence_char: b'`',
                        fence_length: 3,
                        info: params.clone(),
                        literal,
                        ..NodeCodeBlock::default()
                    }),
                );
            }
            NodeKind::HorizontalRule => {
                self.append(parent, NodeValue::ThematicBreak);
            }
            NodeKind::BulletList { tight } => self.list(parent, node, ListType::Bullet, 1, *tight),
            NodeKind::OrderedList { order, tight } => {
                let start = usize::try_from(*order).unwrap_or(1);
                self.list(parent, node, ListType::Ordered, start, *tight);
            }
            NodeKind::ListItem | NodeKind::Doc => self.blocks(parent, node.content()),
            NodeKind::Text(_) | NodeKind::Image { .. } | NodeKind::HardBreak => {
                // inline content at block level only happens in malformed
                // trees; give it a paragraph of its own
                let paragraph = self.append(parent, NodeValue::Paragraph);
                self.inline(paragraph, &Fragment::from_node(node.clone()), false);
            }
        }
    }

    fn list(&self, parent: &'a AstNode<'a>, node: &Node, list_type: ListType, start: usize, tight: bool) {
        let meta = NodeList {
            list_type,
            start,
            delimiter: ListDelimType::Period,
            bullet_char: b'*',
            tight,
            ..NodeList::default()
        };
        let list = self.append(parent, NodeValue::List(meta));
        for child in node.content().iter() {
            let item = self.append(list, NodeValue::Item(meta));
            match child.kind() {
                NodeKind::ListItem => self.blocks(item, child.content()),
                _ => self.block(item, child),
            }
        }
    }

    // -- Inline -------------------------------------------------------------

    fn inline(&self, parent: &'a AstNode<'a>, content: &Fragment, heading: bool) {
        let runs = runs(content, heading);
        let mut writer = InlineWriter::new(self, parent);
        for i in 0..runs.len() {
            writer.run(&runs[i..]);
        }
        writer.finish();
    }

    /// Image alt text, with `&` escaped as in body text.
    fn alt(&self, image: &'a AstNode<'a>, alt: &str) {
        for (i, part) in alt.split('&').enumerate() {
            if i > 0 {
                self.append(image, NodeValue::Raw("\\&".to_string()));
            }
            if !part.is_empty() {
                self.append(image, NodeValue::Text(part.to_string()));
            }
        }
    }

    /// Move the last character of a text node into a reference after it.
    fn reference_last_char(&self, node: &'a AstNode<'a>) {
        let popped = match &mut node.data.borrow_mut().value {
            NodeValue::Text(text) => text.pop(),
            _ => None,
        };
        if let Some(c) = popped {
            node.insert_after(self.alloc(NodeValue::Raw(reference(c))));
        }
    }
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

/// One inline item and the marks it carries. Code is a piece of its own
/// rather than a mark since comrak has no code container.
struct Run {
    marks: Vec<Mark>,
    piece: Piece,
}

enum Piece {
    Text(String),
    Code(String),
    SoftBreak,
    HardBreak,
    Image {
        src: String,
        alt: Option<String>,
        title: Option<String>,
    },
}

impl Piece {
    const fn is_break(&self) -> bool {
        matches!(self, Self::SoftBreak | Self::HardBreak)
    }
}

/// Flatten inline content into runs. Paragraph text is split at `\n` into
/// soft breaks; a heading is a single line, so its newlines stay in the
/// text and come out as character references.
fn runs(content: &Fragment, heading: bool) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for node in content.iter() {
        let code = has_mark_type(node.marks(), MarkType::Code);
        let marks = remove_mark_type(node.marks(), MarkType::Code);
        match node.kind() {
            NodeKind::Text(text) if code => {
                if !text.is_empty() {
                    runs.push(Run {
                        marks,
                        piece: Piece::Code(text.replace('\n', " ")),
                    });
                }
            }
            NodeKind::Text(text) if heading => runs.push(Run {
                marks,
                piece: Piece::Text(text.clone()),
            }),
            NodeKind::Text(text) => {
                for (i, line) in text.split('\n').enumerate() {
                    if i > 0 {
                        runs.push(Run {
                            marks: marks.clone(),
                            piece: Piece::SoftBreak,
                        });
                    }
                    if !line.is_empty() {
                        runs.push(Run {
                            marks: marks.clone(),
                            piece: Piece::Text(line.to_string()),
                        });
                    }
                }
            }
            NodeKind::HardBreak if heading => runs.push(Run {
                marks,
                piece: Piece::Text("\n".to_string()),
            }),
            NodeKind::HardBreak => runs.push(Run {
                marks,
                piece: Piece::HardBreak,
            }),
            NodeKind::Image { src, alt, title } => runs.push(Run {
                marks,
                piece: Piece::Image {
                    src: src.clone(),
                    alt: alt.clone(),
                    title: title.clone(),
                },
            }),
            _ => {
                let text = node.text_content();
                if !text.is_empty() {
                    runs.push(Run {
                        marks,
                        piece: Piece::Text(text),
                    });
                }
            }
        }
    }

    // a mark only spans a line break when the text on both sides has it
    for i in 0..runs.len() {
        if runs[i].piece.is_break() {
            let prev = i.checked_sub(1).map(|p| runs[p].marks.clone()).unwrap_or_default();
            let next = runs.get(i + 1).map(|r| r.marks.clone()).unwrap_or_default();
            runs[i].marks.retain(|m| prev.contains(m) && next.contains(m));
        }
    }
    runs
}

const fn expels(mark: &Mark) -> bool {
    matches!(mark, Mark::Em | Mark::Strong)
}

const fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t')
}

fn reference(c: char) -> String {
    format!("&#{};", u32::from(c))
}

/// How a character next to an emphasis delimiter counts for the flanking
/// rules. Control characters are written as references, so they count as
/// punctuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flank {
    Space,
    Punct,
    Word,
}

fn flank(c: char) -> Flank {
    if c.is_control() {
        Flank::Punct
    } else if c.is_whitespace() {
        Flank::Space
    } else if c.is_alphanumeric() {
        Flank::Word
    } else {
        Flank::Punct
    }
}

/// A run of `*` delimiters written with nothing between them yet.
struct Delims<'a> {
    before: Flank,
    /// The text node ending in the character before the run, if it ends in
    /// a word character.
    before_text: Option<&'a AstNode<'a>>,
    opens: bool,
    closes: bool,
}

// ---------------------------------------------------------------------------
// InlineWriter
// ---------------------------------------------------------------------------

struct InlineWriter<'a, 't> {
    tree: &'t Tree<'a>,
    root: &'a AstNode<'a>,
    /// Open mark containers, outermost first.
    open: Vec<(Mark, &'a AstNode<'a>)>,
    /// Nothing has been written on the current line yet.
    line_start: bool,
    /// Class of the last character written.
    last: Flank,
    last_text: Option<&'a AstNode<'a>>,
    delims: Option<Delims<'a>>,
}

impl<'a, 't> InlineWriter<'a, 't> {
    const fn new(tree: &'t Tree<'a>, root: &'a AstNode<'a>) -> Self {
        Self {
            tree,
            root,
            open: Vec::new(),
            line_start: true,
            last: Flank::Space,
            last_text: None,
            delims: None,
        }
    }

    fn top(&self) -> &'a AstNode<'a> {
        self.open.last().map_or(self.root, |(_, node)| *node)
    }

    /// Write `runs[0]`; the rest is lookahead.
    fn run(&mut self, runs: &[Run]) {
        let run = &runs[0];
        let next = runs.get(1);
        let line_end = next.is_none_or(|next| next.piece.is_break());

        let keep = self
            .open
            .iter()
            .take_while(|(mark, _)| run.marks.contains(mark))
            .count();
        self.close_to(keep);

        // marks that run on longest open first
        let mut opening: Vec<Mark> = run
            .marks
            .iter()
            .filter(|mark| !self.open.iter().any(|(open, _)| open == *mark))
            .cloned()
            .collect();
        opening.sort_by_key(|mark| Reverse(runs.iter().take_while(|r| r.marks.contains(mark)).count()));

        match &run.piece {
            Piece::Text(text) => {
                let mut text = text.as_str();
                if opening.last().is_some_and(expels) {
                    let rest = text.trim_start();
                    self.text(&text[..text.len() - rest.len()], line_end && rest.is_empty());
                    text = rest;
                }
                if text.is_empty() {
                    return;
                }
                self.open(opening);

                let next_marks = next.map_or(&[][..], |next| next.marks.as_slice());
                let staying = self
                    .open
                    .iter()
                    .take_while(|(mark, _)| next_marks.contains(mark))
                    .count();
                let closes_emphasis = self.open.len() > staying && self.open.last().is_some_and(|(mark, _)| expels(mark));
                let body = text.trim_end();
                if closes_emphasis && body.len() < text.len() {
                    self.text(body, false);
                    while self.open.len() > staying && self.open.last().is_some_and(|(mark, _)| expels(mark)) {
                        self.close_to(self.open.len() - 1);
                    }
                    self.text(&text[body.len()..], line_end);
                } else {
                    self.text(text, line_end);
                }
            }
            Piece::Code(code) => {
                self.open(opening);
                self.punct();
                self.tree.append(
                    self.top(),
                    NodeValue::Code(NodeCode {
                        num_backticks: 1,
                        literal: code.clone(),
                    }),
                );
                self.line_start = false;
            }
            Piece::Image { src, alt, title } => {
                self.open(opening);
                self.punct();
                let image = self.tree.append(
                    self.top(),
                    NodeValue::Image(NodeLink {
                        url: src.clone(),
                        title: title.clone().unwrap_or_default(),
                    }),
                );
                if let Some(alt) = alt {
                    self.tree.alt(image, alt);
                }
                self.line_start = false;
            }
            Piece::SoftBreak if self.line_start || next.is_none() => {
                // a real break here would end the paragraph or vanish
                self.raw("&#10;");
                self.line_start = false;
            }
            Piece::SoftBreak => {
                self.open(opening);
                self.settle(Flank::Space);
                self.tree.append(self.top(), NodeValue::SoftBreak);
                self.break_line();
            }
            Piece::HardBreak => {
                self.open(opening);
                self.settle(Flank::Punct);
                self.tree.append(self.top(), NodeValue::LineBreak);
                self.break_line();
            }
        }
    }

    /// Close everything still open at the end of the block.
    fn finish(&mut self) {
        self.close_to(0);
        self.settle(Flank::Space);
    }

    fn open(&mut self, marks: Vec<Mark>) {
        for mark in marks {
            let value = match &mark {
                Mark::Em => NodeValue::Emph,
                Mark::Strong => NodeValue::Strong,
                Mark::Link { href, title } => NodeValue::Link(NodeLink {
                    url: href.clone(),
                    title: title.clone().unwrap_or_default(),
                }),
                Mark::Code => continue,
            };
            if expels(&mark) {
                self.delimiter(true);
            } else {
                self.punct();
            }
            let container = self.tree.append(self.top(), value);
            self.open.push((mark, container));
        }
    }

    /// Close open containers, innermost first, until `len` remain.
    fn close_to(&mut self, len: usize) {
        while self.open.len() > len {
            if let Some((mark, _)) = self.open.pop() {
                if expels(&mark) {
                    self.delimiter(false);
                } else {
                    self.punct();
                }
            }
        }
    }

    fn delimiter(&mut self, opens: bool) {
        let (before, before_text) = (self.last, self.last_text);
        let run = self.delims.get_or_insert(Delims {
            before,
            before_text,
            opens: false,
            closes: false,
        });
        if opens {
            run.opens = true;
        } else {
            run.closes = true;
        }
    }

    /// End the pending delimiter run before a character of class `after`.
    ///
    /// An opener between a word character and punctuation does not open,
    /// nor does a closer between punctuation and a word character. The word
    /// character on the outside is rewritten as a reference, which reads as
    /// punctuation. Returns true when that character is the one about to be
    /// written.
    fn settle(&mut self, after: Flank) -> bool {
        let Some(run) = self.delims.take() else {
            return false;
        };
        if run.opens && run.before == Flank::Word && after == Flank::Punct {
            if let Some(node) = run.before_text {
                self.tree.reference_last_char(node);
            }
        }
        run.closes && run.before == Flank::Punct && after == Flank::Word
    }

    /// Record markup that starts and ends in punctuation.
    fn punct(&mut self) {
        self.settle(Flank::Punct);
        self.last = Flank::Punct;
        self.last_text = None;
    }

    fn break_line(&mut self) {
        self.last = Flank::Space;
        self.last_text = None;
        self.line_start = true;
    }

    /// Write plain text into the innermost container. Blanks at the start
    /// of a line and, with `line_end`, at its end become references.
    fn text(&mut self, text: &str, line_end: bool) {
        if text.is_empty() {
            return;
        }
        let lead_len = if self.line_start {
            text.len() - text.trim_start_matches(is_blank).len()
        } else {
            0
        };
        let (lead, rest) = text.split_at(lead_len);
        let body_len = if line_end {
            rest.trim_end_matches(is_blank).len()
        } else {
            rest.len()
        };
        let (mut body, trail) = rest.split_at(body_len);

        self.references(lead);
        if self.line_start && lead.is_empty() && body.starts_with('~') {
            self.raw("\\~");
            body = &body[1..];
        }
        self.literal(body);
        self.references(trail);
        self.line_start = false;
    }

    /// Escape every `&` so that nothing in `text` reads as a character
    /// reference.
    fn literal(&mut self, text: &str) {
        for (i, part) in text.split('&').enumerate() {
            if i > 0 {
                self.raw("\\&");
            }
            self.plain(part);
        }
    }

    fn plain(&mut self, text: &str) {
        let mut chars = text.chars();
        let Some(first) = chars.next() else {
            return;
        };
        let mut text = text;
        if self.settle(flank(first)) {
            self.raw(&reference(first));
            text = chars.as_str();
            if text.is_empty() {
                return;
            }
        }
        let node = self.tree.append(self.top(), NodeValue::Text(text.to_string()));
        if let Some(last) = text.chars().next_back() {
            self.last = flank(last);
        }
        self.last_text = (self.last == Flank::Word).then_some(node);
    }

    fn references(&mut self, blanks: &str) {
        for c in blanks.chars() {
            self.raw(&reference(c));
        }
    }

    fn raw(&mut self, text: &str) {
        self.punct();
        self.tree.append(self.top(), NodeValue::Raw(text.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::parse;
    use pretty_assertions::assert_eq;

    fn t(s: &str) -> Node {
        Node::text(s, vec![])
    }

    fn p(inline: Vec<Node>) -> Node {
        Node::paragraph(inline)
    }

    fn node(kind: NodeKind, children: Vec<Node>) -> Node {
        Node::new(kind, Fragment::from_vec(children))
    }

    fn item(text: &str) -> Node {
        node(NodeKind::ListItem, vec![p(vec![t(text)])])
    }

    #[test]
    fn paragraphs_are_separated_by_a_blank_line() {
        let doc = Node::doc(vec![p(vec![t("a")]), p(vec![t("b")])]);
        assert_eq!(serialize(&doc), "a\n\nb");
    }

    #[test]
    fn blockquote_prefixes_every_line() {
        let doc = Node::doc(vec![node(
            NodeKind::Blockquote,
            vec![p(vec![t("a\nb")]), p(vec![t("c")])],
        )]);
        assert_eq!(serialize(&doc), "> a\n> b\n> \n> c");
    }

    #[test]
    fn bullet_list_uses_stars() {
        let doc = Node::doc(vec![node(NodeKind::BulletList { tight: true }, vec![item("a"), item("b")])]);
        assert_eq!(serialize(&doc), "* a\n* b");
    }

    #[test]
    fn ordered_list_counts_from_its_start() {
        let doc = Node::doc(vec![node(
            NodeKind::OrderedList { order: 9, tight: false },
            vec![item("a"), item("b")],
        )]);
        let out = serialize(&doc);
        assert_eq!(out, "9. a\n\n10. b");
        assert_eq!(parse(&out), doc);
    }

    #[test]
    fn nested_list_is_indented() {
        let inner = node(NodeKind::BulletList { tight: true }, vec![item("b")]);
        let outer = node(
            NodeKind::BulletList { tight: true },
            vec![node(NodeKind::ListItem, vec![p(vec![t("a")]), inner])],
        );
        assert_eq!(serialize(&Node::doc(vec![outer])), "* a\n  * b");
    }

    #[test]
    fn code_fence_outgrows_content() {
        let doc = Node::doc(vec![node(
            NodeKind::CodeBlock { params: "md".into() },
            vec![t("```\nx")],
        )]);
        let out = serialize(&doc);
        assert_eq!(out, "```` md\n```\nx\n````");
        assert_eq!(parse(&out), doc);
    }

    #[test]
    fn empty_code_block_round_trips() {
        let doc = Node::doc(vec![node(NodeKind::CodeBlock { params: String::new() }, vec![])]);
        assert_eq!(parse(&serialize(&doc)), doc);
    }

    #[test]
    fn heading_escapes_hashes_and_rule_is_dashes() {
        let doc = Node::doc(vec![
            node(NodeKind::Heading { level: 2 }, vec![t("C#")]),
            Node::leaf(NodeKind::HorizontalRule),
        ]);
        assert_eq!(serialize(&doc), "## C\\#\n\n-----");
    }

    #[test]
    fn links_and_autolinks() {
        let link = |href: &str| Mark::Link {
            href: href.into(),
            title: None,
        };
        let doc = Node::doc(vec![p(vec![
            Node::text("x", vec![link("http://a.b")]),
            t(" "),
            Node::text("http://a.b", vec![link("http://a.b")]),
        ])]);
        assert_eq!(serialize(&doc), "[x](http://a.b) <http://a.b>");
    }

    #[test]
    fn link_title_is_quoted() {
        let mark = Mark::Link {
            href: "u".into(),
            title: Some("say \"hi\"".into()),
        };
        let doc = Node::doc(vec![p(vec![Node::text("x", vec![mark])])]);
        let out = serialize(&doc);
        assert_eq!(out, "[x](u \"say \\\"hi\\\"\")");
        assert_eq!(parse(&out), doc);
    }

    #[test]
    fn strong_stays_open_across_nested_emphasis() {
        let doc = Node::doc(vec![p(vec![
            Node::text("a", vec![Mark::Strong]),
            Node::text("b", vec![Mark::Em, Mark::Strong]),
        ])]);
        assert_eq!(serialize(&doc), "**a*b***");
    }

    #[test]
    fn bang_before_link_is_escaped() {
        let link = Mark::Link {
            href: "u".into(),
            title: None,
        };
        let doc = Node::doc(vec![p(vec![t("!"), Node::text("x", vec![link])])]);
        let out = serialize(&doc);
        assert_eq!(out, "\\![x](u)");
        assert_eq!(parse(&out), doc);
    }

    #[test]
    fn image_keeps_alt_and_title() {
        let image = Node::leaf(NodeKind::Image {
            src: "a.png".into(),
            alt: Some("an & b".into()),
            title: Some("t".into()),
        });
        let doc = Node::doc(vec![p(vec![image])]);
        let out = serialize(&doc);
        assert_eq!(out, "![an \\& b](a.png \"t\")");
        assert_eq!(parse(&out), doc);
    }

    #[test]
    fn blank_lines_inside_paragraph_text_are_references() {
        let doc = Node::doc(vec![p(vec![t("a\n\nb\n")])]);
        assert_eq!(serialize(&doc), "a\n&#10;b&#10;");
    }

    #[test]
    fn whitespace_moves_out_of_closing_emphasis_only() {
        let link = Mark::Link {
            href: "u".into(),
            title: None,
        };
        let doc = Node::doc(vec![p(vec![
            Node::text("a", vec![link.clone()]),
            Node::text("b ", vec![Mark::Em, link]),
            t("c"),
        ])]);
        assert_eq!(serialize(&doc), "[a*b* ](u)c");
    }

    #[test]
    fn emphasis_around_punctuation_inside_a_word() {
        let doc = Node::doc(vec![p(vec![t("a"), Node::text(".", vec![Mark::Em]), t("b")])]);
        let out = serialize(&doc);
        assert_eq!(out, "&#97;*.*&#98;");
        assert_eq!(parse(&out), doc);
    }

    #[test]
    fn emphasis_ending_in_punctuation_before_a_word() {
        let doc = Node::doc(vec![p(vec![
            Node::text("ab.", vec![Mark::Strong]),
            t("c "),
            Node::text("`x`", vec![Mark::Em]),
        ])]);
        let out = serialize(&doc);
        assert_eq!(out, "**ab.**&#99; *\\`x\\`*");
        assert_eq!(parse(&out), doc);
    }

    #[test]
    fn word_flanked_emphasis_is_left_alone() {
        let doc = Node::doc(vec![p(vec![t("a"), Node::text("b", vec![Mark::Em]), t("c")])]);
        assert_eq!(serialize(&doc), "a*b*c");
    }
}
