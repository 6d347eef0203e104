//! Markdown to document.
//!
//! comrak builds the CommonMark tree; this module lowers it onto the
//! schema. Inline containers (emphasis, strong, links, code spans) become
//! marks on flat text, soft breaks become `\n` inside the text, and
//! anything outside the schema (raw HTML) is kept as literal text.

use comrak::nodes::{AstNode, ListType, NodeValue};
use comrak::{Arena, parse_document};

use crate::node::{Fragment, Mark, Node, NodeKind};
use crate::schema::NodeType;

use super::{END_LIST_MARKER, options};

/// Parse markdown source into a document.
#[must_use]
pub fn parse(text: &str) -> Node {
    let arena = Arena::new();
    let root = parse_document(&arena, text, &options());
    let blocks = blocks(root);
    tracing::trace!(blocks = blocks.len(), bytes = text.len(), "parsed markdown");
    Node::doc(blocks)
}

fn blocks<'a>(parent: &'a AstNode<'a>) -> Vec<Node> {
    parent.children().filter_map(block).collect()
}

fn block<'a>(node: &'a AstNode<'a>) -> Option<Node> {
    let ast = node.data.borrow();
    let block = match &ast.value {
        NodeValue::Paragraph => Node::paragraph(inline(node)),
        NodeValue::Heading(heading) => Node::new(
            NodeKind::Heading {
                level: heading.level,
            },
            Fragment::from_vec(inline(node)),
        ),
        NodeValue::BlockQuote => {
            let mut children = blocks(node);
            if children.is_empty() {
                children.push(Node::paragraph(Vec::new()));
            }
            Node::new(NodeKind::Blockquote, Fragment::from_vec(children))
        }
        NodeValue::List(list) => {
            let kind = match list.list_type {
                ListType::Bullet => NodeKind::BulletList { tight: list.tight },
                ListType::Ordered => NodeKind::OrderedList {
                    order: u32::try_from(list.start).unwrap_or(u32::MAX),
                    tight: list.tight,
                },
            };
            Node::new(kind, Fragment::from_vec(node.children().map(list_item).collect()))
        }
        NodeValue::CodeBlock(code) => {
            let text = code.literal.strip_suffix('\n').unwrap_or(&code.literal);
            Node::new(
                NodeKind::CodeBlock {
                    params: code.info.clone(),
                },
                Fragment::from_vec(text_nodes(text, &[])),
            )
        }
        NodeValue::ThematicBreak => Node::leaf(NodeKind::HorizontalRule),
        NodeValue::HtmlBlock(html) => {
            let literal = html.literal.trim_end_matches('\n');
            if literal == END_LIST_MARKER {
                return None;
            }
            Node::paragraph(text_nodes(literal, &[]))
        }
        _ => Node::paragraph(text_nodes(&plain_text(node), &[])),
    };
    Some(block)
}

/// A list item always opens with a paragraph; items that start with another
/// block (or nothing) get an empty one.
fn list_item<'a>(node: &'a AstNode<'a>) -> Node {
    let mut children = blocks(node);
    if children
        .first()
        .is_none_or(|first| first.node_type() != NodeType::Paragraph)
    {
        children.insert(0, Node::paragraph(Vec::new()));
    }
    Node::new(NodeKind::ListItem, Fragment::from_vec(children))
}

fn inline<'a>(parent: &'a AstNode<'a>) -> Vec<Node> {
    let mut out = Vec::new();
    collect_inline(parent, &[], &mut out);
    out
}

fn collect_inline<'a>(parent: &'a AstNode<'a>, marks: &[Mark], out: &mut Vec<Node>) {
    for child in parent.children() {
        let ast = child.data.borrow();
        match &ast.value {
            NodeValue::Text(text) | NodeValue::HtmlInline(text) | NodeValue::Raw(text) => {
                out.extend(text_nodes(text, marks));
            }
            NodeValue::SoftBreak => out.extend(text_nodes("\n", marks)),
            NodeValue::LineBreak => out.push(Node::leaf(NodeKind::HardBreak).with_marks(marks.to_vec())),
            NodeValue::Code(code) => out.extend(text_nodes(&code.literal, &Mark::Code.add_to_set(marks))),
            NodeValue::Emph => collect_inline(child, &Mark::Em.add_to_set(marks), out),
            NodeValue::Strong => collect_inline(child, &Mark::Strong.add_to_set(marks), out),
            NodeValue::Link(link) => {
                let mark = Mark::Link {
                    href: link.url.clone(),
                    title: non_empty(&link.title),
                };
                collect_inline(child, &mark.add_to_set(marks), out);
            }
            NodeValue::Image(link) => {
                let image = NodeKind::Image {
                    src: link.url.clone(),
                    alt: non_empty(&plain_text(child)),
                    title: non_empty(&link.title),
                };
                out.push(Node::leaf(image).with_marks(marks.to_vec()));
            }
            _ => collect_inline(child, marks, out),
        }
    }
}

/// The text below `node` with all markup dropped.
fn plain_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut out = String::new();
    for descendant in node.descendants() {
        match &descendant.data.borrow().value {
            NodeValue::Text(text) | NodeValue::HtmlInline(text) | NodeValue::Raw(text) => out.push_str(text),
            NodeValue::Code(code) => out.push_str(&code.literal),
            NodeValue::SoftBreak | NodeValue::LineBreak => out.push('\n'),
            NodeValue::CodeBlock(code) => out.push_str(&code.literal),
            NodeValue::HtmlBlock(html) => out.push_str(&html.literal),
            _ => {}
        }
    }
    out
}

fn text_nodes(text: &str, marks: &[Mark]) -> Vec<Node> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Node::text(text, marks.to_vec())]
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
