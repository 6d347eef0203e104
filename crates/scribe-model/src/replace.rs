//! Slices and the replace algorithm.
//!
//! A [`Slice`] is a fragment cut out of a document together with how many
//! levels are *open* on each side. `doc(p("ab"), p("cd"))` sliced from
//! inside the first paragraph to inside the second gives the content
//! `p("b"), p("c")` with both sides open one level: the paragraphs are
//! fragments of nodes that continue outside the slice.
//!
//! Replacing a range with a slice joins the open sides onto the nodes
//! around the range. Every node the replace touches is checked against the
//! content rules, so a replace either yields a valid document or fails.

use crate::error::{ModelError, Result};
use crate::node::{Fragment, Node, push_merged};
use crate::resolve::ResolvedPos;

// ---------------------------------------------------------------------------
// Slice
// ---------------------------------------------------------------------------

/// A piece of document content with open start and end depths.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Slice {
    content: Fragment,
    open_start: usize,
    open_end: usize,
}

impl Slice {
    #[must_use]
    pub const fn new(content: Fragment, open_start: usize, open_end: usize) -> Self {
        Self {
            content,
            open_start,
            open_end,
        }
    }

    /// The empty slice. Replacing a range with it deletes the range.
    #[must_use]
    pub const fn empty() -> Self {
        Self::new(Fragment::empty(), 0, 0)
    }

    /// A closed slice holding `content`.
    #[must_use]
    pub const fn closed(content: Fragment) -> Self {
        Self::new(content, 0, 0)
    }

    #[inline]
    #[must_use]
    pub const fn content(&self) -> &Fragment {
        &self.content
    }

    #[inline]
    #[must_use]
    pub const fn open_start(&self) -> usize {
        self.open_start
    }

    #[inline]
    #[must_use]
    pub const fn open_end(&self) -> usize {
        self.open_end
    }

    /// Number of positions this slice adds when inserted.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.content
            .size()
            .saturating_sub(self.open_start + self.open_end)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Node entry points
// ---------------------------------------------------------------------------

impl Node {
    /// Resolve a position in this node's content.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::OutOfRange`] if `pos` is past the content.
    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos<'_>> {
        ResolvedPos::resolve(self, pos)
    }

    /// The content between `from` and `to` as a slice, open as deep as the
    /// positions sit below their shared ancestor.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::OutOfRange`] if either position is invalid.
    pub fn slice(&self, from: usize, to: usize) -> Result<Slice> {
        if from >= to {
            return Ok(Slice::empty());
        }
        let rfrom = self.resolve(from)?;
        let rto = self.resolve(to)?;
        let depth = rfrom.shared_depth(to);
        let start = rfrom.start(depth);
        let node = rfrom.node(depth);
        let content = node.content().cut(rfrom.pos() - start, rto.pos() - start);
        Ok(Slice::new(
            content,
            rfrom.depth() - depth,
            rto.depth() - depth,
        ))
    }

    /// Replace `from..to` with `slice`, returning the new node.
    ///
    /// # Errors
    ///
    /// Fails when a position is out of range, when the slice's open sides
    /// cannot be joined onto the surrounding nodes, or when the result
    /// would break a content rule.
    pub fn replace(&self, from: usize, to: usize, slice: &Slice) -> Result<Self> {
        let rfrom = self.resolve(from)?;
        let rto = self.resolve(to)?;
        if slice.open_start > rfrom.depth() {
            return Err(ModelError::TooDeep);
        }
        if rfrom.depth() - slice.open_start != rto.depth().wrapping_sub(slice.open_end) {
            return Err(ModelError::InconsistentDepths);
        }
        replace_outer(&rfrom, &rto, slice, 0)
    }
}

// ---------------------------------------------------------------------------
// Algorithm
// ---------------------------------------------------------------------------

fn replace_outer(
    from: &ResolvedPos<'_>,
    to: &ResolvedPos<'_>,
    slice: &Slice,
    depth: usize,
) -> Result<Node> {
    let index = from.index(depth);
    let node = from.node(depth);
    if index == to.index(depth) && depth < from.depth() - slice.open_start {
        let inner = replace_outer(from, to, slice, depth + 1)?;
        return Ok(node.copy(node.content().replace_child(index, inner)));
    }
    if slice.content.size() == 0 {
        return close(node, replace_two_way(from, to, depth)?);
    }
    if slice.open_start == 0
        && slice.open_end == 0
        && from.depth() == depth
        && to.depth() == depth
    {
        let parent = from.parent();
        let content = parent.content();
        let joined = content
            .cut(0, from.parent_offset())
            .append(&slice.content)
            .append(&content.cut(to.parent_offset(), content.size()));
        return close(parent, joined);
    }
    let extra = from.depth() - slice.open_start;
    let along = prepare_slice(slice, from, extra);
    let start = along.resolve(slice.open_start + extra)?;
    let end = along.resolve(along.content_size() - slice.open_end - extra)?;
    close(node, replace_three_way(from, &start, &end, to, depth)?)
}

/// Wrap the slice content in copies of `along`'s ancestors so that its open
/// sides line up with the replaced range's depths.
fn prepare_slice(slice: &Slice, along: &ResolvedPos<'_>, extra: usize) -> Node {
    let mut node = along.node(extra).copy(slice.content.clone());
    for depth in (0..extra).rev() {
        node = along.node(depth).copy(Fragment::from_node(node));
    }
    node
}

fn check_join(main: &Node, sub: &Node) -> Result<()> {
    if sub.node_type().compatible_content(main.node_type()) {
        Ok(())
    } else {
        Err(ModelError::Join {
            main: main.node_type().name(),
            sub: sub.node_type().name(),
        })
    }
}

fn joinable<'a>(
    before: &ResolvedPos<'a>,
    after: &ResolvedPos<'_>,
    depth: usize,
) -> Result<&'a Node> {
    let node = before.node(depth);
    check_join(node, after.node(depth))?;
    Ok(node)
}

fn add_range(
    start: Option<&ResolvedPos<'_>>,
    end: Option<&ResolvedPos<'_>>,
    depth: usize,
    target: &mut Vec<Node>,
) {
    let Some(anchor) = end.or(start) else {
        return;
    };
    let node = anchor.node(depth);
    let mut start_index = 0;
    let end_index = end.map_or(node.child_count(), |e| e.index(depth));
    if let Some(start) = start {
        start_index = start.index(depth);
        if start.depth() > depth {
            start_index += 1;
        } else if start.text_offset() > 0 {
            if let Some(after) = start.node_after() {
                push_merged(target, after);
            }
            start_index += 1;
        }
    }
    for i in start_index..end_index {
        push_merged(target, node.child(i).clone());
    }
    if let Some(end) = end {
        if end.depth() == depth && end.text_offset() > 0 {
            if let Some(before) = end.node_before() {
                push_merged(target, before);
            }
        }
    }
}

fn close(node: &Node, content: Fragment) -> Result<Node> {
    crate::schema::check_content(node.node_type(), &content)?;
    Ok(node.copy(content))
}

fn replace_three_way(
    from: &ResolvedPos<'_>,
    start: &ResolvedPos<'_>,
    end: &ResolvedPos<'_>,
    to: &ResolvedPos<'_>,
    depth: usize,
) -> Result<Fragment> {
    let open_start = if from.depth() > depth {
        Some(joinable(from, start, depth + 1)?)
    } else {
        None
    };
    let open_end = if to.depth() > depth {
        Some(joinable(end, to, depth + 1)?)
    } else {
        None
    };

    let mut content = Vec::new();
    add_range(None, Some(from), depth, &mut content);
    match (open_start, open_end) {
        (Some(os), Some(oe)) if start.index(depth) == end.index(depth) => {
            check_join(os, oe)?;
            let inner = replace_three_way(from, start, end, to, depth + 1)?;
            push_merged(&mut content, close(os, inner)?);
        }
        _ => {
            if let Some(os) = open_start {
                let inner = replace_two_way(from, start, depth + 1)?;
                push_merged(&mut content, close(os, inner)?);
            }
            add_range(Some(start), Some(end), depth, &mut content);
            if let Some(oe) = open_end {
                let inner = replace_two_way(end, to, depth + 1)?;
                push_merged(&mut content, close(oe, inner)?);
            }
        }
    }
    add_range(Some(to), None, depth, &mut content);
    Ok(Fragment::from_vec(content))
}

fn replace_two_way(from: &ResolvedPos<'_>, to: &ResolvedPos<'_>, depth: usize) -> Result<Fragment> {
    let mut content = Vec::new();
    add_range(None, Some(from), depth, &mut content);
    if from.depth() > depth {
        let node = joinable(from, to, depth + 1)?;
        let inner = replace_two_way(from, to, depth + 1)?;
        push_merged(&mut content, close(node, inner)?);
    }
    add_range(Some(to), None, depth, &mut content);
    Ok(Fragment::from_vec(content))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
