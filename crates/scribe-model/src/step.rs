//! Steps, position maps, and transforms.
//!
//! A [`Step`] is one atomic document change. Applying it yields a new
//! document and a [`StepMap`] that says how positions in the old document
//! move to the new one. A [`Transform`] chains steps, keeping every
//! intermediate document so the whole chain can be inverted for undo.

use crate::error::Result;
use crate::node::{Fragment, Mark, Node};
use crate::replace::Slice;

// ---------------------------------------------------------------------------
// Position mapping
// ---------------------------------------------------------------------------

/// Which side a position sticks to when content is inserted exactly at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bias {
    /// Stay before the inserted content.
    Left,
    /// Move past the inserted content.
    #[default]
    Right,
}

/// One replaced range: `old_size` positions at `start` became `new_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Range {
    start: usize,
    old_size: usize,
    new_size: usize,
}

/// How a single step moved positions around.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepMap {
    ranges: Vec<Range>,
}

impl StepMap {
    /// A map for replacing `old_size` positions at `start` with `new_size`.
    #[must_use]
    pub fn new(start: usize, old_size: usize, new_size: usize) -> Self {
        if old_size == 0 && new_size == 0 {
            return Self::empty();
        }
        Self {
            ranges: vec![Range {
                start,
                old_size,
                new_size,
            }],
        }
    }

    /// The identity map.
    #[must_use]
    pub const fn empty() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Map `pos` through this step.
    ///
    /// A position inside a replaced range lands on the side given by
    /// `bias`; positions on the edge of a deletion stay on their edge.
    #[must_use]
    pub fn map(&self, pos: usize, bias: Bias) -> usize {
        let mut added = 0;
        let mut removed = 0;
        for range in &self.ranges {
            if range.start > pos {
                break;
            }
            let end = range.start + range.old_size;
            if pos <= end {
                let left = if range.old_size == 0 {
                    bias == Bias::Left
                } else if pos == range.start {
                    true
                } else if pos == end {
                    false
                } else {
                    bias == Bias::Left
                };
                let base = range.start + added - removed;
                return if left { base } else { base + range.new_size };
            }
            added += range.new_size;
            removed += range.old_size;
        }
        pos + added - removed
    }

    /// The map that undoes this one.
    #[must_use]
    pub fn invert(&self) -> Self {
        let mut shift_added = 0;
        let mut shift_removed = 0;
        let ranges = self
            .ranges
            .iter()
            .map(|r| {
                let start = r.start + shift_added - shift_removed;
                shift_added += r.new_size;
                shift_removed += r.old_size;
                Range {
                    start,
                    old_size: r.new_size,
                    new_size: r.old_size,
                }
            })
            .collect();
        Self { ranges }
    }
}

/// A sequence of step maps applied one after another.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    #[must_use]
    pub const fn new() -> Self {
        Self { maps: Vec::new() }
    }

    pub fn push(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    #[must_use]
    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    /// Map `pos` through every map in order.
    #[must_use]
    pub fn map(&self, pos: usize, bias: Bias) -> usize {
        self.maps.iter().fold(pos, |pos, m| m.map(pos, bias))
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// An atomic, invertible document change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Replace `from..to` with `slice`.
    Replace { from: usize, to: usize, slice: Slice },
}

impl Step {
    #[must_use]
    pub const fn replace(from: usize, to: usize, slice: Slice) -> Self {
        Self::Replace { from, to, slice }
    }

    /// Apply this step to `doc`.
    ///
    /// # Errors
    ///
    /// Propagates replace failures: out-of-range positions or content that
    /// does not fit.
    pub fn apply(&self, doc: &Node) -> Result<Node> {
        match self {
            Self::Replace { from, to, slice } => doc.replace(*from, *to, slice),
        }
    }

    /// How this step moves positions.
    #[must_use]
    pub fn map(&self) -> StepMap {
        match self {
            Self::Replace { from, to, slice } => StepMap::new(*from, to - from, slice.size()),
        }
    }

    /// The step that undoes this one. `doc` is the document this step was
    /// applied to.
    ///
    /// # Errors
    ///
    /// Fails if the step's range is not valid in `doc`.
    pub fn invert(&self, doc: &Node) -> Result<Self> {
        match self {
            Self::Replace { from, to, slice } => Ok(Self::Replace {
                from: *from,
                to: from + slice.size(),
                slice: doc.slice(*from, *to)?,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// A chain of steps applied to a starting document.
#[derive(Debug, Clone)]
pub struct Transform {
    doc: Node,
    steps: Vec<Step>,
    docs: Vec<Node>,
    mapping: Mapping,
}

impl Transform {
    #[must_use]
    pub const fn new(doc: Node) -> Self {
        Self {
            doc,
            steps: Vec::new(),
            docs: Vec::new(),
            mapping: Mapping::new(),
        }
    }

    /// The document after all steps so far.
    #[inline]
    #[must_use]
    pub const fn doc(&self) -> &Node {
        &self.doc
    }

    /// The document before the first step.
    #[must_use]
    pub fn before(&self) -> &Node {
        self.docs.first().unwrap_or(&self.doc)
    }

    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Documents before each step, parallel to [`steps`](Self::steps).
    #[inline]
    #[must_use]
    pub fn docs(&self) -> &[Node] {
        &self.docs
    }

    #[inline]
    #[must_use]
    pub const fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    #[inline]
    #[must_use]
    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Apply `step`, recording it.
    ///
    /// # Errors
    ///
    /// Returns the step's failure; the transform is left unchanged.
    pub fn step(&mut self, step: Step) -> Result<&mut Self> {
        let next = step.apply(&self.doc)?;
        self.docs.push(std::mem::replace(&mut self.doc, next));
        self.mapping.push(step.map());
        self.steps.push(step);
        Ok(self)
    }

    /// Replace `from..to` with `slice`. A no-op replace adds no step.
    ///
    /// # Errors
    ///
    /// See [`Step::apply`].
    pub fn replace(&mut self, from: usize, to: usize, slice: Slice) -> Result<&mut Self> {
        if from == to && slice.size() == 0 {
            return Ok(self);
        }
        self.step(Step::replace(from, to, slice))
    }

    /// Delete `from..to`.
    ///
    /// # Errors
    ///
    /// See [`Step::apply`].
    pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Self> {
        self.replace(from, to, Slice::empty())
    }

    /// Insert `content` at `pos`.
    ///
    /// # Errors
    ///
    /// See [`Step::apply`].
    pub fn insert(&mut self, pos: usize, content: Fragment) -> Result<&mut Self> {
        self.replace(pos, pos, Slice::closed(content))
    }

    /// Insert `text` with `marks` at `pos`, replacing `pos..to`.
    ///
    /// # Errors
    ///
    /// See [`Step::apply`].
    pub fn insert_text(
        &mut self,
        text: &str,
        pos: usize,
        to: usize,
        marks: Vec<Mark>,
    ) -> Result<&mut Self> {
        if text.is_empty() {
            return self.delete(pos, to);
        }
        let node = Node::text(text, marks);
        self.replace(pos, to, Slice::closed(Fragment::from_node(node)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc(texts: &[&str]) -> Node {
        Node::doc(
            texts
                .iter()
                .map(|s| Node::paragraph(vec![Node::text(*s, vec![])]))
                .collect(),
        )
    }

    // -- StepMap ------------------------------------------------------------

    #[test]
    fn map_insertion_respects_bias() {
        let map = StepMap::new(3, 0, 2);
        assert_eq!(map.map(2, Bias::Right), 2);
        assert_eq!(map.map(3, Bias::Left), 3);
        assert_eq!(map.map(3, Bias::Right), 5);
        assert_eq!(map.map(4, Bias::Left), 6);
    }

    #[test]
    fn map_deletion_collapses_range() {
        let map = StepMap::new(2, 3, 0);
        assert_eq!(map.map(1, Bias::Right), 1);
        assert_eq!(map.map(3, Bias::Left), 2);
        assert_eq!(map.map(3, Bias::Right), 2);
        assert_eq!(map.map(5, Bias::Left), 2);
        assert_eq!(map.map(7, Bias::Left), 4);
    }

    #[test]
    fn inverted_map_round_trips() {
        let map = StepMap::new(2, 1, 4);
        let inv = map.invert();
        assert_eq!(inv.map(map.map(8, Bias::Right), Bias::Right), 8);
        assert_eq!(inv.map(map.map(1, Bias::Right), Bias::Right), 1);
    }

    #[test]
    fn mapping_chains_maps() {
        let mut mapping = Mapping::new();
        mapping.push(StepMap::new(1, 0, 2));
        mapping.push(StepMap::new(0, 1, 0));
        assert_eq!(mapping.map(4, Bias::Right), 5);
    }

    // -- Steps --------------------------------------------------------------

    #[test]
    fn step_invert_restores_doc() {
        let before = doc(&["ab", "cd"]);
        let step = Step::replace(2, 6, Slice::empty());
        let after = step.apply(&before).unwrap();
        assert_eq!(after, doc(&["ad"]));
        let undo = step.invert(&before).unwrap();
        assert_eq!(undo.apply(&after).unwrap(), before);
    }

    // -- Transform ----------------------------------------------------------

    #[test]
    fn transform_records_docs_and_maps() {
        let mut tr = Transform::new(doc(&["hello"]));
        tr.insert_text("XY", 1, 1, vec![]).unwrap().delete(6, 8).unwrap();
        assert_eq!(tr.doc(), &doc(&["XYhel"]));
        assert_eq!(tr.steps().len(), 2);
        assert_eq!(tr.docs().len(), 2);
        assert_eq!(tr.before(), &doc(&["hello"]));
        assert_eq!(tr.mapping().map(6, Bias::Right), 6);
    }

    #[test]
    fn noop_replace_adds_no_step() {
        let mut tr = Transform::new(doc(&["a"]));
        tr.delete(1, 1).unwrap();
        assert!(!tr.doc_changed());
    }

    #[test]
    fn failed_step_leaves_transform_untouched() {
        let start = doc(&["a"]);
        let mut tr = Transform::new(start.clone());
        assert!(tr.delete(0, 3).is_err());
        assert_eq!(tr.doc(), &start);
        assert!(tr.steps().is_empty());
    }
}
