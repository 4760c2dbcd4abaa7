//! Match result records
//!
//! Every successful match produces a [`Matched`]: the emitted node, the text
//! span it covers, and an ordered list of child captures. The consumer above
//! this core flattens these records into an open/close-coded token buffer;
//! here they only need two transforms - re-labelling a match as the boundary
//! of a scope (`wrap`) and shifting its positions into document coordinates
//! (`offset`).

use serde::Serialize;

use super::repository::NodeId;

/// Marks a match as the opening or closing boundary of a scoped region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Boundary {
    Begin,
    End,
}

/// A recursive match record: one emitted node covering a text span, with
/// child records for each declared capture.
///
/// Invariant: child captures are contiguous, non-overlapping spans whose
/// concatenated length equals the parent's matched length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Matched {
    pub node: NodeId,
    pub text: String,
    pub from: usize,
    pub boundary: Option<Boundary>,
    pub captures: Vec<Matched>,
}

impl Matched {
    /// A plain token record with no children
    pub fn token(node: NodeId, text: String, from: usize) -> Self {
        Matched {
            node,
            text,
            from,
            boundary: None,
            captures: Vec::new(),
        }
    }

    /// End position of the matched span
    pub fn to(&self) -> usize {
        self.from + self.text.len()
    }

    /// Length of the matched span in bytes
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Re-label this match as the `Begin` or `End` boundary of `node`,
    /// keeping the span and the child captures.
    pub fn wrap(self, node: NodeId, boundary: Boundary) -> Matched {
        Matched {
            node,
            text: self.text,
            from: self.from,
            boundary: Some(boundary),
            captures: self.captures,
        }
    }

    /// Shift this match and all its children by `delta` positions
    pub fn offset(mut self, delta: isize) -> Matched {
        self.shift(delta);
        self
    }

    fn shift(&mut self, delta: isize) {
        self.from = (self.from as isize + delta) as usize;
        for child in &mut self.captures {
            child.shift(delta);
        }
    }
}
