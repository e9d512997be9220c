//! Cursor ranges and multi-range selections.
//!
//! A [`Range`] has an `anchor` and a `head`; when they are equal the range is
//! a plain cursor. Positions are character indices into the document.
//!
//! ```text
//! anchor=2, head=7: "he[llo w]orld"  (forward selection)
//! anchor=7, head=2: "he]llo w[orld"  (backward selection)
//! anchor=5, head=5: "hello|world"    (cursor)
//! ```
//!
//! A [`Selection`] holds one or more ranges sorted by position. Rotation
//! walks them last-to-first and rebuilds the whole selection after every
//! edit, so ranges stay sorted.

use smallvec::{
  SmallVec,
  smallvec,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SelectionError>;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SelectionError {
  #[error("selection must contain at least one range")]
  EmptySelection,
  #[error("range index {index} out of bounds (len: {len})")]
  RangeIndexOutOfBounds { index: usize, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
  pub anchor: usize,
  pub head:   usize,
}

impl Range {
  pub fn new(anchor: usize, head: usize) -> Self {
    Self { anchor, head }
  }

  pub fn point(head: usize) -> Self {
    Self::new(head, head)
  }

  /// Start of the range.
  #[inline]
  #[must_use]
  pub fn from(&self) -> usize {
    std::cmp::min(self.anchor, self.head)
  }

  /// End of the range.
  #[inline]
  #[must_use]
  pub fn to(&self) -> usize {
    std::cmp::max(self.anchor, self.head)
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.to() - self.from()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.anchor == self.head
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
  ranges: SmallVec<[Range; 1]>,
}

impl Selection {
  /// Create a selection from a list of ranges, sorted by their start.
  pub fn new(ranges: impl IntoIterator<Item = Range>) -> Result<Self> {
    let mut ranges: SmallVec<[Range; 1]> = ranges.into_iter().collect();
    if ranges.is_empty() {
      return Err(SelectionError::EmptySelection);
    }
    ranges.sort_by_key(|range| (range.from(), range.to()));
    Ok(Self { ranges })
  }

  /// A selection with a single cursor.
  pub fn point(pos: usize) -> Self {
    Self {
      ranges: smallvec![Range::point(pos)],
    }
  }

  pub fn single(anchor: usize, head: usize) -> Self {
    Self {
      ranges: smallvec![Range::new(anchor, head)],
    }
  }

  pub fn ranges(&self) -> &[Range] {
    &self.ranges
  }

  pub fn len(&self) -> usize {
    self.ranges.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ranges.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Range> {
    self.ranges.iter()
  }

  pub fn get(&self, index: usize) -> Result<Range> {
    self
      .ranges
      .get(index)
      .copied()
      .ok_or(SelectionError::RangeIndexOutOfBounds {
        index,
        len: self.ranges.len(),
      })
  }
}

impl<'a> IntoIterator for &'a Selection {
  type Item = &'a Range;
  type IntoIter = std::slice::Iter<'a, Range>;

  fn into_iter(self) -> Self::IntoIter {
    self.ranges.iter()
  }
}
