//! Change sets over a [`Rope`].
//!
//! A [`ChangeSet`] is a sequence of [`Operation`]s applied from the start of
//! the document:
//!
//! - **Retain(n)** - keep `n` characters
//! - **Delete(n)** - remove `n` characters
//! - **Insert(s)** - insert `s`
//!
//! A [`Transaction`] wraps a change set built from `(from, to, replacement)`
//! triples. Transactions can be inverted against the document they were built
//! for, which is how [`crate::document::Document`] rolls back atomic groups.
//!
//! ```
//! use ropey::Rope;
//! use the_quote::transaction::Transaction;
//!
//! let mut doc = Rope::from("x = 'hi'");
//! let original = doc.clone();
//!
//! let tx = Transaction::change(&doc, [(4, 8, Some("\"hi\"".into()))]).unwrap();
//! let undo = tx.invert(&doc).unwrap();
//!
//! tx.apply(&mut doc).unwrap();
//! assert_eq!(doc.to_string(), "x = \"hi\"");
//!
//! undo.apply(&mut doc).unwrap();
//! assert_eq!(doc, original);
//! ```

use std::borrow::Cow;

use ropey::Rope;
use thiserror::Error;

use crate::Tendril;

pub type Result<T> = std::result::Result<T, TransactionError>;

/// (from, to) replacement.
pub type Change = (usize, usize, Option<Tendril>);

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransactionError {
  #[error("changeset length mismatch: expected {expected}, got {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("invalid change range: start {from} is after end {to}")]
  InvalidRange { from: usize, to: usize },
  #[error("change range {from}..{to} is out of bounds for document length {len}")]
  RangeOutOfBounds {
    from: usize,
    to:   usize,
    len:  usize,
  },
  #[error("change range {from}..{to} overlaps previous end {prev_end}")]
  OverlappingRange {
    prev_end: usize,
    from:     usize,
    to:       usize,
  },
  #[error("position {pos} is out of bounds for changeset length {len}")]
  PositionOutOfBounds { pos: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
  /// Move cursor by n characters.
  Retain(usize),

  /// Delete n characters.
  Delete(usize),

  /// Insert text at position.
  Insert(Tendril),
}

/// Which side of an insertion a mapped position sticks to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Assoc {
  Before,
  After,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
  changes:   Vec<Operation>,
  /// The required document length. Will refuse to apply changes unless it
  /// matches.
  len:       usize,
  len_after: usize,
}

impl ChangeSet {
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      changes:   Vec::with_capacity(capacity),
      len:       0,
      len_after: 0,
    }
  }

  pub fn changes(&self) -> &[Operation] {
    &self.changes
  }

  /// Returns the expected document length for this changeset
  pub fn len(&self) -> usize {
    self.len
  }

  pub fn len_after(&self) -> usize {
    self.len_after
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.changes.is_empty() || self.changes == [Operation::Retain(self.len)]
  }

  pub fn retain(&mut self, n: usize) {
    if n == 0 {
      return;
    }

    self.len += n;
    self.len_after += n;

    if let Some(Operation::Retain(count)) = self.changes.last_mut() {
      *count += n;
    } else {
      self.changes.push(Operation::Retain(n));
    }
  }

  pub fn delete(&mut self, n: usize) {
    if n == 0 {
      return;
    }

    self.len += n;

    if let Some(Operation::Delete(count)) = self.changes.last_mut() {
      *count += n;
    } else {
      self.changes.push(Operation::Delete(n));
    }
  }

  pub fn insert(&mut self, fragment: Tendril) {
    use Operation::*;

    if fragment.is_empty() {
      return;
    }

    self.len_after += fragment.chars().count();

    // Keep inserts ahead of deletes so a replacement reads Insert, Delete.
    let new_last = match self.changes.as_mut_slice() {
      [.., Insert(prev)] | [.., Insert(prev), Delete(_)] => {
        prev.push_str(&fragment);
        return;
      },
      [.., last @ Delete(_)] => std::mem::replace(last, Insert(fragment)),
      _ => Insert(fragment),
    };

    self.changes.push(new_last);
  }

  fn ensure_len(&self, text_len: usize) -> Result<()> {
    if text_len != self.len {
      return Err(TransactionError::LengthMismatch {
        expected: self.len,
        actual:   text_len,
      });
    }
    Ok(())
  }

  /// Apply this changeset in-place.
  pub fn apply(&self, text: &mut Rope) -> Result<()> {
    self.ensure_len(text.len_chars())?;
    let mut pos = 0;

    for change in &self.changes {
      match change {
        Operation::Retain(n) => pos += n,
        Operation::Delete(n) => text.remove(pos..pos + *n),
        Operation::Insert(s) => {
          text.insert(pos, s);
          pos += s.chars().count();
        },
      }
    }

    Ok(())
  }

  /// Returns a changeset that reverts this one. `original_doc` is the
  /// document before this change was applied.
  pub fn invert(&self, original_doc: &Rope) -> Result<Self> {
    self.ensure_len(original_doc.len_chars())?;

    let mut changes = Self::with_capacity(self.changes.len());
    let mut pos = 0;

    for change in &self.changes {
      match change {
        Operation::Retain(n) => {
          changes.retain(*n);
          pos += n;
        },
        Operation::Delete(n) => {
          let text = Cow::from(original_doc.slice(pos..pos + *n));
          changes.insert(Tendril::from(text.as_ref()));
          pos += n;
        },
        Operation::Insert(s) => changes.delete(s.chars().count()),
      }
    }

    Ok(changes)
  }

  /// Map a position through the changes.
  ///
  /// A position inside replaced or deleted text collapses onto the
  /// replacement. `assoc` decides whether a position sitting exactly at an
  /// insertion (or at the start of a replacement) lands before or after the
  /// new text.
  pub fn map_pos(&self, pos: usize, assoc: Assoc) -> Result<usize> {
    let mut old_pos = 0;
    let mut new_pos = 0;
    let mut iter = self.changes.iter().peekable();

    while let Some(change) = iter.next() {
      match change {
        Operation::Retain(n) => {
          if pos < old_pos + n {
            return Ok(new_pos + (pos - old_pos));
          }
          old_pos += n;
          new_pos += n;
        },
        Operation::Delete(n) => {
          if pos < old_pos + n {
            return Ok(new_pos);
          }
          old_pos += n;
        },
        Operation::Insert(s) => {
          let ins = s.chars().count();
          // a subsequent delete means a replace, consume it
          let deleted = match iter.peek() {
            Some(Operation::Delete(n)) => {
              let n = *n;
              iter.next();
              n
            },
            _ => 0,
          };

          if pos == old_pos || pos < old_pos + deleted {
            return Ok(match assoc {
              Assoc::Before if pos == old_pos => new_pos,
              _ => new_pos + ins,
            });
          }
          old_pos += deleted;
          new_pos += ins;
        },
      }
    }

    if pos == old_pos {
      Ok(new_pos)
    } else {
      Err(TransactionError::PositionOutOfBounds { pos, len: self.len })
    }
  }
}

fn validate_change_bounds(from: usize, to: usize, len: usize) -> Result<()> {
  if from > to {
    return Err(TransactionError::InvalidRange { from, to });
  }
  if to > len {
    return Err(TransactionError::RangeOutOfBounds { from, to, len });
  }
  Ok(())
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Transaction {
  changes: ChangeSet,
}

impl From<ChangeSet> for Transaction {
  fn from(changes: ChangeSet) -> Self {
    Self { changes }
  }
}

impl Transaction {
  /// Changes made to the buffer.
  pub fn changes(&self) -> &ChangeSet {
    &self.changes
  }

  /// Apply this transaction in-place.
  pub fn apply(&self, doc: &mut Rope) -> Result<()> {
    self.changes.apply(doc)
  }

  /// Generate a transaction that reverts this one.
  pub fn invert(&self, original: &Rope) -> Result<Self> {
    Ok(Self::from(self.changes.invert(original)?))
  }

  /// Generate a transaction from a set of sorted, non-overlapping changes.
  pub fn change<I>(doc: &Rope, changes: I) -> Result<Self>
  where
    I: IntoIterator<Item = Change>,
  {
    let len = doc.len_chars();
    let changes = changes.into_iter();
    let (lower, upper) = changes.size_hint();
    let mut changeset = ChangeSet::with_capacity(2 * upper.unwrap_or(lower) + 1);

    let mut last = 0;
    for (from, to, tendril) in changes {
      validate_change_bounds(from, to, len)?;
      if from < last {
        return Err(TransactionError::OverlappingRange {
          prev_end: last,
          from,
          to,
        });
      }

      changeset.retain(from - last);
      if let Some(text) = tendril {
        changeset.insert(text);
      }
      changeset.delete(to - from);
      last = to;
    }

    changeset.retain(len - last);

    Ok(Self::from(changeset))
  }
}
