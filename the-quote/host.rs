//! What the rotation driver needs from the document it edits.
//!
//! The driver never touches a buffer directly. It asks the host to classify
//! a position, to hand out the raw text of the literal around it, and to
//! write a rewritten literal back together with the selection mapped
//! through the rewrite. All edits made for one selection are bracketed by an atomic group
//! so that a late failure can undo the earlier edits.

use std::ops::Range;

use thiserror::Error;

use crate::{
  selection::{
    Selection,
    SelectionError,
  },
  transaction::TransactionError,
};

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum HostError {
  #[error("span {start}..{end} is out of bounds for document length {len}")]
  OutOfBounds { start: usize, end: usize, len: usize },
  #[error("no atomic group is open")]
  NoAtomicGroup,
  #[error(transparent)]
  Selection(#[from] SelectionError),
  #[error(transparent)]
  Transaction(#[from] TransactionError),
}

/// The raw text of one literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
  /// Character range of the literal in the document, delimiters included.
  pub range:  Range<usize>,
  pub text:   String,
  /// Cursor offset inside `text`.
  pub offset: usize,
}

pub trait Host {
  fn selection(&self) -> &Selection;

  /// Locators of the regions around `pos`, innermost first.
  fn classify(&self, pos: usize) -> Vec<String>;

  /// The literal of kind `locator` around `pos`.
  fn span(&self, locator: &str, pos: usize) -> Option<Span>;

  /// Replace `range` with `text` and set the selection, already mapped
  /// through the edit by the caller.
  fn commit(
    &mut self,
    range: Range<usize>,
    text: &str,
    selection: Selection,
  ) -> Result<(), HostError>;

  fn begin_atomic_group(&mut self);

  fn end_atomic_group(&mut self);

  /// Undo every commit since the matching `begin_atomic_group` and close
  /// the group.
  fn revert_atomic_group(&mut self) -> Result<(), HostError>;
}
