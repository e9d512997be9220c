//! A rope-backed in-memory [`Host`].
//!
//! The document knows nothing about languages. Callers describe where the
//! literals are by registering scope regions (`with_scope`), the way a
//! syntax highlighter would hand them out. Regions are mapped through every
//! committed edit; the selection comes with the edit.
//!
//! Atomic groups keep the inversion of every committed transaction together
//! with the selection and regions the group started from. Reverting applies
//! the inversions newest first and restores that state.

use std::ops::Range;

use ropey::Rope;
use tracing::trace;

use crate::{
  host::{
    Host,
    HostError,
    Span,
  },
  selection::Selection,
  transaction::{
    Assoc,
    Transaction,
  },
};

/// A classified region of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRegion {
  pub range:   Range<usize>,
  pub locator: String,
}

#[derive(Debug, Clone)]
struct State {
  selection: Selection,
  scopes:    Vec<ScopeRegion>,
}

#[derive(Debug)]
struct Group {
  /// Inversions in commit order.
  inversions: Vec<Transaction>,
  original:   State,
}

#[derive(Debug)]
pub struct Document {
  text:      Rope,
  selection: Selection,
  scopes:    Vec<ScopeRegion>,
  groups:    Vec<Group>,
}

impl Document {
  pub fn new(text: &str) -> Self {
    Self::from(Rope::from(text))
  }

  #[must_use]
  pub fn with_selection(mut self, selection: Selection) -> Self {
    self.selection = selection;
    self
  }

  #[must_use]
  pub fn with_scope(mut self, range: Range<usize>, locator: impl Into<String>) -> Self {
    self.add_scope(range, locator);
    self
  }

  pub fn add_scope(&mut self, range: Range<usize>, locator: impl Into<String>) {
    self.scopes.push(ScopeRegion {
      range,
      locator: locator.into(),
    });
  }

  pub fn set_selection(&mut self, selection: Selection) {
    self.selection = selection;
  }

  pub fn text(&self) -> &Rope {
    &self.text
  }

  pub fn scopes(&self) -> &[ScopeRegion] {
    &self.scopes
  }

  /// Regions covering `pos`, smallest first.
  fn regions_at(&self, pos: usize) -> Vec<&ScopeRegion> {
    let len = self.text.len_chars();
    let mut regions: Vec<_> = self
      .scopes
      .iter()
      .filter(|region| region.range.start <= pos && pos < region.range.end && region.range.end <= len)
      .collect();
    regions.sort_by_key(|region| region.range.len());
    regions
  }

  fn apply(&mut self, transaction: &Transaction) -> Result<(), HostError> {
    let inversion = transaction.invert(&self.text)?;
    transaction.apply(&mut self.text)?;

    let changes = transaction.changes();
    for region in &mut self.scopes {
      let start = changes.map_pos(region.range.start, Assoc::Before)?;
      let end = changes.map_pos(region.range.end, Assoc::After)?;
      region.range = start..end.max(start);
    }

    if let Some(group) = self.groups.last_mut() {
      group.inversions.push(inversion);
    }
    Ok(())
  }
}

impl From<Rope> for Document {
  fn from(text: Rope) -> Self {
    Self {
      text,
      selection: Selection::point(0),
      scopes: Vec::new(),
      groups: Vec::new(),
    }
  }
}

impl Host for Document {
  fn selection(&self) -> &Selection {
    &self.selection
  }

  fn classify(&self, pos: usize) -> Vec<String> {
    self
      .regions_at(pos)
      .into_iter()
      .map(|region| region.locator.clone())
      .collect()
  }

  fn span(&self, locator: &str, pos: usize) -> Option<Span> {
    let region = self
      .regions_at(pos)
      .into_iter()
      .find(|region| region.locator == locator)?;
    let range = region.range.clone();

    Some(Span {
      text: self.text.slice(range.clone()).to_string(),
      offset: pos - range.start,
      range,
    })
  }

  fn commit(
    &mut self,
    range: Range<usize>,
    text: &str,
    selection: Selection,
  ) -> Result<(), HostError> {
    let len = self.text.len_chars();
    if range.start > range.end || range.end > len {
      return Err(HostError::OutOfBounds {
        start: range.start,
        end: range.end,
        len,
      });
    }

    trace!(?range, text, "commit");
    let transaction = Transaction::change(&self.text, [(range.start, range.end, Some(text.into()))])?;
    self.apply(&transaction)?;
    self.selection = selection;
    Ok(())
  }

  fn begin_atomic_group(&mut self) {
    self.groups.push(Group {
      inversions: Vec::new(),
      original:   State {
        selection: self.selection.clone(),
        scopes:    self.scopes.clone(),
      },
    });
  }

  fn end_atomic_group(&mut self) {
    let Some(group) = self.groups.pop() else {
      return;
    };
    // a nested group becomes part of its parent
    if let Some(parent) = self.groups.last_mut() {
      parent.inversions.extend(group.inversions);
    }
  }

  fn revert_atomic_group(&mut self) -> Result<(), HostError> {
    let group = self.groups.pop().ok_or(HostError::NoAtomicGroup)?;
    for inversion in group.inversions.iter().rev() {
      inversion.apply(&mut self.text)?;
    }
    self.selection = group.original.selection;
    self.scopes = group.original.scopes;
    Ok(())
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::selection::Range as SelRange;

  #[test]
  fn classify_is_innermost_first() {
    let doc = Document::new("f'{x}'")
      .with_scope(0..6, "string.quoted.single")
      .with_scope(2..5, "meta.embedded");

    assert_eq!(doc.classify(3), vec!["meta.embedded", "string.quoted.single"]);
    assert_eq!(doc.classify(0), vec!["string.quoted.single"]);
    assert!(doc.classify(6).is_empty());
  }

  #[test]
  fn span_reports_offset_into_literal() {
    let doc = Document::new("x = 'hi'").with_scope(4..8, "string");
    let span = doc.span("string", 6).unwrap();
    assert_eq!(span, Span {
      range:  4..8,
      text:   "'hi'".into(),
      offset: 2,
    });
    assert!(doc.span("comment", 6).is_none());
  }

  #[test]
  fn commit_sets_selection_and_maps_scopes() {
    let mut doc = Document::new("a = 'x', 'y'")
      .with_scope(4..7, "string")
      .with_scope(9..12, "string")
      .with_selection(Selection::new([SelRange::point(5), SelRange::point(10)]).unwrap());

    let selection = Selection::new([SelRange::point(11), SelRange::point(6)]).unwrap();
    doc.commit(4..7, "f'x'", selection).unwrap();

    assert_eq!(doc.text().to_string(), "a = f'x', 'y'");
    assert_eq!(doc.selection().ranges(), &[SelRange::point(6), SelRange::point(11)]);
    assert_eq!(doc.scopes()[0].range, 4..8);
    assert_eq!(doc.scopes()[1].range, 10..13);
  }

  #[test]
  fn commit_rejects_out_of_bounds() {
    let mut doc = Document::new("'a'");
    assert_eq!(
      doc.commit(1..9, "b", Selection::point(0)),
      Err(HostError::OutOfBounds {
        start: 1,
        end:   9,
        len:   3,
      })
    );
  }

  #[test]
  fn revert_restores_everything_in_the_group() {
    let mut doc = Document::new("say 'hi'")
      .with_scope(4..8, "string")
      .with_selection(Selection::point(6));

    doc.begin_atomic_group();
    doc.commit(4..8, "\"hi\"", Selection::point(6)).unwrap();
    doc.begin_atomic_group();
    doc.commit(4..8, "`hi`", Selection::single(5, 7)).unwrap();
    doc.end_atomic_group();
    assert_eq!(doc.text().to_string(), "say `hi`");

    doc.revert_atomic_group().unwrap();
    assert_eq!(doc.text().to_string(), "say 'hi'");
    assert_eq!(doc.selection(), &Selection::point(6));
    assert_eq!(doc.scopes()[0].range, 4..8);

    assert_eq!(doc.revert_atomic_group(), Err(HostError::NoAtomicGroup));
  }

  #[test]
  fn ended_group_keeps_edits() {
    let mut doc = Document::new("'a'").with_scope(0..3, "string");
    doc.begin_atomic_group();
    doc.commit(0..3, "\"a\"", Selection::point(1)).unwrap();
    doc.end_atomic_group();
    assert_eq!(doc.text().to_string(), "\"a\"");
    assert_eq!(doc.revert_atomic_group(), Err(HostError::NoAtomicGroup));
  }
}
