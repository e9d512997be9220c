//! The rotation driver.
//!
//! For every selection, last to first, the [`Rotator`] asks the host which
//! literal surrounds it, finds the rule path the literal is written in,
//! computes the next path, then unwraps with the old path and wraps with
//! the new one. Only valid text is committed. Every selection is processed
//! inside its own atomic group, and any error reverts that group so a
//! skipped selection leaves the buffer exactly as it found it.

use std::ops::Range;

use thiserror::Error;
use tracing::{
  trace,
  warn,
};

use crate::{
  diagnostics::{
    Diagnostics,
    Event,
    NoopDiagnostics,
  },
  host::{
    Host,
    HostError,
    Span,
  },
  rule_set::{
    NotToggleable,
    RuleId,
    RulePath,
    RuleSet,
  },
  selection::{
    self,
    Selection,
  },
  text::Text,
};

/// Candidate paths tried before a rotation gives up.
pub const MAX_ATTEMPTS: usize = 10;

pub type Result<T> = std::result::Result<T, RotateError>;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RotateError {
  #[error("no candidate encoding accepts the literal")]
  InvalidText,
  #[error(transparent)]
  NotToggleable(#[from] NotToggleable),
  #[error("no rule with embedded regions is declared")]
  NoEmbeddableRule,
  #[error("selection {from}..{to} is not inside a single literal")]
  SelectionSpansBoundary { from: usize, to: usize },
  #[error("no rule matches a literal at {pos}")]
  NoMatchingRule { pos: usize },
  #[error("nothing to embed: empty selection outside of embedded regions")]
  NoEmbeddedRegion,
  #[error(transparent)]
  Host(#[from] HostError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  /// Move to the next encoding in declaration order.
  Cycle,
  /// Move along the declared toggle cycle.
  Toggle,
  /// Embed the selection in an interpolation region, or rotate the style
  /// of the region around it.
  Embed,
}

/// Outcome of one action over all selections.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Report {
  pub applied: usize,
  /// Selection index and the reason it was left alone.
  pub skipped: Vec<(usize, RotateError)>,
}

#[derive(Debug)]
pub struct Rotator<'a, D = NoopDiagnostics> {
  rules:        &'a RuleSet,
  diagnostics:  D,
  max_attempts: usize,
}

impl<'a> Rotator<'a> {
  pub fn new(rules: &'a RuleSet) -> Self {
    Self {
      rules,
      diagnostics: NoopDiagnostics,
      max_attempts: MAX_ATTEMPTS,
    }
  }
}

impl<'a, D: Diagnostics> Rotator<'a, D> {
  pub fn with_diagnostics<E: Diagnostics>(self, diagnostics: E) -> Rotator<'a, E> {
    Rotator {
      rules: self.rules,
      diagnostics,
      max_attempts: self.max_attempts,
    }
  }

  #[must_use]
  pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
    self.max_attempts = max_attempts.max(1);
    self
  }

  pub fn cycle<H: Host + ?Sized>(&self, host: &mut H) -> Report {
    self.run(Action::Cycle, host)
  }

  pub fn toggle<H: Host + ?Sized>(&self, host: &mut H) -> Report {
    self.run(Action::Toggle, host)
  }

  pub fn embed<H: Host + ?Sized>(&self, host: &mut H) -> Report {
    self.run(Action::Embed, host)
  }

  pub fn run<H: Host + ?Sized>(&self, action: Action, host: &mut H) -> Report {
    let mut report = Report::default();
    // literals rewritten so far, in current document positions
    let mut rotated: Vec<Range<usize>> = Vec::new();

    for index in (0..host.selection().len()).rev() {
      let head = host.selection().get(index).map(|range| range.head);
      if action != Action::Embed
        && head.is_ok_and(|head| rotated.iter().any(|literal| literal.contains(&head)))
      {
        trace!(index, "literal already rotated for a later selection");
        report.applied += 1;
        continue;
      }

      host.begin_atomic_group();
      let result = match action {
        Action::Cycle | Action::Toggle => {
          self.rotate(action, host, index).map(|(old, len)| {
            let moved = |pos: usize| pos - old.len() + len;
            for literal in rotated.iter_mut().filter(|literal| literal.start >= old.end) {
              *literal = moved(literal.start)..moved(literal.end);
            }
            rotated.push(old.start..old.start + len);
          })
        },
        Action::Embed => self.embed_one(host, index),
      };

      match result {
        Ok(()) => {
          host.end_atomic_group();
          report.applied += 1;
        },
        Err(error) => {
          if let Err(revert) = host.revert_atomic_group() {
            warn!(index, %revert, "failed to revert atomic group");
          }
          self.diagnostics.report(Event::Skipped {
            index,
            error: &error,
          });
          report.skipped.push((index, error));
        },
      }
    }

    report
  }

  /// Find the literal around `pos` and the rule path it is written in.
  ///
  /// Locators are tried innermost first; below every matching root, each
  /// path is tried in declaration order and the first one that unwraps the
  /// literal wins.
  fn locate<H: Host + ?Sized>(&self, host: &H, pos: usize) -> Result<(Span, RulePath)> {
    for locator in host.classify(pos) {
      let roots: Vec<RuleId> = self.rules.candidates(&locator).collect();
      if roots.is_empty() {
        continue;
      }
      let Some(span) = host.span(&locator, pos) else {
        continue;
      };

      for root in roots {
        for path in self.rules.paths(root) {
          let text = self.rules.unwrap(&path, Text::new(&span.text, span.offset));
          if text.is_valid() {
            trace!(%locator, path = %self.rules.path_name(&path), "literal classified");
            return Ok((span, path));
          }
        }
      }
    }

    Err(RotateError::NoMatchingRule { pos })
  }

  /// Re-encode `text` from one path to another, tracking `offset`.
  fn transcode(&self, from: &RulePath, to: &RulePath, text: &str, offset: usize) -> Text {
    let text = self.rules.unwrap(from, Text::new(text, offset));
    trace!(value = text.as_str(), offset = text.offset(), valid = text.is_valid(), "unwrapped");
    self.rules.wrap(to, text)
  }

  /// Try to move the literal in `span` from `path` to `next`. `None` when
  /// `next` rejects the content.
  fn rewrite(
    &self,
    span: &Span,
    path: &RulePath,
    next: &RulePath,
    selection: &Selection,
    index: usize,
  ) -> Result<Option<Rewrite>> {
    let text = self.transcode(path, next, &span.text, span.offset);
    if !text.is_valid() {
      return Ok(None);
    }

    let new_len = text.len_chars();
    let inner = |offset: usize| self.transcode(path, next, &span.text, offset).offset();
    let range = selection.get(index).map_err(HostError::from)?;
    Ok(Some(Rewrite {
      active: remap(range, &span.range, new_len, &inner),
      selection: remap_selection(selection, &span.range, new_len, &inner)?,
      text,
    }))
  }

  /// Rotate the literal under selection `index`. Returns the literal's old
  /// range and its new length.
  fn rotate<H: Host + ?Sized>(
    &self,
    action: Action,
    host: &mut H,
    index: usize,
  ) -> Result<(Range<usize>, usize)> {
    let range = host.selection().get(index).map_err(HostError::from)?;
    let (span, path) = self.locate(host, range.head)?;

    let mut next = match action {
      Action::Toggle => {
        match self.rules.next_toggle(&path) {
          Ok(next) => next,
          // outside every cycle: go to the default toggle, unless already there
          Err(err) => {
            match self.rules.default_toggle() {
              Some(default) if *default != path => default.clone(),
              _ => return Err(err.into()),
            }
          },
        }
      },
      _ => self.rules.next_rotation(&path),
    };

    for attempt in 1..=self.max_attempts {
      if next == path {
        break;
      }

      if let Some(rewrite) = self.rewrite(&span, &path, &next, host.selection(), index)? {
        let len = rewrite.text.len_chars();
        if rewrite.text.as_str() != span.text {
          host.commit(span.range.clone(), rewrite.text.as_str(), rewrite.selection)?;
        }
        self.diagnostics.report(Event::Rotated {
          index,
          from: &self.rules.path_name(&path),
          to: &self.rules.path_name(&next),
        });
        return Ok((span.range, len));
      }

      self.diagnostics.report(Event::Rejected {
        index,
        path: &self.rules.path_name(&next),
        attempt,
      });

      next = match action {
        // stay inside the declared cycle
        Action::Toggle => {
          match self.rules.next_toggle(&next) {
            Ok(next) => next,
            Err(_) => break,
          }
        },
        _ => self.rules.next_rotation(&next),
      };
    }

    Err(RotateError::InvalidText)
  }

  /// Move the literal onto an encoding that can hold embedded regions.
  fn interpolate(
    &self,
    index: usize,
    span: &Span,
    path: &RulePath,
    selection: &Selection,
  ) -> Result<(RulePath, Rewrite)> {
    let mut next = self.rules.next_interpolation(path);

    for attempt in 1..=self.max_attempts {
      if next != *path && self.rules.holder(&next).is_some() {
        if let Some(rewrite) = self.rewrite(span, path, &next, selection, index)? {
          return Ok((next, rewrite));
        }
        self.diagnostics.report(Event::Rejected {
          index,
          path: &self.rules.path_name(&next),
          attempt,
        });
      }
      next = self.rules.next_rotation(&next);
    }

    Err(RotateError::InvalidText)
  }

  /// Character interval of the literal's content inside `span.text`, from
  /// its first character up to the closing delimiter. `None` for an empty
  /// literal.
  fn content(&self, path: &RulePath, span: &Span) -> Option<Range<usize>> {
    let unwrapped = |offset: usize| self.rules.unwrap(path, Text::new(&span.text, offset));
    let len = unwrapped(0).len_chars();
    if len == 0 {
      return None;
    }

    let raw = span.text.chars().count();
    let start = (1..=raw).find(|&offset| unwrapped(offset).offset() > 0)? - 1;
    let end = (start..=raw).find(|&offset| unwrapped(offset).offset() >= len)?;
    Some(start..end)
  }

  fn embed_one<H: Host + ?Sized>(&self, host: &mut H, index: usize) -> Result<()> {
    if self.rules.embeddables().is_empty() {
      return Err(RotateError::NoEmbeddableRule);
    }

    let mut range = host.selection().get(index).map_err(HostError::from)?;
    let (mut span, mut path) = self.locate(host, range.from())?;
    let spans_boundary = RotateError::SelectionSpansBoundary {
      from: range.from(),
      to:   range.to(),
    };
    if range.to() > span.range.end {
      return Err(spans_boundary);
    }
    let (from, to) = (range.from() - span.range.start, range.to() - span.range.start);
    match self.content(&path, &span) {
      Some(content) if content.start <= from && to <= content.end => (),
      None if from == to => (),
      _ => return Err(spans_boundary),
    }

    if self.rules.holder(&path).is_none() {
      let (next, rewrite) = self.interpolate(index, &span, &path, host.selection())?;
      let text = rewrite.text.to_string();
      host.commit(span.range.clone(), &text, rewrite.selection)?;
      self.diagnostics.report(Event::Rotated {
        index,
        from: &self.rules.path_name(&path),
        to: &self.rules.path_name(&next),
      });

      let start = span.range.start;
      range = rewrite.active;
      span = Span {
        range:  start..start + rewrite.text.len_chars(),
        offset: range.head.saturating_sub(start),
        text,
      };
      path = next;
    }

    let holder = self
      .rules
      .holder(&path)
      .ok_or(RotateError::NoEmbeddableRule)?;

    let start = span.range.start;
    let (from, to) = (range.from() - start, range.to() - start);
    let content = self.content(&path, &span).unwrap_or(from..from);
    match self.enclosing_region(holder, &span.text, &content, from, to) {
      Some((current, region)) => {
        self.rotate_region(host, index, holder, current, &span, region)
      },
      None if range.is_empty() => Err(RotateError::NoEmbeddedRegion),
      None => self.wrap_selection(host, index, holder, &span, from..to, range),
    }
  }

  /// The widest region of any of `holder`'s embedded rules that lies in
  /// `content` and covers `from..to`. Ties go to the rule declared first.
  fn enclosing_region(
    &self,
    holder: RuleId,
    text: &str,
    content: &Range<usize>,
    from: usize,
    to: usize,
  ) -> Option<(RuleId, Range<usize>)> {
    let mut best: Option<(RuleId, Range<usize>)> = None;
    for &id in self.rules.embeds(holder) {
      for region in self.rules.rule(id).scope().locate(text) {
        if region.start < content.start || content.end < region.end {
          continue;
        }
        if region.start > from || to > region.end {
          continue;
        }
        if best.as_ref().is_none_or(|(_, best)| region.len() > best.len()) {
          best = Some((id, region));
        }
      }
    }
    best
  }

  /// Rewrite an existing region in the next embedded style, or as plain
  /// text after the last one.
  fn rotate_region<H: Host + ?Sized>(
    &self,
    host: &mut H,
    index: usize,
    holder: RuleId,
    current: RuleId,
    span: &Span,
    region: Range<usize>,
  ) -> Result<()> {
    let next = self.rules.next_embedded(holder, Some(current));
    let raw: String = span.text.chars().skip(region.start).take(region.len()).collect();

    let restyle = |offset: usize| {
      let text = self.rules.rule(current).unwrap(Text::new(&raw, offset));
      match next {
        Some(next) => self.rules.rule(next).wrap(text),
        None => text,
      }
    };

    let text = restyle(0);
    if !text.is_valid() {
      return Err(RotateError::InvalidText);
    }

    let edit = span.range.start + region.start..span.range.start + region.end;
    let selection = remap_selection(host.selection(), &edit, text.len_chars(), |offset| {
      restyle(offset).offset()
    })?;
    host.commit(edit, text.as_str(), selection)?;

    let name = |id: Option<RuleId>| id.map_or("plain", |id| self.rules.rule(id).name());
    self.diagnostics.report(Event::Rotated {
      index,
      from: name(Some(current)),
      to: name(next),
    });
    Ok(())
  }

  /// Wrap exactly the selected text in the holder's first embedded style.
  fn wrap_selection<H: Host + ?Sized>(
    &self,
    host: &mut H,
    index: usize,
    holder: RuleId,
    span: &Span,
    selected: Range<usize>,
    range: selection::Range,
  ) -> Result<()> {
    let embedded = *self
      .rules
      .embeds(holder)
      .first()
      .ok_or(RotateError::NoEmbeddableRule)?;
    let rule = self.rules.rule(embedded);
    let raw: String = span
      .text
      .chars()
      .skip(selected.start)
      .take(selected.len())
      .collect();

    let text = rule.wrap(Text::new(&raw, 0));
    if !text.is_valid() {
      return Err(RotateError::InvalidText);
    }

    // keep the selection on the original content, now inside the region
    let edit = span.range.start + selected.start..span.range.start + selected.end;
    let inner = |offset: usize| rule.wrap(Text::new(&raw, offset)).offset();
    let active = selection::Range::new(
      edit.start + inner(range.anchor - edit.start),
      edit.start + inner(range.head - edit.start),
    );
    let new_len = text.len_chars();
    let ranges = host.selection().iter().enumerate().map(|(i, &other)| {
      if i == index {
        active
      } else {
        remap(other, &edit, new_len, &inner)
      }
    });
    let selection = Selection::new(ranges).map_err(HostError::from)?;

    host.commit(edit, text.as_str(), selection)?;
    self.diagnostics.report(Event::Rotated {
      index,
      from: "plain",
      to: rule.name(),
    });
    Ok(())
  }
}

/// A literal re-encoded in another path.
struct Rewrite {
  text:      Text,
  /// The processed range, mapped through the rewrite.
  active:    selection::Range,
  /// Every range, mapped through the rewrite.
  selection: Selection,
}

/// Map a selection through the replacement of `edit` by `new_len`
/// characters. Ends strictly inside the edit go through `inner`, which maps
/// an offset into the old text to an offset into the new one.
fn remap(
  range: selection::Range,
  edit: &Range<usize>,
  new_len: usize,
  inner: impl Fn(usize) -> usize,
) -> selection::Range {
  let map = |pos: usize| {
    if pos <= edit.start {
      pos
    } else if pos >= edit.end {
      pos - edit.len() + new_len
    } else {
      edit.start + inner(pos - edit.start)
    }
  };
  selection::Range::new(map(range.anchor), map(range.head))
}

/// [`remap`] every range of `selection`.
fn remap_selection(
  selection: &Selection,
  edit: &Range<usize>,
  new_len: usize,
  inner: impl Fn(usize) -> usize,
) -> Result<Selection> {
  let ranges = selection.iter().map(|&range| remap(range, edit, new_len, &inner));
  Ok(Selection::new(ranges).map_err(HostError::from)?)
}

#[cfg(test)]
mod test {
  use std::cell::Cell;

  use super::*;
  use crate::{
    document::Document,
    rule::{
      Pattern,
      Rule,
      Scope,
      Step,
    },
  };

  fn quote(name: &str, quote: char) -> Rule {
    let delimiter = quote.to_string();
    Rule::named(name, Scope::Locator("string.quoted".into()))
      .with_toggle(true)
      .with_wrap([Step::escape(quote), Step::surround(&delimiter, &delimiter)])
      .with_unwrap([Step::trim(&delimiter, &delimiter), Step::unescape(quote)])
  }

  fn quotes() -> RuleSet {
    let mut builder = RuleSet::builder();
    builder
      .add(quote("double.quote", '"'))
      .add(quote("single.quote", '\''))
      .default_toggle("double.quote");
    builder.build().unwrap()
  }

  #[test]
  fn remap_moves_ends_after_the_edit() {
    let range = selection::Range::new(12, 2);
    let mapped = remap(range, &(4..8), 6, |offset| offset + 1);
    assert_eq!(mapped, selection::Range::new(10, 2));

    let inside = remap(selection::Range::point(5), &(4..8), 6, |offset| offset + 1);
    assert_eq!(inside, selection::Range::point(6));
  }

  #[test]
  fn cycle_keeps_cursor_on_content() {
    let rules = quotes();
    // cursor on the `h`
    let mut doc = Document::new(r#"x = "say \"hi\"""#)
      .with_scope(4..16, "string.quoted.double")
      .with_selection(Selection::point(11));

    let report = Rotator::new(&rules).cycle(&mut doc);
    assert_eq!(report.applied, 1);
    assert_eq!(doc.text().to_string(), r#"x = 'say "hi"'"#);
    assert_eq!(doc.selection(), &Selection::point(10));
    assert_eq!(doc.text().char(10), 'h');
  }

  #[test]
  fn outside_of_literals_nothing_happens() {
    let rules = quotes();
    let mut doc = Document::new("x = 'a'")
      .with_scope(4..7, "string.quoted.single")
      .with_selection(Selection::point(1));

    let report = Rotator::new(&rules).toggle(&mut doc);
    assert_eq!(report.applied, 0);
    assert_eq!(report.skipped, vec![(0, RotateError::NoMatchingRule { pos: 1 })]);
    assert_eq!(doc.text().to_string(), "x = 'a'");
  }

  #[test]
  fn toggle_at_the_default_target_is_not_toggleable() {
    let mut builder = RuleSet::builder();
    builder
      .add(quote("double.quote", '"'))
      .add(quote("single.quote", '\''))
      .add(quote("backtick", '`').with_toggle(false))
      .default_toggle("backtick");
    let rules = builder.build().unwrap();

    let mut doc = Document::new("`a`")
      .with_scope(0..3, "string.quoted.other")
      .with_selection(Selection::point(1));

    let report = Rotator::new(&rules).toggle(&mut doc);
    assert_eq!(report.skipped, vec![(
      0,
      RotateError::NotToggleable(NotToggleable("backtick".into()))
    )]);
    assert_eq!(doc.text().to_string(), "`a`");
  }

  #[test]
  fn remap_selection_keeps_ranges_sorted() {
    let selection = Selection::new([
      selection::Range::point(1),
      selection::Range::point(5),
      selection::Range::point(12),
    ])
    .unwrap();
    // cursors inside the edit move with its content
    let mapped = remap_selection(&selection, &(4..8), 10, |offset| offset + 2).unwrap();
    assert_eq!(mapped.ranges(), &[
      selection::Range::point(1),
      selection::Range::point(7),
      selection::Range::point(14),
    ]);
  }

  #[test]
  fn embed_without_embeddable_rules_is_a_noop() {
    let rules = quotes();
    let mut doc = Document::new("'abc'")
      .with_scope(0..5, "string.quoted.single")
      .with_selection(Selection::single(1, 3));

    let report = Rotator::new(&rules).embed(&mut doc);
    assert_eq!(report.skipped, vec![(0, RotateError::NoEmbeddableRule)]);
    assert_eq!(doc.text().to_string(), "'abc'");
    assert_eq!(doc.selection(), &Selection::single(1, 3));
  }

  #[test]
  fn max_attempts_bounds_retries() {
    #[derive(Default)]
    struct Rejections(Cell<usize>);

    impl Diagnostics for Rejections {
      fn report(&self, event: Event<'_>) {
        if let Event::Rejected { .. } = event {
          self.0.set(self.0.get() + 1);
        }
      }
    }

    let mut builder = RuleSet::builder();
    builder.add(quote("double.quote", '"'));
    for n in 0..5 {
      builder.add(
        Rule::named(format!("empty.{n}"), Scope::Locator("string.quoted".into()))
          .with_wrap([Step::Validate {
            pattern: Pattern::new("^$").unwrap(),
          }]),
      );
    }
    let rules = builder.build().unwrap();

    let mut doc = Document::new("\"abc\"")
      .with_scope(0..5, "string.quoted.double")
      .with_selection(Selection::point(2));

    let rejections = Rejections::default();
    let report = Rotator::new(&rules)
      .with_diagnostics(&rejections)
      .with_max_attempts(3)
      .cycle(&mut doc);

    assert_eq!(report.skipped, vec![(0, RotateError::InvalidText)]);
    assert_eq!(rejections.0.get(), 3);
    assert_eq!(doc.text().to_string(), "\"abc\"");
  }
}
