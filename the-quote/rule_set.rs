//! Rule registry and the rotation algorithms over rule paths.
//!
//! A [`RuleSet`] is built once per language from the language's own rules
//! followed by the generic defaults. Registration is first-wins, so a
//! language rule shadows a generic one of the same name.
//!
//! A [`RulePath`] is the chain of nested encodings currently applied to a
//! literal, root first: `formatted/raw/double.quote` is `fr"..."`. Every
//! rotation function is pure and returns a new path.

use std::collections::HashMap;

use indexmap::IndexMap;
use smallvec::SmallVec;
use thiserror::Error;
use tracing::trace;

use crate::{
  rule::Rule,
  text::Text,
};

pub type RuleId = usize;

pub type Result<T> = std::result::Result<T, RuleSetError>;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RuleSetError {
  #[error("rule `{rule}` contains unknown rule `{name}`")]
  UnknownContains { rule: String, name: String },
  #[error("rule `{rule}` embeds unknown rule `{name}`")]
  UnknownEmbeds { rule: String, name: String },
  #[error("rule `{name}` is nested inside itself")]
  ContainsCycle { name: String },
  #[error("toggle cycle has no entries")]
  EmptyToggle,
  #[error("`{entry}` references unknown rule `{name}`")]
  UnknownPathRule { entry: String, name: String },
  #[error("`{entry}` does not start at a rotatable rule")]
  NotRotatable { entry: String },
  #[error("`{entry}`: `{parent}` does not contain `{child}`")]
  NotContained {
    entry:  String,
    parent: String,
    child:  String,
  },
  #[error("toggle entry `{entry}` does not end at a leaf rule")]
  NotALeaf { entry: String },
}

/// The rule path is not a member of any toggle cycle.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("`{0}` is not part of a toggle cycle")]
pub struct NotToggleable(pub String);

/// Root-to-leaf chain of rules along `contains`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RulePath(SmallVec<[RuleId; 4]>);

impl RulePath {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn root(&self) -> Option<RuleId> {
    self.0.first().copied()
  }

  pub fn leaf(&self) -> Option<RuleId> {
    self.0.last().copied()
  }

  pub fn ids(&self) -> &[RuleId] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  fn push(&mut self, id: RuleId) {
    self.0.push(id);
  }

  fn pop(&mut self) -> Option<RuleId> {
    self.0.pop()
  }
}

impl FromIterator<RuleId> for RulePath {
  fn from_iter<I: IntoIterator<Item = RuleId>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

#[derive(Debug, Clone, Default)]
pub struct RuleSetBuilder {
  rules:          IndexMap<String, Rule>,
  toggles:        Vec<Vec<String>>,
  default_toggle: Option<String>,
}

impl RuleSetBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register `rule` unless a rule with the same name already exists.
  pub fn add(&mut self, rule: Rule) -> &mut Self {
    if self.rules.contains_key(rule.name()) {
      trace!(rule = rule.name(), "rule shadowed by an earlier registration");
      return self;
    }
    self.rules.insert(rule.name().to_string(), rule);
    self
  }

  /// Declare a toggle cycle of `/`-joined rule path names, root first.
  pub fn add_toggle<I, S>(&mut self, cycle: I) -> &mut Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.toggles.push(cycle.into_iter().map(Into::into).collect());
    self
  }

  /// Rule path used when a toggle is requested outside of every cycle.
  pub fn default_toggle(&mut self, entry: impl Into<String>) -> &mut Self {
    self.default_toggle = Some(entry.into());
    self
  }

  pub fn build(self) -> Result<RuleSet> {
    let Self {
      rules,
      toggles,
      default_toggle,
    } = self;

    let resolve = |rule: &Rule, names: &[String], contains: bool| {
      names
        .iter()
        .map(|name| {
          rules.get_index_of(name).ok_or_else(|| {
            let (rule, name) = (rule.name().to_string(), name.clone());
            if contains {
              RuleSetError::UnknownContains { rule, name }
            } else {
              RuleSetError::UnknownEmbeds { rule, name }
            }
          })
        })
        .collect::<Result<SmallVec<[RuleId; 4]>>>()
    };

    let mut contains = Vec::with_capacity(rules.len());
    let mut embeds = Vec::with_capacity(rules.len());
    let mut rotatables = Vec::new();
    let mut embeddables = Vec::new();
    let mut toggleables = Vec::new();

    for (id, rule) in rules.values().enumerate() {
      contains.push(resolve(rule, rule.contains(), true)?);
      embeds.push(resolve(rule, rule.embeds(), false)?);

      if !rule.is_embedded() {
        rotatables.push(id);
      }
      if !rule.embeds().is_empty() {
        embeddables.push(id);
      }
      if rule.is_toggle() {
        toggleables.push(id);
      }
    }

    check_acyclic(&rules, &contains)?;

    let mut set = RuleSet {
      rules,
      contains,
      embeds,
      rotatables,
      embeddables,
      toggleables,
      toggles: HashMap::new(),
      default_toggle: None,
    };

    for cycle in &toggles {
      let paths = cycle
        .iter()
        .map(|entry| {
          let path = set.resolve(entry)?;
          if !set.is_leaf(&path) {
            return Err(RuleSetError::NotALeaf {
              entry: entry.clone(),
            });
          }
          Ok(path)
        })
        .collect::<Result<Vec<_>>>()?;
      set.link_toggle(paths)?;
    }

    if toggles.is_empty() {
      let paths: Vec<_> = set
        .toggleables
        .iter()
        .filter(|&&id| set.rotatables.contains(&id))
        .map(|&id| set.descend(RulePath::from_iter([id])))
        .collect();
      if paths.len() >= 2 {
        set.link_toggle(paths)?;
      }
    }

    if let Some(entry) = default_toggle {
      let path = set.resolve(&entry)?;
      set.default_toggle = Some(set.descend(path));
    }

    Ok(set)
  }
}

fn check_acyclic(rules: &IndexMap<String, Rule>, contains: &[SmallVec<[RuleId; 4]>]) -> Result<()> {
  #[derive(Clone, Copy, PartialEq)]
  enum Mark {
    New,
    Open,
    Done,
  }

  fn visit(id: RuleId, contains: &[SmallVec<[RuleId; 4]>], marks: &mut [Mark]) -> Option<RuleId> {
    match marks[id] {
      Mark::Done => return None,
      Mark::Open => return Some(id),
      Mark::New => {},
    }
    marks[id] = Mark::Open;
    for &child in &contains[id] {
      if let Some(cycle) = visit(child, contains, marks) {
        return Some(cycle);
      }
    }
    marks[id] = Mark::Done;
    None
  }

  let mut marks = vec![Mark::New; contains.len()];
  for id in 0..contains.len() {
    if let Some(cycle) = visit(id, contains, &mut marks) {
      let name = rules
        .get_index(cycle)
        .map(|(name, _)| name.clone())
        .unwrap_or_default();
      return Err(RuleSetError::ContainsCycle { name });
    }
  }
  Ok(())
}

/// Immutable registry of rules, keyed by name.
#[derive(Debug, Clone)]
pub struct RuleSet {
  rules:          IndexMap<String, Rule>,
  /// Resolved `contains` per rule.
  contains:       Vec<SmallVec<[RuleId; 4]>>,
  /// Resolved `embeds` per rule.
  embeds:         Vec<SmallVec<[RuleId; 4]>>,
  rotatables:     Vec<RuleId>,
  embeddables:    Vec<RuleId>,
  toggleables:    Vec<RuleId>,
  /// Joined path name to the next member of its cycle.
  toggles:        HashMap<String, RulePath>,
  default_toggle: Option<RulePath>,
}

impl RuleSet {
  pub fn builder() -> RuleSetBuilder {
    RuleSetBuilder::new()
  }

  pub fn len(&self) -> usize {
    self.rules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rules.is_empty()
  }

  pub fn get(&self, name: &str) -> Option<&Rule> {
    self.rules.get(name)
  }

  pub fn id(&self, name: &str) -> Option<RuleId> {
    self.rules.get_index_of(name)
  }

  /// # Panics
  ///
  /// Panics if `id` was not handed out by this set.
  pub fn rule(&self, id: RuleId) -> &Rule {
    &self.rules[id]
  }

  pub fn rules(&self) -> impl Iterator<Item = &Rule> {
    self.rules.values()
  }

  pub fn rotatables(&self) -> &[RuleId] {
    &self.rotatables
  }

  pub fn embeddables(&self) -> &[RuleId] {
    &self.embeddables
  }

  pub fn toggleables(&self) -> &[RuleId] {
    &self.toggleables
  }

  pub fn children(&self, id: RuleId) -> &[RuleId] {
    &self.contains[id]
  }

  pub fn embeds(&self, id: RuleId) -> &[RuleId] {
    &self.embeds[id]
  }

  /// `/`-joined rule names of `path`.
  pub fn path_name(&self, path: &RulePath) -> String {
    path
      .ids()
      .iter()
      .map(|&id| self.rule(id).name())
      .collect::<Vec<_>>()
      .join("/")
  }

  /// Parse a `/`-joined rule path name.
  pub fn resolve(&self, entry: &str) -> Result<RulePath> {
    let mut path = RulePath::new();
    for name in entry.split('/') {
      let id = self.id(name).ok_or_else(|| {
        RuleSetError::UnknownPathRule {
          entry: entry.to_string(),
          name:  name.to_string(),
        }
      })?;

      match path.leaf() {
        None if !self.rotatables.contains(&id) => {
          return Err(RuleSetError::NotRotatable {
            entry: entry.to_string(),
          });
        },
        Some(parent) if !self.contains[parent].contains(&id) => {
          return Err(RuleSetError::NotContained {
            entry:  entry.to_string(),
            parent: self.rule(parent).name().to_string(),
            child:  name.to_string(),
          });
        },
        _ => {},
      }
      path.push(id);
    }
    Ok(path)
  }

  /// Rotatable roots whose scope matches a classified `locator`.
  pub fn candidates<'a>(&'a self, locator: &'a str) -> impl Iterator<Item = RuleId> + 'a {
    self
      .rotatables
      .iter()
      .copied()
      .filter(move |&id| self.rule(id).scope().matches(locator))
  }

  /// Every root-to-leaf path below `root`, depth first in declaration order.
  pub fn paths(&self, root: RuleId) -> Vec<RulePath> {
    let mut paths = Vec::new();
    self.collect_paths(RulePath::from_iter([root]), &mut paths);
    paths
  }

  fn collect_paths(&self, path: RulePath, paths: &mut Vec<RulePath>) {
    let Some(leaf) = path.leaf() else {
      return;
    };
    if self.contains[leaf].is_empty() {
      paths.push(path);
      return;
    }
    for &child in &self.contains[leaf] {
      let mut next = path.clone();
      next.push(child);
      self.collect_paths(next, paths);
    }
  }

  fn is_leaf(&self, path: &RulePath) -> bool {
    path.leaf().is_some_and(|leaf| self.contains[leaf].is_empty())
  }

  /// Extend `path` with first children until it ends at a leaf.
  fn descend(&self, mut path: RulePath) -> RulePath {
    while let Some(leaf) = path.leaf()
      && let Some(&first) = self.contains[leaf].first()
    {
      path.push(first);
    }
    path
  }

  /// Shortest route from a rotatable root down to `target`.
  fn path_to(&self, target: RuleId) -> RulePath {
    fn find(set: &RuleSet, path: &mut RulePath, target: RuleId) -> bool {
      let Some(leaf) = path.leaf() else {
        return false;
      };
      if leaf == target {
        return true;
      }
      for &child in &set.contains[leaf] {
        path.push(child);
        if find(set, path, target) {
          return true;
        }
        path.pop();
      }
      false
    }

    if self.rotatables.contains(&target) {
      return RulePath::from_iter([target]);
    }

    self
      .rotatables
      .iter()
      .filter_map(|&root| {
        let mut path = RulePath::from_iter([root]);
        find(self, &mut path, target).then_some(path)
      })
      .min_by_key(RulePath::len)
      .unwrap_or_else(|| RulePath::from_iter([target]))
  }

  /// The next encoding in depth-first sibling order.
  ///
  /// Siblings inside the leaf's parent come first; once a family is
  /// exhausted the walk climbs a level, and past the last root it wraps
  /// around to the first rotatable rule.
  pub fn next_rotation(&self, path: &RulePath) -> RulePath {
    let mut next = path.clone();
    let Some(mut child) = next.pop() else {
      return self.descend(self.rotatables.first().copied().into_iter().collect());
    };

    loop {
      let Some(parent) = next.leaf() else {
        let index = self
          .rotatables
          .iter()
          .position(|&id| id == child)
          .map_or(0, |index| (index + 1) % self.rotatables.len());
        if let Some(&root) = self.rotatables.get(index) {
          next.push(root);
        }
        break;
      };

      let siblings = &self.contains[parent];
      match siblings.iter().position(|&id| id == child) {
        Some(index) if index + 1 < siblings.len() => {
          next.push(siblings[index + 1]);
          break;
        },
        _ => {
          next.pop();
          child = parent;
        },
      }
    }

    self.descend(next)
  }

  /// The next encoding whose root can hold embedded regions.
  pub fn next_interpolation(&self, path: &RulePath) -> RulePath {
    let index = path
      .root()
      .and_then(|root| self.embeddables.iter().position(|&id| id == root))
      .map_or(0, |index| (index + 1) % self.embeddables.len());

    match self.embeddables.get(index) {
      Some(&id) => self.descend(self.path_to(id)),
      None => path.clone(),
    }
  }

  /// The member following `path` in its declared toggle cycle.
  pub fn next_toggle(&self, path: &RulePath) -> std::result::Result<RulePath, NotToggleable> {
    let name = self.path_name(path);
    self.toggles.get(&name).cloned().ok_or(NotToggleable(name))
  }

  /// Fallback target for paths outside of every toggle cycle.
  pub fn default_toggle(&self) -> Option<&RulePath> {
    self.default_toggle.as_ref()
  }

  /// The embedded style following `current` in `holder`'s `embeds`.
  ///
  /// `None` stands for plain text: it rotates to the first style, and the
  /// last style rotates back to it.
  pub fn next_embedded(&self, holder: RuleId, current: Option<RuleId>) -> Option<RuleId> {
    let embeds = &self.embeds[holder];
    match current.and_then(|current| embeds.iter().position(|&id| id == current)) {
      Some(index) => embeds.get(index + 1).copied(),
      // plain text, or a style this holder does not know
      None => embeds.first().copied(),
    }
  }

  /// The outermost rule of `path` that carries `embeds`.
  pub fn holder(&self, path: &RulePath) -> Option<RuleId> {
    path
      .ids()
      .iter()
      .copied()
      .find(|&id| !self.embeds[id].is_empty())
  }

  /// Apply the wrap steps of `path`, innermost rule first.
  pub fn wrap(&self, path: &RulePath, text: Text) -> Text {
    path
      .ids()
      .iter()
      .rev()
      .fold(text, |text, &id| self.rule(id).wrap(text))
  }

  /// Apply the unwrap steps of `path`, outermost rule first.
  pub fn unwrap(&self, path: &RulePath, text: Text) -> Text {
    path
      .ids()
      .iter()
      .fold(text, |text, &id| self.rule(id).unwrap(text))
  }

  fn link_toggle(&mut self, paths: Vec<RulePath>) -> Result<()> {
    if paths.is_empty() {
      return Err(RuleSetError::EmptyToggle);
    }
    for (index, path) in paths.iter().enumerate() {
      let next = paths[(index + 1) % paths.len()].clone();
      let name = self.path_name(path);
      self.toggles.entry(name).or_insert(next);
    }
    Ok(())
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::rule::{
    Pattern,
    Scope,
    Step,
  };

  fn locator(scope: &str) -> Scope {
    Scope::Locator(scope.into())
  }

  fn quote(name: &str, quote: char) -> Rule {
    let delimiter = quote.to_string();
    Rule::named(name, locator("string.quoted"))
      .with_toggle(true)
      .with_wrap([Step::escape(quote), Step::surround(&delimiter, &delimiter)])
      .with_unwrap([Step::trim(&delimiter, &delimiter), Step::unescape(quote)])
  }

  fn prefix(name: &str, prefix: &str) -> Rule {
    Rule::named(name, locator("string.quoted"))
      .with_contains(["single.quote", "double.quote"])
      .with_wrap([Step::surround(prefix, "")])
      .with_unwrap([Step::trim(prefix, "")])
  }

  fn python_like() -> RuleSetBuilder {
    let mut builder = RuleSet::builder();
    builder
      .add(quote("single.quote", '\''))
      .add(quote("double.quote", '"'))
      .add(prefix("raw", "r"))
      .add(prefix("unicode", "u"));
    builder
  }

  fn path(set: &RuleSet, entry: &str) -> RulePath {
    set.resolve(entry).unwrap()
  }

  #[test]
  fn add_is_first_wins() {
    let mut builder = RuleSet::builder();
    builder
      .add(Rule::named("double.quote", locator("string.quoted.double.php")))
      .add(Rule::named("double.quote", locator("string.quoted.double")));
    let set = builder.build().unwrap();

    assert_eq!(set.len(), 1);
    assert_eq!(
      set.get("double.quote").unwrap().scope().as_str(),
      "string.quoted.double.php"
    );
  }

  #[test]
  fn derived_lists_follow_registration_order() {
    let mut builder = python_like();
    builder.add(
      Rule::named("meta.embedded", Scope::Pattern(Pattern::new(r"\{[^}]*\}").unwrap()))
        .with_embedded(true),
    );
    builder.add(prefix("formatted", "f").with_embeds(["meta.embedded"]));
    let set = builder.build().unwrap();

    let names = |ids: &[RuleId]| ids.iter().map(|&id| set.rule(id).name()).collect::<Vec<_>>();
    assert_eq!(names(set.rotatables()), vec![
      "single.quote",
      "double.quote",
      "raw",
      "unicode",
      "formatted"
    ]);
    assert_eq!(names(set.embeddables()), vec!["formatted"]);
    assert_eq!(names(set.toggleables()), vec!["single.quote", "double.quote"]);
  }

  #[test]
  fn next_rotation_walks_siblings_then_roots() {
    let set = python_like().build().unwrap();
    let order = [
      "single.quote",
      "double.quote",
      "raw/single.quote",
      "raw/double.quote",
      "unicode/single.quote",
      "unicode/double.quote",
    ];

    for (index, entry) in order.iter().enumerate() {
      let next = set.next_rotation(&path(&set, entry));
      assert_eq!(set.path_name(&next), order[(index + 1) % order.len()]);
    }
  }

  #[test]
  fn next_rotation_closes_over_nested_families() {
    let leaf = |name: &str| Rule::named(name, locator("string")).with_embedded(true);
    let family = |name: &str| Rule::named(name, locator("string")).with_contains(["a", "b"]);

    let mut builder = RuleSet::builder();
    builder.add(leaf("a")).add(leaf("b"));
    for name in ["one", "two", "three", "four"] {
      builder.add(family(name));
    }
    let set = builder.build().unwrap();

    let start = path(&set, "one/a");
    let mut current = set.next_rotation(&start);
    assert_eq!(set.path_name(&current), "one/b");

    for _ in 1..8 {
      assert_ne!(current, start);
      current = set.next_rotation(&current);
    }
    assert_eq!(current, start);
  }

  #[test]
  fn next_rotation_from_nothing_starts_at_first_root() {
    let set = python_like().build().unwrap();
    let next = set.next_rotation(&RulePath::new());
    assert_eq!(set.path_name(&next), "single.quote");
  }

  #[test]
  fn toggles_are_symmetric() {
    let mut builder = python_like();
    builder
      .add_toggle(["single.quote", "double.quote"])
      .add_toggle(["raw/single.quote", "raw/double.quote"]);
    let set = builder.build().unwrap();

    for entry in ["single.quote", "double.quote", "raw/single.quote", "raw/double.quote"] {
      let start = path(&set, entry);
      let toggled = set.next_toggle(&start).unwrap();
      assert_ne!(toggled, start);
      assert_eq!(set.next_toggle(&toggled).unwrap(), start);
    }

    let unicode = path(&set, "unicode/single.quote");
    assert_eq!(
      set.next_toggle(&unicode),
      Err(NotToggleable("unicode/single.quote".into()))
    );
  }

  #[test]
  fn toggle_cycle_is_derived_from_flagged_roots() {
    let set = python_like().build().unwrap();
    let toggled = set.next_toggle(&path(&set, "single.quote")).unwrap();
    assert_eq!(set.path_name(&toggled), "double.quote");
    assert!(set.next_toggle(&path(&set, "raw/single.quote")).is_err());
  }

  #[test]
  fn default_toggle_descends_to_a_leaf() {
    let mut builder = python_like();
    builder.default_toggle("raw");
    let set = builder.build().unwrap();
    assert_eq!(
      set.default_toggle().map(|path| set.path_name(path)).as_deref(),
      Some("raw/single.quote")
    );
  }

  #[test]
  fn build_rejects_broken_declarations() {
    let mut builder = python_like();
    builder.add(Rule::named("bytes", locator("string")).with_contains(["missing"]));
    assert_eq!(builder.build().unwrap_err(), RuleSetError::UnknownContains {
      rule: "bytes".into(),
      name: "missing".into(),
    });

    let mut builder = python_like();
    builder.add(Rule::named("fmt", locator("string")).with_embeds(["missing"]));
    assert!(matches!(
      builder.build(),
      Err(RuleSetError::UnknownEmbeds { .. })
    ));

    let mut builder = RuleSet::builder();
    builder
      .add(Rule::named("a", locator("string")).with_contains(["b"]))
      .add(Rule::named("b", locator("string")).with_contains(["a"]));
    assert!(matches!(
      builder.build(),
      Err(RuleSetError::ContainsCycle { .. })
    ));

    let mut builder = python_like();
    builder.add_toggle(["raw/unicode"]);
    assert_eq!(builder.build().unwrap_err(), RuleSetError::NotContained {
      entry:  "raw/unicode".into(),
      parent: "raw".into(),
      child:  "unicode".into(),
    });

    let mut builder = python_like();
    builder.add_toggle(["raw", "single.quote"]);
    assert_eq!(builder.build().unwrap_err(), RuleSetError::NotALeaf {
      entry: "raw".into(),
    });

    let mut builder = python_like();
    builder.add_toggle(Vec::<String>::new());
    assert_eq!(builder.build().unwrap_err(), RuleSetError::EmptyToggle);

    let mut builder = python_like();
    builder.default_toggle("backtick");
    assert!(matches!(
      builder.build(),
      Err(RuleSetError::UnknownPathRule { .. })
    ));
  }

  #[test]
  fn next_interpolation_cycles_embeddable_roots() {
    let mut builder = python_like();
    builder
      .add(Rule::named("embedded", locator("meta.embedded")).with_embedded(true))
      .add(Rule::named("template", locator("string.template")).with_embeds(["embedded"]))
      .add(prefix("formatted", "f").with_embeds(["embedded"]));
    let set = builder.build().unwrap();

    let next = set.next_interpolation(&path(&set, "double.quote"));
    assert_eq!(set.path_name(&next), "template");

    let next = set.next_interpolation(&next);
    assert_eq!(set.path_name(&next), "formatted/single.quote");

    let next = set.next_interpolation(&path(&set, "formatted/double.quote"));
    assert_eq!(set.path_name(&next), "template");
  }

  #[test]
  fn next_embedded_cycles_through_plain_text() {
    let mut builder = RuleSet::builder();
    builder
      .add(Rule::named("dollar", locator("meta.dollar")).with_embedded(true))
      .add(Rule::named("brace", locator("meta.brace")).with_embedded(true))
      .add(Rule::named("template", locator("string")).with_embeds(["dollar", "brace"]));
    let set = builder.build().unwrap();

    let holder = set.id("template").unwrap();
    let dollar = set.id("dollar");
    let brace = set.id("brace");

    assert_eq!(set.next_embedded(holder, None), dollar);
    assert_eq!(set.next_embedded(holder, dollar), brace);
    assert_eq!(set.next_embedded(holder, brace), None);
    assert_eq!(set.holder(&path(&set, "template")), Some(holder));
  }

  #[test]
  fn paths_enumerate_every_leaf() {
    let set = python_like().build().unwrap();
    let names: Vec<_> = set
      .paths(set.id("raw").unwrap())
      .iter()
      .map(|path| set.path_name(path))
      .collect();
    assert_eq!(names, vec!["raw/single.quote", "raw/double.quote"]);
  }

  #[test]
  fn wrap_is_innermost_first() {
    let set = python_like().build().unwrap();
    let raw_double = path(&set, "raw/double.quote");

    let text = set.wrap(&raw_double, Text::new("a\"b", 1));
    assert_eq!(text.as_str(), r#"r"a\"b""#);
    assert_eq!(text.offset(), 4);

    let text = set.unwrap(&raw_double, text);
    assert_eq!(text.as_str(), "a\"b");
    assert_eq!(text.offset(), 1);
  }
}
