//! Rules describe one encoding of a literal.
//!
//! A rule is plain data: a name, a [`Scope`], its relationships to other
//! rules, and two lists of [`Step`]s. `unwrap` strips the rule's own syntax
//! from a [`Text`], `wrap` adds it back. Rules never look at each other;
//! nesting and rotation live in [`crate::rule_set`].

use std::{
  fmt,
  ops::Range,
};

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::text::Text;

#[derive(Debug, Error)]
#[error("invalid pattern `{pattern}`: {source}")]
pub struct PatternError {
  pattern: String,
  #[source]
  source:  regex::Error,
}

/// A compiled regular expression, deserialized from its source string.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct Pattern(Regex);

impl Pattern {
  pub fn new(pattern: &str) -> Result<Self, PatternError> {
    Regex::new(pattern).map(Self).map_err(|source| {
      PatternError {
        pattern: pattern.to_string(),
        source,
      }
    })
  }

  pub fn as_str(&self) -> &str {
    self.0.as_str()
  }

  pub fn regex(&self) -> &Regex {
    &self.0
  }
}

impl TryFrom<String> for Pattern {
  type Error = PatternError;

  fn try_from(pattern: String) -> Result<Self, Self::Error> {
    Self::new(&pattern)
  }
}

impl PartialEq for Pattern {
  fn eq(&self, other: &Self) -> bool {
    self.as_str() == other.as_str()
  }
}

impl Eq for Pattern {}

impl fmt::Display for Pattern {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

fn default_escape() -> char {
  '\\'
}

fn default_true() -> bool {
  true
}

/// One transform applied to a [`Text`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case", deny_unknown_fields)]
pub enum Step {
  Escape {
    #[serde(rename = "char")]
    ch:     char,
    #[serde(default = "default_escape")]
    escape: char,
  },
  Unescape {
    #[serde(rename = "char")]
    ch:     char,
    #[serde(default = "default_escape")]
    escape: char,
  },
  /// `post` defaults to `pre`.
  Surround {
    pre:  String,
    #[serde(default)]
    post: Option<String>,
  },
  /// `post` defaults to `pre`, the comparison ignores case by default.
  Trim {
    pre:         String,
    #[serde(default)]
    post:        Option<String>,
    #[serde(default = "default_true", rename = "ignore-case")]
    ignore_case: bool,
  },
  Validate {
    pattern: Pattern,
  },
  Extract {
    pattern: Pattern,
    group:   usize,
  },
  Replace {
    from: String,
    to:   String,
  },
}

impl Step {
  pub fn escape(ch: char) -> Self {
    Self::Escape {
      ch,
      escape: default_escape(),
    }
  }

  pub fn unescape(ch: char) -> Self {
    Self::Unescape {
      ch,
      escape: default_escape(),
    }
  }

  pub fn surround(pre: &str, post: &str) -> Self {
    Self::Surround {
      pre:  pre.to_string(),
      post: Some(post.to_string()),
    }
  }

  pub fn trim(pre: &str, post: &str) -> Self {
    Self::Trim {
      pre:         pre.to_string(),
      post:        Some(post.to_string()),
      ignore_case: true,
    }
  }

  pub fn apply(&self, text: Text) -> Text {
    match self {
      Self::Escape { ch, escape } => text.escape(*ch, *escape),
      Self::Unescape { ch, escape } => text.unescape(*ch, *escape),
      Self::Surround { pre, post } => text.surround(pre, post.as_deref().unwrap_or(pre)),
      Self::Trim {
        pre,
        post,
        ignore_case,
      } => text.trim(pre, post.as_deref().unwrap_or(pre), *ignore_case),
      Self::Validate { pattern } => text.validate(pattern.regex()),
      Self::Extract { pattern, group } => text.extract(pattern.regex(), *group),
      Self::Replace { from, to } => text.replace(from, to),
    }
  }
}

/// Where a rule applies.
///
/// Root rules carry a dotted locator token handed out by the host's
/// classifier (`string.quoted.double`). Embedded rules carry a pattern that
/// finds their regions inside a literal's raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
  Locator(String),
  Pattern(Pattern),
}

impl Scope {
  pub fn as_str(&self) -> &str {
    match self {
      Self::Locator(locator) => locator,
      Self::Pattern(pattern) => pattern.as_str(),
    }
  }

  /// Whether a classified `locator` and this scope name the same region:
  /// either one is a dotted prefix of the other. Patterns never match.
  pub fn matches(&self, locator: &str) -> bool {
    let Self::Locator(scope) = self else {
      return false;
    };
    is_dotted_prefix(scope, locator) || is_dotted_prefix(locator, scope)
  }

  /// Character ranges of every region this scope finds in `text`.
  pub fn locate(&self, text: &str) -> Vec<Range<usize>> {
    let Self::Pattern(pattern) = self else {
      return Vec::new();
    };

    pattern
      .regex()
      .find_iter(text)
      .map(|found| {
        let start = text[..found.start()].chars().count();
        start..start + found.as_str().chars().count()
      })
      .collect()
  }
}

impl fmt::Display for Scope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

fn is_dotted_prefix(prefix: &str, scope: &str) -> bool {
  scope
    .strip_prefix(prefix)
    .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
  name:     String,
  scope:    Scope,
  contains: Vec<String>,
  embeds:   Vec<String>,
  embedded: bool,
  toggle:   bool,
  wrap:     Vec<Step>,
  unwrap:   Vec<Step>,
}

impl Rule {
  /// A rule named after its scope.
  pub fn new(scope: Scope) -> Self {
    let name = scope.as_str().to_string();
    Self::named(name, scope)
  }

  pub fn named(name: impl Into<String>, scope: Scope) -> Self {
    Self {
      name: name.into(),
      scope,
      contains: Vec::new(),
      embeds: Vec::new(),
      embedded: false,
      toggle: false,
      wrap: Vec::new(),
      unwrap: Vec::new(),
    }
  }

  #[must_use]
  pub fn with_contains<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.contains = names.into_iter().map(Into::into).collect();
    self
  }

  #[must_use]
  pub fn with_embeds<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.embeds = names.into_iter().map(Into::into).collect();
    self
  }

  #[must_use]
  pub fn with_embedded(mut self, embedded: bool) -> Self {
    self.embedded = embedded;
    self
  }

  #[must_use]
  pub fn with_toggle(mut self, toggle: bool) -> Self {
    self.toggle = toggle;
    self
  }

  #[must_use]
  pub fn with_wrap(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
    self.wrap = steps.into_iter().collect();
    self
  }

  #[must_use]
  pub fn with_unwrap(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
    self.unwrap = steps.into_iter().collect();
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn scope(&self) -> &Scope {
    &self.scope
  }

  /// Names of the rules nested directly inside this one, in order.
  pub fn contains(&self) -> &[String] {
    &self.contains
  }

  /// Names of the embedded rules that may appear inside this rule's text.
  pub fn embeds(&self) -> &[String] {
    &self.embeds
  }

  pub fn is_embedded(&self) -> bool {
    self.embedded
  }

  pub fn is_toggle(&self) -> bool {
    self.toggle
  }

  /// Add this rule's syntax around `text`.
  pub fn wrap(&self, text: Text) -> Text {
    self.wrap.iter().fold(text, |text, step| step.apply(text))
  }

  /// Strip this rule's syntax from `text`. Invalid when the text is not in
  /// this encoding.
  pub fn unwrap(&self, text: Text) -> Text {
    self.unwrap.iter().fold(text, |text, step| step.apply(text))
  }
}
