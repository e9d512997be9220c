//! Rule declarations loaded from TOML.
//!
//! The built-in `languages.toml` is compiled into the crate. A user file in
//! the same format is merged on top of it before deserializing, so a user
//! only spells out what differs.

use std::{
  collections::{
    HashMap,
    hash_map::Entry,
  },
  path::{
    Path,
    PathBuf,
  },
};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::{
  rule::{
    Pattern,
    Rule,
    Scope,
    Step,
  },
  rule_set::{
    RuleSet,
    RuleSetError,
  },
};

/// Default built-in languages.toml.
pub const BUILTIN: &str = include_str!("languages.toml");

/// Depth up to which a user document is merged into the built-in one.
const MERGE_DEPTH: usize = 3;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
  #[error("failed to read {}: {source}", path.display())]
  Read {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to parse rule configuration: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("rule `{name}` needs exactly one of `scope` or `pattern`")]
  Scope { name: String },
  #[error("language `{language}`: {source}")]
  RuleSet {
    language: String,
    #[source]
    source:   RuleSetError,
  },
}

fn default_toggle() -> String {
  "double.quote".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
  #[serde(default)]
  pub generic:   GenericConfig,
  #[serde(default, rename = "language")]
  pub languages: Vec<LanguageConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct GenericConfig {
  #[serde(default = "default_toggle")]
  pub default_toggle: String,
  #[serde(default)]
  pub toggles:        Vec<Vec<String>>,
  #[serde(default, rename = "rule")]
  pub rules:          Vec<RuleConfig>,
}

impl Default for GenericConfig {
  fn default() -> Self {
    Self {
      default_toggle: default_toggle(),
      toggles:        Vec::new(),
      rules:          Vec::new(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LanguageConfig {
  pub name:           String,
  /// Overrides the generic default toggle.
  #[serde(default)]
  pub default_toggle: Option<String>,
  #[serde(default)]
  pub toggles:        Vec<Vec<String>>,
  #[serde(default, rename = "rule")]
  pub rules:          Vec<RuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RuleConfig {
  /// Defaults to the scope locator.
  #[serde(default)]
  pub name:     Option<String>,
  #[serde(default)]
  pub scope:    Option<String>,
  #[serde(default)]
  pub pattern:  Option<Pattern>,
  #[serde(default)]
  pub contains: Vec<String>,
  #[serde(default)]
  pub embeds:   Vec<String>,
  #[serde(default)]
  pub embedded: bool,
  #[serde(default)]
  pub toggle:   bool,
  #[serde(default)]
  pub wrap:     Vec<Step>,
  #[serde(default)]
  pub unwrap:   Vec<Step>,
}

impl TryFrom<RuleConfig> for Rule {
  type Error = ConfigError;

  fn try_from(config: RuleConfig) -> Result<Self> {
    let scope = match (config.scope, config.pattern) {
      (Some(locator), None) => Scope::Locator(locator),
      (None, Some(pattern)) => Scope::Pattern(pattern),
      (scope, pattern) => {
        let name = config
          .name
          .or(scope)
          .or_else(|| pattern.map(|pattern| pattern.to_string()))
          .unwrap_or_default();
        return Err(ConfigError::Scope { name });
      },
    };

    let rule = match config.name {
      Some(name) => Rule::named(name, scope),
      None => Rule::new(scope),
    };
    Ok(
      rule
        .with_contains(config.contains)
        .with_embeds(config.embeds)
        .with_embedded(config.embedded)
        .with_toggle(config.toggle)
        .with_wrap(config.wrap)
        .with_unwrap(config.unwrap),
    )
  }
}

impl Config {
  /// The compiled-in declarations.
  pub fn builtin() -> Self {
    toml::from_str(BUILTIN).expect("Could not deserialize built-in languages.toml")
  }

  /// The built-in declarations with `user` merged on top.
  pub fn merged(user: &str) -> Result<Self> {
    let builtin: toml::Value =
      toml::from_str(BUILTIN).expect("Could not parse built-in languages.toml");
    let user: toml::Value = toml::from_str(user)?;
    let config = merge_toml_values(builtin, user, MERGE_DEPTH).try_into()?;
    Ok(config)
  }

  /// The built-in declarations with the file at `path` merged on top.
  pub fn load(path: &Path) -> Result<Self> {
    let user = std::fs::read_to_string(path).map_err(|source| {
      ConfigError::Read {
        path: path.to_path_buf(),
        source,
      }
    })?;
    debug!(path = %path.display(), "loading rule configuration");
    Self::merged(&user)
  }

  pub fn language(&self, name: &str) -> Option<&LanguageConfig> {
    self
      .languages
      .iter()
      .find(|language| language.name.eq_ignore_ascii_case(name))
  }

  /// Builds the rules of `language`: its own rules first, then the generic
  /// ones. An unknown language gets the generic rules only.
  pub fn rule_set(&self, language: &str) -> Result<RuleSet> {
    let declared = self.language(language);
    let mut builder = RuleSet::builder();

    let rules = declared
      .into_iter()
      .flat_map(|language| &language.rules)
      .chain(&self.generic.rules);
    for rule in rules {
      builder.add(Rule::try_from(rule.clone())?);
    }

    let toggles = declared
      .into_iter()
      .flat_map(|language| &language.toggles)
      .chain(&self.generic.toggles);
    for cycle in toggles {
      builder.add_toggle(cycle);
    }

    let default = declared
      .and_then(|language| language.default_toggle.as_deref())
      .unwrap_or(&self.generic.default_toggle);
    builder.default_toggle(default);

    builder.build().map_err(|source| {
      ConfigError::RuleSet {
        language: language.to_string(),
        source,
      }
    })
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::builtin()
  }
}

/// Owns a [`Config`] and builds each language's [`RuleSet`] on first use.
#[derive(Debug)]
pub struct Languages {
  config: Config,
  cache:  HashMap<String, RuleSet>,
}

impl Languages {
  pub fn new(config: Config) -> Self {
    Self {
      config,
      cache: HashMap::new(),
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn get(&mut self, language: &str) -> Result<&RuleSet> {
    match self.cache.entry(language.to_ascii_lowercase()) {
      Entry::Occupied(entry) => Ok(entry.into_mut()),
      Entry::Vacant(entry) => {
        debug!(language, "building rule set");
        let rules = self.config.rule_set(language)?;
        Ok(entry.insert(rules))
      },
    }
  }
}

impl Default for Languages {
  fn default() -> Self {
    Self::new(Config::builtin())
  }
}

/// Merge two TOML documents, merging values from `right` onto `left`
///
/// `merge_depth` sets the nesting depth up to which values are merged instead
/// of overridden. Arrays of tables with a `name` key are merged by name,
/// other arrays are appended to.
pub fn merge_toml_values(left: toml::Value, right: toml::Value, merge_depth: usize) -> toml::Value {
  use toml::Value;

  fn get_name(v: &Value) -> Option<&str> {
    v.get("name").and_then(Value::as_str)
  }

  match (left, right) {
    (Value::Array(mut left_items), Value::Array(right_items)) if merge_depth > 0 => {
      left_items.reserve(right_items.len());
      for rvalue in right_items {
        let lvalue = get_name(&rvalue)
          .and_then(|rname| left_items.iter().position(|v| get_name(v) == Some(rname)))
          .map(|lpos| left_items.remove(lpos));
        let mvalue = match lvalue {
          Some(lvalue) => merge_toml_values(lvalue, rvalue, merge_depth - 1),
          None => rvalue,
        };
        left_items.push(mvalue);
      }
      Value::Array(left_items)
    },
    (Value::Table(mut left_map), Value::Table(right_map)) if merge_depth > 0 => {
      for (rname, rvalue) in right_map {
        let mvalue = match left_map.remove(&rname) {
          Some(lvalue) => merge_toml_values(lvalue, rvalue, merge_depth - 1),
          None => rvalue,
        };
        left_map.insert(rname, mvalue);
      }
      Value::Table(left_map)
    },
    // Catch everything else we didn't handle, and use the right value
    (_, value) => value,
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::text::Text;

  #[test]
  fn builtin_languages_build() {
    let config = Config::builtin();
    for language in ["c", "cpp", "javascript", "magicpython", "php", "python", "unknown"] {
      let rules = config.rule_set(language).unwrap();
      assert!(!rules.rotatables().is_empty(), "{language}");
      assert!(rules.default_toggle().is_some(), "{language}");
    }
  }

  #[test]
  fn language_rules_shadow_generic_ones() {
    let rules = Config::builtin().rule_set("python").unwrap();
    let single = rules.get("single.quote").unwrap();
    assert_eq!(single.scope(), &Scope::Locator("string.quoted".into()));

    let generic = Config::builtin().rule_set("lua").unwrap();
    let names: Vec<_> = generic.rules().map(Rule::name).collect();
    assert_eq!(names, ["double.quote", "single.quote"]);
  }

  #[test]
  fn c_char_literals_are_short() {
    let rules = Config::builtin().rule_set("c").unwrap();
    let path = rules.resolve("single.quote").unwrap();
    assert!(rules.unwrap(&path, Text::new("'a'", 1)).is_valid());
    assert!(rules.unwrap(&path, Text::new("'\\n'", 1)).is_valid());
    assert!(!rules.unwrap(&path, Text::new("'abcd'", 1)).is_valid());
    assert!(!rules.wrap(&path, Text::new("abcd", 0)).is_valid());
  }

  #[test]
  fn python_single_quote_leaves_triple_quotes_alone() {
    let rules = Config::builtin().rule_set("python").unwrap();
    let single = rules.resolve("single.quote").unwrap();
    let multi = rules.resolve("multi.single").unwrap();

    assert!(!rules.unwrap(&single, Text::new("'''a'''", 3)).is_valid());
    assert!(rules.unwrap(&single, Text::new("''", 1)).is_valid());

    let text = rules.unwrap(&multi, Text::new("'''a\nb'''", 3));
    assert_eq!(text.as_str(), "a\\nb");
    assert_eq!(rules.wrap(&multi, text).as_str(), "'''a\nb'''");
  }

  #[test]
  fn magicpython_raw_strings_are_regexp_scoped() {
    let locator = "string.regexp.quoted.raw.python";
    let python = Config::builtin().rule_set("python").unwrap();
    assert_eq!(python.candidates(locator).count(), 0);

    let rules = Config::builtin().rule_set("magicpython").unwrap();
    let roots: Vec<_> = rules
      .candidates(locator)
      .map(|id| rules.rule(id).name())
      .collect();
    assert_eq!(roots, ["raw", "formatted", "multi.raw", "multi.formatted"]);

    let raw = rules.resolve("raw/single.quote").unwrap();
    let text = rules.unwrap(&raw, Text::new("r'x'", 2));
    assert!(text.is_valid());
    assert_eq!(text.as_str(), "x");
    assert_eq!(rules.path_name(&rules.next_toggle(&raw).unwrap()), "raw/double.quote");
  }

  #[test]
  fn php_heredoc_extracts_its_body() {
    let rules = Config::builtin().rule_set("php").unwrap();
    let heredoc = rules.resolve("heredoc").unwrap();
    let nowdoc = rules.resolve("nowdoc").unwrap();

    let body = rules.unwrap(&heredoc, Text::new("<<<EOT\nhi $name\nEOT", 8));
    assert_eq!(body.as_str(), "hi $name");
    assert_eq!(body.offset(), 1);
    assert!(!rules.unwrap(&heredoc, Text::new("<<<'EOT'\nhi\nEOT", 0)).is_valid());
    assert!(rules.unwrap(&nowdoc, Text::new("<<<'EOT'\nhi\nEOT", 0)).is_valid());
  }

  #[test]
  fn user_language_is_merged_by_name() {
    const USER: &str = r#"
      [[language]]
      name = "python"
      toggles = [["multi.single", "multi.double"]]

      [[language]]
      name = "lua"

      [[language.rule]]
      name = "long.bracket"
      scope = "string.quoted.other"
      wrap = [{ op = "surround", pre = "[[", post = "]]" }]
      unwrap = [{ op = "trim", pre = "[[", post = "]]" }]
    "#;

    let config = Config::merged(USER).unwrap();
    let python = config.language("python").unwrap();
    assert_eq!(python.toggles, vec![vec!["multi.single", "multi.double"]]);
    // rules were not overridden
    assert!(python.rules.iter().any(|rule| rule.name.as_deref() == Some("formatted")));

    let lua = config.rule_set("lua").unwrap();
    assert!(lua.get("long.bracket").is_some());
    assert!(lua.get("single.quote").is_some());
  }

  #[test]
  fn user_generic_rules_are_merged_by_name() {
    const USER: &str = r#"
      [generic]
      default-toggle = "single.quote"

      [[generic.rule]]
      name = "single.quote"
      scope = "string.quoted.single"
      toggle = true
      wrap = [{ op = "surround", pre = "'", post = "'" }]
      unwrap = [{ op = "trim", pre = "'" }]
    "#;

    let config = Config::merged(USER).unwrap();
    assert_eq!(config.generic.default_toggle, "single.quote");
    assert_eq!(config.generic.toggles, Config::builtin().generic.toggles);
    let names: Vec<_> = config
      .generic
      .rules
      .iter()
      .filter_map(|rule| rule.name.as_deref())
      .collect();
    assert_eq!(names, ["double.quote", "single.quote"]);
    assert_eq!(config.generic.rules[1].wrap, vec![Step::surround("'", "'")]);
  }

  #[test]
  fn rule_needs_scope_or_pattern() {
    const BOTH: &str = r#"
      [[generic.rule]]
      name = "odd"
      scope = "string"
      pattern = "x"
    "#;
    const NEITHER: &str = r#"
      [[generic.rule]]
      name = "odd"
    "#;

    for user in [BOTH, NEITHER] {
      let config: Config = toml::from_str(user).unwrap();
      let err = config.rule_set("any").unwrap_err();
      assert!(matches!(err, ConfigError::Scope { name } if name == "odd"));
    }
  }

  #[test]
  fn unknown_keys_are_rejected() {
    assert!(matches!(
      Config::merged("[generic]\ndefault = \"x\"\n"),
      Err(ConfigError::Parse(_))
    ));
    assert!(matches!(
      Config::merged("[[language]]\nname = \"x\"\nindent = 2\n"),
      Err(ConfigError::Parse(_))
    ));
  }

  #[test]
  fn broken_references_name_the_language() {
    const USER: &str = r#"
      [[language]]
      name = "broken"

      [[language.rule]]
      name = "prefix"
      scope = "string"
      contains = ["missing"]
    "#;

    let err = Config::merged(USER).unwrap().rule_set("broken").unwrap_err();
    assert!(matches!(
      err,
      ConfigError::RuleSet {
        language,
        source: RuleSetError::UnknownContains { .. },
      } if language == "broken"
    ));
  }

  #[test]
  fn languages_cache_rule_sets() {
    let mut languages = Languages::default();
    let first = languages.get("Python").unwrap() as *const RuleSet;
    let second = languages.get("python").unwrap() as *const RuleSet;
    assert_eq!(first, second);
    assert!(languages.get("javascript").unwrap().get("template").is_some());
  }

  #[test]
  fn merge_appends_unnamed_array_items() {
    let left: toml::Value = toml::from_str("a = [1]\n[t]\nx = 1\ny = 2").unwrap();
    let right: toml::Value = toml::from_str("a = [2]\n[t]\ny = 3").unwrap();
    let merged = merge_toml_values(left, right, 3);
    assert_eq!(
      merged,
      toml::from_str::<toml::Value>("a = [1, 2]\n[t]\nx = 1\ny = 3").unwrap()
    );
  }
}
