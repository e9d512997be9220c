use std::{
  fmt,
  ops::Range,
  path::PathBuf,
};

use anyhow::{
  Result,
  bail,
};
use clap::{
  ArgAction,
  Parser,
  ValueEnum,
};
use the_quote::{
  rotate::Action,
  selection,
};

#[derive(Clone, Debug)]
pub struct CliOptions {
  pub action:      Action,
  pub language:    String,
  pub scope:       String,
  /// Literal spans. Empty means the whole input.
  pub spans:       Vec<Range<usize>>,
  /// Selections in command line order. Empty means a cursor at the start of
  /// the first literal.
  pub selections:  Vec<selection::Range>,
  pub verbosity:   u8,
  pub log_file:    Option<PathBuf>,
  pub config_file: Option<PathBuf>,
  pub file:        Option<PathBuf>,
}

impl CliOptions {
  pub fn parse() -> Result<Self> {
    let raw = RawCli::parse();
    raw.try_into()
  }
}

#[derive(Parser, Debug)]
#[command(name = "the-quote", about, long_about = None, version)]
struct RawCli {
  /// What to do with the literal under each selection
  #[arg(value_enum, value_name = "ACTION")]
  action: ActionArg,

  /// File to rewrite, standard input if omitted
  #[arg(value_name = "FILE")]
  file: Option<PathBuf>,

  /// Language whose rules apply
  #[arg(short = 'l', long = "language", default_value = "text")]
  language: String,

  /// Scope locator the literals are classified as
  #[arg(short = 's', long = "scope", default_value = "string")]
  scope: String,

  /// Character span of a literal (repeatable)
  #[arg(short = 'r', long = "range", value_name = "START..END", value_parser = parse_span)]
  spans: Vec<Range<usize>>,

  /// Place a cursor (repeatable)
  #[arg(short = 'c', long = "cursor", value_name = "POS")]
  cursors: Vec<usize>,

  /// Select a character span (repeatable)
  #[arg(long = "select", value_name = "ANCHOR..HEAD", value_parser = parse_span)]
  selects: Vec<Range<usize>>,

  /// Increase logging verbosity (repeat for more detail)
  #[arg(short = 'v', action = ArgAction::Count)]
  verbosity: u8,

  /// Save logs to a specific file
  #[arg(long = "log", value_name = "FILE")]
  log_file: Option<PathBuf>,

  /// Merge rule declarations from a specific file
  #[arg(long = "config", value_name = "FILE")]
  config_file: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ActionArg {
  Cycle,
  Toggle,
  Embed,
}

impl fmt::Display for ActionArg {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Cycle => write!(f, "cycle"),
      Self::Toggle => write!(f, "toggle"),
      Self::Embed => write!(f, "embed"),
    }
  }
}

impl From<ActionArg> for Action {
  fn from(action: ActionArg) -> Self {
    match action {
      ActionArg::Cycle => Action::Cycle,
      ActionArg::Toggle => Action::Toggle,
      ActionArg::Embed => Action::Embed,
    }
  }
}

impl TryFrom<RawCli> for CliOptions {
  type Error = anyhow::Error;

  fn try_from(raw: RawCli) -> Result<Self> {
    if let Some(span) = raw.spans.iter().find(|span| span.start >= span.end) {
      bail!("literal span {}..{} is empty", span.start, span.end);
    }

    let selections = raw
      .cursors
      .into_iter()
      .map(selection::Range::point)
      .chain(
        raw
          .selects
          .into_iter()
          .map(|span| selection::Range::new(span.start, span.end)),
      )
      .collect();

    Ok(Self {
      action: raw.action.into(),
      language: raw.language,
      scope: raw.scope,
      spans: raw.spans,
      selections,
      verbosity: raw.verbosity,
      log_file: raw.log_file,
      config_file: raw.config_file,
      file: raw.file,
    })
  }
}

fn parse_span(value: &str) -> std::result::Result<Range<usize>, String> {
  let (start, end) = value
    .split_once("..")
    .ok_or_else(|| format!("expected START..END, got '{value}'"))?;
  let parse = |bound: &str| {
    bound
      .trim()
      .parse::<usize>()
      .map_err(|err| format!("invalid bound '{bound}' in '{value}': {err}"))
  };
  Ok(parse(start)?..parse(end)?)
}
