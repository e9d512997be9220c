use std::{
  io::{
    self,
    Read,
    Write,
  },
  path::{
    Path,
    PathBuf,
  },
};

use anyhow::{
  Context,
  Result,
  bail,
};
use etcetera::base_strategy::{
  BaseStrategy,
  choose_base_strategy,
};
use the_quote::{
  config::{
    Config,
    Languages,
  },
  diagnostics::TracingDiagnostics,
  document::Document,
  host::Host,
  rotate::Rotator,
  selection::{
    self,
    Selection,
  },
};

use crate::cli::CliOptions;

mod cli;

fn main() -> Result<()> {
  let options = CliOptions::parse()?;
  setup_logging(options.verbosity, options.log_file.as_deref())
    .context("failed to initialize logging")?;

  let input = match &options.file {
    Some(path) => {
      std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?
    },
    None => {
      let mut input = String::new();
      io::stdin()
        .read_to_string(&mut input)
        .context("failed to read standard input")?;
      input
    },
  };

  let output = run(&options, &input)?;
  io::stdout()
    .write_all(output.as_bytes())
    .context("failed to write output")?;
  Ok(())
}

fn run(options: &CliOptions, input: &str) -> Result<String> {
  let config = load_config(options.config_file.as_deref())?;
  let mut languages = Languages::new(config);
  let rules = languages.get(&options.language)?;

  let mut doc = Document::new(input);
  let len = doc.text().len_chars();
  let spans = if options.spans.is_empty() {
    vec![0..input.trim_end_matches(['\n', '\r']).chars().count()]
  } else {
    options.spans.clone()
  };
  for span in spans {
    if span.end > len {
      bail!("literal span {}..{} is out of bounds for input length {len}", span.start, span.end);
    }
    doc.add_scope(span, options.scope.as_str());
  }

  let ranges = if options.selections.is_empty() {
    let start = doc.scopes().first().map_or(0, |scope| scope.range.start);
    vec![selection::Range::point(start)]
  } else {
    options.selections.clone()
  };
  if let Some(range) = ranges.iter().find(|range| range.to() > len) {
    bail!("selection {}..{} is out of bounds for input length {len}", range.anchor, range.head);
  }
  doc.set_selection(Selection::new(ranges)?);

  let report = Rotator::new(rules)
    .with_diagnostics(TracingDiagnostics)
    .run(options.action, &mut doc);

  log::info!(
    "{:?}: applied to {} of {} selections",
    options.action,
    report.applied,
    report.applied + report.skipped.len()
  );
  for (index, error) in &report.skipped {
    log::info!("selection {index} skipped: {error}");
  }
  for range in doc.selection() {
    log::info!("selection {}..{}", range.anchor, range.head);
  }

  Ok(doc.text().to_string())
}

fn config_dir() -> Result<PathBuf> {
  if let Ok(dir) = std::env::var("THE_QUOTE_CONFIG_DIR") {
    return Ok(PathBuf::from(dir));
  }
  let strategy = choose_base_strategy().context("unable to find the config directory")?;
  Ok(strategy.config_dir().join("the-quote"))
}

/// Built-in rules, with the user's `languages.toml` merged on top when one
/// exists.
fn load_config(specified_file: Option<&Path>) -> Result<Config> {
  if let Some(path) = specified_file {
    return Config::load(path).with_context(|| format!("failed to load {}", path.display()));
  }

  let default_file = config_dir()?.join("languages.toml");
  if default_file.is_file() {
    return Config::load(&default_file)
      .with_context(|| format!("failed to load {}", default_file.display()));
  }

  log::debug!("no user configuration, using built-in rules");
  Ok(Config::builtin())
}

fn setup_logging(verbosity: u8, log_file: Option<&Path>) -> Result<()> {
  let level = match verbosity {
    0 => log::LevelFilter::Warn,
    1 => log::LevelFilter::Info,
    2 => log::LevelFilter::Debug,
    _ => log::LevelFilter::Trace,
  };

  let dispatch = fern::Dispatch::new()
    .format(|out, message, record| {
      out.finish(format_args!(
        "{} [{}] {}",
        record.target(),
        record.level(),
        message
      ))
    })
    .level(level);

  let dispatch = match log_file {
    Some(path) => dispatch.chain(fern::log_file(path)?),
    None => dispatch.chain(io::stderr()),
  };
  dispatch.apply()?;
  Ok(())
}
