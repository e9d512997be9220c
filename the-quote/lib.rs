use smartstring::{
  LazyCompact,
  SmartString,
};

pub mod config;
pub mod diagnostics;
pub mod document;
pub mod host;
pub mod rotate;
pub mod rule;
pub mod rule_set;
pub mod selection;
pub mod text;
pub mod transaction;

pub type Tendril = SmartString<LazyCompact>;
