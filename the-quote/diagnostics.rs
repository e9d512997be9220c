//! Reporting for rotations that silently do nothing.
//!
//! A failed rotation never surfaces to the user, the buffer just stays as
//! it was. The [`crate::rotate::Rotator`] reports every outcome to a
//! [`Diagnostics`] sink instead. The default sink drops everything.

use tracing::{
  debug,
  trace,
};

use crate::rotate::RotateError;

#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
  /// A selection's literal was rewritten from one rule path to another.
  Rotated {
    index: usize,
    from:  &'a str,
    to:    &'a str,
  },
  /// A candidate rule path rejected the literal's content.
  Rejected {
    index:   usize,
    path:    &'a str,
    attempt: usize,
  },
  /// A selection was left untouched.
  Skipped {
    index: usize,
    error: &'a RotateError,
  },
}

pub trait Diagnostics {
  fn report(&self, event: Event<'_>);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDiagnostics;

impl Diagnostics for NoopDiagnostics {
  fn report(&self, _event: Event<'_>) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
  fn report(&self, event: Event<'_>) {
    match event {
      Event::Rotated { index, from, to } => debug!(index, from, to, "rotated"),
      Event::Rejected {
        index,
        path,
        attempt,
      } => trace!(index, path, attempt, "rule path rejected the literal"),
      Event::Skipped { index, error } => debug!(index, %error, "selection skipped"),
    }
  }
}

impl<D: Diagnostics + ?Sized> Diagnostics for &D {
  fn report(&self, event: Event<'_>) {
    (**self).report(event);
  }
}
