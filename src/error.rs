//! Error values delivered through `on_error`.
//!
//! Every stream in the kernel carries the same error type, [`RxError`]. Domain
//! failures raised by producers or user combinator functions are wrapped in
//! [`RxError::Domain`]; faults in the observer/disposable contract surface as
//! [`RxError::Contract`] so they reach the subscriber instead of panicking.

use std::{error::Error as StdError, fmt, sync::Arc};

use thiserror::Error;

/// A broken observer/disposable contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContractViolation {
  /// A single-upstream observer was given a second upstream disposable.
  #[error("set_upstream was called more than once on a single-upstream observer")]
  UpstreamAlreadySet,
  /// An observer received more upstream disposables than its strategy
  /// declared.
  #[error("observer declared {declared} upstream disposable(s) but received more")]
  TooManyUpstreams { declared: usize },
}

/// The error carried by every `on_error` call.
#[derive(Debug, Clone, Error)]
pub enum RxError {
  #[error("{0}")]
  Domain(Arc<dyn StdError + Send + Sync>),
  #[error("contract violation: {0}")]
  Contract(#[from] ContractViolation),
  #[error("timed out waiting for the next event")]
  Timeout,
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl StdError for Message {}

impl RxError {
  /// Wraps any error as a domain error.
  pub fn domain<E>(err: E) -> Self
  where
    E: StdError + Send + Sync + 'static,
  {
    RxError::Domain(Arc::new(err))
  }

  /// A domain error carrying only a message.
  pub fn msg(message: impl Into<String>) -> Self { RxError::Domain(Arc::new(Message(message.into()))) }

  pub fn is_timeout(&self) -> bool { matches!(self, RxError::Timeout) }

  pub fn contract_violation(&self) -> Option<ContractViolation> {
    match self {
      RxError::Contract(v) => Some(*v),
      _ => None,
    }
  }
}

pub type RxResult<T> = Result<T, RxError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[rxkernel_macro::test]
  fn message_error_displays_text() {
    let err = RxError::msg("boom");
    assert_eq!(err.to_string(), "boom");
    assert!(!err.is_timeout());
    assert_eq!(err.contract_violation(), None);
  }

  #[rxkernel_macro::test]
  fn contract_violation_converts() {
    let err: RxError = ContractViolation::TooManyUpstreams { declared: 2 }.into();
    assert_eq!(err.contract_violation(), Some(ContractViolation::TooManyUpstreams { declared: 2 }));
    assert!(err.to_string().contains("declared 2"));
  }

  #[rxkernel_macro::test]
  fn domain_errors_share_their_source_on_clone() {
    let err = RxError::domain(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
    let cloned = err.clone();
    match (&err, &cloned) {
      (RxError::Domain(a), RxError::Domain(b)) => assert!(Arc::ptr_eq(a, b)),
      _ => panic!("expected domain errors"),
    }
  }
}
