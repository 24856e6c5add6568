//! Disposal strategies: how many upstream handles an observer keeps.
//!
//! Operators pick the cheapest container for the number of upstreams they
//! actually receive. Exceeding the declared count is a contract violation,
//! not something silently absorbed.

use smallvec::SmallVec;

use crate::{
  disposable::{Disposable, DisposableHandle},
  error::ContractViolation,
};

pub trait UpstreamDisposables: Default + Send + 'static {
  /// Stores `upstream`, or reports that the declared count is exceeded.
  fn add(&mut self, upstream: DisposableHandle) -> Result<(), ContractViolation>;

  fn dispose_all(self);

  fn len(&self) -> usize;

  fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Declares that no upstream handle is ever registered.
#[derive(Default, Debug)]
pub struct NoUpstreams;

impl UpstreamDisposables for NoUpstreams {
  fn add(&mut self, _upstream: DisposableHandle) -> Result<(), ContractViolation> {
    Err(ContractViolation::TooManyUpstreams { declared: 0 })
  }

  fn dispose_all(self) {}

  fn len(&self) -> usize { 0 }
}

/// At most `N` upstream handles, stored inline.
#[derive(Debug)]
pub struct FixedUpstreams<const N: usize>(SmallVec<[DisposableHandle; N]>);

impl<const N: usize> Default for FixedUpstreams<N> {
  fn default() -> Self { Self(SmallVec::new()) }
}

impl<const N: usize> UpstreamDisposables for FixedUpstreams<N> {
  fn add(&mut self, upstream: DisposableHandle) -> Result<(), ContractViolation> {
    if self.0.len() >= N {
      return Err(if N == 1 {
        ContractViolation::UpstreamAlreadySet
      } else {
        ContractViolation::TooManyUpstreams { declared: N }
      });
    }
    self.0.push(upstream);
    Ok(())
  }

  fn dispose_all(self) {
    for upstream in self.0 {
      upstream.dispose();
    }
  }

  fn len(&self) -> usize { self.0.len() }
}

/// Any number of upstream handles. Already-disposed handles are pruned as
/// new ones arrive.
#[derive(Default, Debug)]
pub struct DynamicUpstreams(Vec<DisposableHandle>);

impl UpstreamDisposables for DynamicUpstreams {
  fn add(&mut self, upstream: DisposableHandle) -> Result<(), ContractViolation> {
    self.0.retain(|u| !u.is_disposed());
    self.0.push(upstream);
    Ok(())
  }

  fn dispose_all(self) {
    for upstream in self.0 {
      upstream.dispose();
    }
  }

  fn len(&self) -> usize { self.0.len() }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::disposable::BooleanDisposable;

  fn handle() -> (BooleanDisposable, DisposableHandle) {
    let flag = BooleanDisposable::new();
    (flag.clone(), DisposableHandle::new(flag))
  }

  #[rxkernel_macro::test]
  fn none_rejects_everything() {
    let mut none = NoUpstreams;
    assert_eq!(
      none.add(DisposableHandle::empty()),
      Err(ContractViolation::TooManyUpstreams { declared: 0 })
    );
  }

  #[rxkernel_macro::test]
  fn fixed_enforces_declared_count() {
    let mut one = FixedUpstreams::<1>::default();
    assert!(one.add(handle().1).is_ok());
    assert_eq!(one.add(handle().1), Err(ContractViolation::UpstreamAlreadySet));

    let mut two = FixedUpstreams::<2>::default();
    let (a, ha) = handle();
    let (b, hb) = handle();
    assert!(two.add(ha).is_ok());
    assert!(two.add(hb).is_ok());
    assert_eq!(two.add(handle().1), Err(ContractViolation::TooManyUpstreams { declared: 2 }));
    assert_eq!(two.len(), 2);

    two.dispose_all();
    assert!(a.is_disposed() && b.is_disposed());
  }

  #[rxkernel_macro::test]
  fn dynamic_grows_and_prunes() {
    let mut dynamic = DynamicUpstreams::default();
    let (a, ha) = handle();
    dynamic.add(ha).unwrap();
    a.dispose();
    for _ in 0..10 {
      dynamic.add(handle().1).unwrap();
    }
    assert_eq!(dynamic.len(), 10);
  }
}
