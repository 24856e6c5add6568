use std::marker::PhantomData;

use crate::{
  coordinator::{CombineStrategy, Side, SideId},
  error::RxError,
};

/// Combines every value of the primary (first) side with the latest value of
/// the secondary side. Primary values arriving before the secondary has
/// emitted are dropped.
///
/// Only the primary's completion completes the output; the secondary
/// completing just freezes its latest value. Errors of either side terminate.
pub struct WithLatestFrom<A, B, F, R> {
  latest: Option<B>,
  primary_completed: bool,
  f: F,
  _item: PhantomData<fn(A) -> R>,
}

impl<A, B, F, R> CombineStrategy for WithLatestFrom<A, B, F, R>
where
  A: Send + 'static,
  B: Send + 'static,
  F: Fn(A, &B) -> Result<R, RxError> + Clone + Send + Sync + 'static,
  R: Send + 'static,
{
  type First = A;
  type Second = B;
  type Output = R;
  type Config = F;

  fn from_config(f: &F) -> Self { Self { latest: None, primary_completed: false, f: f.clone(), _item: PhantomData } }

  fn on_next(&mut self, value: Side<A, B>) -> Result<Option<R>, RxError> {
    match value {
      Side::First(a) => match &self.latest {
        Some(b) => (self.f)(a, b).map(Some),
        None => Ok(None),
      },
      Side::Second(b) => {
        self.latest = Some(b);
        Ok(None)
      }
    }
  }

  fn on_completed(&mut self, side: SideId) {
    if side == SideId::First {
      self.primary_completed = true;
    }
  }

  fn is_completed(&self) -> bool { self.primary_completed }
}
