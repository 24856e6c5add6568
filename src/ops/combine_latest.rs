use std::marker::PhantomData;

use crate::{
  coordinator::{CombineStrategy, Side, SideId},
  error::RxError,
};

/// Keeps the latest value of each side and combines them on every value once
/// both sides have one.
///
/// Completes when both sides completed, or as soon as a side completes
/// without ever having emitted, since no combination can be produced then.
pub struct CombineLatest<A, B, F, R> {
  first: Option<A>,
  second: Option<B>,
  completed: [bool; 2],
  starved: bool,
  f: F,
  _output: PhantomData<fn() -> R>,
}

impl<A, B, F, R> CombineStrategy for CombineLatest<A, B, F, R>
where
  A: Send + 'static,
  B: Send + 'static,
  F: Fn(&A, &B) -> Result<R, RxError> + Clone + Send + Sync + 'static,
  R: Send + 'static,
{
  type First = A;
  type Second = B;
  type Output = R;
  type Config = F;

  fn from_config(f: &F) -> Self {
    Self { first: None, second: None, completed: [false; 2], starved: false, f: f.clone(), _output: PhantomData }
  }

  fn on_next(&mut self, value: Side<A, B>) -> Result<Option<R>, RxError> {
    match value {
      Side::First(a) => self.first = Some(a),
      Side::Second(b) => self.second = Some(b),
    }
    match (&self.first, &self.second) {
      (Some(a), Some(b)) => (self.f)(a, b).map(Some),
      _ => Ok(None),
    }
  }

  fn on_completed(&mut self, side: SideId) {
    let has_value = match side {
      SideId::First => self.first.is_some(),
      SideId::Second => self.second.is_some(),
    };
    self.completed[side as usize] = true;
    self.starved |= !has_value;
  }

  fn is_completed(&self) -> bool { self.starved || self.completed.iter().all(|c| *c) }
}
