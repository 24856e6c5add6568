use std::{collections::VecDeque, marker::PhantomData};

use crate::{
  coordinator::{CombineStrategy, Side, SideId},
  error::RxError,
};

/// Buffers each side and combines values pairwise by arrival index.
///
/// Completes as soon as a completed side has nothing buffered, since no
/// further pair can form.
pub struct Zip<A, B, F, R> {
  first: VecDeque<A>,
  second: VecDeque<B>,
  completed: [bool; 2],
  f: F,
  _output: PhantomData<fn() -> R>,
}

impl<A, B, F, R> CombineStrategy for Zip<A, B, F, R>
where
  A: Send + 'static,
  B: Send + 'static,
  F: Fn(A, B) -> Result<R, RxError> + Clone + Send + Sync + 'static,
  R: Send + 'static,
{
  type First = A;
  type Second = B;
  type Output = R;
  type Config = F;

  fn from_config(f: &F) -> Self {
    Self {
      first: VecDeque::new(),
      second: VecDeque::new(),
      completed: [false; 2],
      f: f.clone(),
      _output: PhantomData,
    }
  }

  fn on_next(&mut self, value: Side<A, B>) -> Result<Option<R>, RxError> {
    match value {
      Side::First(a) => self.first.push_back(a),
      Side::Second(b) => self.second.push_back(b),
    }
    if self.first.is_empty() || self.second.is_empty() {
      return Ok(None);
    }
    match (self.first.pop_front(), self.second.pop_front()) {
      (Some(a), Some(b)) => (self.f)(a, b).map(Some),
      _ => Ok(None),
    }
  }

  fn on_completed(&mut self, side: SideId) { self.completed[side as usize] = true; }

  fn is_completed(&self) -> bool {
    (self.completed[0] && self.first.is_empty()) || (self.completed[1] && self.second.is_empty())
  }
}
