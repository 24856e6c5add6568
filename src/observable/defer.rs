use std::marker::PhantomData;

use crate::{error::RxError, observable::Observable, observer::Observer};

/// Builds a fresh observable for every subscription.
///
/// A factory error is delivered as the subscription's `on_error`.
pub struct Defer<T, F> {
  factory: F,
  _item: PhantomData<fn() -> T>,
}

impl<T, F> Defer<T, F> {
  pub fn new(factory: F) -> Self { Self { factory, _item: PhantomData } }
}

impl<T, F: Clone> Clone for Defer<T, F> {
  fn clone(&self) -> Self { Self::new(self.factory.clone()) }
}

impl<T, F, S> Observable<T> for Defer<T, F>
where
  T: 'static,
  F: Fn() -> Result<S, RxError> + Send + Sync + 'static,
  S: Observable<T>,
{
  fn subscribe<O: Observer<T> + 'static>(&self, mut observer: O) {
    match (self.factory)() {
      Ok(source) => source.subscribe(observer),
      Err(err) => observer.on_error(err),
    }
  }
}
