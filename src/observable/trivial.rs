//! Observables that emit no values: [`Empty`], [`Never`] and [`ThrowErr`].

use std::marker::PhantomData;

use crate::{error::RxError, observable::Observable, observer::Observer};

/// Completes on subscription.
pub struct Empty<T>(PhantomData<fn() -> T>);

/// Never emits and never terminates.
pub struct Never<T>(PhantomData<fn() -> T>);

/// Fails with a clone of its error on subscription.
pub struct ThrowErr<T> {
  err: RxError,
  _item: PhantomData<fn() -> T>,
}

impl<T> Empty<T> {
  pub fn new() -> Self { Self(PhantomData) }
}

impl<T> Never<T> {
  pub fn new() -> Self { Self(PhantomData) }
}

impl<T> ThrowErr<T> {
  pub fn new(err: RxError) -> Self { Self { err, _item: PhantomData } }
}

impl<T> Default for Empty<T> {
  fn default() -> Self { Self::new() }
}

impl<T> Default for Never<T> {
  fn default() -> Self { Self::new() }
}

impl<T> Clone for Empty<T> {
  fn clone(&self) -> Self { Self::new() }
}

impl<T> Clone for Never<T> {
  fn clone(&self) -> Self { Self::new() }
}

impl<T> Clone for ThrowErr<T> {
  fn clone(&self) -> Self { Self::new(self.err.clone()) }
}

impl<T: 'static> Observable<T> for Empty<T> {
  fn subscribe<O: Observer<T> + 'static>(&self, mut observer: O) { observer.on_completed() }
}

impl<T: 'static> Observable<T> for Never<T> {
  fn subscribe<O: Observer<T> + 'static>(&self, _observer: O) {}
}

impl<T: 'static> Observable<T> for ThrowErr<T> {
  fn subscribe<O: Observer<T> + 'static>(&self, mut observer: O) { observer.on_error(self.err.clone()) }
}
