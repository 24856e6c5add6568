//! Observer trait and implementations
//!
//! An [`Observer`] consumes the events of exactly one subscription:
//! any number of `on_next` calls followed by at most one terminal event
//! (`on_error` or `on_completed`). After a terminal event the observer is
//! disposed and ignores everything else; producers check
//! [`Observer::is_disposed`] before each emission.
//!
//! Producers hand their cancellation handle to the observer through
//! [`Observer::set_upstream`], at most once and before emitting.

use crate::{
  disposable::{CompositeDisposable, Disposable, DisposableHandle},
  error::RxError,
};

mod subscriber;
mod upstreams;

pub use subscriber::{LambdaObserver, ObserverStrategy, Subscriber};
pub use upstreams::{DynamicUpstreams, FixedUpstreams, NoUpstreams, UpstreamDisposables};

// ============================================================================
// Observer Trait
// ============================================================================

pub trait Observer<T>: Send {
  fn on_next(&mut self, value: T);

  /// Terminal. The observer is disposed afterwards.
  fn on_error(&mut self, err: RxError);

  /// Terminal. The observer is disposed afterwards.
  fn on_completed(&mut self);

  fn is_disposed(&self) -> bool;

  /// Registers the producer's cancellation handle. Disposing the
  /// subscription disposes it; if the observer is already disposed the handle
  /// is disposed right away.
  fn set_upstream(&mut self, upstream: DisposableHandle);
}

pub type BoxedObserver<T> = Box<dyn Observer<T>>;

impl<T> Observer<T> for Box<dyn Observer<T>> {
  #[inline]
  fn on_next(&mut self, value: T) { (**self).on_next(value) }

  #[inline]
  fn on_error(&mut self, err: RxError) { (**self).on_error(err) }

  #[inline]
  fn on_completed(&mut self) { (**self).on_completed() }

  #[inline]
  fn is_disposed(&self) -> bool { (**self).is_disposed() }

  #[inline]
  fn set_upstream(&mut self, upstream: DisposableHandle) { (**self).set_upstream(upstream) }
}

// ============================================================================
// Notification
// ============================================================================

/// A materialized event, used where events are queued before delivery.
#[derive(Debug, Clone)]
pub enum Notification<T> {
  Next(T),
  Error(RxError),
  Completed,
}

impl<T> Notification<T> {
  pub fn deliver<O: Observer<T> + ?Sized>(self, observer: &mut O) {
    match self {
      Notification::Next(v) => observer.on_next(v),
      Notification::Error(e) => observer.on_error(e),
      Notification::Completed => observer.on_completed(),
    }
  }

  pub fn is_terminal(&self) -> bool { !matches!(self, Notification::Next(_)) }
}

// ============================================================================
// Forward
// ============================================================================

/// Passes events straight through while collecting every upstream handle in
/// one composite. The downstream sees that composite as its single upstream.
pub(crate) struct Forward<O> {
  downstream: O,
  upstream: CompositeDisposable,
}

impl<O> Forward<O> {
  pub(crate) fn new<T>(mut downstream: O, upstream: CompositeDisposable) -> Self
  where
    O: Observer<T>,
  {
    downstream.set_upstream(upstream.handle());
    Self { downstream, upstream }
  }
}

impl<T, O: Observer<T>> Observer<T> for Forward<O> {
  fn on_next(&mut self, value: T) {
    if !self.is_disposed() {
      self.downstream.on_next(value);
    }
  }

  fn on_error(&mut self, err: RxError) {
    if !self.upstream.is_disposed() {
      self.downstream.on_error(err);
      self.upstream.dispose();
    }
  }

  fn on_completed(&mut self) {
    if !self.upstream.is_disposed() {
      self.downstream.on_completed();
      self.upstream.dispose();
    }
  }

  fn is_disposed(&self) -> bool { self.upstream.is_disposed() || self.downstream.is_disposed() }

  fn set_upstream(&mut self, upstream: DisposableHandle) { self.upstream.add(upstream) }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;
  use crate::disposable::BooleanDisposable;

  #[rxkernel_macro::test]
  fn boxed_observer_delegates() {
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();
    let mut boxed: BoxedObserver<i32> =
      Box::new(Subscriber::<_, DynamicUpstreams>::new(LambdaObserver::next(move |v: i32| {
        c_seen.lock().unwrap().push(v)
      })));
    boxed.on_next(1);
    boxed.on_completed();
    boxed.on_next(2);
    assert!(boxed.is_disposed());
    assert_eq!(*seen.lock().unwrap(), vec![1]);
  }

  #[rxkernel_macro::test]
  fn forward_collects_upstreams() {
    let subscriber = Subscriber::<_, FixedUpstreams<1>>::new(LambdaObserver::next(|_: i32| {}));
    let outer = subscriber.disposable();
    let mut forward = Forward::new::<i32>(subscriber, CompositeDisposable::new());

    let a = BooleanDisposable::new();
    let b = BooleanDisposable::new();
    Observer::<i32>::set_upstream(&mut forward, DisposableHandle::new(a.clone()));
    Observer::<i32>::set_upstream(&mut forward, DisposableHandle::new(b.clone()));
    assert!(!Observer::<i32>::is_disposed(&forward));

    outer.dispose();
    assert!(a.is_disposed() && b.is_disposed());
    assert!(Observer::<i32>::is_disposed(&forward));
  }

  #[rxkernel_macro::test]
  fn notification_delivers() {
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();
    let mut subscriber = Subscriber::<_, NoUpstreams>::new(LambdaObserver::next(move |v: i32| {
      c_seen.lock().unwrap().push(v)
    }));
    Notification::Next(3).deliver(&mut subscriber);
    let done: Notification<i32> = Notification::Completed;
    assert!(done.is_terminal());
    done.deliver(&mut subscriber);
    assert!(subscriber.is_disposed());
    assert_eq!(*seen.lock().unwrap(), vec![3]);
  }
}
