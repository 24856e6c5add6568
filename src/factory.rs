//! Source constructors, reachable from every scheduler type.
//!
//! [`ObservableFactory`] is implemented for every [`Scheduler`], so the
//! scheduler a source runs on is picked by the type the constructor is called
//! on:
//!
//! ```rust
//! use rxkernel::prelude::*;
//!
//! // Emits on the calling thread, one item per trampoline step.
//! CurrentThread::from_iter([1, 2, 3]).subscribe_next(|v| println!("{v}"));
//!
//! // Emits on a dedicated thread.
//! let handle = NewThread::interval(Duration::from_millis(10)).subscribe_next(|v| println!("{v}"));
//! handle.dispose();
//! ```
//!
//! Sources that emit nothing ([`empty`](ObservableFactory::empty),
//! [`never`](ObservableFactory::never),
//! [`throw_err`](ObservableFactory::throw_err)) and the closure-driven
//! [`create`](ObservableFactory::create) and
//! [`defer`](ObservableFactory::defer) act synchronously on the subscribing
//! thread whatever the scheduler.

use std::iter::Once;

use crate::{
  error::RxError,
  observable::{Create, Defer, Emitter, Empty, FromIter, Interval, Never, Observable, ThrowErr, Timer},
  scheduler::{Duration, Scheduler},
};

pub trait ObservableFactory: Scheduler {
  /// Emits `value`, then completes.
  fn just<T>(value: T) -> FromIter<Once<T>, Self> { FromIter::new(std::iter::once(value), Self::default()) }

  /// Emits every item of `iter` in order, then completes. The iterable is
  /// cloned for each subscription.
  fn from_iter<I: IntoIterator>(iter: I) -> FromIter<I, Self> { FromIter::new(iter, Self::default()) }

  fn empty<T>() -> Empty<T> { Empty::new() }

  fn never<T>() -> Never<T> { Never::new() }

  fn throw_err<T>(err: RxError) -> ThrowErr<T> { ThrowErr::new(err) }

  /// Runs `f` with an [`Emitter`] for every subscription.
  ///
  /// ```rust
  /// use rxkernel::prelude::*;
  ///
  /// Immediate::create(|mut emitter: Emitter<i32>| {
  ///   emitter.next(1);
  ///   emitter.complete();
  /// })
  /// .subscribe_next(|v| assert_eq!(v, 1));
  /// ```
  fn create<T, F>(f: F) -> Create<T, F>
  where
    F: Fn(Emitter<T>) + Send + Sync + 'static,
  {
    Create::new(f)
  }

  /// Calls `factory` on every subscription and subscribes to what it returns.
  fn defer<T, F, S>(factory: F) -> Defer<T, F>
  where
    F: Fn() -> Result<S, RxError> + Send + Sync + 'static,
    S: Observable<T>,
  {
    Defer::new(factory)
  }

  /// Emits `0, 1, 2, ...` every `period`; never completes.
  fn interval(period: Duration) -> Interval<Self> { Interval::new(period, Self::default()) }

  /// Emits `0` after `delay`, then completes.
  fn timer(delay: Duration) -> Timer<Self> { Timer::new(delay, Self::default()) }
}

impl<S: Scheduler> ObservableFactory for S {}
