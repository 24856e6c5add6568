//! Observables: descriptions of how to subscribe.
//!
//! An [`Observable`] owns no running state. Each `subscribe` builds the
//! running state for that one subscription inside the observer chain, so the
//! same observable can be subscribed any number of times, from any thread.
//!
//! [`ObservableExt`] is implemented for every observable and carries the
//! subscribe helpers plus all operators of the crate.

use std::{marker::PhantomData, sync::Arc};

use crate::{
  coordinator::{Combined, CombineStrategy},
  disposable::{CompositeDisposable, DisposableHandle},
  error::RxError,
  observer::{BoxedObserver, FixedUpstreams, Forward, LambdaObserver, Observer, Subscriber},
  ops::{
    combine_latest::CombineLatest,
    debounce::Debounce,
    delay::Delay,
    merge::{Merge, MergeAll},
    observe_on::ObserveOn,
    repeat::Repeat,
    retry::{Retry, RetryPolicy},
    retry_when::RetryWhen,
    sample::Sample,
    subscribe_on::SubscribeOn,
    switch_on_next::SwitchOnNext,
    throttle::Throttle,
    timeout::Timeout,
    window_toggle::WindowToggle,
    with_latest_from::WithLatestFrom,
    zip::Zip,
  },
  scheduler::{CurrentThread, Duration, Scheduler},
};

mod create;
mod defer;
mod from_iter;
mod interval;
mod timer;
mod trivial;

pub use create::{Create, Emitter};
pub use defer::Defer;
pub use from_iter::FromIter;
pub use interval::Interval;
pub use timer::Timer;
pub use trivial::{Empty, Never, ThrowErr};

pub trait Observable<T>: Send + Sync + 'static {
  /// Starts a subscription. The observer receives its upstream handle through
  /// `set_upstream` before any event.
  fn subscribe<O: Observer<T> + 'static>(&self, observer: O);
}

// ============================================================================
// Type erasure
// ============================================================================

#[doc(hidden)]
pub trait DynSubscribe<T>: Send + Sync {
  fn dyn_subscribe(&self, observer: BoxedObserver<T>);
}

impl<T: 'static, S: Observable<T>> DynSubscribe<T> for S {
  fn dyn_subscribe(&self, observer: BoxedObserver<T>) { self.subscribe(observer) }
}

/// A type-erased observable, cheap to clone.
pub struct DynamicObservable<T>(Arc<dyn DynSubscribe<T>>);

impl<T> Clone for DynamicObservable<T> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T: 'static> Observable<T> for DynamicObservable<T> {
  fn subscribe<O: Observer<T> + 'static>(&self, observer: O) { self.0.dyn_subscribe(Box::new(observer)) }
}

/// Shares one allocation of an observable between all its copies, instead of
/// duplicating the captured data per copy.
pub struct Shared<S>(Arc<S>);

impl<S> Clone for Shared<S> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T, S: Observable<T>> Observable<T> for Shared<S> {
  fn subscribe<O: Observer<T> + 'static>(&self, observer: O) { self.0.subscribe(observer) }
}

// ============================================================================
// ObservableExt
// ============================================================================

pub trait ObservableExt<T: Send + 'static>: Observable<T> + Sized {
  // ==== Subscribing ====

  /// Subscribes to values only. An error is logged; completion is ignored.
  fn subscribe_next<N>(&self, next: N) -> DisposableHandle
  where
    N: FnMut(T) + Send + 'static,
  {
    let subscriber = Subscriber::<_, FixedUpstreams<1>>::new(LambdaObserver::next(next));
    let handle = subscriber.disposable();
    self.subscribe(subscriber);
    handle
  }

  fn subscribe_all<N, E, C>(&self, next: N, error: E, complete: C) -> DisposableHandle
  where
    N: FnMut(T) + Send + 'static,
    E: FnMut(RxError) + Send + 'static,
    C: FnMut() + Send + 'static,
  {
    let subscriber = Subscriber::<_, FixedUpstreams<1>>::new(LambdaObserver::new(next, error, complete));
    let handle = subscriber.disposable();
    self.subscribe(subscriber);
    handle
  }

  /// Subscribes any observer and returns the handle cancelling it.
  fn subscribe_with_disposable<O>(&self, observer: O) -> DisposableHandle
  where
    O: Observer<T> + 'static,
  {
    let upstream = CompositeDisposable::new();
    let handle = upstream.handle();
    self.subscribe(Forward::new::<T>(observer, upstream));
    handle
  }

  // ==== Ownership ====

  fn boxed(self) -> DynamicObservable<T> { DynamicObservable(Arc::new(self)) }

  fn into_shared(self) -> Shared<Self> { Shared(Arc::new(self)) }

  // ==== Merging and switching ====

  /// Values of both sources as they arrive. Completes once both completed.
  fn merge_with<S>(self, other: S) -> Merge<Self, S>
  where
    S: Observable<T>,
  {
    Merge::new(self, other)
  }

  /// Subscribes to every emitted observable and forwards all their values.
  /// Completes once the outer source and every inner one completed.
  fn merge_all<U>(self) -> MergeAll<Self, T>
  where
    T: Observable<U>,
    U: Send + 'static,
  {
    MergeAll::new(self)
  }

  /// Forwards values of the latest emitted observable only; the previous
  /// inner subscription is disposed on every switch.
  fn switch_on_next<U>(self) -> SwitchOnNext<Self, T>
  where
    T: Observable<U>,
    U: Send + 'static,
  {
    SwitchOnNext::new(self)
  }

  // ==== Combining ====

  /// Pairs of the latest value of each source, once both have one.
  fn combine_latest<B, S>(
    self, other: S,
  ) -> Combined<Self, S, CombineLatest<T, B, fn(&T, &B) -> Result<(T, B), RxError>, (T, B)>>
  where
    T: Clone,
    B: Clone + Send + 'static,
    S: Observable<B>,
  {
    fn pair<A: Clone, B: Clone>(a: &A, b: &B) -> Result<(A, B), RxError> { Ok((a.clone(), b.clone())) }
    Combined::new(self, other, pair::<T, B> as fn(&T, &B) -> Result<(T, B), RxError>)
  }

  /// [`combine_latest`](Self::combine_latest) through a fallible function.
  fn try_combine_latest<B, S, F, R>(self, other: S, f: F) -> Combined<Self, S, CombineLatest<T, B, F, R>>
  where
    B: Send + 'static,
    S: Observable<B>,
    F: Fn(&T, &B) -> Result<R, RxError> + Clone + Send + Sync + 'static,
    R: Send + 'static,
  {
    Combined::new(self, other, f)
  }

  /// Pairs values by arrival index.
  fn zip<B, S>(self, other: S) -> Combined<Self, S, Zip<T, B, fn(T, B) -> Result<(T, B), RxError>, (T, B)>>
  where
    B: Send + 'static,
    S: Observable<B>,
  {
    fn pair<A, B>(a: A, b: B) -> Result<(A, B), RxError> { Ok((a, b)) }
    Combined::new(self, other, pair::<T, B> as fn(T, B) -> Result<(T, B), RxError>)
  }

  fn try_zip<B, S, F, R>(self, other: S, f: F) -> Combined<Self, S, Zip<T, B, F, R>>
  where
    B: Send + 'static,
    S: Observable<B>,
    F: Fn(T, B) -> Result<R, RxError> + Clone + Send + Sync + 'static,
    R: Send + 'static,
  {
    Combined::new(self, other, f)
  }

  /// On every value of `self`, pairs it with the latest value of `other`.
  /// Completes with `self` only.
  fn with_latest_from<B, S>(
    self, other: S,
  ) -> Combined<Self, S, WithLatestFrom<T, B, fn(T, &B) -> Result<(T, B), RxError>, (T, B)>>
  where
    B: Clone + Send + 'static,
    S: Observable<B>,
  {
    fn pair<A, B: Clone>(a: A, b: &B) -> Result<(A, B), RxError> { Ok((a, b.clone())) }
    Combined::new(self, other, pair::<T, B> as fn(T, &B) -> Result<(T, B), RxError>)
  }

  fn try_with_latest_from<B, S, F, R>(self, other: S, f: F) -> Combined<Self, S, WithLatestFrom<T, B, F, R>>
  where
    B: Send + 'static,
    S: Observable<B>,
    F: Fn(T, &B) -> Result<R, RxError> + Clone + Send + Sync + 'static,
    R: Send + 'static,
  {
    Combined::new(self, other, f)
  }

  /// Combines with any custom [`CombineStrategy`].
  fn combine_with<St, S>(self, other: S, config: St::Config) -> Combined<Self, S, St>
  where
    St: CombineStrategy<First = T>,
    S: Observable<St::Second>,
  {
    Combined::new(self, other, config)
  }

  // ==== Windowing ====

  /// Opens a window on every value of `openings`; the window closes on the
  /// first event of the observable `closing_selector` returns for it. Every
  /// value of `self` goes to every open window.
  fn window_toggle<U, Open, F, C, V>(self, openings: Open, closing_selector: F) -> WindowToggle<Self, Open, F, U, V>
  where
    T: Clone,
    U: Send + 'static,
    V: Send + 'static,
    Open: Observable<U>,
    F: Fn(U) -> C + Send + Sync + 'static,
    C: Observable<V>,
  {
    WindowToggle::new(self, openings, closing_selector)
  }

  // ==== Resubscribing ====

  /// Resubscribes on error as long as `policy` allows, through the
  /// current-thread trampoline.
  fn retry<P: RetryPolicy>(self, policy: P) -> Retry<Self, P, CurrentThread> {
    Retry::new(self, policy, CurrentThread)
  }

  fn retry_on<P: RetryPolicy, Sch: Scheduler>(self, policy: P, scheduler: Sch) -> Retry<Self, P, Sch> {
    Retry::new(self, policy, scheduler)
  }

  /// On error, subscribes to the observable `notifier` derives from it: its
  /// first value resubscribes, its completion completes and its error fails
  /// the output.
  fn retry_when<F, N, U>(self, notifier: F) -> RetryWhen<Self, F, U>
  where
    F: Fn(RxError) -> Result<N, RxError> + Send + Sync + 'static,
    N: Observable<U>,
    U: Send + 'static,
  {
    RetryWhen::new(self, notifier)
  }

  /// Subscribes `count` times in a row, completing after the last run.
  fn repeat(self, count: usize) -> Repeat<Self, CurrentThread> { Repeat::new(self, count, CurrentThread) }

  // ==== Timing ====

  /// Fails with [`RxError::Timeout`] if no value arrives within `duration`
  /// of the subscription or of the previous value.
  fn timeout<Sch: Scheduler>(self, duration: Duration, scheduler: Sch) -> Timeout<Self, ThrowErr<T>, Sch> {
    Timeout::new(self, duration, ThrowErr::new(RxError::Timeout), scheduler)
  }

  /// Like [`timeout`](Self::timeout), but switches to `fallback` instead of
  /// failing.
  fn timeout_or<F, Sch>(self, duration: Duration, fallback: F, scheduler: Sch) -> Timeout<Self, F, Sch>
  where
    F: Observable<T>,
    Sch: Scheduler,
  {
    Timeout::new(self, duration, fallback, scheduler)
  }

  /// Shifts every value and the completion by `duration`. Errors are
  /// forwarded at once.
  fn delay<Sch: Scheduler>(self, duration: Duration, scheduler: Sch) -> Delay<Self, Sch> {
    Delay::new(self, duration, scheduler)
  }

  /// Forwards a value, then drops everything for `duration`.
  fn throttle<Sch: Scheduler>(self, duration: Duration, scheduler: Sch) -> Throttle<Self, Sch> {
    Throttle::new(self, duration, scheduler)
  }

  /// Every `period`, forwards the latest value if a new one arrived.
  fn sample<Sch: Scheduler>(self, period: Duration, scheduler: Sch) -> Sample<Self, Sch> {
    Sample::new(self, period, scheduler)
  }

  /// Forwards a value once `duration` passed without a newer one.
  fn debounce<Sch: Scheduler>(self, duration: Duration, scheduler: Sch) -> Debounce<Self, Sch> {
    Debounce::new(self, duration, scheduler)
  }

  // ==== Threading ====

  /// Performs the subscription itself on a worker of `scheduler`.
  fn subscribe_on<Sch: Scheduler>(self, scheduler: Sch) -> SubscribeOn<Self, Sch> {
    SubscribeOn::new(self, scheduler)
  }

  /// Delivers every event on a worker of `scheduler`, in order.
  fn observe_on<Sch: Scheduler>(self, scheduler: Sch) -> ObserveOn<Self, Sch> { ObserveOn::new(self, scheduler) }
}

impl<T: Send + 'static, S: Observable<T>> ObservableExt<T> for S {}

/// `PhantomData` for item types an observable produces but does not store.
pub(crate) type ItemHint<T> = PhantomData<fn() -> T>;
