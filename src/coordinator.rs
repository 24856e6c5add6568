//! The multi-source coordinator.
//!
//! Every operator that listens to more than one upstream (merge, zip,
//! combine_latest, switch_on_next, window_toggle, timeout, ...) funnels its
//! sources into one [`Coordinator`]: a mutex-guarded state block owning the
//! single downstream observer. Source observers take the lock, update their
//! own slot and, if the operator's rule says so, emit to the downstream while
//! still holding it. The downstream therefore never sees two concurrent calls
//! and never more than one terminal event.
//!
//! Subscribing and scheduling never happen under the lock.

use std::marker::PhantomData;

use crate::{
  disposable::{CompositeDisposable, Disposable, DisposableHandle, RefCountDisposable},
  error::RxError,
  observable::Observable,
  observer::Observer,
  rc::{MutArc, RcDerefMut},
  scheduler::CurrentThread,
};

/// The lock-protected part of a coordinator.
pub struct CoordinatorState<T, St, O> {
  /// Operator-specific bookkeeping.
  pub state: St,
  downstream: Option<O>,
  terminated: bool,
  _item: PhantomData<fn(T)>,
}

impl<T, St, O: Observer<T>> CoordinatorState<T, St, O> {
  /// Forwards `value` unless the downstream is gone.
  pub fn emit(&mut self, value: T) {
    if let Some(downstream) = self.downstream.as_mut().filter(|d| !d.is_disposed()) {
      downstream.on_next(value);
    }
  }

  pub fn error(&mut self, err: RxError) {
    self.terminated = true;
    if let Some(mut downstream) = self.downstream.take() {
      downstream.on_error(err);
    }
  }

  pub fn complete(&mut self) {
    self.terminated = true;
    if let Some(mut downstream) = self.downstream.take() {
      downstream.on_completed();
    }
  }

  /// A terminal event went through this coordinator.
  pub fn is_terminated(&self) -> bool { self.terminated }

  /// Nothing emitted from now on would be delivered.
  pub fn is_closed(&self) -> bool {
    self.terminated || self.downstream.as_ref().map_or(true, |d| d.is_disposed())
  }
}

pub struct Coordinator<T, St, O> {
  shared: MutArc<CoordinatorState<T, St, O>>,
  sources: CompositeDisposable,
}

impl<T, St, O> Clone for Coordinator<T, St, O> {
  fn clone(&self) -> Self { Self { shared: self.shared.clone(), sources: self.sources.clone() } }
}

impl<T, St, O: Observer<T>> Coordinator<T, St, O> {
  /// Takes over `downstream`; disposing it disposes every source.
  pub fn new(state: St, mut downstream: O) -> Self {
    let sources = CompositeDisposable::new();
    downstream.set_upstream(sources.handle());
    Self::assemble(state, downstream, sources)
  }

  /// Like [`new`](Self::new), but the sources outlive the downstream until
  /// every reference taken from the returned [`RefCountDisposable`] has been
  /// released. The downstream holds the first reference.
  pub fn with_ref_count(state: St, mut downstream: O) -> (Self, RefCountDisposable) {
    let sources = CompositeDisposable::new();
    let ref_count = RefCountDisposable::new();
    ref_count.add(sources.handle());
    downstream.set_upstream(ref_count.add_ref());
    (Self::assemble(state, downstream, sources), ref_count)
  }

  fn assemble(state: St, downstream: O, sources: CompositeDisposable) -> Self {
    let state = CoordinatorState { state, downstream: Some(downstream), terminated: false, _item: PhantomData };
    Self { shared: MutArc::own(state), sources }
  }

  /// Runs `f` under the lock. If `f` delivered a terminal event, every source
  /// is disposed once the lock is released.
  pub fn with_state<R>(&self, f: impl FnOnce(&mut CoordinatorState<T, St, O>) -> R) -> R {
    let (result, terminated) = {
      let mut guard = self.shared.rc_deref_mut();
      let result = f(&mut guard);
      (result, guard.terminated)
    };
    if terminated {
      self.sources.dispose();
    }
    result
  }

  pub fn error(&self, err: RxError) { self.with_state(|s| s.error(err)) }

  pub fn complete(&self) { self.with_state(|s| s.complete()) }

  /// A fresh child composite for one source subscription.
  pub fn add_source(&self) -> CompositeDisposable {
    let child = CompositeDisposable::new();
    self.sources.add(child.handle());
    child
  }

  /// Detaches a finished source so long-lived coordinators do not accumulate
  /// dead children.
  pub fn remove_source(&self, child: &CompositeDisposable) { self.sources.remove(&child.handle()); }

  pub fn add_resource(&self, resource: DisposableHandle) { self.sources.add(resource) }

  pub fn is_disposed(&self) -> bool { self.sources.is_disposed() }
}

/// Forwards every event of one source straight into a coordinator.
pub(crate) struct Relay<T, St, O> {
  coordinator: Coordinator<T, St, O>,
  upstream: CompositeDisposable,
}

impl<T, St, O: Observer<T>> Relay<T, St, O> {
  pub(crate) fn new(coordinator: Coordinator<T, St, O>) -> Self {
    let upstream = coordinator.add_source();
    Self { coordinator, upstream }
  }
}

impl<T, St, O> Observer<T> for Relay<T, St, O>
where
  T: Send + 'static,
  St: Send + 'static,
  O: Observer<T> + 'static,
{
  fn on_next(&mut self, value: T) { self.coordinator.with_state(|s| s.emit(value)) }

  fn on_error(&mut self, err: RxError) { self.coordinator.error(err) }

  fn on_completed(&mut self) { self.coordinator.complete() }

  fn is_disposed(&self) -> bool { self.upstream.is_disposed() }

  fn set_upstream(&mut self, upstream: DisposableHandle) { self.upstream.add(upstream) }
}

// ============================================================================
// Two-source combination strategies
// ============================================================================

/// A value from one of two sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Side<A, B> {
  First(A),
  Second(B),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideId {
  First,
  Second,
}

/// The three rules of a two-source operator: what to emit, when to
/// complete, and how to treat an error. [`Combined`] runs any strategy on a
/// coordinator, so a custom operator only writes these rules.
pub trait CombineStrategy: Send + 'static {
  type First: Send + 'static;
  type Second: Send + 'static;
  type Output: Send + 'static;
  /// What the operator was built with; each subscription gets a fresh
  /// strategy from it.
  type Config: Clone + Send + Sync + 'static;

  fn from_config(config: &Self::Config) -> Self;

  /// An `Err` terminates the output with that error.
  fn on_next(&mut self, value: Side<Self::First, Self::Second>) -> Result<Option<Self::Output>, RxError>;

  fn on_completed(&mut self, side: SideId);

  /// Checked after every event.
  fn is_completed(&self) -> bool;

  /// Whether `err` from `side` terminates the output. Returning `false`
  /// treats it as that side completing.
  fn on_error(&mut self, side: SideId, err: &RxError) -> bool {
    let _ = (side, err);
    true
  }
}

/// Two sources combined by a [`CombineStrategy`].
pub struct Combined<S1, S2, St: CombineStrategy> {
  first: S1,
  second: S2,
  config: St::Config,
  _strategy: PhantomData<fn() -> St>,
}

impl<S1, S2, St: CombineStrategy> Combined<S1, S2, St> {
  pub fn new(first: S1, second: S2, config: St::Config) -> Self {
    Self { first, second, config, _strategy: PhantomData }
  }
}

impl<S1: Clone, S2: Clone, St: CombineStrategy> Clone for Combined<S1, S2, St> {
  fn clone(&self) -> Self {
    Self::new(self.first.clone(), self.second.clone(), self.config.clone())
  }
}

impl<S1, S2, St> Observable<St::Output> for Combined<S1, S2, St>
where
  S1: Observable<St::First>,
  S2: Observable<St::Second>,
  St: CombineStrategy,
{
  fn subscribe<O: Observer<St::Output> + 'static>(&self, observer: O) {
    let coordinator = Coordinator::new(St::from_config(&self.config), observer);
    // Both subscriptions share one trampoline so their emissions interleave.
    CurrentThread::own_queue(|| {
      self.first.subscribe(CombineObserver::new(coordinator.clone(), SideId::First, Side::First));
      self.second.subscribe(CombineObserver::new(coordinator, SideId::Second, Side::Second));
    });
  }
}

struct CombineObserver<A, St: CombineStrategy, O> {
  coordinator: Coordinator<St::Output, St, O>,
  side: SideId,
  wrap: fn(A) -> Side<St::First, St::Second>,
  upstream: CompositeDisposable,
}

impl<A, St, O> CombineObserver<A, St, O>
where
  St: CombineStrategy,
  O: Observer<St::Output>,
{
  fn new(
    coordinator: Coordinator<St::Output, St, O>, side: SideId, wrap: fn(A) -> Side<St::First, St::Second>,
  ) -> Self {
    let upstream = coordinator.add_source();
    Self { coordinator, side, wrap, upstream }
  }
}

fn finish_if_done<St, O>(s: &mut CoordinatorState<St::Output, St, O>)
where
  St: CombineStrategy,
  O: Observer<St::Output>,
{
  if !s.is_terminated() && s.state.is_completed() {
    s.complete();
  }
}

impl<A, St, O> Observer<A> for CombineObserver<A, St, O>
where
  A: Send + 'static,
  St: CombineStrategy,
  O: Observer<St::Output> + 'static,
{
  fn on_next(&mut self, value: A) {
    let value = (self.wrap)(value);
    self.coordinator.with_state(|s| {
      if s.is_terminated() {
        return;
      }
      match s.state.on_next(value) {
        Ok(Some(output)) => s.emit(output),
        Ok(None) => {}
        Err(err) => return s.error(err),
      }
      finish_if_done(s);
    });
  }

  fn on_error(&mut self, err: RxError) {
    let side = self.side;
    self.coordinator.with_state(|s| {
      if s.is_terminated() {
        return;
      }
      if s.state.on_error(side, &err) {
        s.error(err);
      } else {
        s.state.on_completed(side);
        finish_if_done(s);
      }
    });
  }

  fn on_completed(&mut self) {
    let side = self.side;
    self.coordinator.with_state(|s| {
      if s.is_terminated() {
        return;
      }
      s.state.on_completed(side);
      finish_if_done(s);
    });
  }

  fn is_disposed(&self) -> bool { self.upstream.is_disposed() }

  fn set_upstream(&mut self, upstream: DisposableHandle) { self.upstream.add(upstream) }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;
  use crate::{
    disposable::BooleanDisposable,
    observer::{DynamicUpstreams, LambdaObserver, Subscriber},
  };

  type Log = Arc<Mutex<Vec<String>>>;

  fn recording(log: &Log) -> Subscriber<impl crate::observer::ObserverStrategy<i32>, DynamicUpstreams> {
    let (n, e, c) = (log.clone(), log.clone(), log.clone());
    Subscriber::new(LambdaObserver::new(
      move |v: i32| n.lock().unwrap().push(format!("next {v}")),
      move |err: RxError| e.lock().unwrap().push(format!("error {err}")),
      move || c.lock().unwrap().push("complete".to_owned()),
    ))
  }

  #[rxkernel_macro::test]
  fn terminal_event_disposes_sources() {
    let log = Log::default();
    let coordinator = Coordinator::new((), recording(&log));
    let source = coordinator.add_source();
    let resource = BooleanDisposable::new();
    source.add(DisposableHandle::new(resource.clone()));

    coordinator.with_state(|s| s.emit(1));
    coordinator.complete();
    coordinator.with_state(|s| s.emit(2));
    coordinator.error(RxError::msg("late"));

    assert!(resource.is_disposed());
    assert!(coordinator.is_disposed());
    assert_eq!(*log.lock().unwrap(), vec!["next 1", "complete"]);
  }

  #[rxkernel_macro::test]
  fn downstream_disposal_disposes_sources() {
    let log = Log::default();
    let subscriber = recording(&log);
    let handle = subscriber.disposable();
    let coordinator = Coordinator::new((), subscriber);
    let source = coordinator.add_source();

    handle.dispose();
    assert!(source.is_disposed());
    assert!(coordinator.with_state(|s| s.is_closed()));
  }

  #[rxkernel_macro::test]
  fn ref_counted_sources_outlive_downstream() {
    let log = Log::default();
    let subscriber = recording(&log);
    let handle = subscriber.disposable();
    let (coordinator, ref_count) = Coordinator::with_ref_count((), subscriber);
    let source = coordinator.add_source();
    let child_ref = ref_count.add_ref();

    handle.dispose();
    assert!(!source.is_disposed());
    assert!(coordinator.with_state(|s| s.is_closed() && !s.is_terminated()));

    child_ref.dispose();
    assert!(source.is_disposed());
  }

  #[rxkernel_macro::test]
  fn removed_source_is_not_disposed_with_the_rest() {
    let coordinator = Coordinator::new((), recording(&Log::default()));
    let finished = coordinator.add_source();
    coordinator.remove_source(&finished);
    coordinator.complete();
    assert!(!finished.is_disposed());
  }
}
