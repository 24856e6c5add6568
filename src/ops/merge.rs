use std::marker::PhantomData;

use crate::{
  coordinator::Coordinator,
  disposable::{CompositeDisposable, Disposable, DisposableHandle},
  error::RxError,
  observable::{ItemHint, Observable},
  observer::Observer,
  scheduler::CurrentThread,
};

/// Values of two sources as they arrive.
///
/// ```
/// use rxkernel::prelude::*;
///
/// let seen = std::sync::Arc::new(std::sync::Mutex::new(vec![]));
/// let c_seen = seen.clone();
/// CurrentThread::from_iter([1, 3])
///   .merge_with(CurrentThread::from_iter([2, 4]))
///   .subscribe_next(move |v| c_seen.lock().unwrap().push(v));
/// assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4]);
/// ```
#[derive(Clone)]
pub struct Merge<S1, S2> {
  first: S1,
  second: S2,
}

impl<S1, S2> Merge<S1, S2> {
  pub fn new(first: S1, second: S2) -> Self { Self { first, second } }
}

/// Flattens an observable of observables, subscribing every inner one as it
/// arrives.
pub struct MergeAll<S, Inner> {
  source: S,
  _inner: ItemHint<Inner>,
}

impl<S: Clone, Inner> Clone for MergeAll<S, Inner> {
  fn clone(&self) -> Self { Self::new(self.source.clone()) }
}

impl<S, Inner> MergeAll<S, Inner> {
  pub fn new(source: S) -> Self { Self { source, _inner: PhantomData } }
}

/// Sources still running, the outer one included.
struct Pending(usize);

type MergeCoordinator<T, O> = Coordinator<T, Pending, O>;

impl<T, S1, S2> Observable<T> for Merge<S1, S2>
where
  T: Send + 'static,
  S1: Observable<T>,
  S2: Observable<T>,
{
  fn subscribe<O: Observer<T> + 'static>(&self, observer: O) {
    let coordinator = Coordinator::new(Pending(2), observer);
    CurrentThread::own_queue(|| {
      self.first.subscribe(MergeObserver::new(coordinator.clone()));
      self.second.subscribe(MergeObserver::new(coordinator));
    });
  }
}

impl<U, S, Inner> Observable<U> for MergeAll<S, Inner>
where
  U: Send + 'static,
  S: Observable<Inner>,
  Inner: Observable<U>,
{
  fn subscribe<O: Observer<U> + 'static>(&self, observer: O) {
    let coordinator = Coordinator::new(Pending(1), observer);
    self.source.subscribe(OuterObserver(MergeObserver::new(coordinator)));
  }
}

fn source_completed<T, O: Observer<T>>(coordinator: &MergeCoordinator<T, O>, source: &CompositeDisposable) {
  coordinator.remove_source(source);
  coordinator.with_state(|s| {
    s.state.0 = s.state.0.saturating_sub(1);
    if s.state.0 == 0 {
      s.complete();
    }
  });
}

struct MergeObserver<T, O> {
  coordinator: MergeCoordinator<T, O>,
  upstream: CompositeDisposable,
}

impl<T, O: Observer<T>> MergeObserver<T, O> {
  fn new(coordinator: MergeCoordinator<T, O>) -> Self {
    let upstream = coordinator.add_source();
    Self { coordinator, upstream }
  }
}

impl<T, O> Observer<T> for MergeObserver<T, O>
where
  T: Send + 'static,
  O: Observer<T> + 'static,
{
  fn on_next(&mut self, value: T) { self.coordinator.with_state(|s| s.emit(value)) }

  fn on_error(&mut self, err: RxError) { self.coordinator.error(err) }

  fn on_completed(&mut self) { source_completed(&self.coordinator, &self.upstream) }

  fn is_disposed(&self) -> bool { self.upstream.is_disposed() }

  fn set_upstream(&mut self, upstream: DisposableHandle) { self.upstream.add(upstream) }
}

struct OuterObserver<T, O>(MergeObserver<T, O>);

impl<T, Inner, O> Observer<Inner> for OuterObserver<T, O>
where
  T: Send + 'static,
  Inner: Observable<T>,
  O: Observer<T> + 'static,
{
  fn on_next(&mut self, inner: Inner) {
    let coordinator = &self.0.coordinator;
    let admitted = coordinator.with_state(|s| {
      if s.is_closed() {
        return false;
      }
      s.state.0 += 1;
      true
    });
    if admitted {
      inner.subscribe(MergeObserver::new(coordinator.clone()));
    }
  }

  fn on_error(&mut self, err: RxError) { self.0.coordinator.error(err) }

  fn on_completed(&mut self) { source_completed(&self.0.coordinator, &self.0.upstream) }

  fn is_disposed(&self) -> bool { self.0.upstream.is_disposed() }

  fn set_upstream(&mut self, upstream: DisposableHandle) { self.0.upstream.add(upstream) }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use crate::prelude::*;

  type Log = Arc<Mutex<Vec<String>>>;

  fn log_all<S: Observable<i32>>(source: &S, log: &Log) -> DisposableHandle {
    let (n, e, c) = (log.clone(), log.clone(), log.clone());
    source.subscribe_all(
      move |v| n.lock().unwrap().push(format!("{v}")),
      move |err| e.lock().unwrap().push(format!("error {err}")),
      move || c.lock().unwrap().push("complete".to_owned()),
    )
  }

  #[rxkernel_macro::test]
  fn completes_after_both_sources() {
    let log = Log::default();
    let mut a = PublishSubject::<i32>::new();
    let mut b = PublishSubject::<i32>::new();
    log_all(&a.clone().merge_with(b.clone()), &log);

    a.on_next(1);
    b.on_next(2);
    a.on_completed();
    b.on_next(3);
    assert_eq!(*log.lock().unwrap(), vec!["1", "2", "3"]);
    b.on_completed();
    assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("complete"));
  }

  #[rxkernel_macro::test]
  fn error_cancels_the_other_source() {
    let log = Log::default();
    let mut a = PublishSubject::<i32>::new();
    let mut b = PublishSubject::<i32>::new();
    log_all(&a.clone().merge_with(b.clone()), &log);

    b.on_error(RxError::msg("b failed"));
    a.on_next(1);
    assert_eq!(a.observer_count(), 0);
    assert_eq!(*log.lock().unwrap(), vec!["error b failed"]);
  }

  #[rxkernel_macro::test]
  fn sources_on_one_trampoline_interleave() {
    let log = Log::default();
    log_all(&CurrentThread::from_iter([1, 3, 5]).merge_with(CurrentThread::from_iter([2, 4])), &log);
    assert_eq!(*log.lock().unwrap(), vec!["1", "2", "3", "4", "5", "complete"]);
  }

  #[rxkernel_macro::test]
  fn merge_all_waits_for_outer_and_every_inner() {
    let log = Log::default();
    let mut outer = PublishSubject::<PublishSubject<i32>>::new();
    let mut first = PublishSubject::<i32>::new();
    let mut second = PublishSubject::<i32>::new();
    log_all(&outer.clone().merge_all(), &log);

    outer.on_next(first.clone());
    first.on_next(1);
    outer.on_next(second.clone());
    second.on_next(2);
    first.on_next(3);
    outer.on_completed();
    first.on_completed();
    assert_eq!(*log.lock().unwrap(), vec!["1", "2", "3"]);
    second.on_completed();
    assert_eq!(*log.lock().unwrap(), vec!["1", "2", "3", "complete"]);
  }

  #[rxkernel_macro::test]
  fn disposing_unsubscribes_every_inner() {
    let log = Log::default();
    let mut outer = PublishSubject::<PublishSubject<i32>>::new();
    let inner = PublishSubject::<i32>::new();
    let handle = log_all(&outer.clone().merge_all(), &log);
    outer.on_next(inner.clone());
    assert_eq!(inner.observer_count(), 1);

    handle.dispose();
    assert_eq!(inner.observer_count(), 0);
    assert_eq!(outer.observer_count(), 0);
    assert!(log.lock().unwrap().is_empty());
  }
}
