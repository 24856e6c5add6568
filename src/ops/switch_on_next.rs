use std::marker::PhantomData;

use crate::{
  coordinator::{Coordinator, CoordinatorState},
  disposable::{CompositeDisposable, Disposable, DisposableHandle, SerialDisposable},
  error::RxError,
  observable::{ItemHint, Observable},
  observer::Observer,
};

/// Forwards the values of the most recently emitted inner observable.
///
/// Every new inner observable disposes the previous inner subscription
/// before it is subscribed. The output completes once the outer source and
/// every inner source it subscribed completed by themselves: an inner that
/// was switched away before completing keeps the output open.
///
/// That is stricter than "outer and current inner completed". Switching from
/// `never()` to `just(3)` and completing the outer therefore emits `3` but
/// never completes.
pub struct SwitchOnNext<S, Inner> {
  source: S,
  _inner: ItemHint<Inner>,
}

impl<S: Clone, Inner> Clone for SwitchOnNext<S, Inner> {
  fn clone(&self) -> Self { Self::new(self.source.clone()) }
}

impl<S, Inner> SwitchOnNext<S, Inner> {
  pub fn new(source: S) -> Self { Self { source, _inner: PhantomData } }
}

struct SwitchState {
  /// Outer plus every inner that has not completed.
  pending: usize,
  /// Bumped on every switch; only the inner holding the latest one forwards.
  generation: u64,
}

type SwitchCoordinator<T, O> = Coordinator<T, SwitchState, O>;

impl<U, S, Inner> Observable<U> for SwitchOnNext<S, Inner>
where
  U: Send + 'static,
  S: Observable<Inner>,
  Inner: Observable<U>,
{
  fn subscribe<O: Observer<U> + 'static>(&self, observer: O) {
    let coordinator = Coordinator::new(SwitchState { pending: 1, generation: 0 }, observer);
    let active = SerialDisposable::new();
    coordinator.add_resource(active.handle());
    let upstream = coordinator.add_source();
    self.source.subscribe(OuterObserver { coordinator, active, upstream });
  }
}

fn release<T, O: Observer<T>>(s: &mut CoordinatorState<T, SwitchState, O>) {
  s.state.pending = s.state.pending.saturating_sub(1);
  if s.state.pending == 0 {
    s.complete();
  }
}

struct OuterObserver<T, O> {
  coordinator: SwitchCoordinator<T, O>,
  active: SerialDisposable,
  upstream: CompositeDisposable,
}

impl<T, Inner, O> Observer<Inner> for OuterObserver<T, O>
where
  T: Send + 'static,
  Inner: Observable<T>,
  O: Observer<T> + 'static,
{
  fn on_next(&mut self, inner: Inner) {
    let generation = self.coordinator.with_state(|s| {
      if s.is_closed() {
        return None;
      }
      s.state.pending += 1;
      s.state.generation += 1;
      Some(s.state.generation)
    });
    let Some(generation) = generation else { return };

    let upstream = CompositeDisposable::new();
    self.active.set(upstream.handle());
    inner.subscribe(InnerObserver { coordinator: self.coordinator.clone(), generation, upstream });
  }

  fn on_error(&mut self, err: RxError) { self.coordinator.error(err) }

  fn on_completed(&mut self) {
    self.coordinator.remove_source(&self.upstream);
    self.coordinator.with_state(release);
  }

  fn is_disposed(&self) -> bool { self.upstream.is_disposed() }

  fn set_upstream(&mut self, upstream: DisposableHandle) { self.upstream.add(upstream) }
}

struct InnerObserver<T, O> {
  coordinator: SwitchCoordinator<T, O>,
  generation: u64,
  upstream: CompositeDisposable,
}

impl<T, O> Observer<T> for InnerObserver<T, O>
where
  T: Send + 'static,
  O: Observer<T> + 'static,
{
  fn on_next(&mut self, value: T) {
    let generation = self.generation;
    self.coordinator.with_state(|s| {
      if s.state.generation == generation {
        s.emit(value);
      }
    });
  }

  fn on_error(&mut self, err: RxError) {
    let generation = self.generation;
    self.coordinator.with_state(|s| {
      if s.state.generation == generation {
        s.error(err);
      }
    });
  }

  fn on_completed(&mut self) {
    let generation = self.generation;
    self.coordinator.with_state(|s| {
      if s.state.generation == generation {
        release(s);
      }
    });
  }

  fn is_disposed(&self) -> bool { self.upstream.is_disposed() }

  fn set_upstream(&mut self, upstream: DisposableHandle) { self.upstream.add(upstream) }
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
  fn abandoned_inner_keeps_the_output_open() {
    let log = Log::default();
    let inners = vec![Immediate::just(1).boxed(), Immediate::never::<i32>().boxed(), Immediate::just(3).boxed()];
    log_all(&Immediate::from_iter(inners).switch_on_next(), &log);
    assert_eq!(*log.lock().unwrap(), vec!["1", "3"]);
  }

  #[rxkernel_macro::test]
  fn switching_unsubscribes_the_previous_inner() {
    let log = Log::default();
    let mut outer = PublishSubject::<PublishSubject<i32>>::new();
    let mut first = PublishSubject::<i32>::new();
    let mut second = PublishSubject::<i32>::new();
    log_all(&outer.clone().switch_on_next(), &log);

    outer.on_next(first.clone());
    first.on_next(1);
    outer.on_next(second.clone());
    assert_eq!(first.observer_count(), 0);
    first.on_next(2);
    second.on_next(3);
    second.on_completed();
    outer.on_completed();
    assert_eq!(*log.lock().unwrap(), vec!["1", "3"]);
  }

  #[rxkernel_macro::test]
  fn completes_when_outer_and_inners_completed() {
    let log = Log::default();
    let inners = vec![Immediate::from_iter(vec![1, 2]).boxed(), Immediate::just(3).boxed()];
    log_all(&Immediate::from_iter(inners).switch_on_next(), &log);
    assert_eq!(*log.lock().unwrap(), vec!["1", "2", "3", "complete"]);
  }

  #[rxkernel_macro::test]
  fn inner_error_terminates() {
    let log = Log::default();
    let inners = vec![Immediate::throw_err::<i32>(RxError::msg("inner")).boxed(), Immediate::just(9).boxed()];
    log_all(&Immediate::from_iter(inners).switch_on_next(), &log);
    assert_eq!(*log.lock().unwrap(), vec!["error inner"]);
  }
}
