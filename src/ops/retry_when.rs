use std::{marker::PhantomData, sync::Arc};

use tracing::debug;

use crate::{
  coordinator::Coordinator,
  disposable::{CompositeDisposable, Disposable, DisposableHandle, SerialDisposable},
  error::RxError,
  observable::{ItemHint, Observable},
  observer::Observer,
  scheduler::{CurrentThread, CurrentThreadWorker, Scheduler, Task, TaskState, Worker},
};

/// Resubscribes on error once the observable derived from that error emits.
///
/// The notifier function may refuse outright by returning `Err`. A notifier
/// observable that completes without emitting completes the output; one that
/// fails fails it.
pub struct RetryWhen<S, F, U> {
  source: Arc<S>,
  notifier: Arc<F>,
  _signal: ItemHint<U>,
}

impl<S, F, U> Clone for RetryWhen<S, F, U> {
  fn clone(&self) -> Self {
    Self { source: self.source.clone(), notifier: self.notifier.clone(), _signal: PhantomData }
  }
}

impl<S, F, U> RetryWhen<S, F, U> {
  pub fn new(source: S, notifier: F) -> Self {
    Self { source: Arc::new(source), notifier: Arc::new(notifier), _signal: PhantomData }
  }
}

struct RetryWhenContext<T, S, F, U, O> {
  source: Arc<S>,
  notifier: Arc<F>,
  worker: CurrentThreadWorker,
  attempt: SerialDisposable,
  signal: SerialDisposable,
  coordinator: Coordinator<T, (), O>,
  _signal: ItemHint<U>,
}

impl<T, S, F, N, U> Observable<T> for RetryWhen<S, F, U>
where
  T: Send + 'static,
  S: Observable<T>,
  F: Fn(RxError) -> Result<N, RxError> + Send + Sync + 'static,
  N: Observable<U>,
  U: Send + 'static,
{
  fn subscribe<O: Observer<T> + 'static>(&self, observer: O) {
    let worker = CurrentThread.create_worker();
    let coordinator = Coordinator::new((), observer);
    let attempt = SerialDisposable::new();
    let signal = SerialDisposable::new();
    coordinator.add_resource(attempt.handle());
    coordinator.add_resource(signal.handle());
    coordinator.add_resource(DisposableHandle::new(worker.clone()));

    let context = Arc::new(RetryWhenContext {
      source: self.source.clone(),
      notifier: self.notifier.clone(),
      worker,
      attempt,
      signal,
      coordinator,
      _signal: PhantomData,
    });
    subscribe_attempt(&context);
  }
}

fn subscribe_attempt<T, S, F, N, U, O>(context: &Arc<RetryWhenContext<T, S, F, U, O>>)
where
  T: Send + 'static,
  S: Observable<T>,
  F: Fn(RxError) -> Result<N, RxError> + Send + Sync + 'static,
  N: Observable<U>,
  U: Send + 'static,
  O: Observer<T> + 'static,
{
  let upstream = CompositeDisposable::new();
  context.attempt.set(upstream.handle());
  if upstream.is_disposed() {
    return;
  }
  context.source.subscribe(AttemptObserver { context: context.clone(), upstream });
}

struct AttemptObserver<T, S, F, U, O> {
  context: Arc<RetryWhenContext<T, S, F, U, O>>,
  upstream: CompositeDisposable,
}

impl<T, S, F, N, U, O> Observer<T> for AttemptObserver<T, S, F, U, O>
where
  T: Send + 'static,
  S: Observable<T>,
  F: Fn(RxError) -> Result<N, RxError> + Send + Sync + 'static,
  N: Observable<U>,
  U: Send + 'static,
  O: Observer<T> + 'static,
{
  fn on_next(&mut self, value: T) { self.context.coordinator.with_state(|s| s.emit(value)) }

  fn on_error(&mut self, err: RxError) {
    let notifier = match (self.context.notifier)(err) {
      Ok(notifier) => notifier,
      Err(err) => return self.context.coordinator.error(err),
    };
    let upstream = CompositeDisposable::new();
    self.context.signal.set(upstream.handle());
    if upstream.is_disposed() {
      return;
    }
    notifier.subscribe(SignalObserver { context: self.context.clone(), upstream, fired: false });
  }

  fn on_completed(&mut self) { self.context.coordinator.complete() }

  fn is_disposed(&self) -> bool { self.upstream.is_disposed() }

  fn set_upstream(&mut self, upstream: DisposableHandle) { self.upstream.add(upstream) }
}

/// Watches the notifier derived from one error.
struct SignalObserver<T, S, F, U, O> {
  context: Arc<RetryWhenContext<T, S, F, U, O>>,
  upstream: CompositeDisposable,
  fired: bool,
}

impl<T, S, F, N, U, O> Observer<U> for SignalObserver<T, S, F, U, O>
where
  T: Send + 'static,
  S: Observable<T>,
  F: Fn(RxError) -> Result<N, RxError> + Send + Sync + 'static,
  N: Observable<U>,
  U: Send + 'static,
  O: Observer<T> + 'static,
{
  fn on_next(&mut self, _: U) {
    if std::mem::replace(&mut self.fired, true) {
      return;
    }
    self.upstream.dispose();
    debug!("notifier fired, resubscribing");
    self.context.worker.schedule(
      Task::new(self.context.clone(), |context| {
        if !context.attempt.is_disposed() {
          subscribe_attempt(context);
        }
        TaskState::Finished
      }),
      None,
    );
  }

  fn on_error(&mut self, err: RxError) {
    if !self.fired {
      self.context.coordinator.error(err);
    }
  }

  fn on_completed(&mut self) {
    if !self.fired {
      self.context.coordinator.complete();
    }
  }

  fn is_disposed(&self) -> bool { self.fired || self.upstream.is_disposed() }

  fn set_upstream(&mut self, upstream: DisposableHandle) { self.upstream.add(upstream) }
}
