use std::marker::PhantomData;

use crate::{
  coordinator::Coordinator,
  disposable::{CompositeDisposable, Disposable, DisposableHandle},
  error::RxError,
  observable::Observable,
  observer::Observer,
  scheduler::{Duration, Instant, Scheduler, Task, TaskState, Worker},
};

/// Emits a value only once `duration` passed without a newer one.
///
/// One check task is scheduled per quiet period; newer values only move the
/// due time and the task goes back to sleep for the remainder. A pending
/// value is flushed on completion.
#[derive(Clone)]
pub struct Debounce<S, Sch> {
  source: S,
  duration: Duration,
  scheduler: Sch,
}

impl<S, Sch> Debounce<S, Sch> {
  pub fn new(source: S, duration: Duration, scheduler: Sch) -> Self { Self { source, duration, scheduler } }
}

struct DebounceState<T> {
  pending: Option<(T, Instant)>,
}

impl<T, S, Sch> Observable<T> for Debounce<S, Sch>
where
  T: Send + 'static,
  S: Observable<T>,
  Sch: Scheduler,
{
  fn subscribe<O: Observer<T> + 'static>(&self, observer: O) {
    let worker = self.scheduler.create_worker();
    let coordinator = Coordinator::new(DebounceState { pending: None }, observer);
    coordinator.add_resource(DisposableHandle::new(worker.clone()));
    self.source.subscribe(DebounceObserver {
      upstream: coordinator.add_source(),
      coordinator,
      worker,
      duration: self.duration,
    });
  }
}

struct DebounceObserver<T, W, O> {
  coordinator: Coordinator<T, DebounceState<T>, O>,
  worker: W,
  duration: Duration,
  upstream: CompositeDisposable,
}

impl<T, W, O> Observer<T> for DebounceObserver<T, W, O>
where
  T: Send + 'static,
  W: Worker,
  O: Observer<T> + 'static,
{
  fn on_next(&mut self, value: T) {
    let due = self.worker.now() + self.duration;
    let start = self.coordinator.with_state(|s| {
      if s.is_closed() {
        return false;
      }
      s.state.pending.replace((value, due)).is_none()
    });
    if start {
      let check = Quiet { coordinator: self.coordinator.clone(), worker: self.worker.clone(), _item: PhantomData };
      self.worker.schedule_at(Task::new(check, settle), due);
    }
  }

  fn on_error(&mut self, err: RxError) {
    self.coordinator.with_state(|s| {
      s.state.pending = None;
      s.error(err);
    });
  }

  fn on_completed(&mut self) {
    self.coordinator.with_state(|s| {
      if let Some((value, _)) = s.state.pending.take() {
        s.emit(value);
      }
      s.complete();
    });
  }

  fn is_disposed(&self) -> bool { self.upstream.is_disposed() }

  fn set_upstream(&mut self, upstream: DisposableHandle) { self.upstream.add(upstream) }
}

struct Quiet<T, W, O> {
  coordinator: Coordinator<T, DebounceState<T>, O>,
  worker: W,
  _item: PhantomData<fn(T)>,
}

fn settle<T, W, O>(quiet: &mut Quiet<T, W, O>) -> TaskState
where
  T: Send + 'static,
  W: Worker,
  O: Observer<T> + 'static,
{
  let now = quiet.worker.now();
  quiet.coordinator.with_state(|s| {
    if s.is_closed() {
      return TaskState::Finished;
    }
    match s.state.pending.take() {
      Some((value, due)) if now < due => {
        s.state.pending = Some((value, due));
        TaskState::SleepUntil(due)
      }
      Some((value, _)) => {
        s.emit(value);
        TaskState::Finished
      }
      None => TaskState::Finished,
    }
  })
}
