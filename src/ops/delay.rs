use std::{collections::VecDeque, marker::PhantomData};

use crate::{
  coordinator::Coordinator,
  disposable::{CompositeDisposable, Disposable, DisposableHandle},
  error::RxError,
  observable::Observable,
  observer::{Notification, Observer},
  scheduler::{Duration, Instant, Scheduler, Task, TaskState, Worker},
};

/// Shifts every value forward in time by `duration`.
///
/// Each value is stamped on arrival and handed out from a queue once its
/// time has come, so arrival order is kept. Errors skip the queue and drop
/// whatever is pending.
///
/// Completion is the one terminal event that does not pass straight through:
/// unlike in the other timing operators it is queued and delayed like a
/// value, so the values queued ahead of it are still delivered.
#[derive(Clone)]
pub struct Delay<S, Sch> {
  source: S,
  duration: Duration,
  scheduler: Sch,
}

impl<S, Sch> Delay<S, Sch> {
  pub fn new(source: S, duration: Duration, scheduler: Sch) -> Self { Self { source, duration, scheduler } }
}

struct DelayState<T> {
  queue: VecDeque<(Instant, Notification<T>)>,
  /// A drain task is scheduled or running.
  draining: bool,
}

impl<T, S, Sch> Observable<T> for Delay<S, Sch>
where
  T: Send + 'static,
  S: Observable<T>,
  Sch: Scheduler,
{
  fn subscribe<O: Observer<T> + 'static>(&self, observer: O) {
    let worker = self.scheduler.create_worker();
    let coordinator = Coordinator::new(DelayState { queue: VecDeque::new(), draining: false }, observer);
    coordinator.add_resource(DisposableHandle::new(worker.clone()));
    self.source.subscribe(DelayObserver {
      upstream: coordinator.add_source(),
      coordinator,
      worker,
      duration: self.duration,
    });
  }
}

struct DelayObserver<T, W, O> {
  coordinator: Coordinator<T, DelayState<T>, O>,
  worker: W,
  duration: Duration,
  upstream: CompositeDisposable,
}

impl<T, W, O> DelayObserver<T, W, O>
where
  T: Send + 'static,
  W: Worker,
  O: Observer<T> + 'static,
{
  fn enqueue(&self, event: Notification<T>) {
    let due = self.worker.now() + self.duration;
    let start = self.coordinator.with_state(|s| {
      if s.is_closed() {
        return false;
      }
      s.state.queue.push_back((due, event));
      !std::mem::replace(&mut s.state.draining, true)
    });
    if start {
      let drainer = Drainer { coordinator: self.coordinator.clone(), worker: self.worker.clone(), _item: PhantomData };
      self.worker.schedule_at(Task::new(drainer, drain), due);
    }
  }
}

impl<T, W, O> Observer<T> for DelayObserver<T, W, O>
where
  T: Send + 'static,
  W: Worker,
  O: Observer<T> + 'static,
{
  fn on_next(&mut self, value: T) { self.enqueue(Notification::Next(value)) }

  fn on_error(&mut self, err: RxError) {
    self.coordinator.with_state(|s| {
      s.state.queue.clear();
      s.error(err);
    });
  }

  fn on_completed(&mut self) { self.enqueue(Notification::Completed) }

  fn is_disposed(&self) -> bool { self.upstream.is_disposed() }

  fn set_upstream(&mut self, upstream: DisposableHandle) { self.upstream.add(upstream) }
}

struct Drainer<T, W, O> {
  coordinator: Coordinator<T, DelayState<T>, O>,
  worker: W,
  _item: PhantomData<fn(T)>,
}

/// Hands out every due event, then sleeps until the next one is due.
fn drain<T, W, O>(drainer: &mut Drainer<T, W, O>) -> TaskState
where
  T: Send + 'static,
  W: Worker,
  O: Observer<T> + 'static,
{
  let now = drainer.worker.now();
  drainer.coordinator.with_state(|s| loop {
    if s.is_closed() {
      s.state.queue.clear();
      s.state.draining = false;
      return TaskState::Finished;
    }
    match s.state.queue.front() {
      None => {
        s.state.draining = false;
        return TaskState::Finished;
      }
      Some((due, _)) if *due > now => return TaskState::SleepUntil(*due),
      Some(_) => {}
    }
    if let Some((_, event)) = s.state.queue.pop_front() {
      match event {
        Notification::Next(value) => s.emit(value),
        Notification::Error(err) => s.error(err),
        Notification::Completed => s.complete(),
      }
    }
  })
}
