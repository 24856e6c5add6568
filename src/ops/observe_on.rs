use std::{collections::VecDeque, marker::PhantomData};

use crate::{
  coordinator::Coordinator,
  disposable::{CompositeDisposable, Disposable, DisposableHandle},
  error::RxError,
  observable::Observable,
  observer::{Notification, Observer},
  scheduler::{Scheduler, Task, TaskState, Worker},
};

/// Delivers every event on a worker of `scheduler`, in arrival order.
///
/// Events are queued and one drain task at a time empties the queue, so the
/// downstream sees them serialized even when the source emits from several
/// threads. Errors are queued like everything else.
#[derive(Clone)]
pub struct ObserveOn<S, Sch> {
  source: S,
  scheduler: Sch,
}

impl<S, Sch> ObserveOn<S, Sch> {
  pub fn new(source: S, scheduler: Sch) -> Self { Self { source, scheduler } }
}

struct Mailbox<T> {
  queue: VecDeque<Notification<T>>,
  draining: bool,
}

impl<T, S, Sch> Observable<T> for ObserveOn<S, Sch>
where
  T: Send + 'static,
  S: Observable<T>,
  Sch: Scheduler,
{
  fn subscribe<O: Observer<T> + 'static>(&self, observer: O) {
    let worker = self.scheduler.create_worker();
    let coordinator = Coordinator::new(Mailbox { queue: VecDeque::new(), draining: false }, observer);
    coordinator.add_resource(DisposableHandle::new(worker.clone()));
    self.source.subscribe(ObserveOnObserver { upstream: coordinator.add_source(), coordinator, worker });
  }
}

struct ObserveOnObserver<T, W, O> {
  coordinator: Coordinator<T, Mailbox<T>, O>,
  worker: W,
  upstream: CompositeDisposable,
}

impl<T, W, O> ObserveOnObserver<T, W, O>
where
  T: Send + 'static,
  W: Worker,
  O: Observer<T> + 'static,
{
  fn post(&self, event: Notification<T>) {
    let start = self.coordinator.with_state(|s| {
      if s.is_closed() {
        return false;
      }
      s.state.queue.push_back(event);
      !std::mem::replace(&mut s.state.draining, true)
    });
    if start {
      let drainer = Drainer { coordinator: self.coordinator.clone(), _item: PhantomData };
      self.worker.schedule(Task::new(drainer, deliver), None);
    }
  }
}

impl<T, W, O> Observer<T> for ObserveOnObserver<T, W, O>
where
  T: Send + 'static,
  W: Worker,
  O: Observer<T> + 'static,
{
  fn on_next(&mut self, value: T) { self.post(Notification::Next(value)) }

  fn on_error(&mut self, err: RxError) { self.post(Notification::Error(err)) }

  fn on_completed(&mut self) { self.post(Notification::Completed) }

  fn is_disposed(&self) -> bool { self.upstream.is_disposed() }

  fn set_upstream(&mut self, upstream: DisposableHandle) { self.upstream.add(upstream) }
}

struct Drainer<T, O> {
  coordinator: Coordinator<T, Mailbox<T>, O>,
  _item: PhantomData<fn(T)>,
}

fn deliver<T, O>(drainer: &mut Drainer<T, O>) -> TaskState
where
  T: Send + 'static,
  O: Observer<T> + 'static,
{
  drainer.coordinator.with_state(|s| {
    while let Some(event) = s.state.queue.pop_front() {
      if s.is_closed() {
        break;
      }
      match event {
        Notification::Next(value) => s.emit(value),
        Notification::Error(err) => s.error(err),
        Notification::Completed => s.complete(),
      }
    }
    s.state.queue.clear();
    s.state.draining = false;
    TaskState::Finished
  })
}
