use std::marker::PhantomData;

use crate::{
  coordinator::Coordinator,
  disposable::{CompositeDisposable, Disposable, DisposableHandle},
  error::RxError,
  observable::Observable,
  observer::Observer,
  scheduler::{CurrentThread, Duration, Scheduler, Task, TaskState, Worker},
};

/// Emits the most recent value once per `period`, if one arrived since the
/// last tick. A value still held at completion is emitted before completing.
#[derive(Clone)]
pub struct Sample<S, Sch> {
  source: S,
  period: Duration,
  scheduler: Sch,
}

impl<S, Sch> Sample<S, Sch> {
  pub fn new(source: S, period: Duration, scheduler: Sch) -> Self { Self { source, period, scheduler } }
}

struct SampleState<T> {
  latest: Option<T>,
  period: Duration,
}

impl<T, S, Sch> Observable<T> for Sample<S, Sch>
where
  T: Send + 'static,
  S: Observable<T>,
  Sch: Scheduler,
{
  fn subscribe<O: Observer<T> + 'static>(&self, observer: O) {
    let worker = self.scheduler.create_worker();
    let coordinator = Coordinator::new(SampleState { latest: None, period: self.period }, observer);
    coordinator.add_resource(DisposableHandle::new(worker.clone()));
    let sampler = Sampler { coordinator: coordinator.clone(), _item: PhantomData };
    let observer = SampleObserver { upstream: coordinator.add_source(), coordinator: coordinator.clone() };
    CurrentThread::own_queue(|| {
      self.source.subscribe(observer);
      let ticks = worker.schedule(Task::new(sampler, tick), Some(self.period));
      coordinator.add_resource(DisposableHandle::new(ticks));
    });
  }
}

struct Sampler<T, O> {
  coordinator: Coordinator<T, SampleState<T>, O>,
  _item: PhantomData<fn(T)>,
}

fn tick<T, O>(sampler: &mut Sampler<T, O>) -> TaskState
where
  T: Send + 'static,
  O: Observer<T> + 'static,
{
  sampler.coordinator.with_state(|s| {
    if s.is_closed() {
      return TaskState::Finished;
    }
    if let Some(value) = s.state.latest.take() {
      s.emit(value);
    }
    TaskState::Sleeping(s.state.period)
  })
}

struct SampleObserver<T, O> {
  coordinator: Coordinator<T, SampleState<T>, O>,
  upstream: CompositeDisposable,
}

impl<T, O> Observer<T> for SampleObserver<T, O>
where
  T: Send + 'static,
  O: Observer<T> + 'static,
{
  fn on_next(&mut self, value: T) { self.coordinator.with_state(|s| s.state.latest = Some(value)) }

  fn on_error(&mut self, err: RxError) { self.coordinator.error(err) }

  fn on_completed(&mut self) {
    self.coordinator.with_state(|s| {
      if let Some(value) = s.state.latest.take() {
        s.emit(value);
      }
      s.complete();
    });
  }

  fn is_disposed(&self) -> bool { self.upstream.is_disposed() }

  fn set_upstream(&mut self, upstream: DisposableHandle) { self.upstream.add(upstream) }
}
