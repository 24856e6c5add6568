use std::sync::Arc;

use crate::{
  disposable::{CompositeDisposable, DisposableHandle},
  observable::Observable,
  observer::{Forward, Observer},
  scheduler::{Scheduler, Task, TaskState, Worker},
};

/// Performs the subscription to the source on a worker of `scheduler`.
///
/// Disposing the subscription also disposes the worker, so a subscription
/// still waiting in its queue is never made.
pub struct SubscribeOn<S, Sch> {
  source: Arc<S>,
  scheduler: Sch,
}

impl<S, Sch: Clone> Clone for SubscribeOn<S, Sch> {
  fn clone(&self) -> Self { Self { source: self.source.clone(), scheduler: self.scheduler.clone() } }
}

impl<S, Sch> SubscribeOn<S, Sch> {
  pub fn new(source: S, scheduler: Sch) -> Self { Self { source: Arc::new(source), scheduler } }
}

impl<T, S, Sch> Observable<T> for SubscribeOn<S, Sch>
where
  T: Send + 'static,
  S: Observable<T>,
  Sch: Scheduler,
{
  fn subscribe<O: Observer<T> + 'static>(&self, observer: O) {
    let worker = self.scheduler.create_worker();
    let upstream = CompositeDisposable::new();
    upstream.add(DisposableHandle::new(worker.clone()));
    let forward = Forward::new::<T>(observer, upstream);
    worker.schedule(
      Task::new((self.source.clone(), Some(forward)), |(source, forward)| {
        if let Some(forward) = forward.take() {
          source.subscribe(forward);
        }
        TaskState::Finished
      }),
      None,
    );
  }
}
