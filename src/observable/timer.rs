use crate::{
  disposable::DisposableHandle,
  observable::Observable,
  observer::Observer,
  scheduler::{Duration, Scheduler, Task, TaskState, Worker},
};

/// Emits `0` once after `delay`, then completes.
#[derive(Clone)]
pub struct Timer<Sch> {
  delay: Duration,
  scheduler: Sch,
}

impl<Sch> Timer<Sch> {
  pub fn new(delay: Duration, scheduler: Sch) -> Self { Self { delay, scheduler } }
}

fn fire<O: Observer<usize>>(observer: &mut O) -> TaskState {
  if !observer.is_disposed() {
    observer.on_next(0);
    observer.on_completed();
  }
  TaskState::Finished
}

impl<Sch: Scheduler> Observable<usize> for Timer<Sch> {
  fn subscribe<O: Observer<usize> + 'static>(&self, mut observer: O) {
    let worker = self.scheduler.create_worker();
    observer.set_upstream(DisposableHandle::new(worker.clone()));
    worker.schedule(Task::new(observer, fire), Some(self.delay));
  }
}
