use crate::{
  disposable::DisposableHandle,
  observable::Observable,
  observer::Observer,
  scheduler::{Scheduler, Task, TaskState, Worker},
};

/// Emits the items of an iterable, one per scheduled step, then completes.
///
/// Emitting one item per step is what lets two sources sharing a trampoline
/// interleave instead of one draining completely before the other starts.
/// Created by [`ObservableFactory::from_iter`](crate::factory::ObservableFactory::from_iter)
/// and `just`.
#[derive(Clone)]
pub struct FromIter<I, Sch> {
  iter: I,
  scheduler: Sch,
}

impl<I, Sch> FromIter<I, Sch> {
  pub fn new(iter: I, scheduler: Sch) -> Self { Self { iter, scheduler } }
}

impl<I, Sch> Observable<I::Item> for FromIter<I, Sch>
where
  I: IntoIterator + Clone + Send + Sync + 'static,
  I::IntoIter: Send + 'static,
  I::Item: Send + 'static,
  Sch: Scheduler,
{
  fn subscribe<O: Observer<I::Item> + 'static>(&self, mut observer: O) {
    let worker = self.scheduler.create_worker();
    observer.set_upstream(DisposableHandle::new(worker.clone()));
    worker.schedule(Task::new((self.iter.clone().into_iter(), observer), emit_next), None);
  }
}

fn emit_next<It, O>((iter, observer): &mut (It, O)) -> TaskState
where
  It: Iterator,
  O: Observer<It::Item>,
{
  if observer.is_disposed() {
    return TaskState::Finished;
  }
  match iter.next() {
    Some(value) => {
      observer.on_next(value);
      TaskState::Yield
    }
    None => {
      observer.on_completed();
      TaskState::Finished
    }
  }
}
