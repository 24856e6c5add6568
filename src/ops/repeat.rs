use std::sync::Arc;

use crate::{
  coordinator::Coordinator,
  disposable::{CompositeDisposable, Disposable, DisposableHandle, SerialDisposable},
  error::RxError,
  observable::Observable,
  observer::Observer,
  scheduler::{Scheduler, Task, TaskState, Worker},
};

/// Subscribes to the source `count` times in a row. Each run starts when the
/// previous one completed, through a worker of the scheduler like `retry`;
/// errors end the output right away.
pub struct Repeat<S, Sch> {
  source: Arc<S>,
  count: usize,
  scheduler: Sch,
}

impl<S, Sch: Clone> Clone for Repeat<S, Sch> {
  fn clone(&self) -> Self { Self { source: self.source.clone(), count: self.count, scheduler: self.scheduler.clone() } }
}

impl<S, Sch> Repeat<S, Sch> {
  pub fn new(source: S, count: usize, scheduler: Sch) -> Self {
    Self { source: Arc::new(source), count, scheduler }
  }
}

struct RepeatContext<T, S, W, O> {
  source: Arc<S>,
  worker: W,
  run: SerialDisposable,
  /// Runs left, the current one included.
  coordinator: Coordinator<T, usize, O>,
}

impl<T, S, Sch> Observable<T> for Repeat<S, Sch>
where
  T: Send + 'static,
  S: Observable<T>,
  Sch: Scheduler,
{
  fn subscribe<O: Observer<T> + 'static>(&self, mut observer: O) {
    if self.count == 0 {
      observer.on_completed();
      return;
    }
    let worker = self.scheduler.create_worker();
    let coordinator = Coordinator::new(self.count, observer);
    let run = SerialDisposable::new();
    coordinator.add_resource(run.handle());
    coordinator.add_resource(DisposableHandle::new(worker.clone()));

    let context = Arc::new(RepeatContext { source: self.source.clone(), worker, run, coordinator });
    subscribe_run(&context);
  }
}

fn subscribe_run<T, S, W, O>(context: &Arc<RepeatContext<T, S, W, O>>)
where
  T: Send + 'static,
  S: Observable<T>,
  W: Worker,
  O: Observer<T> + 'static,
{
  let upstream = CompositeDisposable::new();
  context.run.set(upstream.handle());
  if upstream.is_disposed() {
    return;
  }
  context.source.subscribe(RepeatObserver { context: context.clone(), upstream });
}

struct RepeatObserver<T, S, W, O> {
  context: Arc<RepeatContext<T, S, W, O>>,
  upstream: CompositeDisposable,
}

impl<T, S, W, O> Observer<T> for RepeatObserver<T, S, W, O>
where
  T: Send + 'static,
  S: Observable<T>,
  W: Worker,
  O: Observer<T> + 'static,
{
  fn on_next(&mut self, value: T) { self.context.coordinator.with_state(|s| s.emit(value)) }

  fn on_error(&mut self, err: RxError) { self.context.coordinator.error(err) }

  fn on_completed(&mut self) {
    let again = self.context.coordinator.with_state(|s| {
      s.state = s.state.saturating_sub(1);
      if s.state == 0 {
        s.complete();
      }
      !s.is_closed()
    });
    if again {
      self.context.worker.schedule(
        Task::new(self.context.clone(), |context| {
          if !context.run.is_disposed() {
            subscribe_run(context);
          }
          TaskState::Finished
        }),
        None,
      );
    }
  }

  fn is_disposed(&self) -> bool { self.upstream.is_disposed() }

  fn set_upstream(&mut self, upstream: DisposableHandle) { self.upstream.add(upstream) }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use crate::prelude::*;

  fn collect<S: Observable<i32>>(source: &S) -> Vec<String> {
    let log = Arc::new(Mutex::new(vec![]));
    let (n, e, c) = (log.clone(), log.clone(), log.clone());
    source.subscribe_all(
      move |v| n.lock().unwrap().push(format!("{v}")),
      move |err| e.lock().unwrap().push(format!("error {err}")),
      move || c.lock().unwrap().push("complete".to_owned()),
    );
    let log = log.lock().unwrap().clone();
    log
  }

  #[rxkernel_macro::test]
  fn runs_the_source_count_times() {
    assert_eq!(collect(&Immediate::from_iter([1, 2]).repeat(3)), vec!["1", "2", "1", "2", "1", "2", "complete"]);
    assert_eq!(collect(&Immediate::from_iter([1]).repeat(1)), vec!["1", "complete"]);
  }

  #[rxkernel_macro::test]
  fn zero_repeats_complete_immediately() {
    assert_eq!(collect(&Immediate::from_iter([1]).repeat(0)), vec!["complete"]);
  }

  #[rxkernel_macro::test]
  fn error_stops_repeating() {
    let failing = Immediate::just(1).merge_with(Immediate::throw_err(RxError::msg("stop")));
    assert_eq!(collect(&failing.repeat(5)), vec!["1", "error stop"]);
  }

  #[rxkernel_macro::test]
  fn deep_repeat_does_not_grow_the_stack() {
    let log = collect(&Immediate::just(7).repeat(200_000));
    assert_eq!(log.len(), 200_001);
    assert_eq!(log.last().map(String::as_str), Some("complete"));
  }

  #[rxkernel_macro::test]
  fn disposing_stops_the_running_and_further_runs() {
    let mut source = PublishSubject::<i32>::new();
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();
    let handle = source.clone().repeat(3).subscribe_next(move |v| c_seen.lock().unwrap().push(v));
    source.on_next(1);
    assert_eq!(source.observer_count(), 1);

    handle.dispose();
    assert_eq!(source.observer_count(), 0);
    source.on_next(2);
    source.on_completed();
    assert_eq!(*seen.lock().unwrap(), vec![1]);
  }
}
