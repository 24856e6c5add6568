use std::{marker::PhantomData, sync::Arc};

use tracing::debug;

use crate::{
  coordinator::{Coordinator, Relay},
  disposable::{CompositeDisposable, Disposable, DisposableHandle},
  error::RxError,
  observable::Observable,
  observer::Observer,
  scheduler::{CurrentThread, Duration, Instant, Scheduler, Task, TaskState, Worker},
};

/// Switches to `fallback` once `duration` passes without a value.
///
/// The deadline starts at subscription and moves with every value. A check
/// task sleeps until the deadline; if a value moved it meanwhile, the task
/// sleeps again, otherwise it disposes the source and subscribes the
/// fallback. Value arrival and the check race on the coordinator lock, so a
/// value either beats the deadline or is dropped, never both.
pub struct Timeout<S, F, Sch> {
  source: S,
  duration: Duration,
  fallback: Arc<F>,
  scheduler: Sch,
}

impl<S: Clone, F, Sch: Clone> Clone for Timeout<S, F, Sch> {
  fn clone(&self) -> Self {
    Self {
      source: self.source.clone(),
      duration: self.duration,
      fallback: self.fallback.clone(),
      scheduler: self.scheduler.clone(),
    }
  }
}

impl<S, F, Sch> Timeout<S, F, Sch> {
  pub fn new(source: S, duration: Duration, fallback: F, scheduler: Sch) -> Self {
    Self { source, duration, fallback: Arc::new(fallback), scheduler }
  }
}

struct TimeoutState {
  deadline: Instant,
  timed_out: bool,
}

impl<T, S, F, Sch> Observable<T> for Timeout<S, F, Sch>
where
  T: Send + 'static,
  S: Observable<T>,
  F: Observable<T>,
  Sch: Scheduler,
{
  fn subscribe<O: Observer<T> + 'static>(&self, observer: O) {
    let worker = self.scheduler.create_worker();
    let deadline = worker.now() + self.duration;
    let coordinator = Coordinator::new(TimeoutState { deadline, timed_out: false }, observer);
    coordinator.add_resource(DisposableHandle::new(worker.clone()));
    let upstream = coordinator.add_source();

    let watchdog = Watchdog {
      coordinator: coordinator.clone(),
      worker: worker.clone(),
      source: upstream.clone(),
      fallback: self.fallback.clone(),
      _item: PhantomData,
    };
    let observer =
      TimeoutObserver { coordinator: coordinator.clone(), worker: worker.clone(), duration: self.duration, upstream };
    CurrentThread::own_queue(|| {
      self.source.subscribe(observer);
      let watch = worker.schedule_at(Task::new(watchdog, check), deadline);
      coordinator.add_resource(DisposableHandle::new(watch));
    });
  }
}

// ==================== Deadline check ====================

struct Watchdog<T, F, W, O> {
  coordinator: Coordinator<T, TimeoutState, O>,
  worker: W,
  /// The source subscription, disposed when the deadline passes.
  source: CompositeDisposable,
  fallback: Arc<F>,
  _item: PhantomData<fn(T)>,
}

enum Verdict {
  Closed,
  Wait(Instant),
  Fire,
}

fn check<T, F, W, O>(watchdog: &mut Watchdog<T, F, W, O>) -> TaskState
where
  T: Send + 'static,
  F: Observable<T>,
  W: Worker,
  O: Observer<T> + 'static,
{
  let now = watchdog.worker.now();
  let verdict = watchdog.coordinator.with_state(|s| {
    if s.is_closed() {
      Verdict::Closed
    } else if now < s.state.deadline {
      Verdict::Wait(s.state.deadline)
    } else {
      s.state.timed_out = true;
      Verdict::Fire
    }
  });
  match verdict {
    Verdict::Closed => TaskState::Finished,
    Verdict::Wait(deadline) => TaskState::SleepUntil(deadline),
    Verdict::Fire => {
      debug!("deadline passed, switching to fallback");
      watchdog.coordinator.remove_source(&watchdog.source);
      watchdog.source.dispose();
      watchdog.fallback.subscribe(Relay::new(watchdog.coordinator.clone()));
      TaskState::Finished
    }
  }
}

// ==================== Source ====================

struct TimeoutObserver<T, W, O> {
  coordinator: Coordinator<T, TimeoutState, O>,
  worker: W,
  duration: Duration,
  upstream: CompositeDisposable,
}

impl<T, W, O> Observer<T> for TimeoutObserver<T, W, O>
where
  T: Send + 'static,
  W: Worker,
  O: Observer<T> + 'static,
{
  fn on_next(&mut self, value: T) {
    let deadline = self.worker.now() + self.duration;
    self.coordinator.with_state(|s| {
      if !s.state.timed_out {
        s.state.deadline = deadline;
        s.emit(value);
      }
    });
  }

  fn on_error(&mut self, err: RxError) {
    self.coordinator.with_state(|s| {
      if !s.state.timed_out {
        s.error(err);
      }
    });
  }

  fn on_completed(&mut self) {
    self.coordinator.with_state(|s| {
      if !s.state.timed_out {
        s.complete();
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
      move |err: RxError| e.lock().unwrap().push(format!("error timeout={}", err.is_timeout())),
      move || c.lock().unwrap().push("complete".to_owned()),
    )
  }

  fn ms(n: u64) -> Duration { Duration::from_millis(n) }

  #[rxkernel_macro::test]
  fn every_value_moves_the_deadline() {
    TestScheduler::init();
    let log = Log::default();
    let mut source = PublishSubject::<i32>::new();
    log_all(&source.clone().timeout(ms(10), TestScheduler), &log);

    TestScheduler::advance_by(ms(5));
    source.on_next(1);
    TestScheduler::advance_by(ms(9));
    assert_eq!(*log.lock().unwrap(), vec!["1"]);
    TestScheduler::advance_by(ms(1));
    assert_eq!(*log.lock().unwrap(), vec!["1", "error timeout=true"]);
    assert_eq!(source.observer_count(), 0);

    source.on_next(2);
    assert_eq!(log.lock().unwrap().len(), 2);
  }

  #[rxkernel_macro::test]
  fn switches_to_the_fallback() {
    TestScheduler::init();
    let log = Log::default();
    let source = PublishSubject::<i32>::new();
    log_all(&source.clone().timeout_or(ms(10), Immediate::from_iter([7, 8]), TestScheduler), &log);

    TestScheduler::advance_by(ms(10));
    assert_eq!(*log.lock().unwrap(), vec!["7", "8", "complete"]);
    assert_eq!(source.observer_count(), 0);
  }

  #[rxkernel_macro::test]
  fn completion_in_time_cancels_the_check() {
    TestScheduler::init();
    let log = Log::default();
    let mut source = PublishSubject::<i32>::new();
    log_all(&source.clone().timeout(ms(10), TestScheduler), &log);

    source.on_next(1);
    source.on_completed();
    TestScheduler::advance_by(ms(100));
    assert_eq!(*log.lock().unwrap(), vec!["1", "complete"]);
    assert!(TestScheduler::is_empty());
  }

  #[rxkernel_macro::test]
  fn timeout_on_a_dedicated_thread() {
    let (sender, receiver) = std::sync::mpsc::channel();
    Immediate::never::<i32>().timeout(ms(20), NewThread).subscribe_all(
      |_| {},
      move |err| {
        let _ = sender.send(err.is_timeout());
      },
      || {},
    );
    assert_eq!(receiver.recv_timeout(std::time::Duration::from_secs(5)), Ok(true));
  }

  #[rxkernel_macro::test]
  fn finished_source_does_not_wait_out_the_deadline() {
    let log = Log::default();
    let started = Instant::now();
    log_all(&Immediate::just(1).timeout(ms(800), CurrentThread), &log);
    assert!(started.elapsed() < ms(400));
    assert_eq!(*log.lock().unwrap(), vec!["1", "complete"]);
  }
}
