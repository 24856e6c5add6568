use crate::{
  disposable::DisposableHandle,
  observable::Observable,
  observer::Observer,
  scheduler::{Duration, Instant, Scheduler, Task, TaskState, Worker},
};

/// Emits `0, 1, 2, ...` every `period`, forever.
///
/// Each tick is scheduled at an absolute time point derived from the
/// previous one, so slow observers do not make the period drift.
#[derive(Clone)]
pub struct Interval<Sch> {
  period: Duration,
  scheduler: Sch,
}

impl<Sch> Interval<Sch> {
  pub fn new(period: Duration, scheduler: Sch) -> Self { Self { period, scheduler } }
}

struct Ticker<O> {
  observer: O,
  count: usize,
  next_at: Instant,
  period: Duration,
}

fn tick<O: Observer<usize>>(ticker: &mut Ticker<O>) -> TaskState {
  if ticker.observer.is_disposed() {
    return TaskState::Finished;
  }
  ticker.observer.on_next(ticker.count);
  ticker.count += 1;
  ticker.next_at += ticker.period;
  TaskState::SleepUntil(ticker.next_at)
}

impl<Sch: Scheduler> Observable<usize> for Interval<Sch> {
  fn subscribe<O: Observer<usize> + 'static>(&self, mut observer: O) {
    let worker = self.scheduler.create_worker();
    observer.set_upstream(DisposableHandle::new(worker.clone()));
    let first = worker.now() + self.period;
    let ticker = Ticker { observer, count: 0, next_at: first, period: self.period };
    worker.schedule_at(Task::new(ticker, tick), first);
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use crate::prelude::*;

  #[rxkernel_macro::test]
  fn ticks_every_period() {
    TestScheduler::init();
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();
    let handle = TestScheduler::interval(Duration::from_millis(10))
      .subscribe_next(move |v| c_seen.lock().unwrap().push((v, TestScheduler::now())));

    TestScheduler::advance_by(Duration::from_millis(35));
    let ms = Duration::from_millis;
    assert_eq!(*seen.lock().unwrap(), vec![(0, ms(10)), (1, ms(20)), (2, ms(30))]);

    handle.dispose();
    TestScheduler::advance_by(Duration::from_millis(100));
    assert_eq!(seen.lock().unwrap().len(), 3);
    assert!(TestScheduler::is_empty());
  }

  #[rxkernel_macro::test]
  fn runs_on_a_dedicated_thread() {
    let (tx, rx) = std::sync::mpsc::channel();
    let handle = NewThread::interval(Duration::from_millis(2)).subscribe_next(move |v| {
      let _ = tx.send(v);
    });
    let got: Vec<_> = rx.iter().take(3).collect();
    handle.dispose();
    assert_eq!(got, vec![0, 1, 2]);
  }
}
