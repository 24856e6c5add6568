//! Virtual time for deterministic tests of time-based operators.
//!
//! Time only moves when the test says so:
//!
//! ```rust
//! use rxkernel::prelude::*;
//!
//! TestScheduler::init();
//! let seen = std::sync::Arc::new(std::sync::Mutex::new(vec![]));
//! let c_seen = seen.clone();
//! TestScheduler::timer(Duration::from_millis(100))
//!   .subscribe_next(move |v| c_seen.lock().unwrap().push(v));
//!
//! TestScheduler::advance_by(Duration::from_millis(99));
//! assert!(seen.lock().unwrap().is_empty());
//! TestScheduler::advance_by(Duration::from_millis(1));
//! assert_eq!(*seen.lock().unwrap(), vec![0]);
//! ```
//!
//! The clock and queue are thread-local: every test thread has its own
//! virtual time, so tests running in parallel do not see each other. Tasks
//! only ever run inside `advance_by` or `flush`, on the calling thread.

use std::{cell::RefCell, collections::BinaryHeap};

use super::{guarded, Duration, Instant, QueuedTask, Runnable, Scheduler, Task, TaskHandle, TaskState, Worker};
use crate::disposable::{BooleanDisposable, Disposable};

// ==================== Internal State ====================

struct VirtualClock {
  /// The real instant virtual time zero maps to.
  origin: Instant,
  elapsed: Duration,
  queue: BinaryHeap<QueuedTask<Duration>>,
  next_id: u64,
}

impl VirtualClock {
  fn new() -> Self {
    Self { origin: Instant::now(), elapsed: Duration::ZERO, queue: BinaryHeap::new(), next_id: 0 }
  }

  fn push(&mut self, at: Duration, run: Runnable, handle: TaskHandle, lifetime: BooleanDisposable) {
    let id = self.next_id;
    self.next_id += 1;
    self.queue.push(QueuedTask { at, id, run, handle, lifetime });
  }

  fn offset_of(&self, at: Instant) -> Duration {
    at.saturating_duration_since(self.origin).max(self.elapsed)
  }

  fn next_offset(&self, state: TaskState) -> Option<Duration> {
    match state {
      TaskState::Finished => None,
      TaskState::Yield => Some(self.elapsed),
      TaskState::Sleeping(delay) => Some(self.elapsed + delay),
      TaskState::SleepUntil(at) => Some(self.offset_of(at)),
    }
  }
}

thread_local! {
  static CLOCK: RefCell<Option<VirtualClock>> = const { RefCell::new(None) };
}

fn with_clock<R>(f: impl FnOnce(&mut VirtualClock) -> R) -> R {
  CLOCK.with(|clock| f(clock.borrow_mut().get_or_insert_with(VirtualClock::new)))
}

// ==================== TestScheduler ====================

/// A virtual time scheduler. All instances on one thread share the same
/// clock and queue.
#[derive(Clone, Copy, Default, Debug)]
pub struct TestScheduler;

#[derive(Clone, Default, Debug)]
pub struct TestWorker {
  lifetime: BooleanDisposable,
}

impl TestScheduler {
  /// Resets virtual time to zero and drops every pending task.
  pub fn init() {
    let previous = CLOCK.with(|clock| clock.borrow_mut().replace(VirtualClock::new()));
    // Dropped outside the borrow: task state may schedule on drop.
    drop(previous);
  }

  /// Virtual time elapsed since `init`.
  pub fn now() -> Duration { with_clock(|c| c.elapsed) }

  pub fn pending_count() -> usize { with_clock(|c| c.queue.len()) }

  pub fn is_empty() -> bool { with_clock(|c| c.queue.is_empty()) }

  /// Moves time forward by `duration`, running every task that becomes due,
  /// in time order and FIFO among equal times.
  pub fn advance_by(duration: Duration) {
    let target = with_clock(|c| c.elapsed + duration);
    Self::run_until(Some(target));
    with_clock(|c| c.elapsed = c.elapsed.max(target));
  }

  /// Runs pending tasks, jumping time forward to each one, until the queue is
  /// empty. A task that reschedules itself forever (such as an interval) makes
  /// this loop forever; use `advance_by` for those.
  pub fn flush() { Self::run_until(None); }

  fn run_until(target: Option<Duration>) {
    loop {
      let next = with_clock(|c| {
        let due = c
          .queue
          .peek()
          .is_some_and(|e| target.map_or(true, |limit| e.at <= limit));
        if !due {
          return None;
        }
        c.queue.pop()
      });
      let Some(mut entry) = next else { break };
      // Abandoned entries do not move the clock.
      if entry.is_abandoned() {
        continue;
      }
      with_clock(|c| c.elapsed = c.elapsed.max(entry.at));
      let state = (entry.run)();
      let again = with_clock(|c| c.next_offset(state));
      match again {
        Some(at) => with_clock(|c| c.push(at, entry.run, entry.handle, entry.lifetime)),
        None => entry.handle.mark_finished(),
      }
    }
  }
}

impl Scheduler for TestScheduler {
  type Worker = TestWorker;

  fn create_worker(&self) -> TestWorker { TestWorker::default() }
}

impl Worker for TestWorker {
  fn now(&self) -> Instant { with_clock(|c| c.origin + c.elapsed) }

  fn schedule<S: Send + 'static>(&self, task: Task<S>, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let run = guarded(&self.lifetime, task);
    with_clock(|c| {
      let at = c.elapsed + delay.unwrap_or_default();
      c.push(at, run, handle.clone(), self.lifetime.clone());
    });
    handle
  }

  fn schedule_at<S: Send + 'static>(&self, task: Task<S>, at: Instant) -> TaskHandle {
    let handle = TaskHandle::new();
    let run = guarded(&self.lifetime, task);
    with_clock(|c| {
      let at = c.offset_of(at);
      c.push(at, run, handle.clone(), self.lifetime.clone());
    });
    handle
  }
}

impl Disposable for TestWorker {
  fn dispose(&self) { self.lifetime.dispose() }

  fn is_disposed(&self) -> bool { self.lifetime.is_disposed() }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;

  type Log = Arc<Mutex<Vec<(&'static str, Duration)>>>;

  fn record(log: &Log, name: &'static str) { log.lock().unwrap().push((name, TestScheduler::now())); }

  fn named(log: &Log, name: &'static str) -> Task<(Log, &'static str)> {
    Task::new((log.clone(), name), |(log, name)| {
      record(log, name);
      TaskState::Finished
    })
  }

  fn ms(n: u64) -> Duration { Duration::from_millis(n) }

  // ==================== Basic Properties ====================

  #[rxkernel_macro::test]
  fn init_resets_clock_and_queue() {
    TestScheduler::init();
    let worker = TestScheduler.create_worker();
    worker.schedule(named(&Log::default(), "x"), Some(ms(10)));
    TestScheduler::advance_by(ms(5));
    assert_eq!(TestScheduler::now(), ms(5));
    assert_eq!(TestScheduler::pending_count(), 1);

    TestScheduler::init();
    assert_eq!(TestScheduler::now(), Duration::ZERO);
    assert!(TestScheduler::is_empty());
  }

  // ==================== Time Advancement ====================

  #[rxkernel_macro::test]
  fn advance_by_is_cumulative() {
    TestScheduler::init();
    TestScheduler::advance_by(ms(100));
    TestScheduler::advance_by(ms(50));
    assert_eq!(TestScheduler::now(), ms(150));
  }

  #[rxkernel_macro::test]
  fn tasks_run_when_due_in_order() {
    TestScheduler::init();
    let log = Log::default();
    let worker = TestScheduler.create_worker();
    worker.schedule(named(&log, "late"), Some(ms(30)));
    worker.schedule(named(&log, "first"), Some(ms(10)));
    worker.schedule(named(&log, "second"), Some(ms(10)));

    TestScheduler::advance_by(ms(9));
    assert!(log.lock().unwrap().is_empty());
    TestScheduler::advance_by(ms(1));
    assert_eq!(*log.lock().unwrap(), vec![("first", ms(10)), ("second", ms(10))]);
    TestScheduler::flush();
    assert_eq!(log.lock().unwrap()[2], ("late", ms(30)));
    assert_eq!(TestScheduler::now(), ms(30));
  }

  #[rxkernel_macro::test]
  fn sleeping_task_is_rescheduled_relative_to_virtual_now() {
    TestScheduler::init();
    let log = Log::default();
    let worker = TestScheduler.create_worker();
    worker.schedule(
      Task::new((log.clone(), 0), |(log, n)| {
        record(log, "tick");
        *n += 1;
        if *n < 3 { TaskState::Sleeping(ms(10)) } else { TaskState::Finished }
      }),
      None,
    );
    TestScheduler::advance_by(ms(100));
    let times: Vec<_> = log.lock().unwrap().iter().map(|(_, t)| *t).collect();
    assert_eq!(times, vec![ms(0), ms(10), ms(20)]);
    assert!(TestScheduler::is_empty());
  }

  #[rxkernel_macro::test]
  fn worker_now_follows_virtual_time() {
    TestScheduler::init();
    let worker = TestScheduler.create_worker();
    let start = worker.now();
    TestScheduler::advance_by(ms(40));
    assert_eq!(worker.now() - start, ms(40));

    let log = Log::default();
    worker.schedule_at(named(&log, "at"), start + ms(60));
    TestScheduler::advance_by(ms(19));
    assert!(log.lock().unwrap().is_empty());
    TestScheduler::advance_by(ms(1));
    assert_eq!(*log.lock().unwrap(), vec![("at", ms(60))]);
  }

  // ==================== Cancellation ====================

  #[rxkernel_macro::test]
  fn cancelled_and_disposed_tasks_do_not_run() {
    TestScheduler::init();
    let log = Log::default();
    let worker = TestScheduler.create_worker();
    let handle = worker.schedule(named(&log, "cancelled"), Some(ms(5)));
    handle.dispose();

    let other = TestScheduler.create_worker();
    other.schedule(named(&log, "disposed"), Some(ms(5)));
    other.dispose();

    TestScheduler::flush();
    assert!(log.lock().unwrap().is_empty());
    assert!(TestScheduler::is_empty());
    assert_eq!(TestScheduler::now(), Duration::ZERO);
  }
}
