//! Schedulers, workers and tasks.
//!
//! A [`Scheduler`] creates [`Worker`]s; a worker runs [`Task`]s at a given
//! time point. A task is plain state plus a handler function; the handler
//! returns a [`TaskState`] saying whether the task is finished or wants to
//! run again, which is how intervals, timeouts and retries reschedule
//! themselves without recursing.
//!
//! Every worker is itself a [`Disposable`]: disposing it skips whatever is
//! still pending on it.
//!
//! Available schedulers:
//! - [`Immediate`]: runs on the calling thread, looping over re-delays.
//! - [`CurrentThread`]: a per-thread trampoline queue; nested scheduling
//!   enqueues instead of recursing.
//! - [`NewThread`]: one dedicated OS thread per worker.
//! - [`TestScheduler`]: virtual time for deterministic tests.
//! - `TokioScheduler` (feature `tokio-scheduler`): tasks on the ambient Tokio
//!   runtime.

use std::{
  cmp::Ordering as CmpOrdering,
  future::Future,
  pin::Pin,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
  task::{Context, Poll},
};

use futures::task::AtomicWaker;
pub use std::time::{Duration, Instant};

use crate::disposable::{BooleanDisposable, Disposable};

mod current_thread;
mod immediate;
mod new_thread;
pub mod test_scheduler;
#[cfg(feature = "tokio-scheduler")]
mod tokio_scheduler;

pub use current_thread::{CurrentThread, CurrentThreadWorker};
pub use immediate::{Immediate, ImmediateWorker};
pub use new_thread::{NewThread, NewThreadWorker};
pub use test_scheduler::{TestScheduler, TestWorker};
#[cfg(feature = "tokio-scheduler")]
pub use tokio_scheduler::{TokioScheduler, TokioWorker};

// ==================== Task ====================

/// What a task wants after one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
  Finished,
  /// Run again as soon as the worker gets to it.
  Yield,
  /// Run again after the given delay.
  Sleeping(Duration),
  /// Run again at the given time point.
  SleepUntil(Instant),
}

impl TaskState {
  /// The next time point to run at, given the current time.
  pub fn next_run(self, now: Instant) -> Option<Instant> {
    match self {
      TaskState::Finished => None,
      TaskState::Yield => Some(now),
      TaskState::Sleeping(delay) => Some(now + delay),
      TaskState::SleepUntil(at) => Some(at.max(now)),
    }
  }
}

/// A unit of schedulable work: state plus a handler stepping it.
///
/// The handler is a function pointer rather than a closure so that task types
/// stay nameable and operators can carry their own generic state.
pub struct Task<S> {
  state: S,
  handler: fn(&mut S) -> TaskState,
}

impl<S> Task<S> {
  pub fn new(state: S, handler: fn(&mut S) -> TaskState) -> Self { Self { state, handler } }

  #[inline]
  pub fn step(&mut self) -> TaskState { (self.handler)(&mut self.state) }

  pub fn state(&self) -> &S { &self.state }
}

/// A type-erased task, as stored in worker queues.
pub(crate) type Runnable = Box<dyn FnMut() -> TaskState + Send>;

/// Erases `task`; once `lifetime` is disposed the task finishes without
/// running.
pub(crate) fn guarded<S: Send + 'static>(lifetime: &BooleanDisposable, mut task: Task<S>) -> Runnable {
  let lifetime = lifetime.clone();
  Box::new(move || if lifetime.is_disposed() { TaskState::Finished } else { task.step() })
}

// ==================== TaskHandle ====================

/// Handle to a scheduled task.
///
/// Disposing it cancels the task: a task observed as cancelled is skipped
/// instead of run. The handle is also a `Future` resolving once the task
/// finished or was cancelled.
#[derive(Clone, Default)]
pub struct TaskHandle(Arc<HandleState>);

#[derive(Default)]
struct HandleState {
  cancelled: AtomicBool,
  finished: AtomicBool,
  waker: AtomicWaker,
}

impl TaskHandle {
  pub fn new() -> Self { Self::default() }

  /// A handle for work that already ran to completion.
  pub fn finished() -> Self {
    let handle = Self::new();
    handle.mark_finished();
    handle
  }

  pub fn mark_finished(&self) {
    self.0.finished.store(true, Ordering::Release);
    self.0.waker.wake();
  }

  pub fn is_finished(&self) -> bool { self.0.finished.load(Ordering::Acquire) }

  pub fn is_cancelled(&self) -> bool { self.0.cancelled.load(Ordering::Acquire) }
}

impl Disposable for TaskHandle {
  fn dispose(&self) {
    self.0.cancelled.store(true, Ordering::Release);
    self.0.waker.wake();
  }

  fn is_disposed(&self) -> bool { self.is_cancelled() || self.is_finished() }
}

impl Future for TaskHandle {
  type Output = ();

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    if self.is_disposed() {
      return Poll::Ready(());
    }
    self.0.waker.register(cx.waker());
    if self.is_disposed() { Poll::Ready(()) } else { Poll::Pending }
  }
}

// ==================== Scheduler / Worker ====================

pub trait Worker: Disposable + Clone + 'static {
  fn now(&self) -> Instant { Instant::now() }

  /// Runs `task` after `delay` (or as soon as possible).
  fn schedule<S: Send + 'static>(&self, task: Task<S>, delay: Option<Duration>) -> TaskHandle;

  fn schedule_at<S: Send + 'static>(&self, task: Task<S>, at: Instant) -> TaskHandle {
    let delay = at.saturating_duration_since(self.now());
    self.schedule(task, Some(delay))
  }
}

pub trait Scheduler: Clone + Default + Send + Sync + 'static {
  type Worker: Worker;

  fn create_worker(&self) -> Self::Worker;
}

// ==================== Queue entries ====================

/// One queued task, ordered by `(at, id)` so that a `BinaryHeap` pops the
/// earliest time point first and keeps insertion order among equals.
pub(crate) struct QueuedTask<At: Ord> {
  pub(crate) at: At,
  pub(crate) id: u64,
  pub(crate) run: Runnable,
  pub(crate) handle: TaskHandle,
  /// Lifetime of the worker that queued it.
  pub(crate) lifetime: BooleanDisposable,
}

impl<At: Ord> QueuedTask<At> {
  /// Cancelled, or its worker disposed. Such an entry is dropped without
  /// running and without waiting for its time point.
  pub(crate) fn is_abandoned(&self) -> bool { self.handle.is_cancelled() || self.lifetime.is_disposed() }
}

impl<At: Ord> PartialEq for QueuedTask<At> {
  fn eq(&self, other: &Self) -> bool { self.at == other.at && self.id == other.id }
}

impl<At: Ord> Eq for QueuedTask<At> {}

impl<At: Ord> PartialOrd for QueuedTask<At> {
  fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> { Some(self.cmp(other)) }
}

impl<At: Ord> Ord for QueuedTask<At> {
  fn cmp(&self, other: &Self) -> CmpOrdering {
    // Min-heap: earlier times first, then FIFO by id
    other
      .at
      .cmp(&self.at)
      .then_with(|| other.id.cmp(&self.id))
  }
}

pub(crate) fn sleep_until(at: Instant) {
  let now = Instant::now();
  if at > now {
    std::thread::sleep(at - now);
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BinaryHeap;

  use super::*;

  #[rxkernel_macro::test]
  fn next_run_resolves_states() {
    let now = Instant::now();
    assert_eq!(TaskState::Finished.next_run(now), None);
    assert_eq!(TaskState::Yield.next_run(now), Some(now));
    assert_eq!(
      TaskState::Sleeping(Duration::from_millis(5)).next_run(now),
      Some(now + Duration::from_millis(5))
    );
    let past = now - Duration::from_millis(1);
    assert_eq!(TaskState::SleepUntil(past).next_run(now), Some(now));
  }

  #[rxkernel_macro::test]
  fn task_steps_its_state() {
    let mut task = Task::new(0, |n: &mut i32| {
      *n += 1;
      if *n < 3 { TaskState::Yield } else { TaskState::Finished }
    });
    assert_eq!(task.step(), TaskState::Yield);
    assert_eq!(task.step(), TaskState::Yield);
    assert_eq!(task.step(), TaskState::Finished);
    assert_eq!(*task.state(), 3);
  }

  #[rxkernel_macro::test]
  fn handle_resolves_on_finish_and_cancel() {
    let handle = TaskHandle::new();
    assert!(!handle.is_disposed());
    let waiter = {
      let handle = handle.clone();
      std::thread::spawn(move || futures::executor::block_on(handle))
    };
    handle.mark_finished();
    waiter.join().unwrap();
    assert!(handle.is_finished());

    let cancelled = TaskHandle::new();
    cancelled.dispose();
    assert!(cancelled.is_cancelled());
    futures::executor::block_on(cancelled);
    futures::executor::block_on(TaskHandle::finished());
  }

  #[rxkernel_macro::test]
  fn queue_orders_by_time_then_insertion() {
    let base = Instant::now();
    let entry = |at: u64, id| QueuedTask {
      at: base + Duration::from_millis(at),
      id,
      run: Box::new(|| TaskState::Finished),
      handle: TaskHandle::new(),
      lifetime: BooleanDisposable::new(),
    };
    let mut heap = BinaryHeap::new();
    heap.push(entry(10, 0));
    heap.push(entry(5, 1));
    heap.push(entry(5, 2));
    heap.push(entry(0, 3));
    let order: Vec<_> = std::iter::from_fn(|| heap.pop().map(|e| e.id)).collect();
    assert_eq!(order, vec![3, 1, 2, 0]);
  }

  #[rxkernel_macro::test]
  fn entry_is_abandoned_by_cancel_or_worker_disposal() {
    let entry = || QueuedTask {
      at: Instant::now(),
      id: 0,
      run: Box::new(|| TaskState::Finished),
      handle: TaskHandle::new(),
      lifetime: BooleanDisposable::new(),
    };
    let live = entry();
    assert!(!live.is_abandoned());
    let cancelled = entry();
    cancelled.handle.dispose();
    assert!(cancelled.is_abandoned());
    let orphaned = entry();
    orphaned.lifetime.dispose();
    assert!(orphaned.is_abandoned());
  }
}
