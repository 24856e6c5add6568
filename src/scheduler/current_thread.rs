//! Trampoline scheduling on the calling thread.
//!
//! The first `schedule` on a thread with no active queue becomes the queue
//! owner: it runs its task inline, then drains everything that was enqueued
//! meanwhile, in time order. Any `schedule` issued while a queue is owned
//! (from inside a running task, or inside [`CurrentThread::own_queue`]) only
//! enqueues. Recursion depth therefore stays bounded no matter how often tasks
//! reschedule each other.

use std::{cell::RefCell, collections::BinaryHeap};

use tracing::trace;

use super::{guarded, sleep_until, Duration, Instant, QueuedTask, Runnable, Scheduler, Task, TaskHandle, Worker};
use crate::disposable::{BooleanDisposable, Disposable};

#[derive(Default)]
struct Trampoline {
  queue: BinaryHeap<QueuedTask<Instant>>,
  next_id: u64,
}

impl Trampoline {
  fn push(&mut self, at: Instant, run: Runnable, handle: TaskHandle, lifetime: BooleanDisposable) {
    let id = self.next_id;
    self.next_id += 1;
    self.queue.push(QueuedTask { at, id, run, handle, lifetime });
  }
}

thread_local! {
  static TRAMPOLINE: RefCell<Option<Trampoline>> = const { RefCell::new(None) };
}

/// Releases queue ownership when dropped, even if a task panicked.
struct OwnerGuard;

impl OwnerGuard {
  fn acquire() -> Option<Self> {
    TRAMPOLINE.with(|t| {
      let mut t = t.borrow_mut();
      if t.is_some() {
        None
      } else {
        *t = Some(Trampoline::default());
        Some(OwnerGuard)
      }
    })
  }
}

impl Drop for OwnerGuard {
  fn drop(&mut self) { TRAMPOLINE.with(|t| *t.borrow_mut() = None); }
}

/// Pushes onto this thread's queue, handing `run` back if nobody owns it.
fn enqueue(at: Instant, run: Runnable, handle: TaskHandle, lifetime: BooleanDisposable) -> Result<(), Runnable> {
  TRAMPOLINE.with(|t| match t.borrow_mut().as_mut() {
    Some(trampoline) => {
      trampoline.push(at, run, handle, lifetime);
      Ok(())
    }
    None => Err(run),
  })
}

fn pop() -> Option<QueuedTask<Instant>> {
  TRAMPOLINE.with(|t| t.borrow_mut().as_mut().and_then(|t| t.queue.pop()))
}

/// Runs `entry` once and puts it back if it wants to run again.
///
/// An abandoned entry is dropped before its time point is waited for, and
/// again if it was abandoned during the wait.
fn run_entry(mut entry: QueuedTask<Instant>) {
  if entry.is_abandoned() {
    entry.handle.mark_finished();
    return;
  }
  sleep_until(entry.at);
  if entry.is_abandoned() {
    entry.handle.mark_finished();
    return;
  }
  match (entry.run)().next_run(Instant::now()) {
    None => entry.handle.mark_finished(),
    Some(at) => {
      let handle = entry.handle.clone();
      if enqueue(at, entry.run, entry.handle, entry.lifetime).is_err() {
        // Unreachable while the owner guard is alive; treat as finished.
        handle.mark_finished();
      }
    }
  }
}

fn drain() {
  while let Some(entry) = pop() {
    run_entry(entry);
  }
}

/// The trampoline scheduler.
#[derive(Clone, Copy, Default, Debug)]
pub struct CurrentThread;

impl CurrentThread {
  /// Runs `f` as the owner of this thread's queue, then drains the queue.
  ///
  /// Everything `f` schedules on a [`CurrentThread`] worker is deferred until
  /// `f` returns; this is how several sources subscribed together interleave
  /// their emissions. Nested calls just run `f`.
  pub fn own_queue<R>(f: impl FnOnce() -> R) -> R {
    match OwnerGuard::acquire() {
      Some(guard) => {
        trace!("trampoline owned by caller");
        let result = f();
        drain();
        drop(guard);
        result
      }
      None => f(),
    }
  }

  /// Whether a queue owner is active on this thread.
  pub fn is_queue_owned() -> bool { TRAMPOLINE.with(|t| t.borrow().is_some()) }
}

#[derive(Clone, Default, Debug)]
pub struct CurrentThreadWorker {
  lifetime: BooleanDisposable,
}

impl Scheduler for CurrentThread {
  type Worker = CurrentThreadWorker;

  fn create_worker(&self) -> CurrentThreadWorker { CurrentThreadWorker::default() }
}

impl Worker for CurrentThreadWorker {
  fn schedule<S: Send + 'static>(&self, task: Task<S>, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let at = Instant::now() + delay.unwrap_or_default();
    let run = guarded(&self.lifetime, task);
    let Err(run) = enqueue(at, run, handle.clone(), self.lifetime.clone()) else {
      trace!("task enqueued on owned trampoline");
      return handle;
    };

    let Some(guard) = OwnerGuard::acquire() else {
      return handle;
    };
    trace!("trampoline owner running inline");
    run_entry(QueuedTask { at, id: 0, run, handle: handle.clone(), lifetime: self.lifetime.clone() });
    drain();
    drop(guard);
    handle
  }
}

impl Disposable for CurrentThreadWorker {
  fn dispose(&self) { self.lifetime.dispose() }

  fn is_disposed(&self) -> bool { self.lifetime.is_disposed() }
}
