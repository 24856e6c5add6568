use super::{sleep_until, Duration, Instant, Scheduler, Task, TaskHandle, Worker};
use crate::disposable::{BooleanDisposable, Disposable};

/// Runs tasks synchronously on the calling thread.
///
/// A task asking to run again is looped over in place (sleeping for its
/// delay) rather than re-entered, so long self-rescheduling chains keep a
/// flat stack.
#[derive(Clone, Copy, Default, Debug)]
pub struct Immediate;

#[derive(Clone, Default, Debug)]
pub struct ImmediateWorker {
  lifetime: BooleanDisposable,
}

impl Scheduler for Immediate {
  type Worker = ImmediateWorker;

  fn create_worker(&self) -> ImmediateWorker { ImmediateWorker::default() }
}

impl Worker for ImmediateWorker {
  fn schedule<S: Send + 'static>(&self, mut task: Task<S>, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let mut at = delay.map(|d| Instant::now() + d);
    loop {
      if let Some(at) = at {
        if self.is_disposed() {
          break;
        }
        sleep_until(at);
      }
      if self.is_disposed() || handle.is_cancelled() {
        break;
      }
      match task.step().next_run(Instant::now()) {
        Some(next) => at = Some(next),
        None => {
          handle.mark_finished();
          break;
        }
      }
    }
    handle
  }
}

impl Disposable for ImmediateWorker {
  fn dispose(&self) { self.lifetime.dispose() }

  fn is_disposed(&self) -> bool { self.lifetime.is_disposed() }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;
  use crate::scheduler::TaskState;

  #[rxkernel_macro::test]
  fn runs_inline_and_loops_redelays() {
    let worker = Immediate.create_worker();
    let log = Arc::new(Mutex::new(vec![]));
    let handle = worker.schedule(
      Task::new((log.clone(), 0), |(log, n)| {
        *n += 1;
        log.lock().unwrap().push(*n);
        if *n < 3 { TaskState::Sleeping(Duration::from_millis(1)) } else { TaskState::Finished }
      }),
      None,
    );
    assert!(handle.is_finished());
    assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
  }

  #[rxkernel_macro::test]
  fn deep_self_rescheduling_keeps_a_flat_stack() {
    let worker = Immediate.create_worker();
    let handle = worker.schedule(
      Task::new(0usize, |n| {
        *n += 1;
        if *n < 1_000_000 { TaskState::Yield } else { TaskState::Finished }
      }),
      None,
    );
    assert!(handle.is_finished());
  }

  #[rxkernel_macro::test]
  fn honors_initial_delay() {
    let worker = Immediate.create_worker();
    let start = Instant::now();
    worker.schedule(Task::new((), |_| TaskState::Finished), Some(Duration::from_millis(20)));
    assert!(start.elapsed() >= Duration::from_millis(20));
  }

  #[rxkernel_macro::test]
  fn disposed_worker_skips_tasks() {
    let worker = Immediate.create_worker();
    worker.dispose();
    let ran = Arc::new(Mutex::new(false));
    let handle = worker.schedule(
      Task::new(ran.clone(), |ran| {
        *ran.lock().unwrap() = true;
        TaskState::Finished
      }),
      None,
    );
    assert!(!*ran.lock().unwrap());
    assert!(!handle.is_finished());
  }
}
