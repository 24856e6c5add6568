//! Example: Custom Scheduler Injection
//!
//! Every time-based operator takes its scheduler as a value, so any type
//! implementing `Scheduler` and `Worker` can drive it. This one runs tasks
//! on the calling thread, blocking for delays, and logs each step.

use std::time::Duration;

use rxkernel::{
  prelude::*,
  scheduler::{Task, TaskHandle, TaskState, Worker},
};

// ==================================================================================
// 1. Define the Custom Scheduler
// ==================================================================================

#[derive(Clone, Copy, Default)]
pub struct VerboseScheduler;

#[derive(Clone, Default)]
pub struct VerboseWorker {
  lifetime: BooleanDisposable,
}

// 2. A scheduler only hands out workers
impl Scheduler for VerboseScheduler {
  type Worker = VerboseWorker;

  fn create_worker(&self) -> VerboseWorker {
    println!("[VerboseScheduler] New worker");
    VerboseWorker::default()
  }
}

// 3. The worker steps tasks until they finish, honoring their re-delays
impl Worker for VerboseWorker {
  fn schedule<S: Send + 'static>(&self, mut task: Task<S>, delay: Option<Duration>) -> TaskHandle {
    println!("[VerboseScheduler] Scheduling task. Initial delay: {:?}", delay);
    let mut wait = delay;
    loop {
      if let Some(d) = wait {
        println!("[VerboseScheduler] Sleeping {:?} (Blocking thread...)", d);
        std::thread::sleep(d);
      }
      if self.lifetime.is_disposed() {
        println!("[VerboseScheduler] Worker disposed, dropping task");
        return TaskHandle::new();
      }
      wait = match task.step() {
        TaskState::Finished => break,
        TaskState::Yield => None,
        TaskState::Sleeping(d) => Some(d),
        TaskState::SleepUntil(at) => Some(at.saturating_duration_since(self.now())),
      };
    }
    println!("[VerboseScheduler] Task finished");
    TaskHandle::finished()
  }
}

impl Disposable for VerboseWorker {
  fn dispose(&self) { self.lifetime.dispose() }

  fn is_disposed(&self) -> bool { self.lifetime.is_disposed() }
}

// ==================================================================================
// 4. Usage
// ==================================================================================

fn main() {
  println!("--- Starting Custom Scheduler Example ---");

  Immediate::from_iter([10, 20])
    // Each value waits on VerboseWorker before moving on
    .delay(Duration::from_millis(500), VerboseScheduler)
    .subscribe_all(
      |v| println!("Consumer received value: {}", v),
      |err| println!("Consumer received error: {}", err),
      || println!("Consumer completed"),
    );

  println!("--- Example Finished ---");
}
