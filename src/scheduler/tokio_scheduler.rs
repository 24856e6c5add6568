use tokio::runtime::Handle;
use tracing::error;

use super::{guarded, Duration, Instant, Scheduler, Task, TaskHandle, Worker};
use crate::disposable::{BooleanDisposable, Disposable};

/// Runs tasks on the Tokio runtime of the calling context.
///
/// Scheduling outside a runtime logs an error and never runs the task.
#[derive(Clone, Copy, Default, Debug)]
pub struct TokioScheduler;

#[derive(Clone, Default, Debug)]
pub struct TokioWorker {
  lifetime: BooleanDisposable,
}

impl Scheduler for TokioScheduler {
  type Worker = TokioWorker;

  fn create_worker(&self) -> TokioWorker { TokioWorker::default() }
}

impl Worker for TokioWorker {
  fn schedule<S: Send + 'static>(&self, task: Task<S>, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let runtime = match Handle::try_current() {
      Ok(runtime) => runtime,
      Err(err) => {
        error!(%err, "TokioScheduler used outside a Tokio runtime");
        return handle;
      }
    };
    let mut run = guarded(&self.lifetime, task);
    let task_handle = handle.clone();
    runtime.spawn(async move {
      let mut at = Instant::now() + delay.unwrap_or_default();
      loop {
        if at > Instant::now() {
          tokio::time::sleep_until(at.into()).await;
        } else {
          tokio::task::yield_now().await;
        }
        if task_handle.is_cancelled() {
          return;
        }
        match run().next_run(Instant::now()) {
          Some(next) => at = next,
          None => {
            task_handle.mark_finished();
            return;
          }
        }
      }
    });
    handle
  }
}

impl Disposable for TokioWorker {
  fn dispose(&self) { self.lifetime.dispose() }

  fn is_disposed(&self) -> bool { self.lifetime.is_disposed() }
}
