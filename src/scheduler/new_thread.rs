use std::{
  collections::BinaryHeap,
  mem,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Condvar, Mutex, MutexGuard, PoisonError,
  },
  thread,
};

use tracing::{debug, error};

use super::{guarded, Duration, Instant, QueuedTask, Scheduler, Task, TaskHandle, Worker};
use crate::{
  disposable::{BooleanDisposable, Disposable},
  rc::lock,
};

/// Gives every worker its own OS thread.
///
/// The thread is spawned on the first `schedule` and runs the worker's tasks
/// in time order. It exits once the worker is disposed, or once every clone
/// of the worker has been dropped and nothing is left in its queue.
#[derive(Clone, Copy, Default, Debug)]
pub struct NewThread;

#[derive(Default)]
struct ThreadQueue {
  heap: BinaryHeap<QueuedTask<Instant>>,
  next_id: u64,
  started: bool,
}

#[derive(Default)]
struct Shared {
  queue: Mutex<ThreadQueue>,
  ready: Condvar,
  lifetime: BooleanDisposable,
  detached: AtomicBool,
}

impl Shared {
  fn wake(&self) {
    let _queue = lock(&self.queue);
    self.ready.notify_all();
  }
}

/// Marks the worker detached when the last handle to it goes away.
struct WorkerOwner(Arc<Shared>);

impl Drop for WorkerOwner {
  fn drop(&mut self) {
    self.0.detached.store(true, Ordering::Release);
    self.0.wake();
  }
}

#[derive(Clone)]
pub struct NewThreadWorker {
  shared: Arc<Shared>,
  _owner: Arc<WorkerOwner>,
}

impl Scheduler for NewThread {
  type Worker = NewThreadWorker;

  fn create_worker(&self) -> NewThreadWorker {
    let shared = Arc::new(Shared::default());
    NewThreadWorker { _owner: Arc::new(WorkerOwner(shared.clone())), shared }
  }
}

impl Worker for NewThreadWorker {
  fn schedule<S: Send + 'static>(&self, task: Task<S>, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    if self.is_disposed() {
      return handle;
    }
    let at = Instant::now() + delay.unwrap_or_default();
    let run = guarded(&self.shared.lifetime, task);
    let spawn = {
      let mut queue = lock(&self.shared.queue);
      let id = queue.next_id;
      queue.next_id += 1;
      queue.heap.push(QueuedTask { at, id, run, handle: handle.clone(), lifetime: self.shared.lifetime.clone() });
      !mem::replace(&mut queue.started, true)
    };
    if spawn {
      let shared = self.shared.clone();
      let spawned = thread::Builder::new()
        .name("rxkernel-worker".into())
        .spawn(move || run_worker(shared));
      if let Err(err) = spawned {
        error!(%err, "failed to spawn worker thread; disposing worker");
        self.dispose();
      }
    } else {
      self.shared.ready.notify_all();
    }
    handle
  }
}

impl Disposable for NewThreadWorker {
  fn dispose(&self) {
    self.shared.lifetime.dispose();
    self.shared.wake();
  }

  fn is_disposed(&self) -> bool { self.shared.lifetime.is_disposed() }
}

fn wait<'a>(shared: &'a Shared, queue: MutexGuard<'a, ThreadQueue>) -> MutexGuard<'a, ThreadQueue> {
  shared
    .ready
    .wait(queue)
    .unwrap_or_else(PoisonError::into_inner)
}

fn run_worker(shared: Arc<Shared>) {
  debug!("worker thread started");
  let mut queue = lock(&shared.queue);
  loop {
    if shared.lifetime.is_disposed() {
      break;
    }
    let Some(next_at) = queue.heap.peek().map(|e| e.at) else {
      if shared.detached.load(Ordering::Acquire) {
        break;
      }
      queue = wait(&shared, queue);
      continue;
    };
    let now = Instant::now();
    if next_at > now {
      queue = shared
        .ready
        .wait_timeout(queue, next_at - now)
        .unwrap_or_else(PoisonError::into_inner)
        .0;
      continue;
    }
    let Some(mut entry) = queue.heap.pop() else { continue };
    drop(queue);

    let again = if entry.is_abandoned() {
      None
    } else {
      (entry.run)().next_run(Instant::now())
    };
    match again {
      Some(at) => {
        queue = lock(&shared.queue);
        let id = queue.next_id;
        queue.next_id += 1;
        queue.heap.push(QueuedTask { at, id, ..entry });
      }
      None => {
        if !entry.handle.is_cancelled() {
          entry.handle.mark_finished();
        }
        // Task state may own worker clones; release it before relocking.
        drop(entry);
        queue = lock(&shared.queue);
      }
    }
  }
  let leftover = mem::take(&mut queue.heap);
  drop(queue);
  drop(leftover);
  debug!("worker thread stopped");
}

#[cfg(test)]
mod tests {
  use std::sync::mpsc;

  use super::*;
  use crate::scheduler::TaskState;

  #[rxkernel_macro::test]
  fn runs_on_a_dedicated_thread() {
    let (tx, rx) = mpsc::channel();
    let worker = NewThread.create_worker();
    let handle = worker.schedule(
      Task::new(tx, |tx| {
        let _ = tx.send(thread::current().name().map(str::to_owned));
        TaskState::Finished
      }),
      None,
    );
    assert_eq!(rx.recv().unwrap().as_deref(), Some("rxkernel-worker"));
    futures::executor::block_on(handle);
  }

  #[rxkernel_macro::test]
  fn tasks_of_one_worker_run_in_order() {
    let (tx, rx) = mpsc::channel();
    let worker = NewThread.create_worker();
    for (i, ms) in [(2, 30u64), (0, 0), (1, 10)] {
      worker.schedule(
        Task::new((tx.clone(), i), |(tx, i)| {
          let _ = tx.send(*i);
          TaskState::Finished
        }),
        Some(Duration::from_millis(ms)),
      );
    }
    let got: Vec<i32> = (0..3).map(|_| rx.recv().unwrap()).collect();
    assert_eq!(got, vec![0, 1, 2]);
  }

  #[rxkernel_macro::test]
  fn disposed_worker_skips_pending_tasks() {
    let (tx, rx) = mpsc::channel::<()>();
    let worker = NewThread.create_worker();
    worker.schedule(
      Task::new(tx, |tx| {
        let _ = tx.send(());
        TaskState::Finished
      }),
      Some(Duration::from_millis(50)),
    );
    worker.dispose();
    assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());
  }

  #[rxkernel_macro::test]
  fn repeating_task_keeps_running() {
    let (tx, rx) = mpsc::channel();
    let worker = NewThread.create_worker();
    let handle = worker.schedule(
      Task::new((tx, 0), |(tx, n)| {
        *n += 1;
        let _ = tx.send(*n);
        if *n < 3 { TaskState::Sleeping(Duration::from_millis(1)) } else { TaskState::Finished }
      }),
      None,
    );
    futures::executor::block_on(handle);
    assert_eq!(rx.iter().take(3).collect::<Vec<_>>(), vec![1, 2, 3]);
  }
}
