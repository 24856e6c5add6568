//! Resubscribing on error.
//!
//! `retry` takes a [`RetryPolicy`]. A plain `usize` retries that many times
//! right away; [`RetryConfig`] adds a delay and a reset of the attempt counter
//! on successful values:
//!
//! ```rust
//! use std::sync::{
//!   atomic::{AtomicUsize, Ordering},
//!   Arc, Mutex,
//! };
//!
//! use rxkernel::{ops::retry::RetryConfig, prelude::*};
//!
//! let subscriptions = Arc::new(AtomicUsize::new(0));
//! let c_subscriptions = subscriptions.clone();
//! let source = Immediate::create(move |mut emitter: Emitter<usize>| {
//!   let n = c_subscriptions.fetch_add(1, Ordering::SeqCst);
//!   if n < 2 {
//!     emitter.error(RxError::msg("flaky"));
//!   } else {
//!     emitter.next(n);
//!     emitter.complete();
//!   }
//! });
//!
//! let seen = Arc::new(Mutex::new(vec![]));
//! let c_seen = seen.clone();
//! source
//!   .retry(RetryConfig::new().count(3))
//!   .subscribe_next(move |v| c_seen.lock().unwrap().push(v));
//! assert_eq!(*seen.lock().unwrap(), vec![2]);
//! ```
//!
//! Resubscription always goes through a worker of the operator's scheduler,
//! never through a nested call, so the stack depth stays flat however many
//! attempts a source takes.

use std::sync::Arc;

use tracing::debug;

use crate::{
  coordinator::Coordinator,
  disposable::{CompositeDisposable, Disposable, DisposableHandle, SerialDisposable},
  error::RxError,
  observable::Observable,
  observer::Observer,
  scheduler::{Duration, Scheduler, Task, TaskState, Worker},
};

/// Decides whether an error is retried, and after how long.
///
/// ```rust
/// use rxkernel::{ops::retry::RetryPolicy, prelude::*};
///
/// #[derive(Clone)]
/// struct RetryTimeouts;
///
/// impl RetryPolicy for RetryTimeouts {
///   fn should_retry(&self, err: &RxError, attempt: usize) -> Option<Duration> {
///     (err.is_timeout() && attempt < 3).then(|| Duration::from_millis(100))
///   }
/// }
/// ```
pub trait RetryPolicy: Clone + Send + Sync + 'static {
  /// `attempt` counts the retries already made: 0 on the first error.
  /// `None` gives up and forwards `err`.
  fn should_retry(&self, err: &RxError, attempt: usize) -> Option<Duration>;

  /// Whether a value from the source resets the attempt counter to zero.
  fn reset_on_success(&self) -> bool { false }
}

/// Retries that many times, without delay.
impl RetryPolicy for usize {
  fn should_retry(&self, _err: &RxError, attempt: usize) -> Option<Duration> {
    (attempt < *self).then_some(Duration::ZERO)
  }
}

/// Builder for the common retry policies.
///
/// `RetryConfig::new()` alone retries forever without delay; `count(3)`
/// allows three retries, so four subscriptions in total.
#[derive(Clone, Debug, Default)]
pub struct RetryConfig {
  count: Option<usize>,
  delay: Option<Duration>,
  reset_on_success: bool,
}

impl RetryConfig {
  pub fn new() -> Self { Self::default() }

  pub fn count(mut self, count: usize) -> Self {
    self.count = Some(count);
    self
  }

  /// Waits `delay` before every resubscription.
  pub fn delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  /// A value from the source resets the attempt counter, so a source that
  /// keeps making progress between failures is retried indefinitely.
  pub fn reset_on_success(mut self) -> Self {
    self.reset_on_success = true;
    self
  }
}

impl RetryPolicy for RetryConfig {
  fn should_retry(&self, _err: &RxError, attempt: usize) -> Option<Duration> {
    if self.count.is_some_and(|count| attempt >= count) {
      return None;
    }
    Some(self.delay.unwrap_or_default())
  }

  fn reset_on_success(&self) -> bool { self.reset_on_success }
}

pub struct Retry<S, P, Sch> {
  source: Arc<S>,
  policy: P,
  scheduler: Sch,
}

impl<S, P: Clone, Sch: Clone> Clone for Retry<S, P, Sch> {
  fn clone(&self) -> Self {
    Self { source: self.source.clone(), policy: self.policy.clone(), scheduler: self.scheduler.clone() }
  }
}

impl<S, P, Sch> Retry<S, P, Sch> {
  pub fn new(source: S, policy: P, scheduler: Sch) -> Self {
    Self { source: Arc::new(source), policy, scheduler }
  }
}

/// Everything the attempts of one subscription share.
struct RetryContext<T, S, P, W, O> {
  source: Arc<S>,
  policy: P,
  worker: W,
  /// The running attempt; replacing it disposes the previous one.
  attempt: SerialDisposable,
  /// Counts the retries made so far.
  coordinator: Coordinator<T, usize, O>,
}

impl<T, S, P, Sch> Observable<T> for Retry<S, P, Sch>
where
  T: Send + 'static,
  S: Observable<T>,
  P: RetryPolicy,
  Sch: Scheduler,
{
  fn subscribe<O: Observer<T> + 'static>(&self, observer: O) {
    let worker = self.scheduler.create_worker();
    let coordinator = Coordinator::new(0, observer);
    let attempt = SerialDisposable::new();
    coordinator.add_resource(attempt.handle());
    coordinator.add_resource(DisposableHandle::new(worker.clone()));

    let context = Arc::new(RetryContext {
      source: self.source.clone(),
      policy: self.policy.clone(),
      worker,
      attempt,
      coordinator,
    });
    subscribe_attempt(&context);
  }
}

fn subscribe_attempt<T, S, P, W, O>(context: &Arc<RetryContext<T, S, P, W, O>>)
where
  T: Send + 'static,
  S: Observable<T>,
  P: RetryPolicy,
  W: Worker,
  O: Observer<T> + 'static,
{
  let upstream = CompositeDisposable::new();
  context.attempt.set(upstream.handle());
  if upstream.is_disposed() {
    return;
  }
  context.source.subscribe(RetryObserver { context: context.clone(), upstream });
}

struct RetryObserver<T, S, P, W, O> {
  context: Arc<RetryContext<T, S, P, W, O>>,
  upstream: CompositeDisposable,
}

impl<T, S, P, W, O> Observer<T> for RetryObserver<T, S, P, W, O>
where
  T: Send + 'static,
  S: Observable<T>,
  P: RetryPolicy,
  W: Worker,
  O: Observer<T> + 'static,
{
  fn on_next(&mut self, value: T) {
    let reset = self.context.policy.reset_on_success();
    self.context.coordinator.with_state(|s| {
      if reset {
        s.state = 0;
      }
      s.emit(value);
    });
  }

  fn on_error(&mut self, err: RxError) {
    let policy = &self.context.policy;
    let retry = self.context.coordinator.with_state(|s| {
      if s.is_closed() {
        return None;
      }
      let Some(delay) = policy.should_retry(&err, s.state) else {
        s.error(err);
        return None;
      };
      s.state += 1;
      debug!(attempt = s.state, ?delay, %err, "resubscribing after error");
      Some(delay)
    });
    let Some(delay) = retry else { return };
    self.context.worker.schedule(
      Task::new(self.context.clone(), |context| {
        if !context.attempt.is_disposed() {
          subscribe_attempt(context);
        }
        TaskState::Finished
      }),
      Some(delay),
    );
  }

  fn on_completed(&mut self) { self.context.coordinator.complete() }

  fn is_disposed(&self) -> bool { self.upstream.is_disposed() }

  fn set_upstream(&mut self, upstream: DisposableHandle) { self.upstream.add(upstream) }
}
