use crate::{
  disposable::DisposableHandle,
  error::RxError,
  observable::Observable,
  observer::Observer,
  scheduler::{Duration, Instant, Scheduler, Worker},
};

/// Lets a value through, then drops everything that arrives within
/// `duration` of it. Time is read from a worker of `scheduler`, so virtual
/// time works too. Terminal events pass straight through.
#[derive(Clone)]
pub struct Throttle<S, Sch> {
  source: S,
  duration: Duration,
  scheduler: Sch,
}

impl<S, Sch> Throttle<S, Sch> {
  pub fn new(source: S, duration: Duration, scheduler: Sch) -> Self { Self { source, duration, scheduler } }
}

impl<T, S, Sch> Observable<T> for Throttle<S, Sch>
where
  T: Send + 'static,
  S: Observable<T>,
  Sch: Scheduler,
{
  fn subscribe<O: Observer<T> + 'static>(&self, observer: O) {
    self.source.subscribe(ThrottleObserver {
      downstream: observer,
      worker: self.scheduler.create_worker(),
      duration: self.duration,
      open_at: None,
    });
  }
}

struct ThrottleObserver<O, W> {
  downstream: O,
  worker: W,
  duration: Duration,
  /// When the gate opens again; `None` before the first value.
  open_at: Option<Instant>,
}

impl<T, O, W> Observer<T> for ThrottleObserver<O, W>
where
  O: Observer<T>,
  W: Worker,
{
  fn on_next(&mut self, value: T) {
    let now = self.worker.now();
    if self.open_at.map_or(true, |at| now >= at) {
      self.open_at = Some(now + self.duration);
      self.downstream.on_next(value);
    }
  }

  fn on_error(&mut self, err: RxError) { self.downstream.on_error(err) }

  fn on_completed(&mut self) { self.downstream.on_completed() }

  fn is_disposed(&self) -> bool { self.downstream.is_disposed() }

  fn set_upstream(&mut self, upstream: DisposableHandle) { self.downstream.set_upstream(upstream) }
}
