use std::{
  marker::PhantomData,
  mem,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
  },
};

use tracing::{debug, warn};

use super::{Observer, UpstreamDisposables};
use crate::{
  disposable::{Disposable, DisposableHandle},
  error::{ContractViolation, RxError},
  rc::lock,
};

/// The three callbacks of an observer, without any lifecycle bookkeeping.
pub trait ObserverStrategy<T>: Send {
  fn on_next(&mut self, value: T);
  fn on_error(&mut self, err: RxError);
  fn on_completed(&mut self);
}

/// The standard observer: a strategy plus a disposal strategy.
///
/// `Subscriber` enforces the lifecycle contract on behalf of its strategy:
/// nothing is forwarded after disposal, at most one terminal event reaches
/// the strategy, and the upstream handles are disposed once a terminal event
/// has been delivered. Registering more upstreams than `U` declares disposes
/// the offending handle and terminates with a
/// [`RxError::Contract`](crate::error::RxError::Contract) error.
pub struct Subscriber<S, U = super::FixedUpstreams<1>> {
  strategy: S,
  slot: Arc<UpstreamSlot<U>>,
}

struct UpstreamSlot<U> {
  disposed: AtomicBool,
  upstreams: Mutex<U>,
}

impl<U: UpstreamDisposables> UpstreamSlot<U> {
  fn attach(&self, upstream: DisposableHandle) -> Result<(), ContractViolation> {
    let result = {
      let mut upstreams = lock(&self.upstreams);
      if self.disposed.load(Ordering::Acquire) {
        Ok(false)
      } else {
        upstreams.add(upstream.clone()).map(|_| true)
      }
    };
    match result {
      Ok(true) => Ok(()),
      Ok(false) => {
        upstream.dispose();
        Ok(())
      }
      Err(violation) => {
        upstream.dispose();
        Err(violation)
      }
    }
  }

  /// Flips the disposed flag; true only for the first caller.
  fn mark_disposed(&self) -> bool { !self.disposed.swap(true, Ordering::AcqRel) }

  fn release_upstreams(&self) {
    let upstreams = mem::take(&mut *lock(&self.upstreams));
    upstreams.dispose_all();
  }
}

impl<U: UpstreamDisposables> Disposable for UpstreamSlot<U> {
  fn dispose(&self) {
    if self.mark_disposed() {
      self.release_upstreams();
    }
  }

  fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }
}

impl<S, U: UpstreamDisposables> Subscriber<S, U> {
  pub fn new(strategy: S) -> Self {
    Self {
      strategy,
      slot: Arc::new(UpstreamSlot { disposed: AtomicBool::new(false), upstreams: Mutex::default() }),
    }
  }

  /// The handle that cancels this subscription.
  pub fn disposable(&self) -> DisposableHandle { DisposableHandle::from_arc(self.slot.clone()) }
}

impl<T, S, U> Observer<T> for Subscriber<S, U>
where
  S: ObserverStrategy<T>,
  U: UpstreamDisposables,
{
  fn on_next(&mut self, value: T) {
    if !self.slot.is_disposed() {
      self.strategy.on_next(value);
    }
  }

  fn on_error(&mut self, err: RxError) {
    if self.slot.mark_disposed() {
      self.strategy.on_error(err);
      self.slot.release_upstreams();
    }
  }

  fn on_completed(&mut self) {
    if self.slot.mark_disposed() {
      self.strategy.on_completed();
      self.slot.release_upstreams();
    }
  }

  #[inline]
  fn is_disposed(&self) -> bool { self.slot.is_disposed() }

  fn set_upstream(&mut self, upstream: DisposableHandle) {
    if let Err(violation) = self.slot.attach(upstream) {
      debug!(%violation, "observer contract violated");
      self.on_error(violation.into());
    }
  }
}

// ============================================================================
// LambdaObserver
// ============================================================================

/// An [`ObserverStrategy`] built from closures.
pub struct LambdaObserver<N, E, C, T> {
  next: N,
  error: E,
  complete: C,
  _item: PhantomData<fn(T)>,
}

fn report_unhandled(err: RxError) {
  warn!(%err, "error reached a subscriber without an error callback");
}

fn ignore_completion() {}

impl<N, T> LambdaObserver<N, fn(RxError), fn(), T>
where
  N: FnMut(T) + Send,
{
  /// Only values are observed; an error is logged, completion ignored.
  pub fn next(next: N) -> Self {
    Self {
      next,
      error: report_unhandled as fn(RxError),
      complete: ignore_completion as fn(),
      _item: PhantomData,
    }
  }
}

impl<N, E, C, T> LambdaObserver<N, E, C, T>
where
  N: FnMut(T) + Send,
  E: FnMut(RxError) + Send,
  C: FnMut() + Send,
{
  pub fn new(next: N, error: E, complete: C) -> Self {
    Self { next, error, complete, _item: PhantomData }
  }
}

impl<N, E, C, T> ObserverStrategy<T> for LambdaObserver<N, E, C, T>
where
  N: FnMut(T) + Send,
  E: FnMut(RxError) + Send,
  C: FnMut() + Send,
{
  #[inline]
  fn on_next(&mut self, value: T) { (self.next)(value) }

  #[inline]
  fn on_error(&mut self, err: RxError) { (self.error)(err) }

  #[inline]
  fn on_completed(&mut self) { (self.complete)() }
}
