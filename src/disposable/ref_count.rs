use std::sync::{
  atomic::{AtomicBool, AtomicUsize, Ordering},
  Arc,
};

use super::{CompositeDisposable, Disposable, DisposableHandle};

const DISPOSED: usize = usize::MAX;

/// A disposable shared by several independently-lived holders.
///
/// Each holder takes a reference with [`add_ref`](Self::add_ref) and
/// releases it by disposing the returned handle. The guarded resources are
/// torn down when the last reference is released, so the primary holder (the
/// first reference, usually the downstream subscription) and every derived
/// sub-stream must all be done first. Disposing the `RefCountDisposable`
/// itself tears everything down immediately.
#[derive(Clone, Default)]
pub struct RefCountDisposable(Arc<RefCountInner>);

#[derive(Default)]
struct RefCountInner {
  refs: AtomicUsize,
  resources: CompositeDisposable,
}

impl RefCountDisposable {
  pub fn new() -> Self { Self::default() }

  /// Takes a reference. Disposing the returned handle releases it; releasing
  /// twice through the same handle is a no-op. Once the whole resource is
  /// disposed this returns an empty handle.
  pub fn add_ref(&self) -> DisposableHandle {
    let mut current = self.0.refs.load(Ordering::Acquire);
    loop {
      if current == DISPOSED {
        return DisposableHandle::empty();
      }
      match self
        .0
        .refs
        .compare_exchange_weak(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
      {
        Ok(_) => {
          return DisposableHandle::new(RefHandle {
            owner: self.0.clone(),
            released: AtomicBool::new(false),
          });
        }
        Err(actual) => current = actual,
      }
    }
  }

  /// Attaches a resource freed on the final release.
  pub fn add(&self, resource: DisposableHandle) { self.0.resources.add(resource) }

  pub fn remove(&self, resource: &DisposableHandle) { self.0.resources.remove(resource) }

  /// Live references; zero once disposed.
  pub fn ref_count(&self) -> usize {
    match self.0.refs.load(Ordering::Acquire) {
      DISPOSED => 0,
      n => n,
    }
  }
}

impl RefCountInner {
  fn release(&self) {
    let mut current = self.refs.load(Ordering::Acquire);
    loop {
      if current == DISPOSED {
        return;
      }
      let next = if current <= 1 { DISPOSED } else { current - 1 };
      match self
        .refs
        .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
      {
        Ok(_) => {
          if next == DISPOSED {
            self.resources.dispose();
          }
          return;
        }
        Err(actual) => current = actual,
      }
    }
  }
}

impl Disposable for RefCountInner {
  fn dispose(&self) {
    if self.refs.swap(DISPOSED, Ordering::AcqRel) != DISPOSED {
      self.resources.dispose();
    }
  }

  fn is_disposed(&self) -> bool { self.refs.load(Ordering::Acquire) == DISPOSED }
}

impl Disposable for RefCountDisposable {
  fn dispose(&self) { self.0.dispose() }

  fn is_disposed(&self) -> bool { self.0.is_disposed() }
}

struct RefHandle {
  owner: Arc<RefCountInner>,
  released: AtomicBool,
}

impl Disposable for RefHandle {
  fn dispose(&self) {
    if !self.released.swap(true, Ordering::AcqRel) {
      self.owner.release();
    }
  }

  fn is_disposed(&self) -> bool {
    self.released.load(Ordering::Acquire) || self.owner.is_disposed()
  }
}
