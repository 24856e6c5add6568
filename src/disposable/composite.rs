use std::{
  mem,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
  },
};

use smallvec::SmallVec;

use super::{Disposable, DisposableHandle};
use crate::rc::lock;

/// A disposable owning a growing set of children.
///
/// Disposing the composite disposes every child exactly once, no matter how
/// many threads race on `dispose`. A child added after disposal is disposed
/// on the spot. The disposed check is a single atomic load; the lock is only
/// taken to mutate the child list.
#[derive(Clone, Default)]
pub struct CompositeDisposable(Arc<CompositeInner>);

#[derive(Default)]
struct CompositeInner {
  disposed: AtomicBool,
  children: Mutex<SmallVec<[DisposableHandle; 2]>>,
}

impl CompositeDisposable {
  pub fn new() -> Self { Self::default() }

  /// Attaches `child`. Adding the composite to itself is ignored.
  pub fn add(&self, child: DisposableHandle) {
    if child.data_ptr() == self.as_ptr() || child.is_disposed() {
      return;
    }
    {
      let mut children = lock(&self.0.children);
      if !self.0.disposed.load(Ordering::Acquire) {
        children.retain(|c| !c.is_disposed());
        children.push(child);
        return;
      }
    }
    child.dispose();
  }

  /// Detaches `child` without disposing it.
  pub fn remove(&self, child: &DisposableHandle) {
    lock(&self.0.children).retain(|c| !c.ptr_eq(child));
  }

  /// Disposes and drops every current child; the composite stays usable.
  pub fn clear(&self) {
    let children = mem::take(&mut *lock(&self.0.children));
    for child in children {
      child.dispose();
    }
  }

  pub fn len(&self) -> usize { lock(&self.0.children).len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  /// A handle sharing this composite.
  pub fn handle(&self) -> DisposableHandle { DisposableHandle::from_arc(self.0.clone()) }

  fn as_ptr(&self) -> *const () { Arc::as_ptr(&self.0) as *const () }
}

impl Disposable for CompositeInner {
  fn dispose(&self) {
    if self.disposed.swap(true, Ordering::AcqRel) {
      return;
    }
    let children = mem::take(&mut *lock(&self.children));
    for child in children {
      child.dispose();
    }
  }

  #[inline]
  fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }
}

impl Disposable for CompositeDisposable {
  #[inline]
  fn dispose(&self) { self.0.dispose() }

  #[inline]
  fn is_disposed(&self) -> bool { self.0.is_disposed() }
}
