use std::{
  mem,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
  },
};

use super::{Disposable, DisposableHandle};
use crate::rc::lock;

/// Holds at most one resource at a time.
///
/// Setting a new resource disposes the previous one first; after disposal
/// every newly set resource is disposed immediately. Used where successive
/// attempts or inner streams replace each other (`retry`, `switch_on_next`).
#[derive(Clone, Default)]
pub struct SerialDisposable(Arc<SerialInner>);

#[derive(Default)]
struct SerialInner {
  disposed: AtomicBool,
  current: Mutex<DisposableHandle>,
}

impl SerialDisposable {
  pub fn new() -> Self { Self::default() }

  pub fn set(&self, next: DisposableHandle) {
    let previous = {
      let mut current = lock(&self.0.current);
      if self.0.disposed.load(Ordering::Acquire) {
        None
      } else {
        Some(mem::replace(&mut *current, next.clone()))
      }
    };
    match previous {
      Some(previous) => previous.dispose(),
      None => next.dispose(),
    }
  }

  pub fn handle(&self) -> DisposableHandle { DisposableHandle::from_arc(self.0.clone()) }
}

impl Disposable for SerialInner {
  fn dispose(&self) {
    if self.disposed.swap(true, Ordering::AcqRel) {
      return;
    }
    let current = mem::take(&mut *lock(&self.current));
    current.dispose();
  }

  fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }
}

impl Disposable for SerialDisposable {
  fn dispose(&self) { self.0.dispose() }

  fn is_disposed(&self) -> bool { self.0.is_disposed() }
}
