//! Cancellation resources.
//!
//! A [`Disposable`] is one cancellable unit of work. Disposal is idempotent,
//! safe from any thread, and never fails; only the first call performs the
//! teardown. [`DisposableHandle`] is the type-erased, cloneable form passed
//! around the kernel (for example through `Observer::set_upstream`).

use std::{
  fmt,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
  },
};

use crate::rc::lock;

mod composite;
mod ref_count;
mod serial;

pub use composite::CompositeDisposable;
pub use ref_count::RefCountDisposable;
pub use serial::SerialDisposable;

pub trait Disposable: Send + Sync {
  /// Tears the resource down. Calling it again is a no-op.
  fn dispose(&self);

  fn is_disposed(&self) -> bool;
}

/// A cloneable, type-erased disposable.
///
/// The empty handle owns nothing and reports itself as disposed.
#[derive(Clone, Default)]
pub struct DisposableHandle(Option<Arc<dyn Disposable>>);

impl DisposableHandle {
  pub fn new<D: Disposable + 'static>(disposable: D) -> Self { Self(Some(Arc::new(disposable))) }

  pub fn from_arc(disposable: Arc<dyn Disposable>) -> Self { Self(Some(disposable)) }

  /// A handle running `f` on its first disposal.
  pub fn from_fn<F>(f: F) -> Self
  where
    F: FnOnce() + Send + 'static,
  {
    Self::new(ClosureDisposable::new(f))
  }

  pub fn empty() -> Self { Self(None) }

  /// Whether both handles point at the same underlying resource.
  pub fn ptr_eq(&self, other: &Self) -> bool { self.data_ptr() == other.data_ptr() }

  pub(crate) fn data_ptr(&self) -> *const () {
    self
      .0
      .as_ref()
      .map_or(std::ptr::null(), |d| Arc::as_ptr(d) as *const ())
  }
}

impl Disposable for DisposableHandle {
  #[inline]
  fn dispose(&self) {
    if let Some(d) = &self.0 {
      d.dispose();
    }
  }

  #[inline]
  fn is_disposed(&self) -> bool { self.0.as_ref().map_or(true, |d| d.is_disposed()) }
}

impl fmt::Debug for DisposableHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DisposableHandle")
      .field("ptr", &self.data_ptr())
      .field("disposed", &self.is_disposed())
      .finish()
  }
}

/// A plain flag. Disposing it only flips the flag; the owner polls it.
#[derive(Clone, Default, Debug)]
pub struct BooleanDisposable(Arc<AtomicBool>);

impl BooleanDisposable {
  pub fn new() -> Self { Self::default() }
}

impl Disposable for BooleanDisposable {
  #[inline]
  fn dispose(&self) { self.0.store(true, Ordering::Release); }

  #[inline]
  fn is_disposed(&self) -> bool { self.0.load(Ordering::Acquire) }
}

/// Runs a closure exactly once, on the first disposal.
pub struct ClosureDisposable<F> {
  disposed: AtomicBool,
  teardown: Mutex<Option<F>>,
}

impl<F> ClosureDisposable<F>
where
  F: FnOnce() + Send,
{
  pub fn new(teardown: F) -> Self {
    Self { disposed: AtomicBool::new(false), teardown: Mutex::new(Some(teardown)) }
  }
}

impl<F> Disposable for ClosureDisposable<F>
where
  F: FnOnce() + Send,
{
  fn dispose(&self) {
    if self.disposed.swap(true, Ordering::AcqRel) {
      return;
    }
    let teardown = lock(&self.teardown).take();
    if let Some(teardown) = teardown {
      teardown();
    }
  }

  fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }
}
