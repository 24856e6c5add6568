//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

// Cancellation
pub use crate::disposable::{
  BooleanDisposable, ClosureDisposable, CompositeDisposable, Disposable, DisposableHandle, RefCountDisposable,
  SerialDisposable,
};
// Errors
pub use crate::error::{ContractViolation, RxError, RxResult};
// Creation/Factories
pub use crate::factory::ObservableFactory;
// Core traits and erased observables
pub use crate::observable::{
  Create, Defer, DynamicObservable, Emitter, Empty, FromIter, Interval, Never, Observable, ObservableExt, Shared,
  ThrowErr, Timer,
};
// Observer trait
pub use crate::observer::{BoxedObserver, Notification, Observer};
// Operators with public configuration
pub use crate::ops::retry::{RetryConfig, RetryPolicy};
// Schedulers
#[cfg(feature = "tokio-scheduler")]
pub use crate::scheduler::TokioScheduler;
pub use crate::scheduler::{
  CurrentThread, Duration, Immediate, Instant, NewThread, Scheduler, Task, TaskHandle, TaskState, TestScheduler,
  Worker,
};
// Subjects
pub use crate::subject::{PublishSubject, Window};
