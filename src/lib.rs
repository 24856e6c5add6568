//! # rxkernel: a push-based reactive streams kernel
//!
//! Observers, disposables, schedulers and the coordinator every multi-source
//! operator is built on.
//!
//! ## Quick Start
//!
//! ```rust
//! use rxkernel::prelude::*;
//!
//! let mut clicks = PublishSubject::<i32>::new();
//! let handle = clicks
//!   .clone()
//!   .merge_with(Immediate::from_iter([100, 200]))
//!   .subscribe_next(|v| println!("Value: {v}"));
//!
//! clicks.on_next(1);
//! handle.dispose();
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Observable`] | Describes how to subscribe; owns no running state |
//! | [`Observer`] | Consumes `next`, then at most one `error` or `completed` |
//! | [`Disposable`] | Idempotent cancellation of one resource or a tree of them |
//! | [`Scheduler`] | Creates workers that run tasks now, later or again |
//! | [`Coordinator`] | Serializes several sources into one downstream |
//!
//! ## Guarantees
//!
//! - A downstream observer never receives two calls at once, whatever
//!   threads the sources emit on.
//! - At most one terminal event reaches an observer, and nothing after it.
//! - Disposing a subscription disposes everything it subscribed, scheduled
//!   or acquired; work observed as disposed is skipped.
//! - Resubscribing operators and nested scheduling run through a trampoline,
//!   so stack depth does not grow with the number of retries or repeats.
//!
//! ## Feature Flags
//!
//! - **`tokio-scheduler`**: a scheduler running tasks on the ambient Tokio
//!   runtime.
//!
//! [`Observable`]: observable::Observable
//! [`Observer`]: observer::Observer
//! [`Disposable`]: disposable::Disposable
//! [`Scheduler`]: scheduler::Scheduler
//! [`Coordinator`]: coordinator::Coordinator

pub mod coordinator;
pub mod disposable;
pub mod error;
pub mod factory;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod rc;
pub mod scheduler;
pub mod subject;

// Re-export the prelude module
pub use prelude::*;
