//! Operators.
//!
//! Every operator here is reached through [`ObservableExt`](crate::observable::ObservableExt).
//! The multi-source ones (`merge`, `switch_on_next`, the combinators and
//! `window_toggle`) run on a [`Coordinator`](crate::coordinator::Coordinator);
//! the resubscribing and timing ones drive themselves through scheduler tasks.

pub mod combine_latest;
pub mod debounce;
pub mod delay;
pub mod merge;
pub mod observe_on;
pub mod repeat;
pub mod retry;
pub mod retry_when;
pub mod sample;
pub mod subscribe_on;
pub mod switch_on_next;
pub mod throttle;
pub mod timeout;
pub mod window_toggle;
pub mod with_latest_from;
pub mod zip;
