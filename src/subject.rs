//! Hot multicast streams.
//!
//! A [`PublishSubject`] is both an observer and an observable: whatever it
//! observes is broadcast to its current subscribers. Late subscribers only see
//! later events; once the subject terminated, new subscribers receive that
//! terminal event right away.

use std::sync::{Arc, Mutex, Weak};

use crate::{
  disposable::{CompositeDisposable, Disposable, DisposableHandle},
  error::RxError,
  observable::Observable,
  observer::{BoxedObserver, Notification, Observer},
  rc::lock,
};

type Entry<T> = Arc<Mutex<BoxedObserver<T>>>;

struct SubjectState<T> {
  observers: Vec<(u64, Entry<T>)>,
  next_id: u64,
  terminal: Option<Notification<T>>,
}

struct SubjectInner<T> {
  state: Mutex<SubjectState<T>>,
  upstream: CompositeDisposable,
}

impl<T> SubjectInner<T> {
  fn remove(&self, id: u64) { lock(&self.state).observers.retain(|(i, _)| *i != id); }
}

/// Broadcasts to its current subscribers.
///
/// Emission works on a snapshot of the subscriber list, so the subject's own
/// lock is never held while an observer runs; an observer may subscribe to
/// or unsubscribe from the subject it is being called by. Calls to each
/// individual subscriber are serialized.
pub struct PublishSubject<T>(Arc<SubjectInner<T>>);

impl<T> Clone for PublishSubject<T> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T> Default for PublishSubject<T> {
  fn default() -> Self {
    Self(Arc::new(SubjectInner {
      state: Mutex::new(SubjectState { observers: Vec::new(), next_id: 0, terminal: None }),
      upstream: CompositeDisposable::new(),
    }))
  }
}

impl<T> PublishSubject<T> {
  pub fn new() -> Self { Self::default() }

  pub fn observer_count(&self) -> usize { lock(&self.0.state).observers.len() }

  fn snapshot(&self) -> Vec<Entry<T>> {
    let state = lock(&self.0.state);
    if state.terminal.is_some() {
      return Vec::new();
    }
    state.observers.iter().map(|(_, o)| o.clone()).collect()
  }
}

impl<T: Clone + Send + 'static> PublishSubject<T> {
  /// Records the terminal event and hands back everyone who should get it.
  fn terminate(&self, terminal: Notification<T>) -> Vec<Entry<T>> {
    let mut state = lock(&self.0.state);
    if state.terminal.is_some() {
      return Vec::new();
    }
    state.terminal = Some(terminal);
    state.observers.drain(..).map(|(_, o)| o).collect()
  }

  fn finish(&self, terminal: Notification<T>) {
    let observers = self.terminate(terminal.clone());
    for observer in observers {
      terminal.clone().deliver(&mut *lock(&observer));
    }
    self.0.upstream.dispose();
  }
}

impl<T: Clone + Send + 'static> Observable<T> for PublishSubject<T> {
  fn subscribe<O: Observer<T> + 'static>(&self, mut observer: O) {
    let id = {
      let mut state = lock(&self.0.state);
      state.next_id += 1;
      state.next_id
    };
    let subject: Weak<SubjectInner<T>> = Arc::downgrade(&self.0);
    observer.set_upstream(DisposableHandle::from_fn(move || {
      if let Some(inner) = subject.upgrade() {
        inner.remove(id);
      }
    }));
    if observer.is_disposed() {
      return;
    }

    let entry: Entry<T> = Arc::new(Mutex::new(Box::new(observer)));
    let terminal = {
      let mut state = lock(&self.0.state);
      match &state.terminal {
        Some(terminal) => Some(terminal.clone()),
        None => {
          state.observers.push((id, entry.clone()));
          None
        }
      }
    };
    if let Some(terminal) = terminal {
      terminal.deliver(&mut *lock(&entry));
    }
  }
}

impl<T: Clone + Send + 'static> Observer<T> for PublishSubject<T> {
  fn on_next(&mut self, value: T) {
    for observer in self.snapshot() {
      let mut observer = lock(&observer);
      if !observer.is_disposed() {
        observer.on_next(value.clone());
      }
    }
  }

  fn on_error(&mut self, err: RxError) { self.finish(Notification::Error(err)) }

  fn on_completed(&mut self) { self.finish(Notification::Completed) }

  fn is_disposed(&self) -> bool { lock(&self.0.state).terminal.is_some() }

  fn set_upstream(&mut self, upstream: DisposableHandle) { self.0.upstream.add(upstream) }
}

/// One window emitted by `window_toggle`: a hot stream of the source values
/// that arrive while it is open.
pub struct Window<T>(PublishSubject<T>);

impl<T> Clone for Window<T> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T> Window<T> {
  pub(crate) fn new(subject: PublishSubject<T>) -> Self { Self(subject) }
}

impl<T: Clone + Send + 'static> Observable<T> for Window<T> {
  fn subscribe<O: Observer<T> + 'static>(&self, observer: O) { self.0.subscribe(observer) }
}
