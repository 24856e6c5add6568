use std::{marker::PhantomData, sync::Arc};

use crate::{
  coordinator::{Coordinator, CoordinatorState},
  disposable::{CompositeDisposable, Disposable, DisposableHandle, RefCountDisposable},
  error::RxError,
  observable::Observable,
  observer::Observer,
  scheduler::CurrentThread,
  subject::{PublishSubject, Window},
};

/// Splits the source into windows opened by `openings` and closed by the
/// observable the closing selector derives from each opening value.
///
/// Every window holds a reference on the operator's subscriptions, so the
/// source keeps feeding open windows after the downstream unsubscribed; it
/// is released once the last window closes.
pub struct WindowToggle<S, Open, F, U, V> {
  source: S,
  openings: Open,
  closing_selector: Arc<F>,
  _hint: PhantomData<fn(U) -> V>,
}

impl<S: Clone, Open: Clone, F, U, V> Clone for WindowToggle<S, Open, F, U, V> {
  fn clone(&self) -> Self {
    Self {
      source: self.source.clone(),
      openings: self.openings.clone(),
      closing_selector: self.closing_selector.clone(),
      _hint: PhantomData,
    }
  }
}

impl<S, Open, F, U, V> WindowToggle<S, Open, F, U, V> {
  pub fn new(source: S, openings: Open, closing_selector: F) -> Self {
    Self { source, openings, closing_selector: Arc::new(closing_selector), _hint: PhantomData }
  }
}

struct OpenWindow<T> {
  id: u64,
  subject: PublishSubject<T>,
  /// This window's reference on the operator's subscriptions.
  hold: DisposableHandle,
}

struct WindowState<T> {
  windows: Vec<OpenWindow<T>>,
  next_id: u64,
}

type WindowCoordinator<T, O> = Coordinator<Window<T>, WindowState<T>, O>;
type Locked<T, O> = CoordinatorState<Window<T>, WindowState<T>, O>;

/// Completes every open window, handing back their references so they are
/// released outside the lock.
fn complete_all<T, O>(s: &mut Locked<T, O>) -> Vec<DisposableHandle>
where
  T: Clone + Send + 'static,
  O: Observer<Window<T>>,
{
  s.state
    .windows
    .drain(..)
    .map(|mut w| {
      w.subject.on_completed();
      w.hold
    })
    .collect()
}

fn fail_all<T, O>(coordinator: &WindowCoordinator<T, O>, err: RxError)
where
  T: Clone + Send + 'static,
  O: Observer<Window<T>>,
{
  let holds = coordinator.with_state(|s| {
    let holds = s
      .state
      .windows
      .drain(..)
      .map(|mut w| {
        w.subject.on_error(err.clone());
        w.hold
      })
      .collect::<Vec<_>>();
    s.error(err);
    holds
  });
  release(holds);
}

fn release(holds: Vec<DisposableHandle>) {
  for hold in holds {
    hold.dispose();
  }
}

impl<T, S, Open, F, C, U, V> Observable<Window<T>> for WindowToggle<S, Open, F, U, V>
where
  T: Clone + Send + 'static,
  S: Observable<T>,
  Open: Observable<U>,
  F: Fn(U) -> C + Send + Sync + 'static,
  C: Observable<V>,
  U: Send + 'static,
  V: Send + 'static,
{
  fn subscribe<O: Observer<Window<T>> + 'static>(&self, observer: O) {
    let state = WindowState { windows: Vec::new(), next_id: 0 };
    let (coordinator, ref_count) = Coordinator::with_ref_count(state, observer);
    CurrentThread::own_queue(|| {
      self.openings.subscribe(OpeningObserver {
        upstream: coordinator.add_source(),
        coordinator: coordinator.clone(),
        ref_count,
        closing_selector: self.closing_selector.clone(),
        _hint: PhantomData::<fn(U) -> V>,
      });
      self.source.subscribe(SourceObserver { upstream: coordinator.add_source(), coordinator });
    });
  }
}

// ==================== Source ====================

struct SourceObserver<T, O> {
  coordinator: WindowCoordinator<T, O>,
  upstream: CompositeDisposable,
}

impl<T, O> Observer<T> for SourceObserver<T, O>
where
  T: Clone + Send + 'static,
  O: Observer<Window<T>> + 'static,
{
  fn on_next(&mut self, value: T) {
    self.coordinator.with_state(|s| {
      if s.is_terminated() {
        return;
      }
      for window in s.state.windows.iter_mut() {
        window.subject.on_next(value.clone());
      }
    });
  }

  fn on_error(&mut self, err: RxError) { fail_all(&self.coordinator, err) }

  fn on_completed(&mut self) {
    let holds = self.coordinator.with_state(|s| {
      let holds = complete_all(s);
      s.complete();
      holds
    });
    release(holds);
  }

  fn is_disposed(&self) -> bool { self.upstream.is_disposed() }

  fn set_upstream(&mut self, upstream: DisposableHandle) { self.upstream.add(upstream) }
}

// ==================== Openings ====================

struct OpeningObserver<T, O, F, U, V> {
  coordinator: WindowCoordinator<T, O>,
  ref_count: RefCountDisposable,
  closing_selector: Arc<F>,
  upstream: CompositeDisposable,
  _hint: PhantomData<fn(U) -> V>,
}

impl<T, O, F, C, U, V> Observer<U> for OpeningObserver<T, O, F, U, V>
where
  T: Clone + Send + 'static,
  O: Observer<Window<T>> + 'static,
  F: Fn(U) -> C + Send + Sync + 'static,
  C: Observable<V>,
  V: Send + 'static,
{
  fn on_next(&mut self, value: U) {
    let closing = (self.closing_selector)(value);
    let hold = self.ref_count.add_ref();
    if hold.is_disposed() {
      return;
    }
    let opened = self.coordinator.with_state(|s| {
      if s.is_closed() {
        return None;
      }
      let id = s.state.next_id;
      s.state.next_id += 1;
      let subject = PublishSubject::new();
      s.state.windows.push(OpenWindow { id, subject: subject.clone(), hold: hold.clone() });
      s.emit(Window::new(subject));
      Some(id)
    });
    let Some(id) = opened else {
      hold.dispose();
      return;
    };
    closing.subscribe(ClosingObserver::<T, O, V> {
      upstream: self.coordinator.add_source(),
      coordinator: self.coordinator.clone(),
      id,
      _item: PhantomData,
    });
  }

  fn on_error(&mut self, err: RxError) { fail_all(&self.coordinator, err) }

  fn on_completed(&mut self) { self.coordinator.remove_source(&self.upstream) }

  fn is_disposed(&self) -> bool { self.upstream.is_disposed() }

  fn set_upstream(&mut self, upstream: DisposableHandle) { self.upstream.add(upstream) }
}

// ==================== Closings ====================

struct ClosingObserver<T, O, V> {
  coordinator: WindowCoordinator<T, O>,
  id: u64,
  upstream: CompositeDisposable,
  _item: PhantomData<fn(V)>,
}

impl<T, O, V> ClosingObserver<T, O, V>
where
  T: Clone + Send + 'static,
  O: Observer<Window<T>>,
{
  fn close(&mut self) {
    let id = self.id;
    let hold = self.coordinator.with_state(|s| {
      let pos = s.state.windows.iter().position(|w| w.id == id)?;
      let mut window = s.state.windows.remove(pos);
      window.subject.on_completed();
      Some(window.hold)
    });
    self.coordinator.remove_source(&self.upstream);
    self.upstream.dispose();
    if let Some(hold) = hold {
      hold.dispose();
    }
  }
}

impl<T, O, V> Observer<V> for ClosingObserver<T, O, V>
where
  T: Clone + Send + 'static,
  O: Observer<Window<T>> + 'static,
  V: Send + 'static,
{
  fn on_next(&mut self, _: V) { self.close() }

  fn on_error(&mut self, err: RxError) { fail_all(&self.coordinator, err) }

  fn on_completed(&mut self) { self.close() }

  fn is_disposed(&self) -> bool { self.upstream.is_disposed() }

  fn set_upstream(&mut self, upstream: DisposableHandle) { self.upstream.add(upstream) }
}
