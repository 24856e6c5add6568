use std::marker::PhantomData;

use crate::{
  disposable::{CompositeDisposable, DisposableHandle},
  error::RxError,
  observable::Observable,
  observer::{BoxedObserver, Forward, Observer},
};

/// An observable driven by a user function.
///
/// Created by [`ObservableFactory::create`](crate::factory::ObservableFactory::create).
/// The function runs once per subscription and receives an [`Emitter`] it
/// may keep, move to another thread, or drop.
pub struct Create<T, F> {
  f: F,
  _item: PhantomData<fn() -> T>,
}

impl<T, F: Clone> Clone for Create<T, F> {
  fn clone(&self) -> Self { Self::new(self.f.clone()) }
}

impl<T, F> Create<T, F> {
  pub fn new(f: F) -> Self { Self { f, _item: PhantomData } }
}

impl<T, F> Observable<T> for Create<T, F>
where
  T: Send + 'static,
  F: Fn(Emitter<T>) + Send + Sync + 'static,
{
  fn subscribe<O: Observer<T> + 'static>(&self, observer: O) {
    let upstream = CompositeDisposable::new();
    let boxed: BoxedObserver<T> = Box::new(observer);
    let forward = Forward::new::<T>(boxed, upstream.clone());
    (self.f)(Emitter { observer: forward, upstream });
  }
}

/// The producer side of a [`Create`] subscription.
///
/// Anything after the first terminal event is ignored.
pub struct Emitter<T> {
  observer: Forward<BoxedObserver<T>>,
  upstream: CompositeDisposable,
}

impl<T: Send + 'static> Emitter<T> {
  pub fn next(&mut self, value: T) { self.observer.on_next(value) }

  pub fn error(&mut self, err: RxError) { self.observer.on_error(err) }

  pub fn complete(&mut self) { self.observer.on_completed() }

  /// The subscriber is gone or the stream already terminated.
  pub fn is_disposed(&self) -> bool { Observer::<T>::is_disposed(&self.observer) }

  /// Registers a resource torn down with the subscription.
  pub fn add_teardown(&self, teardown: DisposableHandle) { self.upstream.add(teardown) }

  /// A handle to the subscription, for producers polling cancellation from
  /// elsewhere.
  pub fn disposable(&self) -> DisposableHandle { self.upstream.handle() }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{Arc, Mutex},
    thread,
  };

  use crate::prelude::*;

  #[rxkernel_macro::test]
  fn emits_until_the_first_terminal() {
    let log = Arc::new(Mutex::new(vec![]));
    let (n, e, c) = (log.clone(), log.clone(), log.clone());
    Immediate::create(|mut emitter: Emitter<i32>| {
      emitter.next(1);
      emitter.next(2);
      emitter.complete();
      emitter.next(3);
      emitter.error(RxError::msg("late"));
    })
    .subscribe_all(
      move |v| n.lock().unwrap().push(format!("next {v}")),
      move |err| e.lock().unwrap().push(format!("error {err}")),
      move || c.lock().unwrap().push("complete".to_owned()),
    );
    assert_eq!(*log.lock().unwrap(), vec!["next 1", "next 2", "complete"]);
  }

  #[rxkernel_macro::test]
  fn teardown_runs_on_dispose() {
    let torn_down = Arc::new(Mutex::new(false));
    let c_torn_down = torn_down.clone();
    let handle = Immediate::create(move |emitter: Emitter<i32>| {
      let flag = c_torn_down.clone();
      emitter.add_teardown(DisposableHandle::from_fn(move || *flag.lock().unwrap() = true));
    })
    .subscribe_next(|_| {});
    assert!(!*torn_down.lock().unwrap());
    handle.dispose();
    assert!(*torn_down.lock().unwrap());
  }

  #[rxkernel_macro::test]
  fn emitter_can_move_to_another_thread() {
    let (tx, rx) = std::sync::mpsc::channel();
    Immediate::create(|mut emitter: Emitter<i32>| {
      thread::spawn(move || {
        for i in 0..3 {
          emitter.next(i);
        }
        emitter.complete();
      });
    })
    .subscribe_all(
      {
        let tx = tx.clone();
        move |v| tx.send(Some(v)).unwrap()
      },
      |_| {},
      move || tx.send(None).unwrap(),
    );
    let got: Vec<_> = rx.iter().take(4).collect();
    assert_eq!(got, vec![Some(0), Some(1), Some(2), None]);
  }
}
