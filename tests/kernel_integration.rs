//! Integration tests for rxkernel
//!
//! Operator chains across schedulers and threads, checked against the
//! delivery guarantees: no overlapping calls, one terminal event, and
//! transitive disposal.

use std::{
  sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    mpsc, Arc, Mutex,
  },
  thread,
  time::Duration as StdDuration,
};

use rxkernel::prelude::*;

type Log = Arc<Mutex<Vec<String>>>;

fn log_all<T, S>(source: &S, log: &Log) -> DisposableHandle
where
  T: std::fmt::Debug + Send + 'static,
  S: Observable<T>,
{
  let (n, e, c) = (log.clone(), log.clone(), log.clone());
  source.subscribe_all(
    move |v| n.lock().unwrap().push(format!("{v:?}")),
    move |err| e.lock().unwrap().push(format!("error {err}")),
    move || c.lock().unwrap().push("complete".to_owned()),
  )
}

#[rxkernel_macro::test]
fn error_waits_for_the_emission_in_flight() {
  let log = Log::default();
  let busy = Arc::new(AtomicBool::new(false));
  let overlapped = Arc::new(AtomicBool::new(false));
  let first = PublishSubject::<i32>::new();
  let second = PublishSubject::<i32>::new();

  let (n_log, n_busy, n_overlap) = (log.clone(), busy.clone(), overlapped.clone());
  let (e_log, e_busy, e_overlap) = (log.clone(), busy.clone(), overlapped.clone());
  first.clone().merge_with(second.clone()).subscribe_all(
    move |v| {
      if n_busy.swap(true, Ordering::SeqCst) {
        n_overlap.store(true, Ordering::SeqCst);
      }
      thread::sleep(StdDuration::from_millis(50));
      n_log.lock().unwrap().push(format!("next {v}"));
      n_busy.store(false, Ordering::SeqCst);
    },
    move |err| {
      if e_busy.load(Ordering::SeqCst) {
        e_overlap.store(true, Ordering::SeqCst);
      }
      e_log.lock().unwrap().push(format!("error {err}"));
    },
    || {},
  );

  let emitting = {
    let mut first = first.clone();
    thread::spawn(move || first.on_next(1))
  };
  thread::sleep(StdDuration::from_millis(10));
  let failing = {
    let mut second = second.clone();
    thread::spawn(move || second.on_error(RxError::msg("boom")))
  };
  emitting.join().unwrap();
  failing.join().unwrap();

  assert!(!overlapped.load(Ordering::SeqCst));
  assert_eq!(*log.lock().unwrap(), vec!["next 1", "error boom"]);
}

#[rxkernel_macro::test]
fn only_the_first_terminal_event_is_delivered() {
  let terminals = Arc::new(AtomicUsize::new(0));
  let mut a = PublishSubject::<i32>::new();
  let mut b = PublishSubject::<i32>::new();
  let (e, c) = (terminals.clone(), terminals.clone());
  a.clone().zip(b.clone()).subscribe_all(
    |_| {},
    move |_| {
      e.fetch_add(1, Ordering::SeqCst);
    },
    move || {
      c.fetch_add(1, Ordering::SeqCst);
    },
  );

  a.on_next(1);
  b.on_next(2);
  a.on_error(RxError::msg("first"));
  b.on_completed();
  b.on_error(RxError::msg("second"));
  a.on_completed();
  assert_eq!(terminals.load(Ordering::SeqCst), 1);
}

#[rxkernel_macro::test]
fn racing_terminal_events_deliver_once() {
  for _ in 0..50 {
    let terminals = Arc::new(AtomicUsize::new(0));
    let sources: Vec<_> = (0..4).map(|_| PublishSubject::<i32>::new()).collect();
    let merged = sources[0]
      .clone()
      .merge_with(sources[1].clone())
      .merge_with(sources[2].clone().merge_with(sources[3].clone()));
    let (e, c) = (terminals.clone(), terminals.clone());
    merged.subscribe_all(
      |_| {},
      move |_| {
        e.fetch_add(1, Ordering::SeqCst);
      },
      move || {
        c.fetch_add(1, Ordering::SeqCst);
      },
    );

    let threads: Vec<_> = sources
      .into_iter()
      .enumerate()
      .map(|(i, mut source)| {
        thread::spawn(move || {
          source.on_next(i as i32);
          if i % 2 == 0 {
            source.on_error(RxError::msg("racing"));
          } else {
            source.on_completed();
          }
        })
      })
      .collect();
    for t in threads {
      t.join().unwrap();
    }
    assert_eq!(terminals.load(Ordering::SeqCst), 1);
  }
}

#[rxkernel_macro::test]
fn disposing_the_outer_subscription_reaches_every_source() {
  TestScheduler::init();
  let log = Log::default();
  let subject = PublishSubject::<usize>::new();
  let chain = subject
    .clone()
    .merge_with(TestScheduler::interval(Duration::from_millis(10)))
    .combine_latest(TestScheduler::interval(Duration::from_millis(25)))
    .delay(Duration::from_millis(1), TestScheduler);
  let handle = log_all(&chain, &log);

  TestScheduler::advance_by(Duration::from_millis(26));
  assert_eq!(*log.lock().unwrap(), vec!["(1, 0)"]);
  assert_eq!(subject.observer_count(), 1);

  handle.dispose();
  handle.dispose();
  assert!(handle.is_disposed());
  assert_eq!(subject.observer_count(), 0);
  TestScheduler::advance_by(Duration::from_millis(100));
  assert_eq!(log.lock().unwrap().len(), 1);
  assert!(TestScheduler::is_empty());
}

#[rxkernel_macro::test]
fn zip_pairs_values_from_two_threads() {
  let (sender, receiver) = mpsc::channel();
  let done = sender.clone();
  NewThread::from_iter(0..100)
    .zip(NewThread::from_iter(100..200))
    .subscribe_all(
      move |pair| {
        let _ = sender.send(Some(pair));
      },
      |_| {},
      move || {
        let _ = done.send(None);
      },
    );

  let mut pairs = vec![];
  while let Some(pair) = receiver.recv_timeout(StdDuration::from_secs(5)).unwrap() {
    pairs.push(pair);
  }
  assert_eq!(pairs, (0..100).map(|i| (i, i + 100)).collect::<Vec<_>>());
}

#[rxkernel_macro::test]
fn switching_between_timed_inner_streams() {
  TestScheduler::init();
  let log = Log::default();
  let mut outer = PublishSubject::<Interval<TestScheduler>>::new();
  log_all(&outer.clone().switch_on_next::<usize>(), &log);

  outer.on_next(TestScheduler::interval(Duration::from_millis(10)));
  TestScheduler::advance_by(Duration::from_millis(25));
  outer.on_next(TestScheduler::interval(Duration::from_millis(4)));
  TestScheduler::advance_by(Duration::from_millis(9));
  assert_eq!(*log.lock().unwrap(), vec!["0", "1", "0", "1"]);

  outer.on_completed();
  assert_eq!(log.lock().unwrap().len(), 4);
}

#[rxkernel_macro::test]
fn timeouts_are_retried_up_to_the_bound() {
  TestScheduler::init();
  let log = Log::default();
  let subscriptions = Arc::new(AtomicUsize::new(0));
  let c_subscriptions = subscriptions.clone();
  let source = Immediate::defer(move || {
    c_subscriptions.fetch_add(1, Ordering::SeqCst);
    Ok(Immediate::never::<i32>())
  });
  log_all(&source.timeout(Duration::from_millis(10), TestScheduler).retry(2), &log);

  TestScheduler::advance_by(Duration::from_millis(29));
  assert!(log.lock().unwrap().is_empty());
  TestScheduler::advance_by(Duration::from_millis(1));
  assert_eq!(subscriptions.load(Ordering::SeqCst), 3);
  assert_eq!(*log.lock().unwrap(), vec!["error timed out waiting for the next event"]);
}

#[rxkernel_macro::test]
fn observe_on_serializes_emissions_from_many_threads() {
  let (sender, receiver) = mpsc::channel();
  let busy = Arc::new(AtomicBool::new(false));
  let overlapped = Arc::new(AtomicBool::new(false));
  let source = PublishSubject::<i32>::new();
  let (c_busy, c_overlap) = (busy.clone(), overlapped.clone());
  source.clone().observe_on(NewThread).subscribe_next(move |v| {
    if c_busy.swap(true, Ordering::SeqCst) {
      c_overlap.store(true, Ordering::SeqCst);
    }
    let _ = sender.send(v);
    c_busy.store(false, Ordering::SeqCst);
  });

  let threads: Vec<_> = (0..4)
    .map(|t| {
      let mut source = source.clone();
      thread::spawn(move || (0..25).for_each(|i| source.on_next(t * 100 + i)))
    })
    .collect();
  for t in threads {
    t.join().unwrap();
  }

  let mut received: Vec<_> = (0..100)
    .map(|_| receiver.recv_timeout(StdDuration::from_secs(5)).unwrap())
    .collect();
  assert!(!overlapped.load(Ordering::SeqCst));
  received.sort_unstable();
  let mut expected: Vec<_> = (0..4).flat_map(|t| (0..25).map(move |i| t * 100 + i)).collect();
  expected.sort_unstable();
  assert_eq!(received, expected);
}

#[rxkernel_macro::test(shared)]
async fn task_handles_can_be_awaited() {
  let ran = Arc::new(AtomicBool::new(false));
  let worker = NewThread.create_worker();
  let handle = worker.schedule(
    Task::new(ran.clone(), |ran| {
      ran.store(true, Ordering::SeqCst);
      TaskState::Finished
    }),
    Some(Duration::from_millis(10)),
  );
  handle.clone().await;
  assert!(ran.load(Ordering::SeqCst));

  let cancelled = worker.schedule(Task::new((), |_| TaskState::Finished), Some(Duration::from_secs(60)));
  cancelled.dispose();
  cancelled.await;
  worker.dispose();
}
