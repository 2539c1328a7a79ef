//! Delivery contract of a single subscription.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use common::{Event, Recorder};
use ferry_observable::{Cleanup, Observable, Observer, Sink, Subscription};
use parking_lot::Mutex;

#[test]
fn test_delivers_values_then_completes() {
    let observable: Observable<u32, String> = Observable::from_values(vec![1, 2, 3]);
    let recorder = Recorder::new();

    let subscription = observable.subscribe(recorder.observer());

    assert_eq!(
        recorder.events(),
        vec![Event::Next(1), Event::Next(2), Event::Next(3), Event::Complete]
    );
    assert!(subscription.is_closed());
}

#[test]
fn test_each_subscribe_runs_the_producer() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let observable: Observable<usize, String> = Observable::create(move |sink| {
        let call = counter.fetch_add(1, Ordering::SeqCst);
        sink.next(call);
        sink.complete();
        Ok(Cleanup::none())
    });

    let first = Recorder::new();
    let second = Recorder::new();
    observable.subscribe(first.observer());
    observable.subscribe(second.observer());

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(first.events(), vec![Event::Next(0), Event::Complete]);
    assert_eq!(second.events(), vec![Event::Next(1), Event::Complete]);
}

#[test]
fn test_ignores_events_after_terminal() {
    let observable: Observable<u32, String> = Observable::create(|sink| {
        sink.next(1);
        sink.complete();
        sink.next(2);
        sink.error("late".to_string());
        sink.complete();
        Ok(Cleanup::none())
    });
    let recorder = Recorder::new();

    observable.subscribe(recorder.observer());

    assert_eq!(recorder.events(), vec![Event::Next(1), Event::Complete]);
}

#[test]
fn test_producer_error_is_delivered_not_returned() {
    let observable: Observable<u32, String> = Observable::create(|sink| {
        sink.next(1);
        Err("setup failed".to_string())
    });
    let recorder = Recorder::new();

    let subscription = observable.subscribe(recorder.observer());

    assert_eq!(
        recorder.events(),
        vec![Event::Next(1), Event::Error("setup failed".to_string())]
    );
    assert!(subscription.is_closed());
}

#[test]
fn test_cleanup_runs_once_on_complete() {
    let cleanups = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&cleanups);
    let held: Arc<Mutex<Option<Sink<u32, String>>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&held);
    let observable = Observable::create(move |sink| {
        *slot.lock() = Some(sink);
        let counter = Arc::clone(&counter);
        Ok(Cleanup::from_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
    });
    let recorder = Recorder::new();

    let subscription = observable.subscribe(recorder.observer());
    let sink = held.lock().take().unwrap();
    sink.complete();
    subscription.unsubscribe();
    sink.complete();

    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.events(), vec![Event::Complete]);
}

#[test]
fn test_cleanup_runs_immediately_when_completed_during_producer() {
    let cleanups = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&cleanups);
    let observable: Observable<u32, String> = Observable::create(move |sink| {
        sink.complete();
        let counter = Arc::clone(&counter);
        Ok(Cleanup::from_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
    });

    observable.subscribe(Observer::new());

    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unsubscribe_is_idempotent() {
    let cleanups = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&cleanups);
    let held: Arc<Mutex<Option<Sink<u32, String>>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&held);
    let observable = Observable::create(move |sink| {
        *slot.lock() = Some(sink);
        let counter = Arc::clone(&counter);
        Ok(Cleanup::from_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
    });
    let recorder = Recorder::new();

    let subscription = observable.subscribe(recorder.observer());
    subscription.unsubscribe();
    subscription.unsubscribe();
    subscription.clone().unsubscribe();

    let sink = held.lock().take().unwrap();
    sink.next(1);
    sink.complete();

    assert!(sink.is_closed());
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.events(), vec![Event::Unsubscribe]);
}

#[test]
fn test_unsubscribe_from_start_skips_producer() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let observable: Observable<u32, String> = Observable::create(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Cleanup::none())
    });

    let subscription =
        observable.subscribe(Observer::new().on_start(Subscription::unsubscribe));

    assert!(subscription.is_closed());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unsubscribe_from_inside_next() {
    let observable: Observable<u32, String> = Observable::from_values(vec![1, 2, 3]);
    let received = Arc::new(Mutex::new(Vec::new()));
    let current = Arc::new(Mutex::new(None::<Subscription>));

    let start = Arc::clone(&current);
    let values = Arc::clone(&received);
    observable.subscribe(
        Observer::new()
            .on_start(move |subscription| *start.lock() = Some(subscription.clone()))
            .on_next(move |value| {
                values.lock().push(value);
                if let Some(subscription) = current.lock().clone() {
                    subscription.unsubscribe();
                }
            }),
    );

    assert_eq!(*received.lock(), vec![1]);
}

#[tokio::test]
async fn test_no_delivery_after_unsubscribe_returns() {
    let observable: Observable<u32, String> = Observable::create(|sink| {
        let handle = tokio::spawn(async move {
            for value in 0.. {
                sink.next(value);
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });
        // Keep the task alive past unsubscribe; the sink must absorb emissions.
        drop(handle);
        Ok(Cleanup::none())
    });
    let recorder: Recorder<u32, String> = Recorder::new();

    let subscription = observable.subscribe(recorder.observer());
    tokio::time::sleep(Duration::from_millis(20)).await;
    subscription.unsubscribe();
    let seen = recorder.events().len();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(recorder.events().len(), seen);
    assert_eq!(recorder.events().last(), Some(&Event::Unsubscribe));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_delivery_after_unsubscribe_returns_across_threads() {
    let observable: Observable<u32, String> = Observable::create(|sink| {
        std::thread::spawn(move || {
            let mut value: u32 = 0;
            while !sink.is_closed() {
                sink.next(value);
                value = value.wrapping_add(1);
            }
        });
        Ok(Cleanup::none())
    });

    for _ in 0..200 {
        let returned = Arc::new(AtomicBool::new(false));
        let late = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(AtomicUsize::new(0));
        let (check, count, seen) = (Arc::clone(&returned), Arc::clone(&late), Arc::clone(&received));

        let subscription = observable.subscribe(Observer::new().on_next(move |_| {
            if check.load(Ordering::SeqCst) {
                count.fetch_add(1, Ordering::SeqCst);
            }
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        while received.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        subscription.unsubscribe();
        returned.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(late.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn test_from_future_is_cancelled_on_unsubscribe() {
    let finished = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&finished);
    let observable: Observable<u32, String> = Observable::from_future(move || {
        let counter = Arc::clone(&counter);
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        }
    });
    let recorder = Recorder::new();

    let subscription = observable.subscribe(recorder.observer());
    subscription.unsubscribe();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(finished.load(Ordering::SeqCst), 0);
    assert_eq!(recorder.events(), vec![Event::Unsubscribe]);
}

#[tokio::test]
async fn test_from_future_delivers_value() {
    let observable: Observable<u32, String> = Observable::from_future(|| async { Ok(7) });

    assert_eq!(observable.to_future().await, Ok(Some(7)));
}

#[tokio::test]
async fn test_from_stream_forwards_items_and_error() {
    let observable: Observable<u32, String> = Observable::from_stream(|| {
        futures::stream::iter(vec![Ok(1), Ok(2), Err("boom".to_string()), Ok(3)])
    });
    let recorder = Recorder::new();

    observable.subscribe(recorder.observer());
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(
        recorder.events(),
        vec![
            Event::Next(1),
            Event::Next(2),
            Event::Error("boom".to_string())
        ]
    );
}

#[tokio::test]
async fn test_into_stream_yields_values_until_complete() {
    use futures::StreamExt;

    let observable: Observable<u32, String> = Observable::from_values(vec![1, 2]);

    let items: Vec<_> = observable.into_stream().collect().await;

    assert_eq!(items, vec![Ok(1), Ok(2)]);
}
