//! Routing of `Network::execute` across the subscription, polling and fetch
//! paths.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use common::{Event, Recorder, init_tracing, operation, payload, variables};
use ferry_network::{
    CacheConfig, Error, GraphQlResponse, Network, ObservableFromValue, Observer, OperationKind,
    TransportError, Uploadable, UploadableMap, fetch_fn, subscribe_fn,
};
use parking_lot::Mutex;
use serde_json::json;

fn uploads() -> UploadableMap {
    HashMap::from([(
        "file".to_string(),
        Uploadable::new("avatar.png", b"\x89PNG".to_vec()).with_content_type("image/png"),
    )])
}

fn counting_network(calls: &Arc<AtomicUsize>) -> Network {
    let calls = Arc::clone(calls);
    Network::create(fetch_fn(move |_, _, _, _| {
        calls.fetch_add(1, Ordering::SeqCst);
        ObservableFromValue::Value(GraphQlResponse::default())
    }))
}

#[test]
fn test_query_emits_payload_then_completes() {
    init_tracing();
    let network = Network::create(fetch_fn(|_, variables, _, _| {
        assert_eq!(variables.get("id"), Some(&json!("1")));
        ObservableFromValue::Value(payload(json!({"id": "1", "name": "Alice"})))
    }));
    let recorder = Recorder::new();

    network
        .execute(
            &operation(OperationKind::Query),
            &variables(json!({"id": "1"})),
            &CacheConfig::default(),
            None,
        )
        .unwrap()
        .subscribe(recorder.observer());

    assert_eq!(
        recorder.events(),
        vec![
            Event::Next(payload(json!({"id": "1", "name": "Alice"}))),
            Event::Complete
        ]
    );
}

#[test]
fn test_subscription_without_subscribe_function_is_unsupported() {
    let calls = Arc::new(AtomicUsize::new(0));
    let network = counting_network(&calls);

    let result = network.execute(
        &operation(OperationKind::Subscription),
        &variables(json!({})),
        &CacheConfig::default(),
        None,
    );

    assert_matches!(result, Err(Error::UnsupportedOperation(_)));
    assert!(!network.supports_subscriptions());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unsupported_takes_priority_over_uploads() {
    let calls = Arc::new(AtomicUsize::new(0));
    let network = counting_network(&calls);

    let result = network.execute(
        &operation(OperationKind::Subscription),
        &variables(json!({})),
        &CacheConfig::default(),
        Some(&uploads()),
    );

    assert_matches!(result, Err(Error::UnsupportedOperation(_)));
}

#[test]
fn test_subscription_with_uploads_is_invalid() {
    let calls = Arc::new(AtomicUsize::new(0));
    let network = counting_network(&calls).with_subscribe(subscribe_fn(|_, _, _| {
        ObservableFromValue::Value(GraphQlResponse::default())
    }));

    let result = network.execute(
        &operation(OperationKind::Subscription),
        &variables(json!({})),
        &CacheConfig::default(),
        Some(&uploads()),
    );

    assert_matches!(result, Err(Error::InvalidUsage(message)) if message.contains("subscriptions"));
}

#[test]
fn test_poll_with_uploads_is_invalid_and_never_fetches() {
    let calls = Arc::new(AtomicUsize::new(0));
    let network = counting_network(&calls);

    let result = network.execute(
        &operation(OperationKind::Query),
        &variables(json!({})),
        &CacheConfig::default().with_poll_ms(5000),
        Some(&uploads()),
    );

    assert_matches!(result, Err(Error::InvalidUsage(message)) if message.contains("polling"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_poll_with_empty_uploads_is_allowed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let network = counting_network(&calls);

    let subscription = network
        .execute(
            &operation(OperationKind::Query),
            &variables(json!({})),
            &CacheConfig::default().with_poll_ms(1000),
            Some(&UploadableMap::new()),
        )
        .unwrap()
        .subscribe(Observer::new());

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    subscription.unsubscribe();
}

#[tokio::test(start_paused = true)]
async fn test_poll_emits_each_cycle_without_overlap() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let overlapped = Arc::new(AtomicUsize::new(0));
    let forced = Arc::new(Mutex::new(Vec::new()));

    let (counter, active, overlaps, seen) = (
        Arc::clone(&calls),
        Arc::clone(&in_flight),
        Arc::clone(&overlapped),
        Arc::clone(&forced),
    );
    let network = Network::create(fetch_fn(move |_, _, config, _| {
        seen.lock().push(config.force);
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        let active = Arc::clone(&active);
        let overlaps = Arc::clone(&overlaps);
        ObservableFromValue::future(async move {
            if active.fetch_add(1, Ordering::SeqCst) > 0 {
                overlaps.fetch_add(1, Ordering::SeqCst);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(payload(json!({"n": n})))
        })
    }));
    let recorder = Recorder::new();
    let config = CacheConfig::default().with_poll_ms(1000);

    let subscription = network
        .execute(
            &operation(OperationKind::Query),
            &variables(json!({})),
            &config,
            None,
        )
        .unwrap()
        .subscribe(recorder.observer());

    tokio::time::sleep(Duration::from_millis(1000)).await;
    tokio::time::sleep(Duration::from_millis(1000)).await;

    assert_eq!(
        recorder.events(),
        vec![
            Event::Next(payload(json!({"n": 1}))),
            Event::Next(payload(json!({"n": 2})))
        ]
    );
    assert_eq!(overlapped.load(Ordering::SeqCst), 0);
    assert_eq!(*forced.lock(), vec![true, true]);
    assert!(!config.force);

    subscription.unsubscribe();
    tokio::time::sleep(Duration::from_millis(5000)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_fetch_receives_arguments_unchanged() {
    let received = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&received);
    let network = Network::create(fetch_fn(move |params, variables, config, uploadables| {
        *slot.lock() = Some((
            params.name.clone(),
            variables.clone(),
            config.clone(),
            uploadables.cloned(),
        ));
        ObservableFromValue::Value(GraphQlResponse::default())
    }));
    let config = CacheConfig::default().with_metadata(json!({"trace": "abc"}));

    network
        .execute(
            &operation(OperationKind::Mutation),
            &variables(json!({"input": {"name": "avatar"}})),
            &config,
            Some(&uploads()),
        )
        .unwrap()
        .subscribe(Observer::new());

    let (name, seen_variables, seen_config, seen_uploads) = received.lock().take().unwrap();
    assert_eq!(name, "TestOperation");
    assert_eq!(seen_variables, variables(json!({"input": {"name": "avatar"}})));
    assert_eq!(seen_config, config);
    assert_eq!(seen_uploads, Some(uploads()));
}

#[tokio::test]
async fn test_subscription_streams_until_server_completes() {
    let network = Network::create(fetch_fn(|_, _, _, _| {
        ObservableFromValue::Error(TransportError::Other("unexpected fetch".to_string()))
    }))
    .with_subscribe(subscribe_fn(|_, _, config| {
        assert_eq!(config.poll, Some(Duration::from_millis(1000)));
        ObservableFromValue::stream(futures::stream::iter(vec![
            Ok(payload(json!({"message": "hi"}))),
            Ok(payload(json!({"message": "there"}))),
        ]))
    }));
    let recorder = Recorder::new();

    network
        .execute(
            &operation(OperationKind::Subscription),
            &variables(json!({})),
            &CacheConfig::default().with_poll_ms(1000),
            None,
        )
        .unwrap()
        .subscribe(recorder.observer());
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(
        recorder.events(),
        vec![
            Event::Next(payload(json!({"message": "hi"}))),
            Event::Next(payload(json!({"message": "there"}))),
            Event::Complete
        ]
    );
}

#[tokio::test]
async fn test_transport_error_is_delivered_through_the_stream() {
    let network = Network::create(fetch_fn(|_, _, _, _| {
        ObservableFromValue::future(async {
            Err(TransportError::Http {
                status: 500,
                body: "internal".to_string(),
            })
        })
    }));
    let recorder: Recorder<GraphQlResponse> = Recorder::new();

    let observable = network.execute(
        &operation(OperationKind::Query),
        &variables(json!({})),
        &CacheConfig::default(),
        None,
    );
    assert!(observable.is_ok());
    observable.unwrap().subscribe(recorder.observer());
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(
        recorder.events(),
        vec![Event::Error(TransportError::Http {
            status: 500,
            body: "internal".to_string()
        })]
    );
}

#[test]
fn test_immediate_error_is_not_returned_from_execute() {
    let network = Network::create(fetch_fn(|_, _, _, _| {
        ObservableFromValue::Error(TransportError::Request("offline".to_string()))
    }));
    let recorder: Recorder<GraphQlResponse> = Recorder::new();

    network
        .execute(
            &operation(OperationKind::Query),
            &variables(json!({})),
            &CacheConfig::default(),
            None,
        )
        .unwrap()
        .subscribe(recorder.observer());

    assert_eq!(
        recorder.events(),
        vec![Event::Error(TransportError::Request("offline".to_string()))]
    );
}

#[test]
fn test_execute_is_lazy_and_each_subscribe_fetches() {
    let calls = Arc::new(AtomicUsize::new(0));
    let network = counting_network(&calls);

    let observable = network
        .execute(
            &operation(OperationKind::Query),
            &variables(json!({})),
            &CacheConfig::default(),
            None,
        )
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    observable.subscribe(Observer::new());
    observable.subscribe(Observer::new());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unsubscribe_aborts_in_flight_fetch() {
    let finished = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&finished);
    let network = Network::create(fetch_fn(move |_, _, _, _| {
        let counter = Arc::clone(&counter);
        ObservableFromValue::future(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(GraphQlResponse::default())
        })
    }));
    let recorder = Recorder::new();

    let subscription = network
        .execute(
            &operation(OperationKind::Query),
            &variables(json!({})),
            &CacheConfig::default(),
            None,
        )
        .unwrap()
        .subscribe(recorder.observer());
    subscription.unsubscribe();
    subscription.unsubscribe();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(finished.load(Ordering::SeqCst), 0);
    assert_eq!(recorder.events(), vec![Event::Unsubscribe]);
}

#[test]
fn test_fetch_may_return_an_observable() {
    let network = Network::create(fetch_fn(|_, _, _, _| {
        ObservableFromValue::Observable(ferry_network::Observable::from_values(vec![
            payload(json!({"step": 1})),
            payload(json!({"step": 2})),
        ]))
    }));
    let recorder = Recorder::new();

    network
        .execute(
            &operation(OperationKind::Query),
            &variables(json!({})),
            &CacheConfig::default(),
            None,
        )
        .unwrap()
        .subscribe(recorder.observer());

    assert_eq!(
        recorder.events(),
        vec![
            Event::Next(payload(json!({"step": 1}))),
            Event::Next(payload(json!({"step": 2}))),
            Event::Complete
        ]
    );
}

#[test]
#[should_panic(expected = "Tokio")]
fn test_polling_outside_a_runtime_panics() {
    let calls = Arc::new(AtomicUsize::new(0));

    counting_network(&calls)
        .execute(
            &operation(OperationKind::Query),
            &variables(json!({})),
            &CacheConfig::default().with_poll_ms(100),
            None,
        )
        .unwrap()
        .subscribe(Observer::new());
}
