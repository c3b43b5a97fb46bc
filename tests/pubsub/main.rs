//! Publish/subscribe integration tests.
//!
//! These run against the in-process broker; the `nats` and `amqp` modules
//! repeat the core cases against live servers and are ignored by default.

mod support;


use std::sync::Arc;

use relaybus::bus::{connect, Bus, InMemoryBroker};
use relaybus::topic::SUBJECT_ALL_CHANNELS;
use relaybus::{BrokerConfig, Error, Publisher, Subscriber};

use support::{telemetry, TestHandler, QUIET_PERIOD, RECV_TIMEOUT};

// --- Subscribe ---

#[test]
fn subscribe_validates_input() {
    let broker = InMemoryBroker::new();
    let (handler, _rx) = TestHandler::new();

    let cases = [
        ("empty topic", "client", "", "empty topic"),
        ("empty id", "", "channels.c1", "empty id"),
    ];
    for (desc, id, topic, expected) in cases {
        let err = broker.subscribe(id, topic, handler.clone()).unwrap_err();
        assert_eq!(err.to_string(), expected, "{}", desc);
    }
    assert_eq!(broker.subscription_count(), 0);
}

#[test]
fn subscribe_to_all_channels_receives_every_channel() {
    let broker = InMemoryBroker::new();
    let (handler, rx) = TestHandler::new();
    broker
        .subscribe("writer", SUBJECT_ALL_CHANNELS, handler)
        .unwrap();

    broker.publish("c1", &telemetry("c1", "", "1")).unwrap();
    broker.publish("c2", &telemetry("c2", "engine", "2")).unwrap();

    let first = rx.recv_timeout(RECV_TIMEOUT).unwrap();
    let second = rx.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(first.channel, "c1");
    assert_eq!(second.channel, "c2");
    assert_eq!(second.subtopic, "engine");
}

#[test]
fn resubscribe_with_failing_cancel_keeps_original() {
    let broker = InMemoryBroker::new();
    let (original, original_rx) = TestHandler::failing_cancel();
    let (replacement, replacement_rx) = TestHandler::new();

    broker.subscribe("client", "channels.c1", original.clone()).unwrap();
    let err = broker
        .subscribe("client", "channels.c1", replacement)
        .unwrap_err();
    assert!(matches!(err, Error::HandlerCancel(_)));
    assert_eq!(original.cancels(), 1);

    broker.publish("c1", &telemetry("c1", "", "still here")).unwrap();
    let msg = original_rx.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(msg.payload_str(), Some("still here"));
    assert!(replacement_rx.recv_timeout(QUIET_PERIOD).is_err());
}

#[test]
fn resubscribe_replaces_handler() {
    let broker = InMemoryBroker::new();
    let (first, first_rx) = TestHandler::new();
    let (second, second_rx) = TestHandler::new();

    broker.subscribe("client", "channels.c1", first.clone()).unwrap();
    broker.subscribe("client", "channels.c1", second).unwrap();
    assert_eq!(first.cancels(), 1);
    assert_eq!(broker.subscription_count(), 1);

    broker.publish("c1", &telemetry("c1", "", "x")).unwrap();
    assert!(second_rx.recv_timeout(RECV_TIMEOUT).is_ok());
    assert!(first_rx.recv_timeout(QUIET_PERIOD).is_err());
}

// --- Unsubscribe ---

#[test]
fn unsubscribe_lifecycle() {
    let broker = InMemoryBroker::new();
    let (handler, _rx) = TestHandler::new();

    assert!(matches!(
        broker.unsubscribe("client", "channels.c1"),
        Err(Error::NotSubscribed)
    ));

    broker.subscribe("client", "channels.c1", handler.clone()).unwrap();
    broker.unsubscribe("client", "channels.c1").unwrap();
    assert_eq!(handler.cancels(), 1);

    assert!(matches!(
        broker.unsubscribe("client", "channels.c1"),
        Err(Error::NotSubscribed)
    ));
}

#[test]
fn unsubscribe_validates_input() {
    let broker = InMemoryBroker::new();
    assert!(matches!(broker.unsubscribe("client", ""), Err(Error::EmptyTopic)));
    assert!(matches!(broker.unsubscribe("", "channels.c1"), Err(Error::EmptyId)));
}

#[test]
fn unsubscribe_with_failing_cancel_still_removes() {
    let broker = InMemoryBroker::new();
    let (handler, rx) = TestHandler::failing_cancel();
    broker.subscribe("client", "channels.c1", handler).unwrap();

    let err = broker.unsubscribe("client", "channels.c1").unwrap_err();
    assert!(matches!(err, Error::HandlerCancel(_)));
    assert!(!broker.is_subscribed("client", "channels.c1"));

    broker.publish("c1", &telemetry("c1", "", "x")).unwrap();
    assert!(rx.recv_timeout(QUIET_PERIOD).is_err());
}

#[test]
fn unsubscribe_stops_delivery() {
    let broker = InMemoryBroker::new();
    let (handler, rx) = TestHandler::new();
    broker.subscribe("client", "channels.c1.>", handler).unwrap();
    broker.unsubscribe("client", "channels.c1.>").unwrap();

    broker.publish("c1", &telemetry("c1", "engine", "x")).unwrap();
    assert!(rx.recv_timeout(QUIET_PERIOD).is_err());
}

// --- Publish ---

#[test]
fn publish_routes_by_wildcard() {
    let broker = InMemoryBroker::new();
    let (wildcard, wildcard_rx) = TestHandler::new();
    let (exact, exact_rx) = TestHandler::new();
    let (other, other_rx) = TestHandler::new();

    broker.subscribe("a", "channels.C.>", wildcard).unwrap();
    broker.subscribe("b", "channels.C.engine", exact).unwrap();
    broker.subscribe("c", "channels.D.>", other).unwrap();

    broker.publish("C", &telemetry("C", "engine", "on")).unwrap();

    assert_eq!(
        wildcard_rx.recv_timeout(RECV_TIMEOUT).unwrap().subtopic,
        "engine"
    );
    assert_eq!(exact_rx.recv_timeout(RECV_TIMEOUT).unwrap().subtopic, "engine");
    assert!(other_rx.recv_timeout(QUIET_PERIOD).is_err());
}

#[test]
fn wildcard_matches_channel_without_subtopic() {
    let broker = InMemoryBroker::new();
    let (handler, rx) = TestHandler::new();
    broker.subscribe("a", "channels.C.>", handler).unwrap();

    broker.publish("C", &telemetry("C", "", "bare")).unwrap();
    assert_eq!(rx.recv_timeout(RECV_TIMEOUT).unwrap().payload_str(), Some("bare"));
}

#[test]
fn publish_preserves_every_field() {
    let broker = InMemoryBroker::recording();
    let (handler, rx) = TestHandler::new();
    broker.subscribe("a", "channels.c1.>", handler).unwrap();

    let sent = telemetry("c1", "room/temp", "21.5");
    broker.publish("c1", &sent).unwrap();

    let received = rx.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(received, sent);
    assert_eq!(
        broker.published()[0].0,
        "channels.c1.room.temp",
        "subtopic is sanitized into the subject"
    );
}

#[test]
fn publish_rejects_empty_topic() {
    let broker = InMemoryBroker::recording();
    let err = broker.publish("", &telemetry("c1", "", "x")).unwrap_err();
    assert!(matches!(err, Error::EmptyTopic));
    assert!(broker.published().is_empty());
}

#[test]
fn publish_requires_matching_channel() {
    let broker = InMemoryBroker::recording();

    let err = broker.publish("c1", &telemetry("", "", "x")).unwrap_err();
    assert!(matches!(err, Error::EmptyChannel));
    let err = broker.publish("c1", &telemetry("c2", "", "x")).unwrap_err();
    assert!(matches!(err, Error::MalformedTopic(_)));

    assert!(broker.published().is_empty());
}

#[test]
fn publish_surfaces_connection_errors() {
    let broker = InMemoryBroker::new();
    broker.set_available(false);
    let err = broker.publish("c1", &telemetry("c1", "", "x")).unwrap_err();
    assert!(matches!(err, Error::Connection(_)));
}

// --- Bus and lifecycle ---

#[test]
fn bus_from_config_is_transport_agnostic() {
    let bus: Bus = connect(&BrokerConfig::default()).unwrap();
    let (handler, rx) = TestHandler::new();
    bus.subscribe("svc", "channels.>", handler).unwrap();

    let producer = bus.clone();
    std::thread::spawn(move || {
        producer
            .publish("c9", &telemetry("c9", "status", "ok"))
            .unwrap();
    })
    .join()
    .unwrap();

    assert_eq!(rx.recv_timeout(RECV_TIMEOUT).unwrap().channel, "c9");
}

#[test]
fn close_cancels_subscriptions_and_rejects_calls() {
    let broker = InMemoryBroker::new();
    let bus = Bus::from_shared(Arc::new(broker.clone()));
    let (handler, _rx) = TestHandler::new();
    bus.subscribe("svc", "channels.>", handler.clone()).unwrap();

    bus.close().unwrap();
    bus.close().unwrap();

    assert_eq!(handler.cancels(), 1);
    assert_eq!(broker.subscription_count(), 0);
    assert!(matches!(
        bus.publish("c1", &telemetry("c1", "", "x")),
        Err(Error::Closed)
    ));
    let (late, _late_rx) = TestHandler::new();
    assert!(matches!(
        bus.subscribe("svc", "channels.>", late),
        Err(Error::Closed)
    ));
}
