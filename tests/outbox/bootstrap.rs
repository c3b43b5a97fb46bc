use relaybus::bootstrap::{
    self, Channel, EventStoreMiddleware, Filter, Service, State, CERT_UPDATE, CONFIG_CREATE,
    CONFIG_LIST, CONFIG_REMOVE, CONFIG_UPDATE, CONFIG_VIEW, STREAM, THING_BOOTSTRAP,
    THING_DISCONNECT, THING_STATE_CHANGE, THING_UPDATE_CONNECTIONS,
};
use relaybus::outbox::{InMemoryEventStore, OutboxError, StoreError};

use crate::support::{config, outbox, MockConfigService, EXTERNAL_KEY, VALID_TOKEN};

fn service(store: &InMemoryEventStore) -> EventStoreMiddleware<MockConfigService> {
    EventStoreMiddleware::new(MockConfigService::default(), outbox(store, STREAM))
}

fn operations(store: &InMemoryEventStore) -> Vec<String> {
    store
        .entries(STREAM)
        .into_iter()
        .map(|e| e.values["operation"].clone())
        .collect()
}

// --- Happy path ---

#[test]
fn add_emits_config_create() {
    let store = InMemoryEventStore::new();
    let svc = service(&store);

    let saved = svc.add(VALID_TOKEN, config("t1")).unwrap();
    assert_eq!(saved.owner, "user@example.com");

    let entries = store.entries(STREAM);
    assert_eq!(entries.len(), 1);
    let values = &entries[0].values;
    assert_eq!(values["operation"], CONFIG_CREATE);
    assert_eq!(values["thing_id"], "t1");
    assert_eq!(values["owner"], "user@example.com");
    assert_eq!(values["channels"], "c1");
    assert!(values.contains_key("occurred_at"));
}

#[test]
fn every_operation_emits_its_event() {
    let store = InMemoryEventStore::new();
    let svc = service(&store);

    svc.add(VALID_TOKEN, config("t1")).unwrap();
    svc.view(VALID_TOKEN, "t1").unwrap();
    svc.update(VALID_TOKEN, config("t1")).unwrap();
    svc.update_cert(VALID_TOKEN, "t1-key", "cert", "key", "ca").unwrap();
    svc.update_connections(VALID_TOKEN, "t1", vec!["c1".into(), "c2".into()])
        .unwrap();
    svc.list(VALID_TOKEN, Filter::default(), 0, 10).unwrap();
    svc.bootstrap(EXTERNAL_KEY, "t1-external", false).unwrap();
    svc.change_state(VALID_TOKEN, "t1", State::Active).unwrap();
    svc.update_channel_handler(Channel {
        id: "c2".into(),
        name: "renamed".into(),
        ..Default::default()
    })
    .unwrap();
    svc.disconnect_thing_handler("c2", "t1").unwrap();
    svc.remove_channel_handler("c1").unwrap();
    svc.remove_config_handler("t1").unwrap();
    svc.remove(VALID_TOKEN, "t1").unwrap();

    assert_eq!(
        operations(&store),
        vec![
            CONFIG_CREATE,
            CONFIG_VIEW,
            CONFIG_UPDATE,
            CERT_UPDATE,
            THING_UPDATE_CONNECTIONS,
            CONFIG_LIST,
            THING_BOOTSTRAP,
            THING_STATE_CHANGE,
            bootstrap::CHANNEL_HANDLER_UPDATE,
            THING_DISCONNECT,
            bootstrap::CHANNEL_HANDLER_REMOVE,
            bootstrap::CONFIG_HANDLER_REMOVE,
            CONFIG_REMOVE,
        ]
    );
}

#[test]
fn event_fields_follow_call_inputs() {
    let store = InMemoryEventStore::new();
    let svc = service(&store);
    svc.add(VALID_TOKEN, config("t1")).unwrap();

    svc.update_connections(VALID_TOKEN, "t1", vec!["c1".into(), "c2".into()])
        .unwrap();
    svc.change_state(VALID_TOKEN, "t1", State::Active).unwrap();

    let entries = store.entries(STREAM);
    assert_eq!(entries[1].values["channels"], "c1,c2");
    assert_eq!(entries[2].values["state"], "1");
    assert_eq!(entries[2].values["thing_id"], "t1");
}

// --- Failures ---

#[test]
fn failed_call_emits_nothing() {
    let store = InMemoryEventStore::new();
    let svc = service(&store);

    let err = svc.add("wrong", config("t1")).unwrap_err();
    assert!(matches!(err, bootstrap::Error::AuthenticationFailed));

    let err = svc.bootstrap(EXTERNAL_KEY, "unknown", false).unwrap_err();
    assert!(matches!(err, bootstrap::Error::NotFound));

    assert!(store.is_empty(STREAM));
    assert_eq!(svc.outbox().pending(), 0);
}

#[test]
fn store_outage_is_invisible_to_callers() {
    let store = InMemoryEventStore::new();
    let svc = service(&store);

    store.set_available(false);
    let saved = svc.add(VALID_TOKEN, config("t1")).unwrap();
    assert_eq!(saved.thing_id, "t1");
    assert_eq!(svc.outbox().pending(), 1);
    assert!(store.is_empty(STREAM));

    store.set_available(true);
    let result = svc.outbox().flush().unwrap();
    assert_eq!(result.published, 1);
    assert_eq!(svc.outbox().pending(), 0);

    let entries = store.entries(STREAM);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].values["thing_id"], "t1");
    assert_eq!(entries[0].values["operation"], CONFIG_CREATE);
}

#[test]
fn slow_store_is_treated_as_unreachable() {
    let store = InMemoryEventStore::new();
    store.set_latency(std::time::Duration::from_millis(500));
    let svc = service(&store);

    svc.remove(VALID_TOKEN, "t1").unwrap();
    assert_eq!(svc.outbox().pending(), 1);
    assert!(store.is_empty(STREAM));
}

#[test]
fn rejected_append_fails_mutations_but_not_queries() {
    let store = InMemoryEventStore::new();
    let svc = service(&store);
    svc.add(VALID_TOKEN, config("t1")).unwrap();

    store.fail_next_appends(1);
    let err = svc.remove(VALID_TOKEN, "t1").unwrap_err();
    assert!(matches!(
        err,
        bootstrap::Error::Outbox(OutboxError::Append(StoreError::Rejected(_)))
    ));

    store.fail_next_appends(1);
    svc.list(VALID_TOKEN, Filter::default(), 0, 10).unwrap();

    // Refused events are not retried later.
    assert_eq!(svc.outbox().pending(), 0);
    svc.outbox().flush().unwrap();
    assert_eq!(operations(&store), vec![CONFIG_CREATE]);
}
