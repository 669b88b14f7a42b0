mod common;

use common::{pair_store, s, upper_case_store, wait_until};
use conflux_channel::{ChannelConfig, ChannelError, EventChannel};
use conflux_store::{IndexedStore, StoreConfig, StoreError};
use conflux_types::{Entry, EventKind, LifecycleEvent};
use pretty_assertions::assert_eq;
use std::collections::HashSet;

// ── Basic operations ──────────────────────────────────────────────

#[test]
fn simple_operations() {
    let store = upper_case_store();
    assert!(store.is_empty());

    assert_eq!(store.add(s("foo")).unwrap(), None);
    assert_eq!(store.add(s("bar")).unwrap(), None);
    assert_eq!(store.get("FOO"), Some(s("foo")));
    assert_eq!(store.add(s("foo")).unwrap(), Some(s("foo")));

    assert_eq!(store.len(), 2);
    assert_eq!(store.get("FOO"), Some(s("foo")));
    assert_eq!(store.keys(), HashSet::from([s("FOO"), s("BAR")]));
    assert!(store.contains_key("BAR"));
    assert!(!store.contains_key("BAZ"));
}

#[test]
fn add_replaces_value_with_same_identity() {
    let store = upper_case_store();
    store.add(s("foo")).unwrap();
    assert_eq!(store.add(s("FoO")).unwrap(), Some(s("foo")));
    assert_eq!(store.get("FOO"), Some(s("FoO")));
    assert_eq!(store.len(), 1);
}

#[test]
fn missing_identity_is_rejected() {
    let store: IndexedStore<String, String> =
        IndexedStore::new(|value: &String| (!value.is_empty()).then(|| value.clone()));

    let err = store.add(String::new()).unwrap_err();
    assert_eq!(err, StoreError::InvalidIdentity(s("store")));
    assert!(store.is_empty());
}

#[test]
fn remove_returns_previous_value() {
    let store = upper_case_store();
    store.add(s("foo")).unwrap();

    assert_eq!(store.remove("FOO").unwrap(), Some(s("foo")));
    assert_eq!(store.remove("FOO").unwrap(), None);
    assert!(store.is_empty());
}

#[test]
fn values_snapshot() {
    let store = upper_case_store();
    store.add(s("foo")).unwrap();
    store.add(s("bar")).unwrap();

    let mut values = store.values();
    values.sort();
    assert_eq!(values, vec![s("bar"), s("foo")]);
}

#[test]
fn configured_name_appears_in_errors() {
    let store: IndexedStore<String, String> =
        IndexedStore::with_config(|_: &String| None, StoreConfig::named("fragments"));
    assert_eq!(store.config().name, "fragments");
    assert_eq!(
        store.add(s("x")).unwrap_err().to_string(),
        "identity projection produced no key in store fragments"
    );
}

// ── Config ────────────────────────────────────────────────────────

#[test]
fn store_config_from_json_fills_defaults() {
    let config: StoreConfig = serde_json::from_str(r#"{"name": "fragments"}"#).unwrap();
    assert_eq!(config.name, "fragments");
    assert_eq!(config.channel, StoreConfig::default().channel);

    let bounded: StoreConfig = serde_json::from_str(r#"{"channel": {"capacity": 4}}"#).unwrap();
    assert_eq!(bounded.name, "store");
    assert_eq!(bounded.channel.capacity, Some(4));
}

#[test]
fn bounded_config_applies_to_index_channels() {
    let config: StoreConfig =
        serde_json::from_str(r#"{"name": "bounded", "channel": {"capacity": 1}}"#).unwrap();
    let store = IndexedStore::with_config(|value: &String| Some(value.to_uppercase()), config);
    let by_length = store.create_index(|value: &String| Some(value.len())).unwrap();
    let mut sub = by_length.observe_live().unwrap();

    store.add(s("a")).unwrap();
    store.add(s("bb")).unwrap();
    assert_eq!(sub.drain(), Err(ChannelError::Overflow { capacity: 1 }));
}

// ── Events ────────────────────────────────────────────────────────

#[test]
fn mutations_emit_entry_events() {
    let store = upper_case_store();
    let mut sub = store.observe();

    store.add(s("foo")).unwrap();
    store.add(s("Foo")).unwrap();
    store.remove("FOO").unwrap();
    store.remove("FOO").unwrap();

    assert_eq!(
        sub.drain().unwrap(),
        vec![
            LifecycleEvent::add(Entry::new(s("FOO"), s("foo"))),
            LifecycleEvent::update(Entry::new(s("FOO"), s("Foo"))),
            LifecycleEvent::remove(Entry::new(s("FOO"), s("Foo"))),
        ]
    );
}

#[test]
fn observe_replays_current_values() {
    let store = upper_case_store();
    store.add(s("foo")).unwrap();
    store.add(s("bar")).unwrap();
    store.add(s("FOO")).unwrap();
    store.remove("BAR").unwrap();

    let mut sub = store.observe();
    store.add(s("baz")).unwrap();

    assert_eq!(
        sub.drain().unwrap(),
        vec![
            LifecycleEvent::add(Entry::new(s("FOO"), s("FOO"))),
            LifecycleEvent::add(Entry::new(s("BAZ"), s("baz"))),
        ]
    );
}

#[test]
fn observe_live_skips_replay() {
    let store = upper_case_store();
    store.add(s("foo")).unwrap();

    let mut sub = store.observe_live();
    store.add(s("bar")).unwrap();

    assert_eq!(
        sub.drain().unwrap(),
        vec![LifecycleEvent::add(Entry::new(s("BAR"), s("bar")))]
    );
}

#[test]
fn clear_emits_one_remove_per_entry() {
    let store = upper_case_store();
    store.add(s("foo")).unwrap();
    store.add(s("bar")).unwrap();
    let mut sub = store.observe_live();

    assert_eq!(store.clear().unwrap(), 2);
    assert!(store.is_empty());

    let events = sub.drain().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|event| event.kind == EventKind::Remove));
    let removed: HashSet<_> = events.into_iter().map(|event| event.value.key).collect();
    assert_eq!(removed, HashSet::from([s("FOO"), s("BAR")]));
}

// ── External sources ──────────────────────────────────────────────

#[test]
fn apply_translates_lifecycle_events() {
    let store = upper_case_store();
    store.apply(LifecycleEvent::add(s("foo"))).unwrap();
    store.apply(LifecycleEvent::update(s("FOO"))).unwrap();
    assert_eq!(store.get("FOO"), Some(s("FOO")));

    store.apply(LifecycleEvent::remove(s("foo"))).unwrap();
    assert!(store.is_empty());
}

#[tokio::test]
async fn subscribe_follows_source_with_replay() {
    let source = EventChannel::with_existing(ChannelConfig::named("source"), || vec![s("foo")]);
    let store = upper_case_store();
    let feed = store.subscribe(&source);

    wait_until(|| store.contains_key("FOO")).await;

    source.emit(EventKind::Add, s("bar")).unwrap();
    wait_until(|| store.contains_key("BAR")).await;

    source.emit(EventKind::Remove, s("foo")).unwrap();
    wait_until(|| !store.contains_key("FOO")).await;

    feed.cancel();
    assert_eq!(store.keys(), HashSet::from([s("BAR")]));
}

// ── Close ─────────────────────────────────────────────────────────

#[test]
fn mutation_after_close_fails() {
    let store = upper_case_store();
    store.add(s("foo")).unwrap();
    let mut sub = store.observe_live();
    store.close();

    assert!(store.is_closed());
    assert_eq!(store.add(s("bar")), Err(StoreError::Closed));
    assert_eq!(store.remove("FOO"), Err(StoreError::Closed));
    assert_eq!(store.clear(), Err(StoreError::Closed));
    assert!(store.create_index(|v: &String| Some(v.len())).is_err());

    // Reads keep working.
    assert_eq!(store.get("FOO"), Some(s("foo")));
    assert_eq!(sub.drain().unwrap(), Vec::new());
    assert!(sub.is_terminated());
}

#[test]
fn close_closes_indices() {
    let store = upper_case_store();
    store.add(s("foo")).unwrap();
    let lookup = store.create_index(|v: &String| Some(v.len())).unwrap();
    let mut sub = lookup.observe_live().unwrap();

    store.close();
    store.close();

    assert_eq!(store.index_count(), 0);
    assert!(!lookup.is_registered());
    assert_eq!(lookup.get(&3), Vec::<String>::new());
    assert!(lookup.observe().is_err());
    assert_eq!(sub.drain().unwrap(), Vec::new());
    assert!(sub.is_terminated());
}

// ── Concurrency ───────────────────────────────────────────────────

#[test]
fn concurrent_adds_are_all_visible() {
    let store = pair_store();
    let lookup = store.create_index(|v: &(String, u32)| Some(v.1)).unwrap();

    std::thread::scope(|scope| {
        for thread in 0..4u32 {
            let store = store.clone();
            scope.spawn(move || {
                for i in 0..250 {
                    store.add((format!("{thread}-{i}"), i % 10)).unwrap();
                }
            });
        }
    });

    assert_eq!(store.len(), 1000);
    for group in 0..10 {
        assert_eq!(lookup.get(&group).len(), 100);
    }
}

#[test]
fn concurrent_add_and_snapshot_read() {
    let store = upper_case_store();

    let size = std::thread::scope(|scope| {
        let writer = store.clone();
        scope.spawn(move || {
            writer.add(s("foo")).unwrap();
            writer.add(s("bar")).unwrap();
        });
        let reader = store.clone();
        scope.spawn(move || reader.values().len()).join().unwrap()
    });

    assert!(size <= 2);
    assert_eq!(store.len(), 2);
}

#[test]
fn replay_with_concurrent_writer_sees_every_entry_once() {
    let store = upper_case_store();
    for i in 0..100 {
        store.add(format!("pre-{i}")).unwrap();
    }

    let mut sub = std::thread::scope(|scope| {
        let writer = store.clone();
        scope.spawn(move || {
            for i in 0..500 {
                writer.add(format!("live-{i}")).unwrap();
            }
        });
        store.observe()
    });

    let events = sub.drain().unwrap();
    assert!(events.iter().all(|event| event.kind == EventKind::Add));
    let keys: Vec<_> = events.into_iter().map(|event| event.value.key).collect();
    let distinct: HashSet<_> = keys.iter().cloned().collect();
    assert_eq!(keys.len(), distinct.len());
    assert_eq!(distinct, store.keys());
    assert_eq!(distinct.len(), 600);
}
