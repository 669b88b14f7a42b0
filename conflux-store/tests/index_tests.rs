mod common;

use common::{pair_store, s, upper_case_store};
use conflux_store::{IndexBucket, StoreError};
use conflux_types::{EventKind, LifecycleEvent};
use pretty_assertions::assert_eq;
use std::collections::HashSet;

fn letters(value: &String) -> Option<Vec<char>> {
    Some(value.chars().collect())
}

// ── Single-valued index ───────────────────────────────────────────

#[test]
fn create_lookup() {
    let store = upper_case_store();
    let by_length = store.create_index(|v: &String| Some(v.len())).unwrap();

    store.add(s("foo")).unwrap();
    store.add(s("bar")).unwrap();
    store.add(s("foobar")).unwrap();

    assert_eq!(by_length.get(&3), vec![s("foo"), s("bar")]);
    assert_eq!(by_length.get(&6), vec![s("foobar")]);
    assert_eq!(by_length.keys(), HashSet::from([3, 6]));

    let mut sub = by_length.observe_live().unwrap();
    store.remove("BAR").unwrap();

    assert_eq!(by_length.get(&3), vec![s("foo")]);
    assert_eq!(
        sub.drain().unwrap(),
        vec![LifecycleEvent::update(IndexBucket::new(3, vec![s("foo")]))]
    );
}

#[test]
fn index_is_backfilled_on_creation() {
    let store = upper_case_store();
    store.add(s("foo")).unwrap();
    store.add(s("foobar")).unwrap();

    let by_length = store.create_index(|v: &String| Some(v.len())).unwrap();
    assert_eq!(by_length.get(&3), vec![s("foo")]);
    assert_eq!(by_length.get(&6), vec![s("foobar")]);
    assert_eq!(store.index_count(), 1);
}

#[test]
fn bucket_lifecycle_events() {
    let store = upper_case_store();
    let by_length = store.create_index(|v: &String| Some(v.len())).unwrap();
    let mut sub = by_length.observe().unwrap();

    store.add(s("foo")).unwrap();
    store.add(s("bar")).unwrap();
    store.remove("FOO").unwrap();
    store.remove("BAR").unwrap();

    assert_eq!(
        sub.drain().unwrap(),
        vec![
            LifecycleEvent::add(IndexBucket::new(3, vec![s("foo")])),
            LifecycleEvent::update(IndexBucket::new(3, vec![s("foo"), s("bar")])),
            LifecycleEvent::update(IndexBucket::new(3, vec![s("bar")])),
            LifecycleEvent::remove(IndexBucket::new(3, vec![s("bar")])),
        ]
    );
    assert!(!by_length.contains_key(&3));
    assert_eq!(by_length.bucket(&3), None);
}

#[test]
fn value_moving_between_buckets() {
    let store = pair_store();
    let by_group = store.create_index(|v: &(String, u32)| Some(v.1)).unwrap();
    store.add((s("a"), 1)).unwrap();
    store.add((s("b"), 1)).unwrap();
    let mut sub = by_group.observe_live().unwrap();

    store.add((s("a"), 2)).unwrap();

    assert_eq!(by_group.get(&1), vec![(s("b"), 1)]);
    assert_eq!(by_group.get(&2), vec![(s("a"), 2)]);
    assert_eq!(
        sub.drain().unwrap(),
        vec![
            LifecycleEvent::update(IndexBucket::new(1, vec![(s("b"), 1)])),
            LifecycleEvent::add(IndexBucket::new(2, vec![(s("a"), 2)])),
        ]
    );
}

#[test]
fn update_in_place_keeps_bucket() {
    let store = upper_case_store();
    let by_length = store.create_index(|v: &String| Some(v.len())).unwrap();
    store.add(s("foo")).unwrap();
    let mut sub = by_length.observe_live().unwrap();

    store.add(s("FOO")).unwrap();

    assert_eq!(by_length.get(&3), vec![s("FOO")]);
    assert_eq!(
        sub.drain().unwrap(),
        vec![LifecycleEvent::update(IndexBucket::new(3, vec![s("FOO")]))]
    );
}

#[test]
fn observe_replays_buckets() {
    let store = upper_case_store();
    let by_length = store.create_index(|v: &String| Some(v.len())).unwrap();
    store.add(s("foo")).unwrap();
    store.add(s("bar")).unwrap();

    let mut sub = by_length.observe().unwrap();
    assert_eq!(
        sub.drain().unwrap(),
        vec![LifecycleEvent::add(IndexBucket::new(3, vec![s("foo"), s("bar")]))]
    );
}

#[test]
fn returned_buckets_are_snapshots() {
    let store = upper_case_store();
    let by_length = store.create_index(|v: &String| Some(v.len())).unwrap();
    store.add(s("foo")).unwrap();

    let mut values = by_length.get(&3);
    values.push(s("bar"));
    values.clear();
    assert_eq!(by_length.get(&3), vec![s("foo")]);
}

#[test]
fn bucket_serializes_key_and_values() {
    let bucket = IndexBucket::new(3, vec![s("foo"), s("bar")]);
    assert_eq!(
        serde_json::to_value(&bucket).unwrap(),
        serde_json::json!({ "key": 3, "values": ["foo", "bar"] })
    );
}

// ── Multi-valued index ────────────────────────────────────────────

#[test]
fn create_multi_lookup() {
    let store = upper_case_store();
    let by_letter = store.create_multi_index(letters).unwrap();

    store.add(s("foo")).unwrap();
    store.add(s("bar")).unwrap();
    store.add(s("baz")).unwrap();

    assert_eq!(by_letter.get(&'f'), vec![s("foo")]);
    assert_eq!(by_letter.get(&'o'), vec![s("foo")]);
    assert_eq!(by_letter.get(&'a'), vec![s("bar"), s("baz")]);
    assert_eq!(by_letter.get(&'b'), vec![s("bar"), s("baz")]);
    assert_eq!(by_letter.get(&'z'), vec![s("baz")]);
    assert_eq!(
        by_letter.keys(),
        HashSet::from(['f', 'o', 'b', 'a', 'r', 'z'])
    );

    store.remove("BAR").unwrap();
    assert_eq!(by_letter.get(&'r'), Vec::<String>::new());
    assert_eq!(by_letter.get(&'a'), vec![s("baz")]);
}

#[test]
fn duplicate_projected_keys_collapse() {
    let store = upper_case_store();
    let by_letter = store.create_multi_index(letters).unwrap();
    let mut sub = by_letter.observe_live().unwrap();

    store.add(s("oo")).unwrap();

    assert_eq!(by_letter.get(&'o'), vec![s("oo")]);
    assert_eq!(
        sub.drain().unwrap(),
        vec![LifecycleEvent::add(IndexBucket::new('o', vec![s("oo")]))]
    );
}

#[test]
fn empty_projection_occupies_no_bucket() {
    let store = upper_case_store();
    let by_letter = store.create_multi_index(letters).unwrap();
    store.add(String::new()).unwrap();

    assert_eq!(store.len(), 1);
    assert!(by_letter.keys().is_empty());
}

// ── Invalid projections ───────────────────────────────────────────

#[test]
fn missing_index_key_leaves_store_untouched() {
    let store = upper_case_store();
    let by_length = store.create_index(|v: &String| Some(v.len())).unwrap();
    let _guarded = store
        .create_index(|v: &String| (!v.starts_with('x')).then(|| v.len()))
        .unwrap();
    store.add(s("foo")).unwrap();
    let mut entries = store.observe_live();
    let mut buckets = by_length.observe_live().unwrap();

    let err = store.add(s("xyz")).unwrap_err();
    assert!(matches!(err, StoreError::InvalidIndexKey(_)));

    assert_eq!(store.len(), 1);
    assert_eq!(by_length.get(&3), vec![s("foo")]);
    assert!(entries.drain().unwrap().is_empty());
    assert!(buckets.drain().unwrap().is_empty());
}

#[test]
fn invalid_backfill_does_not_register() {
    let store = upper_case_store();
    store.add(s("xyz")).unwrap();

    let result = store.create_index(|v: &String| (!v.starts_with('x')).then(|| v.len()));
    assert!(matches!(result, Err(StoreError::InvalidIndexKey(_))));
    assert_eq!(store.index_count(), 0);
    store.add(s("foo")).unwrap();
}

// ── Handles ───────────────────────────────────────────────────────

#[test]
fn closing_lookup_unregisters_index() {
    let store = upper_case_store();
    let by_length = store.create_index(|v: &String| Some(v.len())).unwrap();
    let by_letter = store.create_multi_index(letters).unwrap();
    store.add(s("foo")).unwrap();
    let mut sub = by_length.observe_live().unwrap();

    by_length.close();
    by_length.close();

    assert_eq!(store.index_count(), 1);
    assert!(!by_length.is_registered());
    assert!(by_length.get(&3).is_empty());
    assert_eq!(sub.drain().unwrap(), Vec::new());
    assert!(sub.is_terminated());

    store.add(s("bar")).unwrap();
    assert_eq!(by_letter.get(&'o'), vec![s("foo")]);
    assert_eq!(by_letter.get(&'r'), vec![s("bar")]);
}

#[test]
fn lookup_does_not_keep_store_alive() {
    let store = upper_case_store();
    let by_length = store.create_index(|v: &String| Some(v.len())).unwrap();
    store.add(s("foo")).unwrap();
    assert!(by_length.is_registered());

    drop(store);
    assert!(!by_length.is_registered());
    assert!(by_length.keys().is_empty());
    assert!(matches!(by_length.observe(), Err(StoreError::Closed)));
}

#[test]
fn lookup_events_follow_store_mutations() {
    let store = upper_case_store();
    let by_length = store.create_index(|v: &String| Some(v.len())).unwrap();
    let mut sub = by_length.observe_live().unwrap();
    store.add(s("foo")).unwrap();
    store.clear().unwrap();

    let kinds: Vec<_> = sub.drain().unwrap().into_iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EventKind::Add, EventKind::Remove]);
}
