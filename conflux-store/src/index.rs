//! Secondary indices.
//!
//! An index maps projected keys to buckets of store values. Every index is a
//! multi-valued projection internally; a single-valued index wraps its key in
//! a one-element vector.
//!
//! Indices are owned by their store. A [`Lookup`] is a handle holding only a
//! weak reference to the store and the index's [`IndexId`], so handles never
//! keep a store alive.

use crate::error::{StoreError, StoreResult};
use crate::store::Shared;
use conflux_channel::{ChannelConfig, EventChannel, Subscription};
use conflux_types::EventKind;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Weak;
use tracing::debug;

type Projection<L, V> = Box<dyn Fn(&V) -> Option<Vec<L>> + Send + Sync>;

/// Ticket identifying an index within its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexId(pub(crate) u64);

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "index-{}", self.0)
    }
}

/// Snapshot of one index bucket: a key and the values projected onto it.
///
/// Values are in insertion order. A bucket is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexBucket<L, V> {
    pub key: L,
    pub values: Vec<V>,
}

impl<L, V> IndexBucket<L, V> {
    #[must_use]
    pub fn new(key: L, values: Vec<V>) -> Self {
        Self { key, values }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Store-side interface of an index.
///
/// Only the owning store calls these, always under its write lock.
pub(crate) trait SecondaryIndex<K, V>: Send + Sync {
    fn id(&self) -> IndexId;

    /// Fails if the projection yields no key for `value`.
    fn validate(&self, value: &V) -> StoreResult<()>;

    /// Places `value` (stored under `key`) into the buckets of its projection,
    /// leaving any bucket it no longer projects onto.
    fn upsert(&mut self, key: &K, value: &V) -> StoreResult<()>;

    /// Takes the value stored under `key` out of every bucket it occupies.
    fn remove(&mut self, key: &K) -> StoreResult<()>;

    fn close(&self);

    fn as_any(&self) -> &dyn Any;
}

pub(crate) struct BucketIndex<K, L, V> {
    id: IndexId,
    projection: Projection<L, V>,
    buckets: HashMap<L, IndexMap<K, V>>,
    memberships: HashMap<K, Vec<L>>,
    events: EventChannel<IndexBucket<L, V>>,
}

impl<K, L, V> BucketIndex<K, L, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    L: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(id: IndexId, channel: ChannelConfig, projection: Projection<L, V>) -> Self {
        Self {
            id,
            projection,
            buckets: HashMap::new(),
            memberships: HashMap::new(),
            events: EventChannel::new(channel),
        }
    }

    /// Projected keys of `value`, duplicates collapsed, first occurrence kept.
    fn project(&self, value: &V) -> StoreResult<Vec<L>> {
        let keys = (self.projection)(value)
            .ok_or_else(|| StoreError::InvalidIndexKey(self.events.config().name.clone()))?;
        let mut distinct = Vec::with_capacity(keys.len());
        for key in keys {
            if !distinct.contains(&key) {
                distinct.push(key);
            }
        }
        Ok(distinct)
    }

    fn leave(&mut self, key: &K, bucket_key: &L) -> StoreResult<()> {
        let Some(bucket) = self.buckets.get_mut(bucket_key) else {
            return Ok(());
        };
        let Some(removed) = bucket.shift_remove(key) else {
            return Ok(());
        };

        if bucket.is_empty() {
            self.buckets.remove(bucket_key);
            self.events.emit(
                EventKind::Remove,
                IndexBucket::new(bucket_key.clone(), vec![removed]),
            )?;
        } else {
            let snapshot = IndexBucket::new(bucket_key.clone(), bucket.values().cloned().collect());
            self.events.emit(EventKind::Update, snapshot)?;
        }
        Ok(())
    }

    fn bucket<Q>(&self, bucket_key: &Q) -> Option<IndexBucket<L, V>>
    where
        L: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.buckets
            .get_key_value(bucket_key)
            .map(|(key, values)| IndexBucket::new(key.clone(), values.values().cloned().collect()))
    }

    fn snapshot(&self) -> Vec<IndexBucket<L, V>> {
        self.buckets
            .iter()
            .map(|(key, values)| IndexBucket::new(key.clone(), values.values().cloned().collect()))
            .collect()
    }
}

impl<K, L, V> SecondaryIndex<K, V> for BucketIndex<K, L, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    L: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn id(&self) -> IndexId {
        self.id
    }

    fn validate(&self, value: &V) -> StoreResult<()> {
        self.project(value).map(|_| ())
    }

    fn upsert(&mut self, key: &K, value: &V) -> StoreResult<()> {
        let targets = self.project(value)?;
        let previous = self.memberships.remove(key).unwrap_or_default();
        for left in previous.iter().filter(|l| !targets.contains(l)) {
            self.leave(key, left)?;
        }

        for target in &targets {
            let bucket = self.buckets.entry(target.clone()).or_default();
            let kind = if bucket.is_empty() {
                EventKind::Add
            } else {
                EventKind::Update
            };
            bucket.insert(key.clone(), value.clone());
            let snapshot = IndexBucket::new(target.clone(), bucket.values().cloned().collect());
            self.events.emit(kind, snapshot)?;
        }

        self.memberships.insert(key.clone(), targets);
        Ok(())
    }

    fn remove(&mut self, key: &K) -> StoreResult<()> {
        let Some(occupied) = self.memberships.remove(key) else {
            return Ok(());
        };
        for bucket_key in &occupied {
            self.leave(key, bucket_key)?;
        }
        Ok(())
    }

    fn close(&self) {
        self.events.close();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Read handle for a secondary index.
///
/// Reads return empty results once the index is closed or the store is
/// closed or dropped.
pub struct Lookup<K, L, V> {
    store: Weak<Shared<K, V>>,
    id: IndexId,
    _bucket_key: PhantomData<fn() -> L>,
}

impl<K, L, V> Clone for Lookup<K, L, V> {
    fn clone(&self) -> Self {
        Self {
            store: Weak::clone(&self.store),
            id: self.id,
            _bucket_key: PhantomData,
        }
    }
}

impl<K, L, V> fmt::Debug for Lookup<K, L, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lookup").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<K, L, V> Lookup<K, L, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    L: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(store: Weak<Shared<K, V>>, id: IndexId) -> Self {
        Self {
            store,
            id,
            _bucket_key: PhantomData,
        }
    }

    /// The ticket of this index within its store.
    #[must_use]
    pub fn id(&self) -> IndexId {
        self.id
    }

    fn read<R>(&self, f: impl FnOnce(&BucketIndex<K, L, V>) -> R) -> Option<R> {
        let shared = self.store.upgrade()?;
        let state = shared.state.read();
        let index = state
            .indices
            .iter()
            .find(|index| index.id() == self.id)?
            .as_any()
            .downcast_ref::<BucketIndex<K, L, V>>()?;
        Some(f(index))
    }

    /// Values whose projection includes `bucket_key`, in insertion order.
    #[must_use]
    pub fn get<Q>(&self, bucket_key: &Q) -> Vec<V>
    where
        L: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.bucket(bucket_key).map(|bucket| bucket.values).unwrap_or_default()
    }

    /// The bucket for `bucket_key`, if any value projects onto it.
    #[must_use]
    pub fn bucket<Q>(&self, bucket_key: &Q) -> Option<IndexBucket<L, V>>
    where
        L: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.read(|index| index.bucket(bucket_key)).flatten()
    }

    /// Snapshot of every non-empty bucket key.
    #[must_use]
    pub fn keys(&self) -> HashSet<L> {
        self.read(|index| index.buckets.keys().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn contains_key<Q>(&self, bucket_key: &Q) -> bool
    where
        L: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.read(|index| index.buckets.contains_key(bucket_key))
            .unwrap_or(false)
    }

    /// Returns true while the index is registered with a live store.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.read(|_| ()).is_some()
    }

    /// Subscribes to bucket events, starting with a synthetic `Add` for every
    /// current bucket.
    pub fn observe(&self) -> StoreResult<Subscription<IndexBucket<L, V>>> {
        self.read(|index| index.events.observe_with(|| index.snapshot()))
            .ok_or(StoreError::Closed)
    }

    /// Subscribes to bucket events without replay.
    pub fn observe_live(&self) -> StoreResult<Subscription<IndexBucket<L, V>>> {
        self.read(|index| index.events.observe_live())
            .ok_or(StoreError::Closed)
    }

    /// Unregisters the index from its store and closes its channel.
    ///
    /// Closing an index that is already gone is a no-op.
    pub fn close(&self) {
        let Some(shared) = self.store.upgrade() else {
            return;
        };
        let mut state = shared.state.write();
        let Some(position) = state.indices.iter().position(|index| index.id() == self.id) else {
            return;
        };
        let index = state.indices.remove(position);
        index.close();
        debug!(store = %shared.config.name, index = %self.id, "unregistered index");
    }
}
