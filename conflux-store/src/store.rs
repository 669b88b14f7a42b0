//! The primary store and its mutation path.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::index::{BucketIndex, IndexId, Lookup, SecondaryIndex};
use conflux_channel::{follow, EventChannel, Feed, Subscription};
use conflux_types::{Entry, EventKind, LifecycleEvent};
use parking_lot::RwLock;
use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

type Identity<K, V> = Box<dyn Fn(&V) -> Option<K> + Send + Sync>;

/// A key-value store whose keys are derived from the values.
///
/// Cloning the store yields another handle to the same data.
pub struct IndexedStore<K, V> {
    shared: Arc<Shared<K, V>>,
}

pub(crate) struct Shared<K, V> {
    pub(crate) config: StoreConfig,
    identity: Identity<K, V>,
    pub(crate) state: RwLock<StoreState<K, V>>,
}

pub(crate) struct StoreState<K, V> {
    data: HashMap<K, V>,
    pub(crate) indices: Vec<Box<dyn SecondaryIndex<K, V>>>,
    next_index: u64,
    events: EventChannel<Entry<K, V>>,
    closed: bool,
}

impl<K, V> StoreState<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn insert(&mut self, key: K, value: V) -> StoreResult<Option<V>> {
        for index in &self.indices {
            index.validate(&value)?;
        }

        let previous = self.data.insert(key.clone(), value.clone());
        let kind = if previous.is_some() {
            EventKind::Update
        } else {
            EventKind::Add
        };
        self.events.emit(kind, Entry::new(key.clone(), value.clone()))?;

        for index in &mut self.indices {
            index.upsert(&key, &value)?;
        }
        Ok(previous)
    }

    fn evict<Q>(&mut self, key: &Q) -> StoreResult<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some((key, value)) = self.data.remove_entry(key) else {
            return Ok(None);
        };
        self.events.emit(EventKind::Remove, Entry::new(key.clone(), value.clone()))?;

        for index in &mut self.indices {
            index.remove(&key)?;
        }
        Ok(Some(value))
    }
}

impl<K, V> Clone for IndexedStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, V> fmt::Debug for IndexedStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.read();
        f.debug_struct("IndexedStore")
            .field("name", &self.shared.config.name)
            .field("len", &state.data.len())
            .field("indices", &state.indices.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl<K, V> IndexedStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a store that keys every value by `identity`.
    #[must_use]
    pub fn new<I>(identity: I) -> Self
    where
        I: Fn(&V) -> Option<K> + Send + Sync + 'static,
    {
        Self::with_config(identity, StoreConfig::default())
    }

    /// Creates a store with explicit configuration.
    #[must_use]
    pub fn with_config<I>(identity: I, config: StoreConfig) -> Self
    where
        I: Fn(&V) -> Option<K> + Send + Sync + 'static,
    {
        let events = EventChannel::new(config.channel.clone());
        Self {
            shared: Arc::new(Shared {
                config,
                identity: Box::new(identity),
                state: RwLock::new(StoreState {
                    data: HashMap::new(),
                    indices: Vec::new(),
                    next_index: 1,
                    events,
                    closed: false,
                }),
            }),
        }
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    /// Derives the key of `value` without storing it.
    pub fn identity_of(&self, value: &V) -> StoreResult<K> {
        (self.shared.identity)(value)
            .ok_or_else(|| StoreError::InvalidIdentity(self.shared.config.name.clone()))
    }

    /// Stores `value` under its identity, returning the value it replaced.
    ///
    /// Emits `Add` for a new key and `Update` otherwise. Every index
    /// projection is evaluated before anything changes, so a failing
    /// projection leaves the store untouched.
    pub fn add(&self, value: V) -> StoreResult<Option<V>> {
        let key = self.identity_of(&value)?;
        let mut state = self.shared.state.write();
        state.ensure_open()?;

        let previous = state.insert(key, value)?;
        debug!(
            store = %self.shared.config.name,
            replaced = previous.is_some(),
            len = state.data.len(),
            "stored value"
        );
        Ok(previous)
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.state.read().data.get(key).cloned()
    }

    /// Returns true if a value is stored under `key`.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.state.read().data.contains_key(key)
    }

    /// Removes the value stored under `key`, returning it.
    ///
    /// Removing an absent key is not an error and emits nothing.
    pub fn remove<Q>(&self, key: &Q) -> StoreResult<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut state = self.shared.state.write();
        state.ensure_open()?;

        let removed = state.evict(key)?;
        if removed.is_some() {
            debug!(store = %self.shared.config.name, len = state.data.len(), "removed value");
        }
        Ok(removed)
    }

    /// Removes every value, one at a time.
    ///
    /// Each value produces its own `Remove` event and index updates. The
    /// whole operation holds the write lock, so no other mutation interleaves.
    pub fn clear(&self) -> StoreResult<usize> {
        let mut state = self.shared.state.write();
        state.ensure_open()?;

        let keys: Vec<K> = state.data.keys().cloned().collect();
        for key in &keys {
            state.evict(key)?;
        }
        debug!(store = %self.shared.config.name, removed = keys.len(), "cleared store");
        Ok(keys.len())
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state.read().data.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.state.read().data.is_empty()
    }

    /// Snapshot of all keys.
    #[must_use]
    pub fn keys(&self) -> HashSet<K> {
        self.shared.state.read().data.keys().cloned().collect()
    }

    /// Snapshot of all values, in no particular order.
    #[must_use]
    pub fn values(&self) -> Vec<V> {
        self.shared.state.read().data.values().cloned().collect()
    }

    /// Registers a single-valued secondary index and back-fills it.
    pub fn create_index<L, P>(&self, projection: P) -> StoreResult<Lookup<K, L, V>>
    where
        L: Eq + Hash + Clone + Send + Sync + 'static,
        P: Fn(&V) -> Option<L> + Send + Sync + 'static,
    {
        self.create_multi_index(move |value| projection(value).map(|key| vec![key]))
    }

    /// Registers a multi-valued secondary index and back-fills it.
    ///
    /// A value appears in the bucket of every key its projection yields.
    pub fn create_multi_index<L, P>(&self, projection: P) -> StoreResult<Lookup<K, L, V>>
    where
        L: Eq + Hash + Clone + Send + Sync + 'static,
        P: Fn(&V) -> Option<Vec<L>> + Send + Sync + 'static,
    {
        let mut state = self.shared.state.write();
        state.ensure_open()?;

        let id = IndexId(state.next_index);
        let mut index = BucketIndex::new(
            id,
            self.shared.config.index_channel(id.0),
            Box::new(projection),
        );
        for value in state.data.values() {
            index.validate(value)?;
        }
        for (key, value) in &state.data {
            index.upsert(key, value)?;
        }

        state.next_index += 1;
        state.indices.push(Box::new(index));
        debug!(
            store = %self.shared.config.name,
            index = id.0,
            backfilled = state.data.len(),
            "registered index"
        );
        Ok(Lookup::new(Arc::downgrade(&self.shared), id))
    }

    /// Number of registered indices.
    #[must_use]
    pub fn index_count(&self) -> usize {
        self.shared.state.read().indices.len()
    }

    /// Subscribes to entry events, starting with a synthetic `Add` for every
    /// stored entry.
    pub fn observe(&self) -> Subscription<Entry<K, V>> {
        let state = self.shared.state.read();
        state.events.observe_with(|| {
            state
                .data
                .iter()
                .map(|(key, value)| Entry::new(key.clone(), value.clone()))
                .collect::<Vec<_>>()
        })
    }

    /// Subscribes to entry events without replay.
    pub fn observe_live(&self) -> Subscription<Entry<K, V>> {
        self.shared.state.read().events.observe_live()
    }

    /// Applies a lifecycle event from an external source.
    ///
    /// `Add` and `Update` store the value; `Remove` removes whatever is stored
    /// under the removed value's identity.
    pub fn apply(&self, event: LifecycleEvent<V>) -> StoreResult<()> {
        match event.kind {
            EventKind::Add | EventKind::Update => self.add(event.value).map(|_| ()),
            EventKind::Remove => {
                let key = self.identity_of(&event.value)?;
                self.remove(&key).map(|_| ())
            }
        }
    }

    /// Feeds every event of `source`, including its replay, into this store.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe(&self, source: &EventChannel<V>) -> Feed {
        let store = self.clone();
        follow(
            format!("{}.subscribe", self.shared.config.name),
            source.observe(),
            move |event| store.apply(event),
        )
    }

    /// Closes the store, its indices and every channel.
    ///
    /// Reads keep working; later mutations fail with [`StoreError::Closed`].
    pub fn close(&self) {
        let mut state = self.shared.state.write();
        if state.closed {
            return;
        }
        state.closed = true;
        for index in state.indices.drain(..) {
            index.close();
        }
        state.events.close();
        debug!(store = %self.shared.config.name, "store closed");
    }

    /// Returns true once the store has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.state.read().closed
    }
}
