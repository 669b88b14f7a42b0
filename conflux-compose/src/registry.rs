//! Store-backed fragment registry.

use crate::error::ComposeResult;
use conflux_channel::{EventChannel, Feed, Subscription};
use conflux_store::{IndexedStore, Lookup, StoreConfig};
use conflux_types::{Entry, Fragment};
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

/// Fragments keyed by fragment id, with a secondary index by composition key.
///
/// Pair it with [`CompositionEngine::follow_registry`](crate::CompositionEngine::follow_registry)
/// to compose whatever the registry holds.
pub struct FragmentRegistry<F, K, C> {
    store: IndexedStore<F, Fragment<F, K, C>>,
    by_composition_key: Lookup<F, K, Fragment<F, K, C>>,
}

impl<F, K, C> Clone for FragmentRegistry<F, K, C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            by_composition_key: self.by_composition_key.clone(),
        }
    }
}

impl<F, K, C> fmt::Debug for FragmentRegistry<F, K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentRegistry")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<F, K, C> FragmentRegistry<F, K, C>
where
    F: Eq + Hash + Clone + Send + Sync + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    pub fn new() -> ComposeResult<Self> {
        Self::with_config(StoreConfig::named("fragments"))
    }

    pub fn with_config(config: StoreConfig) -> ComposeResult<Self> {
        let store = IndexedStore::with_config(
            |fragment: &Fragment<F, K, C>| Some(fragment.fragment_id().clone()),
            config,
        );
        let by_composition_key =
            store.create_index(|fragment: &Fragment<F, K, C>| Some(fragment.composition_key().clone()))?;
        Ok(Self {
            store,
            by_composition_key,
        })
    }

    /// Stores `fragment`, returning the fragment it replaced.
    pub fn register(&self, fragment: Fragment<F, K, C>) -> ComposeResult<Option<Fragment<F, K, C>>> {
        Ok(self.store.add(fragment)?)
    }

    /// Removes the fragment `fragment_id`, returning it.
    pub fn revoke(&self, fragment_id: &F) -> ComposeResult<Option<Fragment<F, K, C>>> {
        Ok(self.store.remove(fragment_id)?)
    }

    #[must_use]
    pub fn get(&self, fragment_id: &F) -> Option<Fragment<F, K, C>> {
        self.store.get(fragment_id)
    }

    /// Fragments registered under `composition_key`, in registration order.
    #[must_use]
    pub fn fragments_for(&self, composition_key: &K) -> Vec<Fragment<F, K, C>> {
        self.by_composition_key.get(composition_key)
    }

    #[must_use]
    pub fn composition_keys(&self) -> HashSet<K> {
        self.by_composition_key.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// The composition-key index.
    #[must_use]
    pub fn by_composition_key(&self) -> &Lookup<F, K, Fragment<F, K, C>> {
        &self.by_composition_key
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &IndexedStore<F, Fragment<F, K, C>> {
        &self.store
    }

    /// Subscribes to fragment entries with replay.
    pub fn observe(&self) -> Subscription<Entry<F, Fragment<F, K, C>>> {
        self.store.observe()
    }

    /// Feeds a fragment source into the registry.
    pub fn subscribe(&self, source: &EventChannel<Fragment<F, K, C>>) -> Feed {
        self.store.subscribe(source)
    }

    pub fn close(&self) {
        self.store.close();
    }
}
