//! Per-key aggregates of fragments.

use crate::config::MergeOrder;
use crate::error::{ComposeError, ComposeResult};
use conflux_types::{Composed, Fragment};
use indexmap::IndexMap;
use std::fmt;
use std::hash::Hash;

/// Binary function folding two configurations into one.
///
/// Expected to be associative. Commutativity is not assumed.
pub type Reducer<C> = dyn Fn(C, C) -> C + Send + Sync;

/// The fragments registered under one composition key and their merged
/// configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate<F, K, C>
where
    F: Eq + Hash,
{
    composition_key: K,
    fragments: IndexMap<F, Fragment<F, K, C>>,
    configuration: Option<C>,
}

impl<F, K, C> Aggregate<F, K, C>
where
    F: Eq + Hash + Ord + Clone,
    K: Eq + Clone + fmt::Debug,
    C: Clone,
{
    /// Builds an aggregate from `fragments`, all of which must declare
    /// `composition_key`.
    pub fn new(
        composition_key: K,
        fragments: impl IntoIterator<Item = Fragment<F, K, C>>,
        reducer: &Reducer<C>,
        order: MergeOrder,
    ) -> ComposeResult<Self> {
        let mut aggregate = Self::empty(composition_key);
        for fragment in fragments {
            aggregate.check_key(&fragment)?;
            aggregate
                .fragments
                .insert(fragment.fragment_id().clone(), fragment);
        }
        aggregate.recompute(reducer, order);
        Ok(aggregate)
    }

    /// An aggregate without fragments or configuration.
    #[must_use]
    pub fn empty(composition_key: K) -> Self {
        Self {
            composition_key,
            fragments: IndexMap::new(),
            configuration: None,
        }
    }

    /// Returns this aggregate with `fragment` added or replaced.
    pub fn with_fragment(
        mut self,
        fragment: Fragment<F, K, C>,
        reducer: &Reducer<C>,
        order: MergeOrder,
    ) -> ComposeResult<Self> {
        self.insert(fragment, reducer, order)?;
        Ok(self)
    }

    /// Returns this aggregate without the fragment `fragment_id`.
    #[must_use]
    pub fn without_fragment(mut self, fragment_id: &F, reducer: &Reducer<C>, order: MergeOrder) -> Self {
        self.remove(fragment_id, reducer, order);
        self
    }

    pub(crate) fn insert(
        &mut self,
        fragment: Fragment<F, K, C>,
        reducer: &Reducer<C>,
        order: MergeOrder,
    ) -> ComposeResult<()> {
        self.check_key(&fragment)?;
        self.fragments
            .insert(fragment.fragment_id().clone(), fragment);
        self.recompute(reducer, order);
        Ok(())
    }

    pub(crate) fn remove(
        &mut self,
        fragment_id: &F,
        reducer: &Reducer<C>,
        order: MergeOrder,
    ) -> Option<Fragment<F, K, C>> {
        let removed = self.fragments.shift_remove(fragment_id)?;
        self.recompute(reducer, order);
        Some(removed)
    }

    fn check_key(&self, fragment: &Fragment<F, K, C>) -> ComposeResult<()> {
        if *fragment.composition_key() != self.composition_key {
            return Err(ComposeError::AggregateKeyMismatch {
                expected: format!("{:?}", self.composition_key),
                actual: format!("{:?}", fragment.composition_key()),
            });
        }
        Ok(())
    }

    fn recompute(&mut self, reducer: &Reducer<C>, order: MergeOrder) {
        let mut ordered: Vec<&Fragment<F, K, C>> = self.fragments.values().collect();
        if order == MergeOrder::FragmentId {
            ordered.sort_by(|a, b| a.fragment_id().cmp(b.fragment_id()));
        }
        self.configuration = ordered
            .into_iter()
            .filter_map(Fragment::configuration)
            .cloned()
            .reduce(|merged, next| reducer(merged, next));
    }
}

impl<F, K, C> Aggregate<F, K, C>
where
    F: Eq + Hash,
{
    #[must_use]
    pub fn composition_key(&self) -> &K {
        &self.composition_key
    }

    /// The merged configuration, absent if no fragment carries any.
    #[must_use]
    pub fn configuration(&self) -> Option<&C> {
        self.configuration.as_ref()
    }

    /// Fragments in registration order.
    pub fn fragments(&self) -> impl Iterator<Item = &Fragment<F, K, C>> {
        self.fragments.values()
    }

    #[must_use]
    pub fn fragment(&self, fragment_id: &F) -> Option<&Fragment<F, K, C>> {
        self.fragments.get(fragment_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// The query-side view: key and merged configuration.
    #[must_use]
    pub fn to_composed(&self) -> Composed<K, C>
    where
        K: Clone,
        C: Clone,
    {
        Composed::new(self.composition_key.clone(), self.configuration.clone())
    }

    /// Transforms the merged configuration, dropping the fragments.
    pub fn map<T>(self, mapper: impl FnOnce(C) -> T) -> Composed<K, T> {
        Composed::new(self.composition_key, self.configuration.map(mapper))
    }
}
