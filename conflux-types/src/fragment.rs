//! Configuration fragments.
//!
//! A fragment is one source's contribution of configuration for a single
//! composition key. Fragments are immutable: a source that changes its data
//! produces a new fragment with the same id.

use serde::{Deserialize, Serialize};

/// One source's contribution of configuration for a composition key.
///
/// `configuration` may be absent: such a fragment still occupies a slot in
/// its aggregate but contributes nothing to the merged result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment<F, K, C> {
    fragment_id: F,
    composition_key: K,
    configuration: Option<C>,
}

impl<F, K, C> Fragment<F, K, C> {
    /// Creates a fragment carrying configuration.
    #[must_use]
    pub fn new(fragment_id: F, composition_key: K, configuration: C) -> Self {
        Self {
            fragment_id,
            composition_key,
            configuration: Some(configuration),
        }
    }

    /// Creates a fragment that contributes no configuration.
    #[must_use]
    pub fn empty(fragment_id: F, composition_key: K) -> Self {
        Self {
            fragment_id,
            composition_key,
            configuration: None,
        }
    }

    /// Creates a fragment from an optional configuration.
    #[must_use]
    pub fn with_configuration(fragment_id: F, composition_key: K, configuration: Option<C>) -> Self {
        Self {
            fragment_id,
            composition_key,
            configuration,
        }
    }

    /// Returns the fragment id.
    #[must_use]
    pub fn fragment_id(&self) -> &F {
        &self.fragment_id
    }

    /// Returns the composition key this fragment belongs to.
    #[must_use]
    pub fn composition_key(&self) -> &K {
        &self.composition_key
    }

    /// Returns the configuration, if this fragment carries any.
    #[must_use]
    pub fn configuration(&self) -> Option<&C> {
        self.configuration.as_ref()
    }

    /// Transforms the configuration, keeping id and composition key.
    pub fn map<T>(self, mapper: impl FnOnce(C) -> T) -> Fragment<F, K, T> {
        Fragment {
            fragment_id: self.fragment_id,
            composition_key: self.composition_key,
            configuration: self.configuration.map(mapper),
        }
    }
}

/// A composition key together with its merged configuration.
///
/// This is the query-side view of an aggregate: it carries no fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composed<K, C> {
    /// The composition key.
    pub composition_key: K,
    /// The merged configuration, absent if no fragment contributes any.
    pub configuration: Option<C>,
}

impl<K, C> Composed<K, C> {
    /// Creates a new composed view.
    #[must_use]
    pub fn new(composition_key: K, configuration: Option<C>) -> Self {
        Self {
            composition_key,
            configuration,
        }
    }

    /// Returns the merged configuration.
    #[must_use]
    pub fn configuration(&self) -> Option<&C> {
        self.configuration.as_ref()
    }

    /// Transforms the merged configuration, keeping the composition key.
    pub fn map<T>(self, mapper: impl FnOnce(C) -> T) -> Composed<K, T> {
        Composed {
            composition_key: self.composition_key,
            configuration: self.configuration.map(mapper),
        }
    }
}
