//! Fragments declared statically in configuration.
//!
//! ```json
//! {
//!   "fragments": {
//!     "defaults": {
//!       "composition_key": "app-1",
//!       "configuration": { "conflux.idp.client-id": "app-1" }
//!     }
//!   }
//! }
//! ```

use crate::error::{SourceError, SourceResult};
use crate::factory::FragmentFactory;
use conflux_channel::{ChannelConfig, EventChannel};
use conflux_types::Fragment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Statically declared fragments, keyed by fragment id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticSourceConfig {
    pub fragments: BTreeMap<String, FragmentProperties>,
}

/// One statically declared fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentProperties {
    pub composition_key: String,
    #[serde(default)]
    pub configuration: BTreeMap<String, String>,
}

type KeyFn<K> = Box<dyn Fn(&str) -> K + Send + Sync>;
type ConfigurationFn<C> = Box<dyn Fn(&BTreeMap<String, String>) -> C + Send + Sync>;

/// Builds fragments from `(fragment id, properties)` entries.
pub struct PropertiesFragmentFactory<K, C> {
    key: KeyFn<K>,
    configuration: ConfigurationFn<C>,
}

impl<K, C> PropertiesFragmentFactory<K, C> {
    pub fn new(
        key: impl Fn(&str) -> K + Send + Sync + 'static,
        configuration: impl Fn(&BTreeMap<String, String>) -> C + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: Box::new(key),
            configuration: Box::new(configuration),
        }
    }
}

impl<K, C> fmt::Debug for PropertiesFragmentFactory<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertiesFragmentFactory").finish_non_exhaustive()
    }
}

impl<K, C> FragmentFactory<(String, FragmentProperties)> for PropertiesFragmentFactory<K, C> {
    type Key = K;
    type Configuration = C;

    fn create_fragment(&self, source: &(String, FragmentProperties)) -> SourceResult<Fragment<String, K, C>> {
        let (fragment_id, properties) = source;
        if properties.composition_key.trim().is_empty() {
            return Err(SourceError::Invalid(format!(
                "fragment {fragment_id} has no composition key"
            )));
        }
        Ok(Fragment::new(
            fragment_id.clone(),
            (self.key)(&properties.composition_key),
            (self.configuration)(&properties.configuration),
        ))
    }
}

/// A fixed set of fragments published as a replaying channel.
///
/// The set never changes, so every subscriber receives exactly one `Add` per
/// fragment and nothing else.
pub struct StaticFragmentSource<K, C> {
    fragments: Arc<Vec<Fragment<String, K, C>>>,
}

impl<K, C> Clone for StaticFragmentSource<K, C> {
    fn clone(&self) -> Self {
        Self {
            fragments: Arc::clone(&self.fragments),
        }
    }
}

impl<K, C> fmt::Debug for StaticFragmentSource<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticFragmentSource")
            .field("fragments", &self.fragments.len())
            .finish()
    }
}

impl<K, C> StaticFragmentSource<K, C>
where
    K: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    /// Builds every declared fragment. Fails on the first invalid entry.
    pub fn new<Fac>(config: &StaticSourceConfig, factory: &Fac) -> SourceResult<Self>
    where
        Fac: FragmentFactory<(String, FragmentProperties), Key = K, Configuration = C>,
    {
        let fragments = config
            .fragments
            .iter()
            .map(|(id, properties)| factory.create_fragment(&(id.clone(), properties.clone())))
            .collect::<SourceResult<Vec<_>>>()?;
        debug!(fragments = fragments.len(), "loaded static fragments");
        Ok(Self {
            fragments: Arc::new(fragments),
        })
    }

    #[must_use]
    pub fn fragments(&self) -> &[Fragment<String, K, C>] {
        &self.fragments
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// A channel whose subscribers receive one `Add` per fragment.
    #[must_use]
    pub fn channel(&self) -> EventChannel<Fragment<String, K, C>> {
        let fragments = Arc::clone(&self.fragments);
        EventChannel::with_existing(ChannelConfig::named("static-fragments"), move || {
            fragments.as_ref().clone()
        })
    }
}
