//! Store configuration.

use conflux_channel::ChannelConfig;
use serde::{Deserialize, Serialize};

/// Configuration for an [`IndexedStore`](crate::IndexedStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Name used in log output and error messages.
    pub name: String,
    /// Settings for the store's entry channel. Index channels inherit the
    /// capacity and derive their name from the store's.
    pub channel: ChannelConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "store".to_string(),
            channel: ChannelConfig::named("store"),
        }
    }
}

impl StoreConfig {
    /// Creates an unbounded configuration with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            channel: ChannelConfig::named(name.clone()),
            name,
        }
    }

    pub(crate) fn index_channel(&self, index: u64) -> ChannelConfig {
        ChannelConfig {
            name: format!("{}.index-{index}", self.name),
            capacity: self.channel.capacity,
        }
    }
}
