//! Engine configuration.

use conflux_channel::ChannelConfig;
use serde::{Deserialize, Serialize};

/// Order in which fragment configurations are folded.
///
/// The reducer is not required to be commutative, so the order is part of
/// the result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOrder {
    /// Order in which fragment ids first joined the aggregate. Re-registering
    /// a fragment keeps its position.
    #[default]
    Registration,
    /// Ascending fragment id.
    FragmentId,
}

/// Configuration for a [`CompositionEngine`](crate::CompositionEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    /// Name used in log output.
    pub name: String,
    /// Settings for the aggregate channel.
    pub channel: ChannelConfig,
    /// Fold order for fragment configurations.
    pub merge_order: MergeOrder,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            name: "composition".to_string(),
            channel: ChannelConfig::named("composition"),
            merge_order: MergeOrder::default(),
        }
    }
}

impl ComposeConfig {
    /// Creates a configuration with the given name and default merge order.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            channel: ChannelConfig::named(name.clone()),
            name,
            merge_order: MergeOrder::default(),
        }
    }

    /// Sets the merge order.
    #[must_use]
    pub fn with_merge_order(mut self, merge_order: MergeOrder) -> Self {
        self.merge_order = merge_order;
        self
    }
}
