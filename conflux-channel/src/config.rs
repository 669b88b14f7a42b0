//! Channel configuration.

use serde::{Deserialize, Serialize};

/// Configuration for an [`EventChannel`](crate::EventChannel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Name used in log output.
    pub name: String,
    /// Maximum number of undelivered live events per subscriber.
    /// `None` means unbounded. A capacity of zero is treated as one.
    pub capacity: Option<usize>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: "events".to_string(),
            capacity: None,
        }
    }
}

impl ChannelConfig {
    /// Creates an unbounded configuration with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets a per-subscriber capacity.
    #[must_use]
    pub fn bounded(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }
}
