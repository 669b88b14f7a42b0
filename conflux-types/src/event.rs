//! Lifecycle events.
//!
//! Every observable component publishes the same three-step lifecycle for
//! the things it holds: an entity is added, updated any number of times, and
//! finally removed. A late subscriber receives a synthetic `Add` for each
//! entity that already exists, which is indistinguishable from a real one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of change a [`LifecycleEvent`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The entity did not exist before (or is being replayed to a new subscriber).
    Add,
    /// The entity existed and now has a new value.
    Update,
    /// The entity no longer exists. The value is its last known state.
    Remove,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Update => write!(f, "update"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// A single change delivered to an observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent<T> {
    /// What happened.
    pub kind: EventKind,
    /// The value after the change, or the last value for a removal.
    pub value: T,
}

impl<T> LifecycleEvent<T> {
    /// Creates a new event.
    #[must_use]
    pub fn new(kind: EventKind, value: T) -> Self {
        Self { kind, value }
    }

    /// Creates an add event.
    #[must_use]
    pub fn add(value: T) -> Self {
        Self::new(EventKind::Add, value)
    }

    /// Creates an update event.
    #[must_use]
    pub fn update(value: T) -> Self {
        Self::new(EventKind::Update, value)
    }

    /// Creates a remove event.
    #[must_use]
    pub fn remove(value: T) -> Self {
        Self::new(EventKind::Remove, value)
    }

    /// Transforms the carried value, keeping the event kind.
    pub fn map_value<U>(self, mapper: impl FnOnce(T) -> U) -> LifecycleEvent<U> {
        LifecycleEvent {
            kind: self.kind,
            value: mapper(self.value),
        }
    }

    /// Returns a reference to the carried value.
    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Consumes the event, returning the carried value.
    #[must_use]
    pub fn into_value(self) -> T {
        self.value
    }

    /// Returns true for `Add` and `Update` events.
    #[must_use]
    pub fn is_upsert(&self) -> bool {
        matches!(self.kind, EventKind::Add | EventKind::Update)
    }
}

/// A primary-store record: a value together with the key derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry<K, V> {
    /// The identity of the value.
    pub key: K,
    /// The stored value.
    pub value: V,
}

impl<K, V> Entry<K, V> {
    /// Creates a new entry.
    #[must_use]
    pub fn new(key: K, value: V) -> Self {
        Self { key, value }
    }
}
