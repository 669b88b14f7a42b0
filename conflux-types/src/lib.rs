//! Core type definitions for conflux.
//!
//! This crate defines the fundamental, domain-agnostic types shared by the
//! store, the event channel and the composition engine:
//! - Lifecycle events (add, update, remove) carrying any value
//! - Store entries (`key`, `value` pairs)
//! - Configuration fragments and composed configuration views
//!
//! Concrete configuration value types and their merge functions belong to
//! the caller (see `conflux-apps` for one example), not here.

mod event;
mod fragment;

pub use event::{Entry, EventKind, LifecycleEvent};
pub use fragment::{Composed, Fragment};
