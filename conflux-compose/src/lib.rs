//! Composition engine for conflux.
//!
//! Fragments are grouped by composition key into [`Aggregate`]s. Each
//! aggregate carries the left fold of its fragments' configurations under a
//! caller-supplied reducer, recomputed on every registration and revocation.
//! The [`CompositionEngine`] publishes one lifecycle per aggregate: `Add` when
//! the first fragment for a key arrives, `Update` on every later change, and
//! `Remove` when the last fragment is revoked.
//!
//! Fragments reach the engine directly, from any fragment channel, or from a
//! [`FragmentRegistry`] that keeps them in an indexed store.

mod aggregate;
mod config;
mod engine;
mod error;
mod registry;

pub use aggregate::{Aggregate, Reducer};
pub use config::{ComposeConfig, MergeOrder};
pub use engine::CompositionEngine;
pub use error::{ComposeError, ComposeResult};
pub use registry::FragmentRegistry;
