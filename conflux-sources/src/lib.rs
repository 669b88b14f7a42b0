//! Fragment sources for conflux.
//!
//! Adapters that turn external configuration into fragment lifecycle events:
//!
//! - [`StaticFragmentSource`]: a fixed set of fragments declared in a config
//!   file, published once as `Add` events
//! - [`ResourceWatchHandler`]: resources reported by a watch client
//!   (ConfigMaps and Secrets), filtered by namespace and labels
//!
//! Both expose an [`EventChannel`](conflux_channel::EventChannel) that replays
//! current fragments to late subscribers, ready to be fed into a store or a
//! composition engine.

mod error;
mod factory;
mod filter;
mod properties;
mod resource;
mod watch;

pub use error::{SourceError, SourceResult};
pub use factory::FragmentFactory;
pub use filter::{LabelSelector, ResourceFilter};
pub use properties::{
    FragmentProperties, PropertiesFragmentFactory, StaticFragmentSource, StaticSourceConfig,
};
pub use resource::{ConfigMapFragmentFactory, Resource, ResourceKind, SecretFragmentFactory};
pub use watch::ResourceWatchHandler;
