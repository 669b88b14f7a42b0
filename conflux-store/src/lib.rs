//! Concurrent indexed store for conflux.
//!
//! An [`IndexedStore`] holds values under a key derived from each value and
//! maintains any number of secondary indices over them. Every mutation of the
//! primary map and of all indices happens under one write lock, so readers
//! never see an index that disagrees with the map.
//!
//! Both the store and each index publish lifecycle events. Subscribing with
//! `observe` replays the current contents as synthetic adds, taken under the
//! store's read lock, followed by every later change.

mod config;
mod error;
mod index;
mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use index::{IndexBucket, IndexId, Lookup};
pub use store::IndexedStore;
