//! Resource watch adapter.
//!
//! A watch client reports resources through `on_add`, `on_update` and
//! `on_delete`. The handler filters them, turns matching ones into fragments
//! and publishes fragment lifecycle events on its channel. Subscribers to the
//! channel first receive an `Add` for every resource currently known.

use crate::error::SourceResult;
use crate::factory::FragmentFactory;
use crate::filter::ResourceFilter;
use crate::resource::Resource;
use conflux_channel::{ChannelConfig, EventChannel};
use conflux_types::{EventKind, Fragment, LifecycleEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

type Factory<K, C> = Box<dyn FragmentFactory<Resource, Key = K, Configuration = C>>;

struct Known<K, C> {
    resource_version: String,
    fragment: Fragment<String, K, C>,
}

/// Turns resource watch callbacks into fragment events.
pub struct ResourceWatchHandler<K, C> {
    name: String,
    filter: ResourceFilter,
    factory: Factory<K, C>,
    known: Arc<Mutex<HashMap<String, Known<K, C>>>>,
    events: EventChannel<Fragment<String, K, C>>,
}

impl<K, C> fmt::Debug for ResourceWatchHandler<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceWatchHandler")
            .field("name", &self.name)
            .field("filter", &self.filter)
            .field("known", &self.known.lock().len())
            .finish_non_exhaustive()
    }
}

impl<K, C> ResourceWatchHandler<K, C>
where
    K: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    pub fn new<Fac>(name: impl Into<String>, filter: ResourceFilter, factory: Fac) -> Self
    where
        Fac: FragmentFactory<Resource, Key = K, Configuration = C> + 'static,
    {
        let name = name.into();
        let known: Arc<Mutex<HashMap<String, Known<K, C>>>> = Arc::default();
        let snapshot = Arc::clone(&known);
        let events = EventChannel::with_existing(ChannelConfig::named(name.clone()), move || {
            snapshot
                .lock()
                .values()
                .map(|known| known.fragment.clone())
                .collect()
        });
        Self {
            name,
            filter,
            factory: Box::new(factory),
            known,
            events,
        }
    }

    /// The fragment channel. `observe` on it replays every known resource.
    #[must_use]
    pub fn channel(&self) -> &EventChannel<Fragment<String, K, C>> {
        &self.events
    }

    /// Number of resources currently published as fragments.
    #[must_use]
    pub fn known_count(&self) -> usize {
        self.known.lock().len()
    }

    /// A resource appeared.
    pub fn on_add(&self, resource: &Resource) -> SourceResult<Option<EventKind>> {
        if !self.filter.matches(resource) {
            trace!(watch = %self.name, uid = %resource.uid, "ignoring non-matching resource");
            return Ok(None);
        }
        self.publish(resource)
    }

    /// A resource changed. Nothing is published if its resource version did
    /// not change. A resource that no longer matches the filter is removed.
    pub fn on_update(&self, old: &Resource, new: &Resource) -> SourceResult<Option<EventKind>> {
        if old.resource_version == new.resource_version {
            trace!(watch = %self.name, uid = %new.uid, "resource version unchanged");
            return Ok(None);
        }
        if !self.filter.matches(new) {
            return self.forget(&new.uid);
        }
        self.publish(new)
    }

    /// A resource was deleted.
    pub fn on_delete(&self, resource: &Resource) -> SourceResult<Option<EventKind>> {
        self.forget(&resource.uid)
    }

    /// Closes the fragment channel.
    pub fn close(&self) {
        self.events.close();
    }

    fn publish(&self, resource: &Resource) -> SourceResult<Option<EventKind>> {
        let fragment = match self.factory.create_fragment(resource) {
            Ok(fragment) => fragment,
            Err(e) => {
                warn!(watch = %self.name, uid = %resource.uid, "cannot build fragment: {e}");
                self.forget(&resource.uid)?;
                return Err(e);
            }
        };

        let mut published = None;
        self.events.emit_with(|| {
            let previous = self.known.lock().insert(
                resource.uid.clone(),
                Known {
                    resource_version: resource.resource_version.clone(),
                    fragment: fragment.clone(),
                },
            );
            let kind = match previous {
                Some(_) => EventKind::Update,
                None => EventKind::Add,
            };
            published = Some(kind);
            Some(LifecycleEvent::new(kind, fragment))
        })?;

        if let Some(kind) = published {
            debug!(
                watch = %self.name,
                uid = %resource.uid,
                version = %resource.resource_version,
                %kind,
                "published fragment"
            );
        }
        Ok(published)
    }

    fn forget(&self, uid: &str) -> SourceResult<Option<EventKind>> {
        let removed = self.events.emit_with(|| {
            self.known
                .lock()
                .remove(uid)
                .map(|known| LifecycleEvent::remove(known.fragment))
        })?;
        if !removed {
            return Ok(None);
        }
        debug!(watch = %self.name, uid, "removed fragment");
        Ok(Some(EventKind::Remove))
    }
}

impl<K, C> ResourceWatchHandler<K, C> {
    /// The resource version last published for `uid`.
    #[must_use]
    pub fn resource_version(&self, uid: &str) -> Option<String> {
        self.known
            .lock()
            .get(uid)
            .map(|known| known.resource_version.clone())
    }
}
