//! The composition engine.

use crate::aggregate::{Aggregate, Reducer};
use crate::config::{ComposeConfig, MergeOrder};
use crate::error::{ComposeError, ComposeResult};
use crate::registry::FragmentRegistry;
use conflux_channel::{follow, EventChannel, Feed, Subscription};
use conflux_types::{Composed, EventKind, Fragment, LifecycleEvent};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

/// Maintains one [`Aggregate`] per composition key and publishes their
/// lifecycle.
///
/// Cloning the engine yields another handle to the same aggregates.
pub struct CompositionEngine<F, K, C>
where
    F: Eq + Hash,
{
    shared: Arc<Shared<F, K, C>>,
}

struct Shared<F, K, C>
where
    F: Eq + Hash,
{
    config: ComposeConfig,
    reducer: Box<Reducer<C>>,
    state: RwLock<EngineState<F, K, C>>,
}

struct EngineState<F, K, C>
where
    F: Eq + Hash,
{
    aggregates: HashMap<K, Aggregate<F, K, C>>,
    owners: HashMap<F, K>,
    events: EventChannel<Aggregate<F, K, C>>,
    closed: bool,
}

impl<F, K, C> EngineState<F, K, C>
where
    F: Eq + Hash + Ord + Clone + fmt::Debug + Send + Sync + 'static,
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    fn ensure_open(&self) -> ComposeResult<()> {
        if self.closed {
            return Err(ComposeError::Closed);
        }
        Ok(())
    }

    fn attach(
        &mut self,
        fragment: Fragment<F, K, C>,
        reducer: &Reducer<C>,
        order: MergeOrder,
    ) -> ComposeResult<EventKind> {
        let key = fragment.composition_key().clone();
        let fragment_id = fragment.fragment_id().clone();

        let kind = match self.aggregates.get_mut(&key) {
            Some(aggregate) => {
                aggregate.insert(fragment, reducer, order)?;
                self.events.emit(EventKind::Update, aggregate.clone())?;
                EventKind::Update
            }
            None => {
                let aggregate = Aggregate::new(key.clone(), [fragment], reducer, order)?;
                self.events.emit(EventKind::Add, aggregate.clone())?;
                self.aggregates.insert(key.clone(), aggregate);
                EventKind::Add
            }
        };
        self.owners.insert(fragment_id, key);
        Ok(kind)
    }

    fn detach(
        &mut self,
        fragment_id: &F,
        reducer: &Reducer<C>,
        order: MergeOrder,
    ) -> ComposeResult<Option<EventKind>> {
        let Some(key) = self.owners.remove(fragment_id) else {
            return Ok(None);
        };
        let Some(aggregate) = self.aggregates.get_mut(&key) else {
            return Ok(None);
        };
        if aggregate.fragment(fragment_id).is_none() {
            return Ok(None);
        }

        if aggregate.len() == 1 {
            if let Some(prior) = self.aggregates.remove(&key) {
                self.events.emit(EventKind::Remove, prior)?;
            }
            return Ok(Some(EventKind::Remove));
        }

        aggregate.remove(fragment_id, reducer, order);
        self.events.emit(EventKind::Update, aggregate.clone())?;
        Ok(Some(EventKind::Update))
    }
}

impl<F, K, C> Clone for CompositionEngine<F, K, C>
where
    F: Eq + Hash,
{
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F, K, C> fmt::Debug for CompositionEngine<F, K, C>
where
    F: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.read();
        f.debug_struct("CompositionEngine")
            .field("name", &self.shared.config.name)
            .field("aggregates", &state.aggregates.len())
            .field("fragments", &state.owners.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl<F, K, C> CompositionEngine<F, K, C>
where
    F: Eq + Hash + Ord + Clone + fmt::Debug + Send + Sync + 'static,
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    /// Creates an engine folding configurations with `reducer`.
    #[must_use]
    pub fn new<R>(reducer: R) -> Self
    where
        R: Fn(C, C) -> C + Send + Sync + 'static,
    {
        Self::with_config(reducer, ComposeConfig::default())
    }

    /// Creates an engine with explicit configuration.
    #[must_use]
    pub fn with_config<R>(reducer: R, config: ComposeConfig) -> Self
    where
        R: Fn(C, C) -> C + Send + Sync + 'static,
    {
        let events = EventChannel::new(config.channel.clone());
        Self {
            shared: Arc::new(Shared {
                config,
                reducer: Box::new(reducer),
                state: RwLock::new(EngineState {
                    aggregates: HashMap::new(),
                    owners: HashMap::new(),
                    events,
                    closed: false,
                }),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ComposeConfig {
        &self.shared.config
    }

    /// Registers or replaces a fragment.
    ///
    /// A fragment id previously registered under another composition key is
    /// revoked there first, so a fragment never belongs to two aggregates.
    pub fn register(&self, fragment: Fragment<F, K, C>) -> ComposeResult<()> {
        let reducer = self.shared.reducer.as_ref();
        let order = self.shared.config.merge_order;

        let mut state = self.shared.state.write();
        state.ensure_open()?;

        let moved_from = state
            .owners
            .get(fragment.fragment_id())
            .filter(|owner| *owner != fragment.composition_key())
            .cloned();
        if let Some(previous) = &moved_from {
            debug!(
                engine = %self.shared.config.name,
                fragment = ?fragment.fragment_id(),
                from = ?previous,
                to = ?fragment.composition_key(),
                "fragment moved to another composition key"
            );
            state.detach(fragment.fragment_id(), reducer, order)?;
        }

        let fragment_id = fragment.fragment_id().clone();
        let key = fragment.composition_key().clone();
        let kind = state.attach(fragment, reducer, order)?;
        debug!(
            engine = %self.shared.config.name,
            fragment = ?fragment_id,
            composition_key = ?key,
            %kind,
            "registered fragment"
        );
        Ok(())
    }

    /// Revokes a fragment by id. Returns false if it was not registered.
    pub fn revoke(&self, fragment_id: &F) -> ComposeResult<bool> {
        let reducer = self.shared.reducer.as_ref();
        let order = self.shared.config.merge_order;

        let mut state = self.shared.state.write();
        state.ensure_open()?;

        let Some(kind) = state.detach(fragment_id, reducer, order)? else {
            return Ok(false);
        };
        debug!(
            engine = %self.shared.config.name,
            fragment = ?fragment_id,
            %kind,
            "revoked fragment"
        );
        Ok(true)
    }

    /// The aggregate for `composition_key`, or an empty one if no fragment is
    /// registered under it.
    #[must_use]
    pub fn find_configuration(&self, composition_key: &K) -> Aggregate<F, K, C> {
        self.shared
            .state
            .read()
            .aggregates
            .get(composition_key)
            .cloned()
            .unwrap_or_else(|| Aggregate::empty(composition_key.clone()))
    }

    /// Key and merged configuration for `composition_key`.
    #[must_use]
    pub fn find_composed(&self, composition_key: &K) -> Composed<K, C> {
        let state = self.shared.state.read();
        match state.aggregates.get(composition_key) {
            Some(aggregate) => aggregate.to_composed(),
            None => Composed::new(composition_key.clone(), None),
        }
    }

    /// Snapshot of every key with at least one fragment.
    #[must_use]
    pub fn composition_keys(&self) -> HashSet<K> {
        self.shared.state.read().aggregates.keys().cloned().collect()
    }

    /// Number of registered fragments across all aggregates.
    #[must_use]
    pub fn fragment_count(&self) -> usize {
        self.shared.state.read().owners.len()
    }

    /// Subscribes to aggregate events, starting with a synthetic `Add` for
    /// every current aggregate.
    pub fn observe(&self) -> Subscription<Aggregate<F, K, C>> {
        let state = self.shared.state.read();
        state
            .events
            .observe_with(|| state.aggregates.values().cloned().collect::<Vec<_>>())
    }

    /// Subscribes to aggregate events without replay.
    pub fn observe_live(&self) -> Subscription<Aggregate<F, K, C>> {
        self.shared.state.read().events.observe_live()
    }

    /// Applies a fragment lifecycle event: `Add` and `Update` register,
    /// `Remove` revokes by fragment id.
    pub fn apply(&self, event: LifecycleEvent<Fragment<F, K, C>>) -> ComposeResult<()> {
        match event.kind {
            EventKind::Add | EventKind::Update => self.register(event.value),
            EventKind::Remove => self.revoke(event.value.fragment_id()).map(|_| ()),
        }
    }

    /// Feeds every fragment event of `source`, including its replay, into the
    /// engine. Must be called from within a Tokio runtime.
    pub fn subscribe(&self, source: &EventChannel<Fragment<F, K, C>>) -> Feed {
        let engine = self.clone();
        follow(
            format!("{}.subscribe", self.shared.config.name),
            source.observe(),
            move |event| engine.apply(event),
        )
    }

    /// Feeds every fragment held by `registry`, and every later change, into
    /// the engine. Must be called from within a Tokio runtime.
    pub fn follow_registry(&self, registry: &FragmentRegistry<F, K, C>) -> Feed {
        let engine = self.clone();
        follow(
            format!("{}.registry", self.shared.config.name),
            registry.observe(),
            move |event| engine.apply(event.map_value(|entry| entry.value)),
        )
    }

    /// Closes the engine and its channel. Later registrations fail with
    /// [`ComposeError::Closed`]; queries keep working.
    pub fn close(&self) {
        let mut state = self.shared.state.write();
        if state.closed {
            return;
        }
        state.closed = true;
        state.events.close();
        debug!(engine = %self.shared.config.name, "composition engine closed");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.state.read().closed
    }
}
