//! The event channel itself.

use crate::config::ChannelConfig;
use crate::error::{ChannelError, ChannelResult};
use crate::subscription::{LiveReceiver, Subscription};
use conflux_types::{EventKind, LifecycleEvent};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

type ExistingData<T> = Box<dyn Fn() -> Vec<T> + Send + Sync>;

/// A multi-subscriber lifecycle event channel.
///
/// Cloning the channel yields another handle to the same subscribers.
/// Delivery never blocks the emitter: each subscriber owns a queue that is
/// filled synchronously by [`emit`](Self::emit) and drained by the
/// subscriber at its own pace.
pub struct EventChannel<T> {
    inner: Arc<Inner<T>>,
}

pub(crate) struct Inner<T> {
    config: ChannelConfig,
    existing: Option<ExistingData<T>>,
    state: Mutex<State<T>>,
}

struct State<T> {
    next_id: u64,
    subscribers: Vec<Subscriber<T>>,
    closed: bool,
}

struct Subscriber<T> {
    id: u64,
    sender: LiveSender<T>,
    overflowed: Arc<AtomicBool>,
}

enum LiveSender<T> {
    Bounded(mpsc::Sender<LifecycleEvent<T>>),
    Unbounded(mpsc::UnboundedSender<LifecycleEvent<T>>),
}

enum Delivery {
    Delivered,
    Overflowed,
    Disconnected,
}

impl<T> LiveSender<T> {
    fn deliver(&self, event: LifecycleEvent<T>) -> Delivery {
        match self {
            Self::Bounded(tx) => match tx.try_send(event) {
                Ok(()) => Delivery::Delivered,
                Err(mpsc::error::TrySendError::Full(_)) => Delivery::Overflowed,
                Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Disconnected,
            },
            Self::Unbounded(tx) => match tx.send(event) {
                Ok(()) => Delivery::Delivered,
                Err(_) => Delivery::Disconnected,
            },
        }
    }
}

impl<T> Inner<T> {
    /// Removes a subscriber. Called when a subscription is dropped.
    pub(crate) fn detach(&self, id: u64) {
        let mut state = self.state.lock();
        let before = state.subscribers.len();
        state.subscribers.retain(|subscriber| subscriber.id != id);
        if state.subscribers.len() < before {
            trace!(channel = %self.config.name, subscriber = id, "subscriber detached");
        }
    }
}

impl<T> Clone for EventChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("EventChannel")
            .field("name", &self.inner.config.name)
            .field("capacity", &self.inner.config.capacity)
            .field("subscribers", &state.subscribers.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl<T> Default for EventChannel<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new(ChannelConfig::default())
    }
}

impl<T> EventChannel<T>
where
    T: Clone + Send + 'static,
{
    /// Creates a channel without existing data.
    #[must_use]
    pub fn new(config: ChannelConfig) -> Self {
        Self::build(config, None)
    }

    /// Creates a channel whose [`observe`](Self::observe) replays the items
    /// returned by `existing` as synthetic adds.
    #[must_use]
    pub fn with_existing<F>(config: ChannelConfig, existing: F) -> Self
    where
        F: Fn() -> Vec<T> + Send + Sync + 'static,
    {
        Self::build(config, Some(Box::new(existing)))
    }

    fn build(config: ChannelConfig, existing: Option<ExistingData<T>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                existing,
                state: Mutex::new(State {
                    next_id: 1,
                    subscribers: Vec::new(),
                    closed: false,
                }),
            }),
        }
    }

    /// Returns the channel configuration.
    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Returns the number of attached subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscribers.len()
    }

    /// Emits an event of the given kind to every subscriber.
    pub fn emit(&self, kind: EventKind, value: T) -> ChannelResult<()> {
        self.emit_event(LifecycleEvent::new(kind, value))
    }

    /// Emits an event to every subscriber.
    ///
    /// Subscribers whose bounded queue is full are detached and will observe
    /// [`ChannelError::Overflow`]; subscribers that went away are pruned.
    pub fn emit_event(&self, event: LifecycleEvent<T>) -> ChannelResult<()> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(ChannelError::Closed);
        }
        self.deliver(&mut state, &event);
        Ok(())
    }

    /// Runs `change` under the channel lock and emits the event it returns.
    ///
    /// State read by the existing-data supplier should only change inside
    /// `change`: [`observe`](Self::observe) then replays it with no event
    /// missed or repeated. `change` must not call back into the channel.
    /// Returns whether an event was emitted.
    pub fn emit_with<F>(&self, change: F) -> ChannelResult<bool>
    where
        F: FnOnce() -> Option<LifecycleEvent<T>>,
    {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(ChannelError::Closed);
        }
        let Some(event) = change() else {
            return Ok(false);
        };
        self.deliver(&mut state, &event);
        Ok(true)
    }

    fn deliver(&self, state: &mut State<T>, event: &LifecycleEvent<T>) {
        let config = &self.inner.config;
        state.subscribers.retain(|subscriber| {
            match subscriber.sender.deliver(event.clone()) {
                Delivery::Delivered => true,
                Delivery::Overflowed => {
                    subscriber.overflowed.store(true, Ordering::Release);
                    warn!(
                        channel = %config.name,
                        subscriber = subscriber.id,
                        capacity = ?config.capacity,
                        "subscriber overflowed, detaching"
                    );
                    false
                }
                Delivery::Disconnected => {
                    debug!(channel = %config.name, subscriber = subscriber.id, "pruned disconnected subscriber");
                    false
                }
            }
        });

        trace!(
            channel = %config.name,
            kind = %event.kind,
            subscribers = state.subscribers.len(),
            "emitted event"
        );
    }

    /// Subscribes with replay of the channel's existing data.
    ///
    /// The supplier runs under the channel lock, after the subscription is
    /// attached, so nothing emitted concurrently is lost or delivered twice.
    /// Without an existing-data supplier this behaves like
    /// [`observe_live`](Self::observe_live).
    pub fn observe(&self) -> Subscription<T> {
        let Some(existing) = &self.inner.existing else {
            return self.observe_live();
        };

        let mut state = self.inner.state.lock();
        let Some((id, live, overflowed)) = self.attach(&mut state) else {
            return Subscription::completed();
        };
        let snapshot: VecDeque<T> = existing().into();
        drop(state);

        trace!(
            channel = %self.inner.config.name,
            subscriber = id,
            synthetic = snapshot.len(),
            "subscriber attached with replay"
        );
        self.subscription(id, snapshot, live, overflowed)
    }

    /// Subscribes with replay of a caller-supplied snapshot.
    ///
    /// The subscription is attached to the live feed before `snapshot` runs,
    /// so every event emitted while the snapshot is being read is buffered.
    /// Callers that emit under a lock should invoke this under the same lock.
    pub fn observe_with<I, S>(&self, snapshot: S) -> Subscription<T>
    where
        S: FnOnce() -> I,
        I: IntoIterator<Item = T>,
    {
        let attached = self.attach(&mut self.inner.state.lock());
        let Some((id, live, overflowed)) = attached else {
            return Subscription::completed();
        };

        let snapshot: VecDeque<T> = snapshot().into_iter().collect();
        trace!(
            channel = %self.inner.config.name,
            subscriber = id,
            synthetic = snapshot.len(),
            "subscriber attached with replay"
        );

        self.subscription(id, snapshot, live, overflowed)
    }

    /// Subscribes to live events only, without any replay.
    pub fn observe_live(&self) -> Subscription<T> {
        let attached = self.attach(&mut self.inner.state.lock());
        let Some((id, live, overflowed)) = attached else {
            return Subscription::completed();
        };
        trace!(channel = %self.inner.config.name, subscriber = id, "subscriber attached");

        self.subscription(id, VecDeque::new(), live, overflowed)
    }

    /// Closes the channel.
    ///
    /// Every subscription completes after draining what it already buffered.
    /// Later emits fail with [`ChannelError::Closed`]. Closing twice is a no-op.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let count = state.subscribers.len();
        state.subscribers.clear();
        debug!(channel = %self.inner.config.name, subscribers = count, "channel closed");
    }

    fn attach(&self, state: &mut State<T>) -> Option<(u64, LiveReceiver<T>, Arc<AtomicBool>)> {
        if state.closed {
            return None;
        }

        let id = state.next_id;
        state.next_id += 1;

        let (sender, receiver) = match self.inner.config.capacity {
            Some(capacity) => {
                let (tx, rx) = mpsc::channel(capacity.max(1));
                (LiveSender::Bounded(tx), LiveReceiver::Bounded(rx))
            }
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                (LiveSender::Unbounded(tx), LiveReceiver::Unbounded(rx))
            }
        };
        let overflowed = Arc::new(AtomicBool::new(false));

        state.subscribers.push(Subscriber {
            id,
            sender,
            overflowed: Arc::clone(&overflowed),
        });
        Some((id, receiver, overflowed))
    }

    fn subscription(
        &self,
        id: u64,
        snapshot: VecDeque<T>,
        live: LiveReceiver<T>,
        overflowed: Arc<AtomicBool>,
    ) -> Subscription<T> {
        Subscription::new(
            id,
            snapshot,
            live,
            overflowed,
            self.inner.config.capacity,
            Arc::downgrade(&self.inner),
        )
    }
}
