//! Subscriber side of an [`EventChannel`](crate::EventChannel).

use crate::channel::Inner;
use crate::error::{ChannelError, ChannelResult};
use conflux_types::LifecycleEvent;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::trace;

pub(crate) enum LiveReceiver<T> {
    Bounded(mpsc::Receiver<LifecycleEvent<T>>),
    Unbounded(mpsc::UnboundedReceiver<LifecycleEvent<T>>),
}

impl<T> LiveReceiver<T> {
    fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<LifecycleEvent<T>>> {
        match self {
            Self::Bounded(rx) => rx.poll_recv(cx),
            Self::Unbounded(rx) => rx.poll_recv(cx),
        }
    }

    fn try_recv(&mut self) -> Result<LifecycleEvent<T>, TryRecvError> {
        match self {
            Self::Bounded(rx) => rx.try_recv(),
            Self::Unbounded(rx) => rx.try_recv(),
        }
    }
}

/// A single subscriber's view of an [`EventChannel`](crate::EventChannel).
///
/// Yields the synthetic snapshot first, then live events in emission order.
/// The stream ends when the channel closes, or after a single
/// [`ChannelError::Overflow`] if the subscriber fell behind a bounded channel.
/// Live events still queued at that point are discarded, not yielded.
/// Dropping the subscription detaches it from the channel.
pub struct Subscription<T> {
    id: u64,
    snapshot: VecDeque<T>,
    live: Option<LiveReceiver<T>>,
    overflowed: Arc<AtomicBool>,
    capacity: Option<usize>,
    channel: Weak<Inner<T>>,
    terminated: bool,
}

// No field is pinned; the snapshot queue only holds owned values.
impl<T> Unpin for Subscription<T> {}

impl<T> Subscription<T> {
    pub(crate) fn new(
        id: u64,
        snapshot: VecDeque<T>,
        live: LiveReceiver<T>,
        overflowed: Arc<AtomicBool>,
        capacity: Option<usize>,
        channel: Weak<Inner<T>>,
    ) -> Self {
        Self {
            id,
            snapshot,
            live: Some(live),
            overflowed,
            capacity,
            channel,
            terminated: false,
        }
    }

    /// A subscription that has already completed, returned when observing a
    /// closed channel.
    pub(crate) fn completed() -> Self {
        Self {
            id: 0,
            snapshot: VecDeque::new(),
            live: None,
            overflowed: Arc::new(AtomicBool::new(false)),
            capacity: None,
            channel: Weak::new(),
            terminated: true,
        }
    }

    /// Number of synthetic events not yet consumed.
    #[must_use]
    pub fn pending_snapshot(&self) -> usize {
        self.snapshot.len()
    }

    /// Returns true once the stream has ended.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<ChannelResult<LifecycleEvent<T>>> {
        self.next().await
    }

    /// Takes every event that is available right now without waiting.
    ///
    /// Fails with [`ChannelError::Overflow`] if the subscriber overflowed,
    /// discarding whatever was still queued; the subscription is terminated
    /// afterwards and later calls return an empty list.
    pub fn drain(&mut self) -> ChannelResult<Vec<LifecycleEvent<T>>> {
        if let Some(err) = self.take_overflow() {
            return Err(err);
        }

        let mut events: Vec<_> = self.snapshot.drain(..).map(LifecycleEvent::add).collect();
        let Some(live) = self.live.as_mut() else {
            self.terminated = true;
            return Ok(events);
        };

        loop {
            match live.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if let Some(err) = self.take_overflow() {
                        return Err(err);
                    }
                    self.finish();
                    break;
                }
            }
        }
        Ok(events)
    }

    /// Stops receiving events. Other subscribers are unaffected.
    pub fn cancel(self) {
        trace!(subscriber = self.id, "subscription cancelled");
    }

    fn take_overflow(&mut self) -> Option<ChannelError> {
        if self.terminated || !self.overflowed.load(Ordering::Acquire) {
            return None;
        }
        self.finish();
        Some(ChannelError::Overflow {
            capacity: self.capacity.unwrap_or_default().max(1),
        })
    }

    fn finish(&mut self) {
        self.terminated = true;
        self.live = None;
        self.snapshot.clear();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = ChannelResult<LifecycleEvent<T>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.terminated {
            return Poll::Ready(None);
        }
        if let Some(err) = this.take_overflow() {
            return Poll::Ready(Some(Err(err)));
        }
        if let Some(value) = this.snapshot.pop_front() {
            return Poll::Ready(Some(Ok(LifecycleEvent::add(value))));
        }

        let Some(live) = this.live.as_mut() else {
            this.terminated = true;
            return Poll::Ready(None);
        };
        match live.poll_recv(cx) {
            Poll::Ready(Some(event)) => Poll::Ready(Some(Ok(event))),
            Poll::Ready(None) => {
                // The sender is dropped after the flag is set.
                if let Some(err) = this.take_overflow() {
                    return Poll::Ready(Some(Err(err)));
                }
                this.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.upgrade() {
            channel.detach(self.id);
        }
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("pending_snapshot", &self.snapshot.len())
            .field("terminated", &self.terminated)
            .finish_non_exhaustive()
    }
}
