//! Background consumers that apply a subscription's events to a sink.

use crate::error::ChannelError;
use crate::subscription::Subscription;
use conflux_types::LifecycleEvent;
use std::fmt;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Why a [`Feed`] stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedExit {
    /// The source channel closed.
    Completed,
    /// The sink rejected an event. Carries the rendered error.
    Rejected(String),
    /// The feed fell behind a bounded source.
    Overflowed,
    /// The feed was cancelled, or its task panicked.
    Cancelled,
}

/// Handle to a running feed task.
///
/// Dropping the handle does not stop the feed; call [`cancel`](Self::cancel).
#[derive(Debug)]
pub struct Feed {
    name: String,
    handle: JoinHandle<FeedExit>,
}

impl Feed {
    /// The name the feed was started with.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true once the feed task has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the feed. Events not yet applied are discarded.
    pub fn cancel(&self) {
        debug!(feed = %self.name, "cancelling feed");
        self.handle.abort();
    }

    /// Waits for the feed to stop.
    pub async fn finished(self) -> FeedExit {
        match self.handle.await {
            Ok(exit) => exit,
            Err(e) => {
                if e.is_panic() {
                    error!(feed = %self.name, "feed task panicked");
                }
                FeedExit::Cancelled
            }
        }
    }
}

/// Spawns a task that applies every event of `subscription` to `apply`.
///
/// The feed stops at the end of the stream, on the first rejected event, or on
/// overflow. Must be called from within a Tokio runtime.
pub fn follow<T, E, A>(name: impl Into<String>, mut subscription: Subscription<T>, mut apply: A) -> Feed
where
    T: Send + 'static,
    E: fmt::Display,
    A: FnMut(LifecycleEvent<T>) -> Result<(), E> + Send + 'static,
{
    let name = name.into();
    let task_name = name.clone();

    let handle = tokio::spawn(async move {
        while let Some(next) = subscription.recv().await {
            let event = match next {
                Ok(event) => event,
                Err(ChannelError::Overflow { capacity }) => {
                    warn!(feed = %task_name, capacity, "feed overflowed, stopping");
                    return FeedExit::Overflowed;
                }
                Err(ChannelError::Closed) => break,
            };

            let kind = event.kind;
            if let Err(e) = apply(event) {
                warn!(feed = %task_name, %kind, "failed to apply event: {e}");
                return FeedExit::Rejected(e.to_string());
            }
        }

        debug!(feed = %task_name, "feed completed");
        FeedExit::Completed
    });

    Feed { name, handle }
}
