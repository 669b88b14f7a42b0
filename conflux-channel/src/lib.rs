//! Lifecycle event channel for conflux.
//!
//! An [`EventChannel`] fans lifecycle events out to any number of
//! [`Subscription`]s. Its defining property is late-subscriber replay: a
//! subscriber that attaches after entities already exist first receives a
//! synthetic `Add` for each of them, then every live event emitted after the
//! snapshot was taken, with nothing lost and nothing repeated.
//!
//! # Replay ordering
//!
//! A subscription attaches to the live feed *before* the snapshot is read.
//! Everything emitted from that moment on is buffered in the subscriber's
//! live queue, while the snapshot sits in a separate queue that is always
//! drained first. Components that own the snapshot data (the store and the
//! composition engine) additionally take the snapshot under the same lock
//! their writers hold while emitting, which closes the window in which an
//! event could appear both in the snapshot and in the live queue. Channels
//! built with an existing-data supplier get the same guarantee when their
//! data only changes inside [`EventChannel::emit_with`].
//!
//! # Subscription modes
//!
//! - [`EventChannel::observe`]: replay the channel's existing data, then tail
//! - [`EventChannel::observe_with`]: replay a caller-supplied snapshot, then tail
//! - [`EventChannel::observe_live`]: tail only
//!
//! # Backpressure
//!
//! Channels are unbounded by default. With a configured capacity, a
//! subscriber whose live queue is full is detached and its next poll yields
//! [`ChannelError::Overflow`]. Overflow is fail-fast: the backlog still queued
//! for that subscriber is discarded and replaced by the error. Events are
//! never dropped silently.

mod channel;
mod config;
mod error;
mod feed;
mod subscription;

pub use channel::EventChannel;
pub use config::ChannelConfig;
pub use error::{ChannelError, ChannelResult};
pub use feed::{follow, Feed, FeedExit};
pub use subscription::Subscription;
