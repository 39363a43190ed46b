//! Channel transport abstraction.
//!
//! The hosted relay is a collaborator: this module only fixes the narrow
//! surface the hub needs (open a named channel, listen, send, close) so any
//! broadcast service can sit underneath.

use crate::error::SyncResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Connection state of a channel, as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    /// Not connected yet.
    #[default]
    Idle,
    /// Subscription requested, not yet confirmed.
    Connecting,
    /// Ready to send and receive.
    Subscribed,
    /// The transport gave up waiting for the subscription.
    TimedOut,
    /// The transport reported a channel failure.
    ChannelError,
    /// The channel was closed.
    Closed,
}

impl ConnectionStatus {
    /// Whether sends will be relayed.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Subscribed)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Subscribed => "subscribed",
            Self::TimedOut => "timed out",
            Self::ChannelError => "channel error",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Options requested when opening a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelOptions {
    /// Deliver our own broadcasts back to us.
    pub self_echo: bool,
    /// Request delivery acknowledgement from the relay.
    pub ack: bool,
}

/// One broadcast message as framed by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelFrame {
    /// Event name the relay routes on.
    pub event: String,
    /// Opaque body.
    pub payload: serde_json::Value,
}

impl ChannelFrame {
    /// Creates a frame.
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }
}

/// Callback for inbound frames.
pub type FrameHandler = Arc<dyn Fn(&ChannelFrame) + Send + Sync>;

/// Callback for connection status changes.
pub type StatusHandler = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

/// An open channel on a transport.
///
/// Handlers must be registered before [`subscribe`](Self::subscribe);
/// frames that arrive earlier are not replayed.
pub trait ChannelHandle: Send + Sync {
    /// The channel name.
    fn name(&self) -> &str;

    /// Registers a handler for every broadcast frame on the channel.
    fn on_broadcast(&self, handler: FrameHandler);

    /// Registers a handler for status changes.
    fn on_status(&self, handler: StatusHandler);

    /// Joins the channel. Completion is reported through the status handlers.
    fn subscribe(&self) -> SyncResult<()>;

    /// Sends a frame to the other members of the channel.
    fn send(&self, frame: ChannelFrame) -> SyncResult<()>;

    /// Leaves the channel. Safe to call more than once.
    fn close(&self);
}

/// A broadcast transport that can open named channels.
pub trait ChannelTransport: Send + Sync {
    /// Opens (but does not join) a channel.
    fn open(&self, name: &str, options: ChannelOptions) -> SyncResult<Arc<dyn ChannelHandle>>;
}

/// An in-process relay for tests and single-process embedding.
pub mod memory {
    use super::*;
    use crate::error::SyncError;
    use parking_lot::{Mutex, RwLock};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tracing::trace;

    /// Relays frames between every open handle of the same channel name.
    ///
    /// Delivery is synchronous: `send` returns after every recipient handler
    /// has run. No lock is held while handlers run.
    #[derive(Clone, Default)]
    pub struct LocalRelay {
        inner: Arc<RelayInner>,
    }

    #[derive(Default)]
    struct RelayInner {
        next_member: AtomicU64,
        channels: RwLock<HashMap<String, Vec<Arc<Member>>>>,
    }

    struct Member {
        id: u64,
        channel: String,
        options: ChannelOptions,
        frame_handlers: RwLock<Vec<FrameHandler>>,
        status_handlers: RwLock<Vec<StatusHandler>>,
        status: Mutex<ConnectionStatus>,
    }

    impl Member {
        fn set_status(&self, status: ConnectionStatus) {
            *self.status.lock() = status;
            let handlers = self.status_handlers.read().clone();
            for handler in handlers {
                handler(status);
            }
        }

        fn deliver(&self, frame: &ChannelFrame) {
            let handlers = self.frame_handlers.read().clone();
            for handler in handlers {
                handler(frame);
            }
        }
    }

    impl LocalRelay {
        /// Creates an empty relay.
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of joined members on a channel.
        pub fn member_count(&self, channel: &str) -> usize {
            self.inner
                .channels
                .read()
                .get(channel)
                .map_or(0, Vec::len)
        }

        /// Delivers a frame to every joined member of `channel`, as if sent
        /// by a peer outside this process.
        pub fn inject(&self, channel: &str, frame: ChannelFrame) {
            for member in self.inner.members(channel) {
                member.deliver(&frame);
            }
        }

        /// Forces a status on every joined member of `channel`.
        ///
        /// Members stay joined; this simulates the relay reporting trouble.
        pub fn set_status(&self, channel: &str, status: ConnectionStatus) {
            for member in self.inner.members(channel) {
                member.set_status(status);
            }
        }
    }

    impl RelayInner {
        fn members(&self, channel: &str) -> Vec<Arc<Member>> {
            self.channels.read().get(channel).cloned().unwrap_or_default()
        }

        fn join(&self, member: &Arc<Member>) {
            let mut channels = self.channels.write();
            let members = channels.entry(member.channel.clone()).or_default();
            if !members.iter().any(|m| m.id == member.id) {
                members.push(member.clone());
            }
        }

        fn leave(&self, member: &Member) {
            let mut channels = self.channels.write();
            let Some(members) = channels.get_mut(&member.channel) else {
                return;
            };
            members.retain(|m| m.id != member.id);
            if members.is_empty() {
                channels.remove(&member.channel);
            }
        }
    }

    impl ChannelTransport for LocalRelay {
        fn open(&self, name: &str, options: ChannelOptions) -> SyncResult<Arc<dyn ChannelHandle>> {
            let member = Arc::new(Member {
                id: self.inner.next_member.fetch_add(1, Ordering::Relaxed),
                channel: name.to_string(),
                options,
                frame_handlers: RwLock::new(Vec::new()),
                status_handlers: RwLock::new(Vec::new()),
                status: Mutex::new(ConnectionStatus::Idle),
            });
            Ok(Arc::new(LocalHandle {
                relay: self.inner.clone(),
                member,
            }))
        }
    }

    struct LocalHandle {
        relay: Arc<RelayInner>,
        member: Arc<Member>,
    }

    impl ChannelHandle for LocalHandle {
        fn name(&self) -> &str {
            &self.member.channel
        }

        fn on_broadcast(&self, handler: FrameHandler) {
            self.member.frame_handlers.write().push(handler);
        }

        fn on_status(&self, handler: StatusHandler) {
            self.member.status_handlers.write().push(handler);
        }

        fn subscribe(&self) -> SyncResult<()> {
            if *self.member.status.lock() == ConnectionStatus::Closed {
                return Err(SyncError::ChannelClosed);
            }
            self.relay.join(&self.member);
            self.member.set_status(ConnectionStatus::Subscribed);
            Ok(())
        }

        fn send(&self, frame: ChannelFrame) -> SyncResult<()> {
            if !self.member.status.lock().is_connected() {
                return Err(SyncError::NotConnected);
            }
            let recipients = self.relay.members(&self.member.channel);
            trace!(
                "relay {}: {} -> {} members",
                self.member.channel,
                frame.event,
                recipients.len()
            );
            for recipient in recipients {
                if recipient.id == self.member.id && !self.member.options.self_echo {
                    continue;
                }
                recipient.deliver(&frame);
            }
            Ok(())
        }

        fn close(&self) {
            if *self.member.status.lock() == ConnectionStatus::Closed {
                return;
            }
            self.relay.leave(&self.member);
            self.member.set_status(ConnectionStatus::Closed);
        }
    }
}
