//! Broadcast hub: one channel subscription shared by every local subscriber.
//!
//! The hub tags outbound events with its own [`ClientId`] and drops inbound
//! events carrying that id before they reach any subscriber. The transport is
//! also asked not to echo, but only the identity check is relied on.

use crate::config::HubConfig;
use crate::error::SyncResult;
use crate::transport::{
    ChannelFrame, ChannelHandle, ChannelOptions, ChannelTransport, ConnectionStatus,
};
use bunkerline_types::{ClientId, SyncEvent};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// Callback invoked for every inbound event not sent by this hub.
pub type EventCallback = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Stable handle of a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Observer registry keyed by [`SubscriberId`].
#[derive(Default)]
struct SubscriberRegistry {
    next_id: AtomicU64,
    callbacks: RwLock<HashMap<SubscriberId, EventCallback>>,
}

impl SubscriberRegistry {
    fn insert(&self, callback: EventCallback) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks.write().insert(id, callback);
        id
    }

    fn remove(&self, id: SubscriberId) -> bool {
        self.callbacks.write().remove(&id).is_some()
    }

    fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    fn contains(&self, id: SubscriberId) -> bool {
        self.callbacks.read().contains_key(&id)
    }

    /// Runs every callback against a snapshot of the registry. A callback
    /// removed mid-dispatch is skipped if it has not run yet.
    fn dispatch(&self, event: &SyncEvent) {
        let snapshot: Vec<(SubscriberId, EventCallback)> = self
            .callbacks
            .read()
            .iter()
            .map(|(id, cb)| (*id, cb.clone()))
            .collect();
        for (id, callback) in snapshot {
            if self.contains(id) {
                callback(event);
            }
        }
    }
}

struct HubInner {
    client_id: ClientId,
    subscribers: SubscriberRegistry,
    status: watch::Sender<ConnectionStatus>,
    /// Bumped on every connect and teardown. Transport callbacks carry the
    /// generation they were registered under and are ignored once stale.
    generation: AtomicU64,
}

impl HubInner {
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    fn receive(&self, frame: &ChannelFrame) {
        let event: SyncEvent = match serde_json::from_value(frame.payload.clone()) {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping malformed frame {:?}: {}", frame.event, e);
                return;
            }
        };
        if event.kind != frame.event {
            warn!(
                "Dropping frame whose event {:?} disagrees with its body kind {:?}",
                frame.event, event.kind
            );
            return;
        }
        if event.is_from(&self.client_id) {
            trace!("Suppressed self echo of {}", event.kind);
            return;
        }
        self.subscribers.dispatch(&event);
    }

    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            debug!("Hub {} status: {} -> {}", self.client_id, previous, status);
        }
    }
}

/// Owns one broadcast channel subscription and fans inbound events out to
/// local subscribers.
///
/// Dropping the hub releases the subscription.
pub struct BroadcastHub {
    inner: Arc<HubInner>,
    transport: Arc<dyn ChannelTransport>,
    config: HubConfig,
    channel: Mutex<Option<Arc<dyn ChannelHandle>>>,
}

impl BroadcastHub {
    /// Creates a hub with a freshly generated client identity. Does not
    /// connect.
    pub fn new(transport: Arc<dyn ChannelTransport>, config: HubConfig) -> Self {
        Self::with_client_id(transport, config, ClientId::generate())
    }

    /// Creates a hub with a given identity.
    pub fn with_client_id(
        transport: Arc<dyn ChannelTransport>,
        config: HubConfig,
        client_id: ClientId,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Idle);
        Self {
            inner: Arc::new(HubInner {
                client_id,
                subscribers: SubscriberRegistry::default(),
                status,
                generation: AtomicU64::new(0),
            }),
            transport,
            config,
            channel: Mutex::new(None),
        }
    }

    /// This hub's identity.
    pub fn client_id(&self) -> &ClientId {
        &self.inner.client_id
    }

    /// The hub configuration.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status.borrow()
    }

    /// Whether broadcasts will currently be relayed.
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Watches connection status changes.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Opens and joins the channel.
    ///
    /// Calling this while a channel is already held does nothing. A failure
    /// leaves the hub disconnected with status `ChannelError`; there is no
    /// automatic retry.
    pub fn connect(&self) -> SyncResult<()> {
        let mut slot = self.channel.lock();
        if slot.is_some() {
            debug!("Hub {} already connected", self.inner.client_id);
            return Ok(());
        }

        let generation = self.inner.next_generation();
        self.inner.set_status(ConnectionStatus::Connecting);
        let options = ChannelOptions {
            self_echo: self.config.self_echo,
            ack: self.config.ack,
        };
        let channel = match self.transport.open(&self.config.channel_name, options) {
            Ok(channel) => channel,
            Err(e) => {
                warn!("Failed to open channel {}: {}", self.config.channel_name, e);
                self.inner.set_status(ConnectionStatus::ChannelError);
                return Err(e);
            }
        };

        let weak: Weak<HubInner> = Arc::downgrade(&self.inner);
        channel.on_broadcast(Arc::new(move |frame: &ChannelFrame| {
            match weak.upgrade() {
                Some(inner) if inner.is_current(generation) => inner.receive(frame),
                Some(_) => trace!("Ignoring {} from a released channel", frame.event),
                None => {}
            }
        }));
        let weak: Weak<HubInner> = Arc::downgrade(&self.inner);
        channel.on_status(Arc::new(move |status: ConnectionStatus| {
            match weak.upgrade() {
                Some(inner) if inner.is_current(generation) => inner.set_status(status),
                Some(_) => trace!("Ignoring {} status from a released channel", status),
                None => {}
            }
        }));

        if let Err(e) = channel.subscribe() {
            warn!("Failed to join channel {}: {}", self.config.channel_name, e);
            self.inner.next_generation();
            channel.close();
            self.inner.set_status(ConnectionStatus::ChannelError);
            return Err(e);
        }

        info!(
            "Hub {} joined channel {}",
            self.inner.client_id, self.config.channel_name
        );
        *slot = Some(channel);
        Ok(())
    }

    /// Leaves the channel. Safe to call when never connected.
    pub fn disconnect(&self) {
        let channel = self.channel.lock().take();
        self.inner.next_generation();
        if let Some(channel) = channel {
            channel.close();
            info!(
                "Hub {} left channel {}",
                self.inner.client_id,
                channel.name()
            );
        }
        self.inner.set_status(ConnectionStatus::Closed);
    }

    /// Sends an event tagged with this hub's identity.
    ///
    /// Best effort: before the channel is subscribed, or if the transport
    /// rejects the send, the event is dropped without error.
    pub fn broadcast(&self, kind: &str, payload: serde_json::Value) {
        if !self.is_connected() {
            debug!("Dropping {} broadcast: hub status is {}", kind, self.status());
            return;
        }
        let Some(channel) = self.channel.lock().clone() else {
            debug!("Dropping {} broadcast: no channel", kind);
            return;
        };

        let event = SyncEvent::new(kind, payload, self.inner.client_id.clone());
        let body = match serde_json::to_value(&event) {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to encode {} event: {}", kind, e);
                return;
            }
        };
        if let Err(e) = channel.send(ChannelFrame::new(kind, body)) {
            warn!("Broadcast of {} not relayed: {}", kind, e);
        }
    }

    /// Registers a callback for every inbound event sent by another client.
    ///
    /// The callback stays registered until the returned [`Subscription`] is
    /// dropped or unsubscribed.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let id = self.inner.subscribers.insert(Arc::new(callback));
        trace!("Hub {} registered {}", self.inner.client_id, id);
        Subscription {
            id,
            hub: Arc::downgrade(&self.inner),
        }
    }
}

impl Drop for BroadcastHub {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("client_id", &self.inner.client_id)
            .field("channel", &self.config.channel_name)
            .field("status", &self.status())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Registration guard returned by [`BroadcastHub::subscribe`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriberId,
    hub: Weak<HubInner>,
}

impl Subscription {
    /// The subscriber handle.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Deregisters the callback. Events dispatched afterwards are not
    /// delivered to it.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            if hub.subscribers.remove(self.id) {
                trace!("Hub {} removed {}", hub.client_id, self.id);
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Subscription").field(&self.id).finish()
    }
}
