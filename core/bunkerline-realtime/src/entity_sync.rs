//! Generic entity sync: publishes local mutations and applies remote ones.

use crate::applicator::{apply_action, CollectionStore, EntityAction};
use crate::hub::{BroadcastHub, Subscription};
use bunkerline_types::{EventKind, Identified, SyncAction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

/// Bridges one entity collection and a [`BroadcastHub`].
///
/// Events are namespaced `{prefix}_{action}` so several entity streams can
/// share a channel. Outbound calls only publish: the caller applies its own
/// mutation locally first, and the hub keeps the echo from being applied
/// twice. Dropping the `EntitySync` stops inbound application.
pub struct EntitySync<T> {
    hub: Arc<BroadcastHub>,
    prefix: String,
    _subscription: Subscription,
    _entity: PhantomData<fn() -> T>,
}

impl<T> EntitySync<T>
where
    T: Identified + Clone + Serialize + DeserializeOwned + 'static,
{
    /// Subscribes `store` to the `prefix` stream of `hub`.
    pub fn new<S>(hub: Arc<BroadcastHub>, prefix: impl Into<String>, store: S) -> Self
    where
        S: CollectionStore<T> + 'static,
    {
        let prefix = prefix.into();
        let stream = prefix.clone();
        let subscription = hub.subscribe(move |event| {
            let action = match EntityAction::<T>::decode(&stream, event) {
                Ok(Some(action)) => action,
                Ok(None) => return,
                Err(e) => {
                    warn!("Dropping event from {}: {}", event.sender_id, e);
                    return;
                }
            };
            debug!("Applying {} from {}", event.kind, event.sender_id);
            let mut pending = Some(action);
            store.update(&mut |current| pending.take().and_then(|a| apply_action(current, a)));
        });

        Self {
            hub,
            prefix,
            _subscription: subscription,
            _entity: PhantomData,
        }
    }

    /// The stream prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The hub this stream publishes through.
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Publishes `{prefix}_insert` with the full item.
    pub fn sync_insert(&self, item: &T) {
        self.publish(SyncAction::Insert, serde_json::to_value(item));
    }

    /// Publishes `{prefix}_update` with the full updated item.
    pub fn sync_update(&self, item: &T) {
        self.publish(SyncAction::Update, serde_json::to_value(item));
    }

    /// Publishes `{prefix}_delete` with `{ "id": id }`.
    pub fn sync_delete(&self, id: &str) {
        self.publish(SyncAction::Delete, Ok(serde_json::json!({ "id": id })));
    }

    /// Publishes `{prefix}_batch` with the whole collection, for full resync.
    pub fn sync_batch(&self, items: &[T]) {
        self.publish(SyncAction::Batch, serde_json::to_value(items));
    }

    fn publish(&self, action: SyncAction, payload: Result<serde_json::Value, serde_json::Error>) {
        let kind = EventKind::new(self.prefix.as_str(), action).to_string();
        match payload {
            Ok(payload) => self.hub.broadcast(&kind, payload),
            Err(e) => warn!("Not publishing {}: {}", kind, e),
        }
    }
}

impl<T> fmt::Debug for EntitySync<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySync")
            .field("prefix", &self.prefix)
            .field("client_id", self.hub.client_id())
            .finish()
    }
}
