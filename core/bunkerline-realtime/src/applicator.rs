//! Entity action applicator - applies sync events to local collections.
//!
//! Inbound events are decoded into an [`EntityAction`] at the channel
//! boundary, then folded into the latest collection state by
//! [`apply_action`]. The applicator never mutates a collection in place; it
//! derives the next state and leaves replacement to the [`CollectionStore`].

use crate::error::{SyncError, SyncResult};
use bunkerline_types::{EventKind, Identified, SyncAction, SyncEvent};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{trace, warn};

/// Payload of a `{prefix}_delete` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePayload {
    pub id: String,
}

/// A decoded mutation of an entity collection.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityAction<T> {
    /// Append unless the id is already present.
    Insert(T),
    /// Replace the element with the same id, whole-object.
    Update(T),
    /// Remove the element with this id.
    Delete { id: String },
    /// Replace the entire collection.
    Batch(Vec<T>),
}

impl<T> EntityAction<T> {
    /// The wire action of this mutation.
    pub fn action(&self) -> SyncAction {
        match self {
            Self::Insert(_) => SyncAction::Insert,
            Self::Update(_) => SyncAction::Update,
            Self::Delete { .. } => SyncAction::Delete,
            Self::Batch(_) => SyncAction::Batch,
        }
    }
}

impl<T: DeserializeOwned> EntityAction<T> {
    /// Decodes an event of the `prefix` stream.
    ///
    /// Returns `Ok(None)` for events of other streams, and an error if the
    /// event is ours but its action or payload is invalid.
    pub fn decode(prefix: &str, event: &SyncEvent) -> SyncResult<Option<Self>> {
        if !EventKind::belongs_to(&event.kind, prefix) {
            return Ok(None);
        }
        let kind = event
            .event_kind()
            .map_err(|_| SyncError::UnknownAction(event.kind.clone()))?;
        let malformed = |e: serde_json::Error| SyncError::MalformedPayload {
            kind: event.kind.clone(),
            reason: e.to_string(),
        };
        let payload = event.payload.clone();
        let action = match kind.action() {
            SyncAction::Insert => Self::Insert(serde_json::from_value(payload).map_err(malformed)?),
            SyncAction::Update => Self::Update(serde_json::from_value(payload).map_err(malformed)?),
            SyncAction::Delete => {
                let DeletePayload { id } = serde_json::from_value(payload).map_err(malformed)?;
                Self::Delete { id }
            }
            SyncAction::Batch => Self::Batch(serde_json::from_value(payload).map_err(malformed)?),
        };
        Ok(Some(action))
    }
}

/// Derives the next collection state from `current`.
///
/// Returns `None` when the action leaves the collection unchanged: a
/// duplicate insert, an update or delete of an absent id. These are
/// expected under concurrent editing and are not errors.
pub fn apply_action<T>(current: &[T], action: EntityAction<T>) -> Option<Vec<T>>
where
    T: Identified + Clone,
{
    match action {
        EntityAction::Insert(item) => {
            if current.iter().any(|e| e.id() == item.id()) {
                trace!("Insert of existing id {} ignored", item.id());
                return None;
            }
            let mut next = current.to_vec();
            next.push(item);
            Some(next)
        }
        EntityAction::Update(item) => {
            let Some(pos) = current.iter().position(|e| e.id() == item.id()) else {
                trace!("Update of absent id {} ignored", item.id());
                return None;
            };
            let mut next = current.to_vec();
            next[pos] = item;
            Some(next)
        }
        EntityAction::Delete { id } => {
            if !current.iter().any(|e| e.id() == id) {
                trace!("Delete of absent id {} ignored", id);
                return None;
            }
            Some(current.iter().filter(|e| e.id() != id).cloned().collect())
        }
        EntityAction::Batch(items) => Some(dedup_by_id(items)),
    }
}

/// Keeps the first element for each id.
fn dedup_by_id<T: Identified>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(items.len());
    let total = items.len();
    let unique: Vec<T> = items
        .into_iter()
        .filter(|item| seen.insert(item.id().to_string()))
        .collect();
    if unique.len() != total {
        warn!("Batch repeated {} id(s); kept first occurrences", total - unique.len());
    }
    unique
}

/// An application-owned collection the applicator may update.
pub trait CollectionStore<T>: Send + Sync {
    /// Reads the latest state, lets `derive` compute the next one, and
    /// replaces it. `derive` returning `None` leaves the state untouched.
    ///
    /// Implementations must make read-derive-replace atomic with respect to
    /// other `update` calls.
    fn update(&self, derive: &mut dyn FnMut(&[T]) -> Option<Vec<T>>);
}

/// A shareable `Vec<T>` behind a lock; the stock [`CollectionStore`].
#[derive(Debug)]
pub struct SharedCollection<T> {
    items: Arc<RwLock<Vec<T>>>,
}

impl<T> Clone for SharedCollection<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<T> Default for SharedCollection<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T> SharedCollection<T> {
    /// Wraps an initial state.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: Arc::new(RwLock::new(items)),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Replaces the whole state.
    pub fn replace(&self, items: Vec<T>) {
        *self.items.write() = items;
    }
}

impl<T: Clone> SharedCollection<T> {
    /// Copy of the current state.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.read().clone()
    }
}

impl<T: Identified + Clone> SharedCollection<T> {
    /// Applies a local mutation with the same rules as remote ones.
    /// Returns true if the collection changed.
    pub fn apply(&self, action: EntityAction<T>) -> bool {
        let mut guard = self.items.write();
        match apply_action(&guard, action) {
            Some(next) => {
                *guard = next;
                true
            }
            None => false,
        }
    }
}

impl<T: Send + Sync> CollectionStore<T> for SharedCollection<T> {
    fn update(&self, derive: &mut dyn FnMut(&[T]) -> Option<Vec<T>>) {
        let mut guard = self.items.write();
        if let Some(next) = derive(&guard) {
            *guard = next;
        }
    }
}
