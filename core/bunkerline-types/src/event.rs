//! Event types for broadcast sync.
//!
//! Every message on a sync channel is a [`SyncEvent`]: an event kind, an
//! opaque JSON payload, and the identity of the client that sent it. Entity
//! streams name their events `{prefix}_{action}`, where the action is one of
//! the four [`SyncAction`]s.

use crate::{ClientId, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between an entity stream prefix and its action.
pub const KIND_SEPARATOR: char = '_';

/// An entity that can be kept in a synced collection.
///
/// The id must be unique within a collection; the reducer relies on it for
/// every insert, update and delete.
pub trait Identified {
    /// The entity's unique identifier.
    fn id(&self) -> &str;
}

/// The mutation carried by an entity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    /// A new entity was added.
    Insert,
    /// An existing entity was replaced with a new full version.
    Update,
    /// An entity was removed.
    Delete,
    /// The whole collection was replaced.
    Batch,
}

impl SyncAction {
    /// All actions, in wire order.
    pub const ALL: [SyncAction; 4] = [Self::Insert, Self::Update, Self::Delete, Self::Batch];

    /// The wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Batch => "batch",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "batch" => Ok(Self::Batch),
            other => Err(Error::UnknownAction(other.to_string())),
        }
    }
}

/// A parsed `{prefix}_{action}` event kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKind {
    prefix: String,
    action: SyncAction,
}

impl EventKind {
    /// Creates an event kind for the given stream prefix and action.
    pub fn new(prefix: impl Into<String>, action: SyncAction) -> Self {
        Self {
            prefix: prefix.into(),
            action,
        }
    }

    /// Parses a kind string.
    ///
    /// The prefix may itself contain the separator (`supply_operation_insert`),
    /// so the action is taken from the last segment.
    pub fn parse(kind: &str) -> Result<Self> {
        let (prefix, action) = kind
            .rsplit_once(KIND_SEPARATOR)
            .ok_or_else(|| Error::InvalidEventKind(kind.to_string()))?;
        if prefix.is_empty() {
            return Err(Error::InvalidEventKind(kind.to_string()));
        }
        Ok(Self {
            prefix: prefix.to_string(),
            action: action.parse()?,
        })
    }

    /// The entity stream prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The action.
    #[must_use]
    pub fn action(&self) -> SyncAction {
        self.action
    }

    /// Returns true if `kind` names an event of the stream `prefix`,
    /// regardless of whether its action is known.
    #[must_use]
    pub fn belongs_to(kind: &str, prefix: &str) -> bool {
        kind.strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix(KIND_SEPARATOR))
            .is_some_and(|action| !action.contains(KIND_SEPARATOR))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.prefix, KIND_SEPARATOR, self.action)
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A message exchanged over a sync channel.
///
/// The sender id is set once by the sending hub and never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    /// The event kind, usually `{prefix}_{action}`.
    pub kind: String,
    /// Kind-specific JSON payload.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// The client that sent this event.
    pub sender_id: ClientId,
}

impl SyncEvent {
    /// Creates a new event.
    pub fn new(kind: impl Into<String>, payload: serde_json::Value, sender_id: ClientId) -> Self {
        Self {
            kind: kind.into(),
            payload,
            sender_id,
        }
    }

    /// Creates an entity event for `prefix` and `action`.
    pub fn entity(
        prefix: &str,
        action: SyncAction,
        payload: serde_json::Value,
        sender_id: ClientId,
    ) -> Self {
        Self::new(EventKind::new(prefix, action).to_string(), payload, sender_id)
    }

    /// Parses the event's kind.
    pub fn event_kind(&self) -> Result<EventKind> {
        EventKind::parse(&self.kind)
    }

    /// Returns true if the event was sent by `client`.
    #[must_use]
    pub fn is_from(&self, client: &ClientId) -> bool {
        &self.sender_id == client
    }
}
