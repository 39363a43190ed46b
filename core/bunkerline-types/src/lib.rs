//! Core type definitions for Bunkerline realtime sync.
//!
//! This crate defines the transport-agnostic types shared by every client
//! taking part in a broadcast channel:
//! - [`ClientId`], the per-session identity used for echo suppression
//! - [`SyncEvent`], the envelope exchanged over the relay
//! - [`EventKind`] / [`SyncAction`], the `{prefix}_{action}` event taxonomy
//! - [`Identified`], the bound every synced entity type must satisfy
//!
//! Domain entities (supply operations, vehicles, documents) live in
//! `bunkerline-model`, not here.

mod event;
mod ids;

pub use event::{EventKind, Identified, SyncAction, SyncEvent, KIND_SEPARATOR};
pub use ids::{ClientId, CLIENT_ID_TAG};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid client id: {0:?}")]
    InvalidClientId(String),

    #[error("invalid event kind: {0:?}")]
    InvalidEventKind(String),

    #[error("unknown sync action: {0:?}")]
    UnknownAction(String),
}
