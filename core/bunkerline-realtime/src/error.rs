//! Error types for the realtime layer.
//!
//! None of these reach the UI: the hub and the sync handles log and drop.
//! They surface only from `connect`/`enable` and from the decode step, where
//! callers decide whether to log.

use thiserror::Error;

/// Result type for realtime operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in realtime operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport-level failure (open, subscribe, send). Raised by hosted
    /// relay adapters; the in-memory relay never fails this way.
    #[error("transport error: {0}")]
    Transport(String),

    /// Send attempted on a channel that is not subscribed.
    #[error("channel not connected")]
    NotConnected,

    /// Channel closed.
    #[error("channel closed")]
    ChannelClosed,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An event's payload does not have the shape its kind requires.
    #[error("malformed payload for {kind}: {reason}")]
    MalformedPayload { kind: String, reason: String },

    /// An event of our stream carries an action we do not know.
    #[error("unknown action in event kind {0:?}")]
    UnknownAction(String),

    /// A change-feed row filter could not be parsed.
    #[error("invalid row filter: {0:?}")]
    InvalidFilter(String),
}
