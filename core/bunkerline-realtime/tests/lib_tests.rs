use bunkerline_realtime::transport::memory::LocalRelay;
use bunkerline_realtime::{BroadcastHub, HubConfig, SyncError, DEFAULT_CHANNEL};
use std::sync::Arc;

#[test]
fn hub_creation() {
    let hub = BroadcastHub::new(Arc::new(LocalRelay::new()), HubConfig::default());

    assert_eq!(hub.config().channel_name, DEFAULT_CHANNEL);
    assert!(hub.client_id().as_str().starts_with("client_"));
    assert!(!hub.is_connected());
    assert_eq!(hub.subscriber_count(), 0);
}

#[test]
fn error_messages() {
    let malformed = SyncError::MalformedPayload {
        kind: "operation_insert".into(),
        reason: "missing field `id`".into(),
    };
    assert_eq!(
        malformed.to_string(),
        "malformed payload for operation_insert: missing field `id`"
    );
    assert_eq!(SyncError::NotConnected.to_string(), "channel not connected");
    assert_eq!(
        SyncError::UnknownAction("operation_merge".into()).to_string(),
        "unknown action in event kind \"operation_merge\""
    );
}

#[test]
fn serde_errors_convert() {
    let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: SyncError = err.into();
    assert!(matches!(err, SyncError::Serialization(_)));
}
