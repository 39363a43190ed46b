use bunkerline_types::{ClientId, EventKind, SyncAction, SyncEvent};
use serde_json::json;
use std::str::FromStr;

fn client(s: &str) -> ClientId {
    ClientId::parse(s).unwrap()
}

// ── SyncAction ────────────────────────────────────────────────────

#[test]
fn action_wire_names() {
    let names: Vec<&str> = SyncAction::ALL.iter().map(|a| a.as_str()).collect();
    assert_eq!(names, ["insert", "update", "delete", "batch"]);
}

#[test]
fn action_from_str_roundtrip() {
    for action in SyncAction::ALL {
        assert_eq!(SyncAction::from_str(action.as_str()).unwrap(), action);
    }
}

#[test]
fn action_from_str_unknown() {
    assert!(SyncAction::from_str("upsert").is_err());
    assert!(SyncAction::from_str("INSERT").is_err());
}

#[test]
fn action_serde_lowercase() {
    let json = serde_json::to_string(&SyncAction::Batch).unwrap();
    assert_eq!(json, r#""batch""#);
}

// ── EventKind ─────────────────────────────────────────────────────

#[test]
fn kind_display() {
    let kind = EventKind::new("operation", SyncAction::Insert);
    assert_eq!(kind.to_string(), "operation_insert");
}

#[test]
fn kind_parse_simple() {
    let kind = EventKind::parse("operation_delete").unwrap();
    assert_eq!(kind.prefix(), "operation");
    assert_eq!(kind.action(), SyncAction::Delete);
}

#[test]
fn kind_parse_prefix_with_separator() {
    let kind: EventKind = "supply_operation_update".parse().unwrap();
    assert_eq!(kind.prefix(), "supply_operation");
    assert_eq!(kind.action(), SyncAction::Update);
}

#[test]
fn kind_parse_rejects_missing_separator() {
    assert!(EventKind::parse("operation").is_err());
}

#[test]
fn kind_parse_rejects_empty_prefix() {
    assert!(EventKind::parse("_insert").is_err());
}

#[test]
fn kind_parse_rejects_unknown_action() {
    assert!(EventKind::parse("operation_merge").is_err());
}

#[test]
fn belongs_to_matches_own_stream() {
    assert!(EventKind::belongs_to("operation_insert", "operation"));
    assert!(EventKind::belongs_to("operation_merge", "operation"));
    assert!(EventKind::belongs_to("supply_operation_batch", "supply_operation"));
}

#[test]
fn belongs_to_rejects_other_streams() {
    assert!(!EventKind::belongs_to("vehicle_insert", "operation"));
    assert!(!EventKind::belongs_to("operations_insert", "operation"));
    assert!(!EventKind::belongs_to("operation_note_insert", "operation"));
    assert!(!EventKind::belongs_to("operation", "operation"));
}

// ── SyncEvent ─────────────────────────────────────────────────────

#[test]
fn entity_event_kind() {
    let event =
        SyncEvent::entity("operation", SyncAction::Update, json!({"id": "op1"}), client("C1"));
    assert_eq!(event.kind, "operation_update");
    assert_eq!(event.event_kind().unwrap().action(), SyncAction::Update);
}

#[test]
fn is_from_compares_sender() {
    let event = SyncEvent::new("ping", json!(null), client("C1"));
    assert!(event.is_from(&client("C1")));
    assert!(!event.is_from(&client("C2")));
}

#[test]
fn serde_uses_camel_case_sender() {
    let event = SyncEvent::new("operation_delete", json!({"id": "op1"}), client("C1"));
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(
        value,
        json!({"kind": "operation_delete", "payload": {"id": "op1"}, "senderId": "C1"})
    );
}

#[test]
fn deserialize_without_payload_defaults_to_null() {
    let event: SyncEvent = serde_json::from_str(r#"{"kind":"ping","senderId":"C9"}"#).unwrap();
    assert!(event.payload.is_null());
    assert_eq!(event.sender_id.as_str(), "C9");
}

#[test]
fn deserialize_without_sender_fails() {
    let result: Result<SyncEvent, _> = serde_json::from_str(r#"{"kind":"ping","payload":1}"#);
    assert!(result.is_err());
}
