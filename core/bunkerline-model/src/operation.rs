use bunkerline_types::Identified;
use serde::{Deserialize, Serialize};

/// Table backing supply operations in the change feed.
pub const OPERATIONS_TABLE: &str = "supply_operations";

/// Event prefix of the supply operation broadcast stream.
pub const OPERATION_EVENT_PREFIX: &str = "operation";

/// Lifecycle of a supply operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    #[default]
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

/// A scheduled fuel delivery to a vessel.
///
/// Columns the dashboard does not model are kept in `extra` so a full-object
/// update never drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyOperation {
    pub id: String,
    pub vessel_name: String,
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub fuel_type: Option<String>,
    /// Quantity in metric tonnes.
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub status: OperationStatus,
    /// ISO-8601 date-time as stored by the backend.
    #[serde(default)]
    pub scheduled_at: Option<String>,
    #[serde(default)]
    pub driver_id: Option<String>,
    #[serde(default)]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SupplyOperation {
    /// Creates a planned operation with only the required fields set.
    pub fn new(id: impl Into<String>, vessel_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vessel_name: vessel_name.into(),
            port: None,
            fuel_type: None,
            quantity: None,
            status: OperationStatus::default(),
            scheduled_at: None,
            driver_id: None,
            vehicle_id: None,
            notes: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Returns true once the operation can no longer change status.
    pub fn is_closed(&self) -> bool {
        matches!(self.status, OperationStatus::Completed | OperationStatus::Cancelled)
    }
}

impl Identified for SupplyOperation {
    fn id(&self) -> &str {
        &self.id
    }
}
