//! Domain entity model for Bunkerline.
//!
//! - [`SupplyOperation`]: a scheduled bunker delivery to a vessel
//! - [`OperationStatus`]: where an operation is in its lifecycle
//!
//! Row shapes follow the `supply_operations` table, so the same type decodes
//! both broadcast payloads and change-feed rows.

mod operation;

pub use operation::{OperationStatus, SupplyOperation, OPERATIONS_TABLE, OPERATION_EVENT_PREFIX};
