//! Realtime state sync for Bunkerline dashboards.
//!
//! Several clients each hold their own in-memory copy of shared collections
//! (supply operations, vehicles, documents). This crate keeps those copies
//! consistent by exchanging change events over a broadcast relay.
//!
//! # Architecture
//!
//! - **Transport**: the hosted relay, behind [`ChannelTransport`]
//! - **Hub**: one channel subscription per client, tagging sends with the
//!   client's identity and suppressing its own echoes
//! - **Applicator**: decodes `{prefix}_{action}` events and derives the next
//!   collection state, idempotently
//! - **Entity sync**: binds one collection to one stream prefix on the hub
//! - **Table realtime**: follows the store's row change feed directly
//!
//! ## Data flow
//!
//! 1. A client mutates its collection locally
//! 2. [`EntitySync`] publishes the mutation through the [`BroadcastHub`]
//! 3. The relay fans it out to every other client on the channel
//! 4. Each receiving hub drops events carrying its own id, then dispatches
//! 5. Each receiving [`EntitySync`] applies the action to its collection
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use bunkerline_model::{SupplyOperation, OPERATION_EVENT_PREFIX};
//! use bunkerline_realtime::transport::memory::LocalRelay;
//! use bunkerline_realtime::{BroadcastHub, EntitySync, HubConfig, SharedCollection};
//!
//! let relay = Arc::new(LocalRelay::new());
//! let hub = Arc::new(BroadcastHub::new(relay, HubConfig::default()));
//! hub.connect().unwrap();
//!
//! let operations = SharedCollection::<SupplyOperation>::default();
//! let sync = EntitySync::new(hub.clone(), OPERATION_EVENT_PREFIX, operations.clone());
//!
//! let op = SupplyOperation::new("op1", "MV Aegean Star");
//! operations.replace(vec![op.clone()]);
//! sync.sync_insert(&op);
//! ```

pub mod applicator;
pub mod config;
mod entity_sync;
mod error;
pub mod feed;
mod hub;
mod table;
pub mod transport;

pub use applicator::{apply_action, CollectionStore, DeletePayload, EntityAction, SharedCollection};
pub use config::{HubConfig, TableRealtimeConfig, DEFAULT_CHANNEL};
pub use entity_sync::EntitySync;
pub use error::{SyncError, SyncResult};
pub use feed::{ChangeFeed, FeedSubscription, RowChange, RowChangeCallback, RowEventType, RowFilter};
pub use hub::{BroadcastHub, EventCallback, SubscriberId, Subscription};
pub use table::{DeletedRow, OperationsRealtime, RowHandlers, TableRealtime};
pub use transport::{
    ChannelFrame, ChannelHandle, ChannelOptions, ChannelTransport, ConnectionStatus, FrameHandler,
    StatusHandler,
};

pub use bunkerline_types::{ClientId, EventKind, Identified, SyncAction, SyncEvent};
