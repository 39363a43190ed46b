//! Table-bound realtime hook following the store's change feed directly.
//!
//! Unlike [`EntitySync`](crate::EntitySync), this does not go through the
//! broadcast hub and does no echo suppression: the change feed already
//! delivers one notification per row mutation.

use crate::config::TableRealtimeConfig;
use crate::error::SyncResult;
use crate::feed::{ChangeFeed, FeedSubscription, RowChange, RowEventType};
use crate::transport::{
    ChannelFrame, ChannelHandle, ChannelOptions, ChannelTransport, ConnectionStatus,
};
use bunkerline_model::SupplyOperation;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key of a deleted row. The store usually sends only the primary key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeletedRow {
    pub id: String,
}

type RowCallback<T> = Box<dyn Fn(T) + Send + Sync>;

/// Callbacks invoked for decoded row changes.
pub struct RowHandlers<T> {
    on_insert: Option<RowCallback<T>>,
    on_update: Option<RowCallback<T>>,
    on_delete: Option<RowCallback<DeletedRow>>,
    on_any_change: Option<Box<dyn Fn(&RowChange) + Send + Sync>>,
}

impl<T> Default for RowHandlers<T> {
    fn default() -> Self {
        Self {
            on_insert: None,
            on_update: None,
            on_delete: None,
            on_any_change: None,
        }
    }
}

impl<T> RowHandlers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_insert(mut self, f: impl Fn(T) + Send + Sync + 'static) -> Self {
        self.on_insert = Some(Box::new(f));
        self
    }

    pub fn on_update(mut self, f: impl Fn(T) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Box::new(f));
        self
    }

    pub fn on_delete(mut self, f: impl Fn(DeletedRow) + Send + Sync + 'static) -> Self {
        self.on_delete = Some(Box::new(f));
        self
    }

    /// Runs after the specific handler for every change, including rows
    /// that failed to decode.
    pub fn on_any_change(mut self, f: impl Fn(&RowChange) + Send + Sync + 'static) -> Self {
        self.on_any_change = Some(Box::new(f));
        self
    }
}

impl<T: DeserializeOwned> RowHandlers<T> {
    fn dispatch(&self, change: &RowChange) {
        match change.event_type {
            RowEventType::Insert => {
                if let Some(handler) = &self.on_insert {
                    if let Some(row) = decode_row(change, change.new.as_ref()) {
                        handler(row);
                    }
                }
            }
            RowEventType::Update => {
                if let Some(handler) = &self.on_update {
                    if let Some(row) = decode_row(change, change.new.as_ref()) {
                        handler(row);
                    }
                }
            }
            RowEventType::Delete => {
                if let Some(handler) = &self.on_delete {
                    if let Some(row) = decode_row(change, change.old.as_ref()) {
                        handler(row);
                    }
                }
            }
        }
        if let Some(handler) = &self.on_any_change {
            handler(change);
        }
    }
}

fn decode_row<R: DeserializeOwned>(
    change: &RowChange,
    row: Option<&serde_json::Value>,
) -> Option<R> {
    let Some(row) = row else {
        warn!("{:?} on {} carried no row", change.event_type, change.table);
        return None;
    };
    match R::deserialize(row) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!("Dropping malformed {:?} row on {}: {}", change.event_type, change.table, e);
            None
        }
    }
}

struct ActiveTable {
    feed_subscription: Box<dyn FeedSubscription>,
    channel: Arc<dyn ChannelHandle>,
}

/// Follows one table's change feed and owns a side channel for manual
/// peer notifications.
///
/// [`enable`](Self::enable) subscribes once; calling it again keeps the
/// existing subscription. [`disable`](Self::disable) and drop tear down both.
pub struct TableRealtime<T> {
    feed: Arc<dyn ChangeFeed>,
    transport: Arc<dyn ChannelTransport>,
    config: TableRealtimeConfig,
    handlers: Arc<RowHandlers<T>>,
    status: Arc<RwLock<ConnectionStatus>>,
    /// Bumped on every enable and teardown; stale channel callbacks are ignored.
    generation: Arc<AtomicU64>,
    active: Mutex<Option<ActiveTable>>,
}

/// Realtime hook for the supply operations table.
pub type OperationsRealtime = TableRealtime<SupplyOperation>;

impl OperationsRealtime {
    /// Hook on `supply_operations` with default channel naming.
    pub fn operations(
        feed: Arc<dyn ChangeFeed>,
        transport: Arc<dyn ChannelTransport>,
        handlers: RowHandlers<SupplyOperation>,
    ) -> Self {
        Self::new(feed, transport, TableRealtimeConfig::default(), handlers)
    }
}

impl<T> TableRealtime<T>
where
    T: DeserializeOwned + 'static,
{
    /// Creates a disabled hook.
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        transport: Arc<dyn ChannelTransport>,
        config: TableRealtimeConfig,
        handlers: RowHandlers<T>,
    ) -> Self {
        Self {
            feed,
            transport,
            config,
            handlers: Arc::new(handlers),
            status: Arc::new(RwLock::new(ConnectionStatus::Idle)),
            generation: Arc::new(AtomicU64::new(0)),
            active: Mutex::new(None),
        }
    }

    /// The hook configuration.
    pub fn config(&self) -> &TableRealtimeConfig {
        &self.config
    }

    /// Whether the feed subscription is live.
    pub fn is_enabled(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Status of the side channel.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.read()
    }

    /// Subscribes to the table feed and joins the side channel.
    pub fn enable(&self) -> SyncResult<()> {
        let mut active = self.active.lock();
        if active.is_some() {
            return Ok(());
        }

        let channel = self
            .transport
            .open(&self.config.channel_name, ChannelOptions::default())?;
        let generation = self.bump_generation();
        let current = self.generation.clone();
        let status = self.status.clone();
        channel.on_status(Arc::new(move |s: ConnectionStatus| {
            if current.load(Ordering::Acquire) == generation {
                *status.write() = s;
            }
        }));
        *self.status.write() = ConnectionStatus::Connecting;
        if let Err(e) = channel.subscribe() {
            warn!("Failed to join {}: {}", self.config.channel_name, e);
            self.fail(channel.as_ref());
            return Err(e);
        }

        let handlers = self.handlers.clone();
        let feed_subscription = match self.feed.on_row_change(
            &self.config.table,
            self.config.filter.as_deref(),
            Arc::new(move |change: &RowChange| handlers.dispatch(change)),
        ) {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!("Failed to follow table {}: {}", self.config.table, e);
                self.fail(channel.as_ref());
                return Err(e);
            }
        };

        info!("Following table {}", self.config.table);
        *active = Some(ActiveTable {
            feed_subscription,
            channel,
        });
        Ok(())
    }

    /// Tears down the feed subscription and the side channel.
    pub fn disable(&self) {
        let active = self.active.lock().take();
        if let Some(active) = active {
            self.bump_generation();
            active.feed_subscription.cancel();
            active.channel.close();
            *self.status.write() = ConnectionStatus::Closed;
            info!("Stopped following table {}", self.config.table);
        }
    }

    fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Releases a channel that failed to come up.
    fn fail(&self, channel: &dyn ChannelHandle) {
        self.bump_generation();
        channel.close();
        *self.status.write() = ConnectionStatus::ChannelError;
    }

    /// Sends a raw event on the side channel. Dropped silently when the hook
    /// is disabled or the channel is not subscribed.
    pub fn broadcast(&self, event: &str, data: serde_json::Value) {
        let channel = self.active.lock().as_ref().map(|a| a.channel.clone());
        let Some(channel) = channel else {
            debug!("Dropping {} broadcast: {} hook disabled", event, self.config.table);
            return;
        };
        if !self.status().is_connected() {
            debug!("Dropping {} broadcast: channel {}", event, self.status());
            return;
        }
        if let Err(e) = channel.send(ChannelFrame::new(event, data)) {
            warn!("Broadcast of {} not relayed: {}", event, e);
        }
    }
}

impl<T> Drop for TableRealtime<T> {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            self.generation.fetch_add(1, Ordering::AcqRel);
            active.feed_subscription.cancel();
            active.channel.close();
        }
    }
}

impl<T> fmt::Debug for TableRealtime<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableRealtime")
            .field("table", &self.config.table)
            .field("channel", &self.config.channel_name)
            .field("enabled", &self.active.lock().is_some())
            .finish()
    }
}
