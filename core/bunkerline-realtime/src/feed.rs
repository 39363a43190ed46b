//! Row-level change feed of the backing store.
//!
//! The database emits one notification per row mutation. Only the
//! subscription surface is modelled here; the store itself is external.

use crate::error::SyncResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Type of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RowEventType {
    Insert,
    Update,
    Delete,
}

/// A single row change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowChange {
    pub event_type: RowEventType,
    pub table: String,
    /// Row after the change (INSERT, UPDATE).
    #[serde(default)]
    pub new: Option<serde_json::Value>,
    /// Row before the change (UPDATE, DELETE). Often only the primary key.
    #[serde(default)]
    pub old: Option<serde_json::Value>,
}

impl RowChange {
    /// Creates an INSERT change.
    pub fn insert(table: &str, row: serde_json::Value) -> Self {
        Self {
            event_type: RowEventType::Insert,
            table: table.to_string(),
            new: Some(row),
            old: None,
        }
    }

    /// Creates an UPDATE change.
    pub fn update(table: &str, old: serde_json::Value, new: serde_json::Value) -> Self {
        Self {
            event_type: RowEventType::Update,
            table: table.to_string(),
            new: Some(new),
            old: Some(old),
        }
    }

    /// Creates a DELETE change.
    pub fn delete(table: &str, old: serde_json::Value) -> Self {
        Self {
            event_type: RowEventType::Delete,
            table: table.to_string(),
            new: None,
            old: Some(old),
        }
    }

    /// The row a filter is evaluated against: `new`, or `old` for deletes.
    pub fn subject_row(&self) -> Option<&serde_json::Value> {
        match self.event_type {
            RowEventType::Delete => self.old.as_ref(),
            _ => self.new.as_ref(),
        }
    }
}

/// Callback for row changes.
pub type RowChangeCallback = Arc<dyn Fn(&RowChange) + Send + Sync>;

/// A live change-feed subscription.
pub trait FeedSubscription: Send + Sync {
    /// Stops delivery. Safe to call more than once.
    fn cancel(&self);
}

/// A row-level change feed.
pub trait ChangeFeed: Send + Sync {
    /// Subscribes to changes of `table`, optionally narrowed by a
    /// `column=eq.value` filter.
    fn on_row_change(
        &self,
        table: &str,
        filter: Option<&str>,
        callback: RowChangeCallback,
    ) -> SyncResult<Box<dyn FeedSubscription>>;
}

/// A parsed `column=eq.value` row filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    pub column: String,
    pub value: String,
}

impl RowFilter {
    /// Parses `column=eq.value`. Only equality is supported.
    pub fn parse(filter: &str) -> SyncResult<Self> {
        let invalid = || crate::error::SyncError::InvalidFilter(filter.to_string());
        let (column, rest) = filter.split_once('=').ok_or_else(invalid)?;
        let value = rest.strip_prefix("eq.").ok_or_else(invalid)?;
        if column.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            column: column.to_string(),
            value: value.to_string(),
        })
    }

    /// Whether `row` satisfies the filter.
    pub fn matches(&self, row: &serde_json::Value) -> bool {
        match row.get(&self.column) {
            Some(serde_json::Value::String(s)) => *s == self.value,
            Some(serde_json::Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

/// An in-process change feed for tests and embedding.
pub mod memory {
    use super::*;
    use parking_lot::RwLock;
    use std::collections::HashMap;
    use std::sync::Weak;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Listener {
        table: String,
        filter: Option<RowFilter>,
        callback: RowChangeCallback,
    }

    #[derive(Default)]
    struct FeedInner {
        next_id: AtomicU64,
        listeners: RwLock<HashMap<u64, Arc<Listener>>>,
    }

    /// A change feed driven by explicit `emit` calls.
    #[derive(Clone, Default)]
    pub struct MemoryChangeFeed {
        inner: Arc<FeedInner>,
    }

    impl MemoryChangeFeed {
        /// Creates a feed with no listeners.
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of live subscriptions on `table`.
        pub fn subscriber_count(&self, table: &str) -> usize {
            self.inner
                .listeners
                .read()
                .values()
                .filter(|l| l.table == table)
                .count()
        }

        /// Delivers a change to every matching listener.
        pub fn emit(&self, change: RowChange) {
            let listeners: Vec<Arc<Listener>> =
                self.inner.listeners.read().values().cloned().collect();
            for listener in listeners {
                if listener.table != change.table {
                    continue;
                }
                if let Some(filter) = &listener.filter {
                    if !change.subject_row().is_some_and(|row| filter.matches(row)) {
                        continue;
                    }
                }
                (listener.callback)(&change);
            }
        }

        /// Emits an INSERT.
        pub fn emit_insert(&self, table: &str, row: serde_json::Value) {
            self.emit(RowChange::insert(table, row));
        }

        /// Emits an UPDATE.
        pub fn emit_update(&self, table: &str, old: serde_json::Value, new: serde_json::Value) {
            self.emit(RowChange::update(table, old, new));
        }

        /// Emits a DELETE.
        pub fn emit_delete(&self, table: &str, old: serde_json::Value) {
            self.emit(RowChange::delete(table, old));
        }
    }

    impl ChangeFeed for MemoryChangeFeed {
        fn on_row_change(
            &self,
            table: &str,
            filter: Option<&str>,
            callback: RowChangeCallback,
        ) -> SyncResult<Box<dyn FeedSubscription>> {
            let filter = filter.map(RowFilter::parse).transpose()?;
            let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
            self.inner.listeners.write().insert(
                id,
                Arc::new(Listener {
                    table: table.to_string(),
                    filter,
                    callback,
                }),
            );
            Ok(Box::new(MemorySubscription {
                id,
                feed: Arc::downgrade(&self.inner),
            }))
        }
    }

    struct MemorySubscription {
        id: u64,
        feed: Weak<FeedInner>,
    }

    impl FeedSubscription for MemorySubscription {
        fn cancel(&self) {
            if let Some(feed) = self.feed.upgrade() {
                feed.listeners.write().remove(&self.id);
            }
        }
    }
}
