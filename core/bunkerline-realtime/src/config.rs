//! Configuration for hubs and table feeds.

use bunkerline_model::OPERATIONS_TABLE;
use serde::{Deserialize, Serialize};

/// Default channel shared by every entity stream.
pub const DEFAULT_CHANNEL: &str = "bunkerline-sync";

/// Configuration for a [`BroadcastHub`](crate::BroadcastHub).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Name of the broadcast channel.
    pub channel_name: String,
    /// Ask the transport to reflect our own messages back. The hub filters
    /// them either way; leave this off outside of diagnostics.
    pub self_echo: bool,
    /// Ask the transport to acknowledge sends.
    pub ack: bool,
}

impl HubConfig {
    /// Config for a named channel with default options.
    pub fn for_channel(channel_name: impl Into<String>) -> Self {
        Self {
            channel_name: channel_name.into(),
            ..Default::default()
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            channel_name: DEFAULT_CHANNEL.to_string(),
            self_echo: false,
            ack: false,
        }
    }
}

/// Configuration for a [`TableRealtime`](crate::TableRealtime) hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableRealtimeConfig {
    /// Table whose row changes are followed.
    pub table: String,
    /// Channel used for the manual broadcast escape hatch.
    pub channel_name: String,
    /// Optional `column=eq.value` row filter.
    pub filter: Option<String>,
}

impl TableRealtimeConfig {
    /// Config following every row of `table`, broadcasting on `{table}-changes`.
    pub fn for_table(table: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            channel_name: format!("{table}-changes"),
            table,
            filter: None,
        }
    }

    /// Restricts the feed to rows matching `filter`.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

impl Default for TableRealtimeConfig {
    fn default() -> Self {
        Self::for_table(OPERATIONS_TABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_defaults() {
        let config = HubConfig::default();
        assert_eq!(config.channel_name, DEFAULT_CHANNEL);
        assert!(!config.self_echo);
        assert!(!config.ack);
    }

    #[test]
    fn hub_config_partial_json() {
        let config: HubConfig = serde_json::from_str(r#"{"channel_name":"fleet"}"#).unwrap();
        assert_eq!(config, HubConfig::for_channel("fleet"));
    }

    #[test]
    fn table_defaults_to_operations() {
        let config = TableRealtimeConfig::default();
        assert_eq!(config.table, "supply_operations");
        assert_eq!(config.channel_name, "supply_operations-changes");
        assert_eq!(config.filter, None);
    }

    #[test]
    fn table_with_filter() {
        let config = TableRealtimeConfig::for_table("vehicles").with_filter("depot=eq.north");
        assert_eq!(config.filter.as_deref(), Some("depot=eq.north"));
    }
}
