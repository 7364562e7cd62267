use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// The five tables the streaming core joins on their pending event id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchedTable {
    PendingEvents,
    RmNode,
    Resource,
    UpdatedContainerInfo,
    ContainerStatus,
}

impl WatchedTable {
    /// Every watched table, in message kind order.
    pub const ALL: [WatchedTable; 5] = [
        WatchedTable::PendingEvents,
        WatchedTable::RmNode,
        WatchedTable::Resource,
        WatchedTable::UpdatedContainerInfo,
        WatchedTable::ContainerStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WatchedTable::PendingEvents => "pending_events",
            WatchedTable::RmNode => "rm_node",
            WatchedTable::Resource => "resource",
            WatchedTable::UpdatedContainerInfo => "updated_container_info",
            WatchedTable::ContainerStatus => "container_status",
        }
    }
}

impl fmt::Display for WatchedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Polling configuration for one watched table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SourceConfig {
    pub table: WatchedTable,
    /// Timeout, in milliseconds, of a blocking poll when the listener goes idle.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

impl SourceConfig {
    /// Default blocking poll timeout in milliseconds.
    pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 10;

    pub fn new(table: WatchedTable) -> Self {
        Self {
            table,
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_timeout_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: format!("sources.{}.poll_timeout_ms", self.table),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

fn default_poll_timeout_ms() -> u64 {
    SourceConfig::DEFAULT_POLL_TIMEOUT_MS
}
