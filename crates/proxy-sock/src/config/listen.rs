//! Listen and name-resolution configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    pub port: u16,
    /// Interface to bind to (dotted-decimal IPv4). Wildcard when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,
    /// Maximum number of pending, not-yet-accepted connections
    #[serde(default = "default_backlog")]
    pub backlog: i32,
}

pub const DEFAULT_BACKLOG: i32 = 1024;

fn default_backlog() -> i32 {
    DEFAULT_BACKLOG
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            port: 8888,
            bind_address: None,
            backlog: default_backlog(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DnsConfig {
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_ttl_seconds() -> u64 {
    3600
}

fn default_max_entries() -> usize {
    1024
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
            max_entries: default_max_entries(),
        }
    }
}
