//! Configuration types for the socket layer.

mod listen;

use std::net::Ipv4Addr;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use listen::{DnsConfig, ListenConfig, DEFAULT_BACKLOG};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SockConfig {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub dns: DnsConfig,
}

impl SockConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: SockConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.listen.port == 0 {
            anyhow::bail!("listen.port must be greater than 0");
        }

        if let Some(ref addr) = self.listen.bind_address {
            if addr.parse::<Ipv4Addr>().is_err() {
                anyhow::bail!(
                    "listen.bind_address '{}' is not a dotted-decimal IPv4 address",
                    addr
                );
            }
        }

        if self.listen.backlog <= 0 {
            anyhow::bail!("listen.backlog must be positive");
        }

        if self.dns.max_entries == 0 {
            anyhow::bail!("dns.max_entries must be at least 1");
        }

        Ok(())
    }
}
