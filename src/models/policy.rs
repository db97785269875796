//! Policy enforced by the command line front end.

use crate::constants;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySection {
    /// Services items may be stored under (empty = no restriction).
    #[serde(default)]
    pub service_allowlist: Vec<String>,

    /// Largest accepted secret in bytes.
    #[serde(default = "default_max_secret_size")]
    pub max_secret_size: usize,

    /// Append operations to audit.log.
    #[serde(default = "default_audit")]
    pub audit: bool,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            service_allowlist: Vec::new(),
            max_secret_size: default_max_secret_size(),
            audit: default_audit(),
        }
    }
}

fn default_max_secret_size() -> usize {
    constants::MAX_SECRET_SIZE
}

fn default_audit() -> bool {
    true
}

impl PolicySection {
    pub fn is_service_allowed(&self, service: &str) -> bool {
        self.service_allowlist.is_empty() || self.service_allowlist.iter().any(|s| s == service)
    }

    pub fn check_secret_size(&self, len: usize) -> anyhow::Result<()> {
        if len > self.max_secret_size {
            anyhow::bail!(
                "secret exceeds maximum size ({} bytes, max {} bytes)",
                len,
                self.max_secret_size
            );
        }
        Ok(())
    }
}
