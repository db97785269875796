//! keychain.toml model.

use crate::constants;
use crate::models::item::ItemClass;
use crate::models::policy::PolicySection;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeychainConfig {
    #[serde(default)]
    pub keychain: KeychainSection,
    #[serde(default)]
    pub policy: PolicySection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeychainSection {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Class used by `add` when `--class` is not given.
    #[serde(default)]
    pub default_class: ItemClass,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl KeychainSection {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for KeychainSection {
    fn default() -> Self {
        Self {
            version: default_version(),
            default_class: ItemClass::default(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

fn default_version() -> u32 {
    constants::CONFIG_FORMAT_VERSION
}

fn default_lock_timeout_ms() -> u64 {
    constants::DEFAULT_LOCK_TIMEOUT_MS
}
