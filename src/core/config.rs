//! Load and save keychain.toml.

use crate::constants;
use crate::models::keychain_config::KeychainConfig;
use crate::util::fs as keychain_fs;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// A missing file yields the defaults.
pub fn load(path: &Path) -> Result<KeychainConfig> {
    if !path.exists() {
        return Ok(KeychainConfig::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("read keychain config {}", path.display()))?;
    let config: KeychainConfig = toml::from_str(&content)
        .with_context(|| format!("parse keychain config {}", path.display()))?;
    if config.keychain.version > constants::CONFIG_FORMAT_VERSION {
        bail!(
            "unsupported keychain config version {} in {}",
            config.keychain.version,
            path.display()
        );
    }
    Ok(config)
}

pub fn save(path: &Path, config: &KeychainConfig) -> Result<()> {
    let content = toml::to_string_pretty(config).context("serialize keychain config")?;
    keychain_fs::write_atomic(path, content.as_bytes(), constants::SECRET_FILE_MODE)
        .with_context(|| format!("write keychain config {}", path.display()))
}
