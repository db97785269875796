//! Keychain path resolution and directory structure.

use crate::constants;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct KeychainPaths {
    pub root: PathBuf,
    pub records: PathBuf,
    pub key: PathBuf,
    pub lock: PathBuf,
    pub config: PathBuf,
    pub audit_log: PathBuf,
    pub audit_lock: PathBuf,
}

impl KeychainPaths {
    /// Resolve the keychain root from CLI arg, env var, or the XDG data dir.
    pub fn resolve(root_arg: Option<PathBuf>) -> Self {
        if let Some(root) = root_arg {
            return Self::from_root(root);
        }
        if let Some(root) = env::var_os(constants::ROOT_ENV).filter(|v| !v.is_empty()) {
            return Self::from_root(PathBuf::from(root));
        }
        if let Some(data) = data_dir() {
            return Self::from_root(data.join(constants::KEYCHAIN_DIR_NAME));
        }
        Self::from_root(PathBuf::from(constants::DEFAULT_KEYCHAIN_ROOT))
    }

    pub fn from_root(root: PathBuf) -> Self {
        Self {
            records: root.join("keychain.json"),
            key: root.join("keychain.key"),
            lock: root.join("keychain.lock"),
            config: root.join("keychain.toml"),
            audit_log: root.join("audit.log"),
            audit_lock: root.join("audit.lock"),
            root,
        }
    }
}

fn data_dir() -> Option<PathBuf> {
    if let Some(xdg) = env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(xdg));
    }
    env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .map(|home| PathBuf::from(home).join(".local").join("share"))
}

impl std::fmt::Display for KeychainPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "keychain@{}", self.root.display())
    }
}
