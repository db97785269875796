//! Encrypted keychain file.
//!
//! Records live in `keychain.json` with attributes in clear and each secret
//! sealed under the key in `keychain.key`. Reads take a shared flock on
//! `keychain.lock`, transactions an exclusive one; the file is replaced by
//! atomic rename.

use super::{Backend, BackendError};
use crate::constants;
use crate::core::cipher::{self, Sealed, SealingKey};
use crate::core::file_lock::{FileLock, LockMode};
use crate::core::paths::KeychainPaths;
use crate::error::StoreError;
use crate::models::item::{ItemClass, ItemKey, Record};
use crate::util::fs as keychain_fs;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::time::Duration;
use zeroize::Zeroizing;

#[derive(Debug, Serialize, Deserialize)]
struct KeychainDocument {
    version: u32,
    #[serde(default)]
    items: Vec<SealedRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SealedRecord {
    class: ItemClass,
    service: String,
    account: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    revision: u64,
    /// hex
    nonce: String,
    /// hex, ciphertext with auth tag
    secret: String,
}

pub struct FileBackend {
    paths: KeychainPaths,
    lock_timeout: Duration,
    key: Option<SealingKey>,
}

impl FileBackend {
    pub fn new(paths: KeychainPaths) -> Self {
        Self {
            paths,
            lock_timeout: Duration::from_millis(constants::DEFAULT_LOCK_TIMEOUT_MS),
            key: None,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn paths(&self) -> &KeychainPaths {
        &self.paths
    }

    /// Create the keychain root and sealing key. Returns `false` if the key
    /// already existed; an existing key is never replaced.
    pub fn init(paths: &KeychainPaths) -> Result<bool, BackendError> {
        keychain_fs::ensure_dir(&paths.root, constants::KEYCHAIN_DIR_MODE)
            .map_err(|e| BackendError::io("create keychain directory", &paths.root, e))?;
        if paths.key.exists() {
            return Ok(false);
        }
        let key = SealingKey::generate();
        keychain_fs::write_atomic(&paths.key, key.as_bytes(), constants::SECRET_FILE_MODE)
            .map_err(|e| BackendError::io("write sealing key", &paths.key, e))?;
        tracing::info!(root = %paths.root.display(), "keychain initialized");
        Ok(true)
    }

    fn key(&self) -> Result<&SealingKey, BackendError> {
        self.key.as_ref().ok_or(BackendError::Closed)
    }

    fn lock(&self, mode: LockMode) -> Result<FileLock, BackendError> {
        match FileLock::acquire(&self.paths.lock, mode, self.lock_timeout) {
            Ok(Some(lock)) => Ok(lock),
            Ok(None) => {
                tracing::warn!(?mode, timeout = ?self.lock_timeout, "keychain lock timed out");
                Err(BackendError::Locked(self.paths.lock.clone()))
            }
            Err(e) => Err(BackendError::io("lock", &self.paths.lock, e)),
        }
    }

    fn read_records(&self, key: &SealingKey) -> Result<Vec<Record>, BackendError> {
        let path = &self.paths.records;
        let content = match fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BackendError::io("read keychain", path, e)),
        };
        let doc: KeychainDocument = serde_json::from_slice(&content)
            .map_err(|e| BackendError::Corrupt(format!("{}: {}", path.display(), e)))?;
        if doc.version > constants::KEYCHAIN_FORMAT_VERSION {
            return Err(BackendError::Corrupt(format!(
                "unsupported keychain format version {}",
                doc.version
            )));
        }
        doc.items
            .into_iter()
            .map(|sealed| unseal_record(key, sealed))
            .collect()
    }

    fn write_records(&self, key: &SealingKey, records: &[Record]) -> Result<(), BackendError> {
        let items = records
            .iter()
            .map(|record| seal_record(key, record))
            .collect::<Result<Vec<_>, _>>()?;
        let doc = KeychainDocument {
            version: constants::KEYCHAIN_FORMAT_VERSION,
            items,
        };
        let content = serde_json::to_vec_pretty(&doc)
            .map_err(|e| BackendError::Corrupt(format!("serialize keychain: {}", e)))?;
        keychain_fs::write_atomic(&self.paths.records, &content, constants::SECRET_FILE_MODE)
            .map_err(|e| BackendError::io("write keychain", &self.paths.records, e))
    }
}

fn seal_record(key: &SealingKey, record: &Record) -> Result<SealedRecord, BackendError> {
    let item = record.key();
    let sealed = cipher::seal(key, &item, &record.secret)
        .ok_or_else(|| BackendError::Corrupt(format!("cannot seal secret for {}", item)))?;
    Ok(SealedRecord {
        class: record.class,
        service: record.service.clone(),
        account: record.account.clone(),
        label: record.label.clone(),
        created_at: record.created_at,
        modified_at: record.modified_at,
        revision: record.revision,
        nonce: hex::encode(sealed.nonce),
        secret: hex::encode(&sealed.ciphertext),
    })
}

fn unseal_record(key: &SealingKey, sealed: SealedRecord) -> Result<Record, BackendError> {
    let item = ItemKey::new(sealed.class, sealed.service, sealed.account);
    let nonce: [u8; constants::NONCE_LEN] = hex::decode(&sealed.nonce)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| BackendError::Corrupt(format!("bad nonce for {}", item)))?;
    let ciphertext = hex::decode(&sealed.secret)
        .map_err(|_| BackendError::Corrupt(format!("bad secret encoding for {}", item)))?;
    let secret = cipher::unseal(key, &item, &Sealed { nonce, ciphertext })
        .ok_or_else(|| BackendError::Unseal(item.to_string()))?;
    Ok(Record {
        class: item.class,
        service: item.service,
        account: item.account,
        label: sealed.label,
        secret,
        created_at: sealed.created_at,
        modified_at: sealed.modified_at,
        revision: sealed.revision,
    })
}

impl Backend for FileBackend {
    fn open(&mut self) -> Result<(), BackendError> {
        let bytes = match fs::read(&self.paths.key) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BackendError::NotInitialized(self.paths.root.clone()))
            }
            Err(e) => return Err(BackendError::io("read sealing key", &self.paths.key, e)),
        };
        let key = SealingKey::from_slice(&bytes)
            .ok_or_else(|| BackendError::Corrupt("sealing key has the wrong length".into()))?;
        self.key = Some(key);
        tracing::debug!(keychain = %self.paths, "keychain opened");
        Ok(())
    }

    fn close(&mut self) -> Result<(), BackendError> {
        self.key = None;
        tracing::debug!(keychain = %self.paths, "keychain closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.key.is_some()
    }

    fn snapshot(&self) -> Result<Vec<Record>, BackendError> {
        let key = self.key()?;
        let _lock = self.lock(LockMode::Shared)?;
        self.read_records(key)
    }

    fn transact<R>(
        &mut self,
        apply: impl FnOnce(&mut Vec<Record>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let key = self.key()?;
        let _lock = self.lock(LockMode::Exclusive)?;
        let mut records = self.read_records(key)?;
        let out = apply(&mut records)?;
        self.write_records(key, &records)?;
        Ok(out)
    }
}
