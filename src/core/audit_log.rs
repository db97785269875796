//! Append-only, hash-chained audit trail of keychain operations.
//!
//! Entries never contain secret material. Each entry carries the hash of
//! its predecessor and its own SHA-256 over the canonical JSON form, so
//! edits and deletions inside the log are detectable.

use crate::constants;
use crate::core::file_lock::FileLock;
use crate::core::paths::KeychainPaths;
use crate::util::fs as keychain_fs;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditOutcome {
    pub fn ok(affected: usize) -> Self {
        Self {
            success: true,
            affected: Some(affected),
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            affected: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub actor: String,
    /// Item key or filter description.
    pub target: String,
    pub result: AuditOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_hash: Option<String>,
}

/// Result of walking the whole chain.
#[derive(Debug, Default)]
pub struct ChainReport {
    pub total: usize,
    pub errors: Vec<String>,
}

impl ChainReport {
    pub fn is_intact(&self) -> bool {
        self.errors.is_empty()
    }
}

fn detect_actor() -> String {
    if let Ok(user) = std::env::var("SUDO_USER") {
        if !user.is_empty() {
            return format!("{}(sudo)", user);
        }
    }
    std::env::var("USER").unwrap_or_else(|_| "unknown".to_string())
}

/// Append an entry for `action` on `target`.
pub fn record(
    paths: &KeychainPaths,
    action: &str,
    target: &str,
    outcome: AuditOutcome,
) -> Result<()> {
    record_as(paths, action, target, &detect_actor(), outcome)
}

pub fn record_as(
    paths: &KeychainPaths,
    action: &str,
    target: &str,
    actor: &str,
    outcome: AuditOutcome,
) -> Result<()> {
    let _lock = FileLock::exclusive(&paths.audit_lock)
        .with_context(|| format!("lock {}", paths.audit_lock.display()))?;
    let prev_hash = last_entry_hash(&paths.audit_log)?;

    let mut entry = AuditEntry {
        timestamp: Utc::now(),
        action: action.to_string(),
        actor: actor.to_string(),
        target: target.to_string(),
        result: outcome,
        prev_hash,
        entry_hash: None,
    };
    entry.entry_hash = Some(entry_hash(&entry)?);

    tracing::info!(
        target: "goamet_keychain::audit",
        action = %entry.action,
        actor = %entry.actor,
        item = %entry.target,
        success = entry.result.success,
        "audit"
    );

    let line = serde_json::to_string(&entry).context("serialize audit entry")?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.audit_log)
        .with_context(|| format!("open audit log {}", paths.audit_log.display()))?;
    writeln!(file, "{}", line).context("write audit entry")?;
    keychain_fs::set_permissions(&paths.audit_log, constants::AUDIT_LOG_MODE)
        .context("set audit log permissions")?;
    Ok(())
}

/// Hash of the last well-formed entry, reading the log backwards in chunks.
fn last_entry_hash(path: &Path) -> Result<Option<String>> {
    let mut file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("open {}", path.display())),
    };
    let mut offset = file
        .metadata()
        .with_context(|| format!("stat {}", path.display()))?
        .len();

    const CHUNK: u64 = 8192;
    let mut tail: Vec<u8> = Vec::new();
    while offset > 0 {
        let read_size = CHUNK.min(offset);
        offset -= read_size;
        file.seek(SeekFrom::Start(offset))
            .with_context(|| format!("seek {}", path.display()))?;
        let mut chunk = vec![0u8; read_size as usize];
        file.read_exact(&mut chunk)
            .with_context(|| format!("read {}", path.display()))?;
        chunk.extend_from_slice(&tail);
        tail = chunk;

        // the bytes before the first newline may be a partial line
        let start = if offset == 0 {
            0
        } else {
            match tail.iter().position(|b| *b == b'\n') {
                Some(i) => i + 1,
                None => continue,
            }
        };
        for line in tail[start..].split(|b| *b == b'\n').rev() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            if let Ok(entry) = serde_json::from_slice::<AuditEntry>(line) {
                if entry.entry_hash.is_some() {
                    return Ok(entry.entry_hash);
                }
            }
        }
        tail.truncate(start);
    }
    Ok(None)
}

/// SHA-256 over the key-sorted JSON of `entry` without `entry_hash`.
fn entry_hash(entry: &AuditEntry) -> Result<String> {
    let mut value = serde_json::to_value(entry).context("serialize for hash")?;
    if let Some(obj) = value.as_object_mut() {
        obj.remove("entry_hash");
    }
    let canonical =
        serde_json::to_string(&sort_keys(value)).context("serialize canonical json")?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Read entries, keeping the last `limit` if given. Malformed lines are
/// skipped with a warning.
pub fn read_log(paths: &KeychainPaths, limit: Option<usize>) -> Result<Vec<AuditEntry>> {
    if !paths.audit_log.exists() {
        return Ok(Vec::new());
    }
    let file = fs::File::open(&paths.audit_log)
        .with_context(|| format!("open audit log {}", paths.audit_log.display()))?;

    let mut entries = Vec::new();
    let mut malformed = 0usize;
    for line in BufReader::new(file).lines() {
        let line = line.context("read audit log line")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<AuditEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(_) => malformed += 1,
        }
    }
    if malformed > 0 {
        tracing::warn!(malformed, "skipped malformed audit entries");
    }

    if let Some(limit) = limit {
        if entries.len() > limit {
            entries.drain(..entries.len() - limit);
        }
    }
    Ok(entries)
}

/// Check every link and every entry hash.
pub fn verify_chain(paths: &KeychainPaths) -> Result<ChainReport> {
    let entries = read_log(paths, None)?;
    let mut report = ChainReport {
        total: entries.len(),
        errors: Vec::new(),
    };
    let mut expected_prev: Option<&str> = None;

    for (i, entry) in entries.iter().enumerate() {
        let n = i + 1;
        if entry.prev_hash.as_deref() != expected_prev {
            report.errors.push(format!(
                "entry {}: prev_hash mismatch (expected {:?}, got {:?})",
                n, expected_prev, entry.prev_hash
            ));
        }
        match &entry.entry_hash {
            Some(stored) => {
                if &entry_hash(entry)? != stored {
                    report
                        .errors
                        .push(format!("entry {}: entry_hash mismatch (tampered?)", n));
                }
            }
            None => report.errors.push(format!("entry {}: missing entry_hash", n)),
        }
        expected_prev = entry.entry_hash.as_deref();
    }
    Ok(report)
}
