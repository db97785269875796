//! File-based locking using flock(2) for cross-process serialization.
//!
//! Calls go through `FileExt::` explicitly: newer toolchains have inherent
//! `File::try_lock*` methods with a different error type.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::constants;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// A held flock. Released on drop (file close releases flock).
pub struct FileLock {
    _file: File,
}

impl FileLock {
    /// Acquire an exclusive lock, blocking until available.
    pub fn exclusive(path: &Path) -> io::Result<Self> {
        let file = open_lock_file(path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self { _file: file })
    }

    /// Try to acquire a lock without blocking.
    /// Returns `Ok(Some(lock))` if acquired, `Ok(None)` if held elsewhere.
    pub fn try_acquire(path: &Path, mode: LockMode) -> io::Result<Option<Self>> {
        let file = open_lock_file(path)?;
        let result = match mode {
            LockMode::Shared => FileExt::try_lock_shared(&file),
            LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
        };
        match result {
            Ok(()) => Ok(Some(Self { _file: file })),
            Err(ref e) if is_contended(e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Poll for the lock until `timeout` elapses. `Ok(None)` means the
    /// lock stayed contended for the whole window.
    pub fn acquire(path: &Path, mode: LockMode, timeout: Duration) -> io::Result<Option<Self>> {
        let deadline = Instant::now() + timeout;
        let poll = Duration::from_millis(constants::LOCK_POLL_INTERVAL_MS);
        loop {
            if let Some(lock) = Self::try_acquire(path, mode)? {
                return Ok(Some(lock));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(poll.min(deadline - now));
        }
    }
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
}

fn is_contended(e: &io::Error) -> bool {
    // fs2 on Linux may return Other instead of WouldBlock
    e.kind() == io::ErrorKind::WouldBlock || e.raw_os_error() == Some(11) // EAGAIN
}
