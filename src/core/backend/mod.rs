//! Secure storage backends.
//!
//! A backend is the only place records are persisted. The store reaches it
//! exclusively through this trait: an explicit open/close lifecycle, a
//! consistent snapshot for reads, and an all-or-nothing transaction for
//! writes.

mod error;
mod file;
mod memory;

pub use error::BackendError;
pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::error::StoreError;
use crate::models::item::Record;

pub trait Backend: Send {
    /// Unlock the backend. Must be called before any other operation.
    fn open(&mut self) -> Result<(), BackendError>;

    /// Lock the backend again. Stored records are kept.
    fn close(&mut self) -> Result<(), BackendError>;

    fn is_open(&self) -> bool;

    /// All live records in insertion order.
    fn snapshot(&self) -> Result<Vec<Record>, BackendError>;

    /// Run `apply` against a working copy of the records and persist the
    /// copy only if `apply` succeeds.
    fn transact<R>(
        &mut self,
        apply: impl FnOnce(&mut Vec<Record>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError>;
}
