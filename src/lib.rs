//! Encrypted local credential store.
//!
//! Items are keyed by class, service and account. Every secret is sealed
//! with XChaCha20-Poly1305 before it reaches disk, and every write runs as
//! one atomic transaction under an exclusive file lock.
//!
//! ## Modules
//! - `cli` — Command-line handlers
//! - `core` — Store, backends, sealing, audit trail
//! - `error` — Typed store errors and platform status codes
//! - `models` — Items, filters, changes, configuration
//! - `util` — Filesystem helpers

pub mod cli;
pub mod constants;
pub mod core;
pub mod error;
pub mod models;
pub mod util;

pub use crate::core::backend::{Backend, FileBackend, MemoryBackend};
pub use crate::core::store::CredentialStore;
pub use crate::error::StoreError;
