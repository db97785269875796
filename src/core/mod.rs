//! Core keychain logic: store, storage backends, sealing and audit.

pub mod audit_log;
pub mod backend;
pub mod cipher;
pub mod config;
pub mod file_lock;
pub mod paths;
pub mod store;
