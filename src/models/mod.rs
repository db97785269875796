//! Data structures: items, requests, and configuration.

pub mod attr;
pub mod item;
pub mod keychain_config;
pub mod policy;
pub mod query;
