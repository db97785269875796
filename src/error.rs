//! Store-level error taxonomy.
//!
//! Every operation on the credential store reports one of four outcomes.
//! Backend failures are translated at the boundary (see
//! `impl From<BackendError> for StoreError`) so callers never match on
//! storage-specific errors.

use crate::constants;
use crate::core::backend::BackendError;
use crate::models::item::ItemKey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("duplicate item: {0}")]
    DuplicateItem(ItemKey),

    #[error("item not found")]
    ItemNotFound,

    #[error("keychain unavailable: {0}")]
    BackendUnavailable(#[source] BackendError),
}

impl StoreError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Only backend failures are worth retrying; everything else is a
    /// property of the request or the stored data.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }

    /// Platform-style status code for this error.
    pub fn status(&self) -> i32 {
        match self {
            Self::InvalidParameter(_) => constants::STATUS_PARAM,
            Self::DuplicateItem(_) => constants::STATUS_DUPLICATE_ITEM,
            Self::ItemNotFound => constants::STATUS_ITEM_NOT_FOUND,
            Self::BackendUnavailable(_) => constants::STATUS_NOT_AVAILABLE,
        }
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidParameter(_) => 2,
            Self::DuplicateItem(_) => 3,
            Self::ItemNotFound => 4,
            Self::BackendUnavailable(_) => 5,
        }
    }
}

impl From<BackendError> for StoreError {
    fn from(err: BackendError) -> Self {
        Self::BackendUnavailable(err)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
