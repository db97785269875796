//! Three-state attribute values.
//!
//! An attribute in a request is either left out, explicitly set to null, or
//! set to a value. `Option<T>` cannot tell the first two apart, and the
//! store treats them very differently: an omitted filter field does not
//! constrain the search, while an explicit null is rejected as malformed.

use crate::error::StoreError;
use serde::{Deserialize, Deserializer};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Attr<T> {
    #[default]
    Unset,
    Null,
    Value(T),
}

impl<T> Attr<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Attr::Unset)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Attr::Null)
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            Attr::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Resolve to an optional constraint. `Unset` means "no constraint";
    /// `Null` is rejected.
    pub fn constraint(&self, field: Field) -> Result<Option<&T>, StoreError> {
        match self {
            Attr::Unset => Ok(None),
            Attr::Null => Err(StoreError::invalid(format!("{} is explicitly null", field))),
            Attr::Value(v) => Ok(Some(v)),
        }
    }

    /// Resolve a field that must carry a value.
    pub fn required(self, field: Field) -> Result<T, StoreError> {
        match self {
            Attr::Unset => Err(StoreError::invalid(format!("{} is required", field))),
            Attr::Null => Err(StoreError::invalid(format!("{} is explicitly null", field))),
            Attr::Value(v) => Ok(v),
        }
    }

    /// Resolve an optional field: `Unset` becomes `None`, `Null` is rejected.
    pub fn optional(self, field: Field) -> Result<Option<T>, StoreError> {
        match self {
            Attr::Unset => Ok(None),
            Attr::Null => Err(StoreError::invalid(format!("{} is explicitly null", field))),
            Attr::Value(v) => Ok(Some(v)),
        }
    }
}

/// `None` is an explicit null, not an omission.
impl<T> From<Option<T>> for Attr<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Attr::Value(v),
            None => Attr::Null,
        }
    }
}

/// JSON `null` decodes to `Null`. A missing key never reaches this impl;
/// pair it with `#[serde(default)]` so that it becomes `Unset`.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Attr<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Attr::from)
    }
}

/// Attribute names, as used in error messages and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Field {
    Class,
    Service,
    Account,
    Label,
    Secret,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Class => "class",
            Field::Service => "service",
            Field::Account => "account",
            Field::Label => "label",
            Field::Secret => "secret",
        };
        f.write_str(name)
    }
}
