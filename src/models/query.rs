//! Request shapes accepted by the credential store.

use crate::error::StoreError;
use crate::models::attr::{Attr, Field};
use crate::models::item::{ItemClass, Record, Secret};
use serde::Deserialize;
use std::fmt;
use zeroize::Zeroizing;

/// Attribute filter. Unset fields do not constrain; set fields must match
/// exactly; all set fields must match together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Filter {
    #[serde(default)]
    pub class: Attr<ItemClass>,
    #[serde(default)]
    pub service: Attr<String>,
    #[serde(default)]
    pub account: Attr<String>,
    #[serde(default)]
    pub label: Attr<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on every item of `class`.
    pub fn class(class: ItemClass) -> Self {
        Self {
            class: Attr::Value(class),
            ..Self::default()
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Attr::Value(service.into());
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Attr::Value(account.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Attr::Value(label.into());
        self
    }

    /// Set `field` to an explicit null. `secret` is not a filter attribute.
    pub fn with_null(mut self, field: Field) -> Result<Self, StoreError> {
        match field {
            Field::Class => self.class = Attr::Null,
            Field::Service => self.service = Attr::Null,
            Field::Account => self.account = Attr::Null,
            Field::Label => self.label = Attr::Null,
            Field::Secret => {
                return Err(StoreError::invalid("secret cannot be used in a filter"))
            }
        }
        Ok(self)
    }

    /// Validate the filter and borrow it as a predicate.
    pub fn predicate(&self) -> Result<Predicate<'_>, StoreError> {
        Ok(Predicate {
            class: self.class.constraint(Field::Class)?.copied(),
            service: self.service.constraint(Field::Service)?.map(String::as_str),
            account: self.account.constraint(Field::Account)?.map(String::as_str),
            label: self.label.constraint(Field::Label)?.map(String::as_str),
        })
    }
}

/// A validated filter.
#[derive(Debug, Clone, Copy)]
pub struct Predicate<'a> {
    class: Option<ItemClass>,
    service: Option<&'a str>,
    account: Option<&'a str>,
    label: Option<&'a str>,
}

impl Predicate<'_> {
    pub fn matches(&self, record: &Record) -> bool {
        self.class.map_or(true, |c| record.class == c)
            && self.service.map_or(true, |s| record.service == s)
            && self.account.map_or(true, |a| record.account == a)
            && self
                .label
                .map_or(true, |l| record.label.as_deref() == Some(l))
    }
}

/// How many items a search returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchLimit {
    #[default]
    One,
    All,
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: Filter,
    pub return_secret: bool,
    pub limit: MatchLimit,
}

impl Query {
    pub fn one(filter: Filter) -> Self {
        Self {
            filter,
            return_secret: false,
            limit: MatchLimit::One,
        }
    }

    pub fn all(filter: Filter) -> Self {
        Self {
            filter,
            return_secret: false,
            limit: MatchLimit::All,
        }
    }

    pub fn with_secret(mut self) -> Self {
        self.return_secret = true;
        self
    }
}

/// An item to add. `class`, `service`, `account` and `secret` are required.
#[derive(Clone, Default)]
pub struct NewItem {
    pub class: Attr<ItemClass>,
    pub service: Attr<String>,
    pub account: Attr<String>,
    pub label: Attr<String>,
    pub secret: Attr<Secret>,
}

impl NewItem {
    pub fn new(
        class: ItemClass,
        service: impl Into<String>,
        account: impl Into<String>,
        secret: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            class: Attr::Value(class),
            service: Attr::Value(service.into()),
            account: Attr::Value(account.into()),
            label: Attr::Unset,
            secret: Attr::Value(Zeroizing::new(secret.into())),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Attr::Value(label.into());
        self
    }

    pub fn with_null(mut self, field: Field) -> Self {
        match field {
            Field::Class => self.class = Attr::Null,
            Field::Service => self.service = Attr::Null,
            Field::Account => self.account = Attr::Null,
            Field::Label => self.label = Attr::Null,
            Field::Secret => self.secret = Attr::Null,
        }
        self
    }

    /// Check every field, rejecting any explicit null even on optional
    /// attributes.
    pub fn validate(self) -> Result<ValidNewItem, StoreError> {
        Ok(ValidNewItem {
            class: self.class.required(Field::Class)?,
            service: self.service.required(Field::Service)?,
            account: self.account.required(Field::Account)?,
            label: self.label.optional(Field::Label)?,
            secret: self.secret.required(Field::Secret)?,
        })
    }
}

pub struct ValidNewItem {
    pub class: ItemClass,
    pub service: String,
    pub account: String,
    pub label: Option<String>,
    pub secret: Secret,
}

/// Attribute changes applied by an update. The class of a record is fixed.
#[derive(Clone, Default)]
pub struct Changes {
    pub service: Attr<String>,
    pub account: Attr<String>,
    pub label: Attr<String>,
    pub secret: Attr<Secret>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Attr::Value(service.into());
        self
    }

    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = Attr::Value(account.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Attr::Value(label.into());
        self
    }

    pub fn secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.secret = Attr::Value(Zeroizing::new(secret.into()));
        self
    }

    pub fn with_null(mut self, field: Field) -> Result<Self, StoreError> {
        match field {
            Field::Service => self.service = Attr::Null,
            Field::Account => self.account = Attr::Null,
            Field::Label => self.label = Attr::Null,
            Field::Secret => self.secret = Attr::Null,
            Field::Class => return Err(StoreError::invalid("class cannot be changed")),
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<ValidChanges<'_>, StoreError> {
        let changes = ValidChanges {
            service: self.service.constraint(Field::Service)?.map(String::as_str),
            account: self.account.constraint(Field::Account)?.map(String::as_str),
            label: self.label.constraint(Field::Label)?.map(String::as_str),
            secret: self.secret.constraint(Field::Secret)?,
        };
        if changes.is_empty() {
            return Err(StoreError::invalid("no attributes to update"));
        }
        Ok(changes)
    }
}

#[derive(Clone, Copy)]
pub struct ValidChanges<'a> {
    pub service: Option<&'a str>,
    pub account: Option<&'a str>,
    pub label: Option<&'a str>,
    pub secret: Option<&'a Secret>,
}

impl ValidChanges<'_> {
    fn is_empty(&self) -> bool {
        self.service.is_none()
            && self.account.is_none()
            && self.label.is_none()
            && self.secret.is_none()
    }

    /// Key changes are applied on top of `record`'s current key.
    pub fn touches_key(&self) -> bool {
        self.service.is_some() || self.account.is_some()
    }

    pub fn apply(&self, record: &mut Record) {
        if let Some(service) = self.service {
            record.service = service.to_string();
        }
        if let Some(account) = self.account {
            record.account = account.to_string();
        }
        if let Some(label) = self.label {
            record.label = Some(label.to_string());
        }
        if let Some(secret) = self.secret {
            record.secret = secret.clone();
        }
    }
}

fn redacted(secret: &Attr<Secret>) -> &'static str {
    match secret {
        Attr::Unset => "Unset",
        Attr::Null => "Null",
        Attr::Value(_) => "[REDACTED]",
    }
}

impl fmt::Debug for NewItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewItem")
            .field("class", &self.class)
            .field("service", &self.service)
            .field("account", &self.account)
            .field("label", &self.label)
            .field("secret", &redacted(&self.secret))
            .finish()
    }
}

impl fmt::Debug for Changes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Changes")
            .field("service", &self.service)
            .field("account", &self.account)
            .field("label", &self.label)
            .field("secret", &redacted(&self.secret))
            .finish()
    }
}
