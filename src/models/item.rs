use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

/// Secret payload. Wiped from memory on drop.
pub type Secret = Zeroizing<Vec<u8>>;

/// Category tag of a stored item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum ItemClass {
    #[default]
    GenericPassword,
    InternetPassword,
    Certificate,
    Key,
    Identity,
}

impl ItemClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemClass::GenericPassword => "generic-password",
            ItemClass::InternetPassword => "internet-password",
            ItemClass::Certificate => "certificate",
            ItemClass::Key => "key",
            ItemClass::Identity => "identity",
        }
    }
}

impl fmt::Display for ItemClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `(class, service, account)` tuple identifying a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub class: ItemClass,
    pub service: String,
    pub account: String,
}

impl ItemKey {
    pub fn new(class: ItemClass, service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            class,
            service: service.into(),
            account: account.into(),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.class, self.service, self.account)
    }
}

/// A live record as held by a backend.
#[derive(Clone)]
pub struct Record {
    pub class: ItemClass,
    pub service: String,
    pub account: String,
    pub label: Option<String>,
    pub secret: Secret,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Store-wide write counter at the time of the last add/update.
    pub revision: u64,
}

impl Record {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.class, self.service.clone(), self.account.clone())
    }

    pub fn has_key(&self, key: &ItemKey) -> bool {
        self.class == key.class && self.service == key.service && self.account == key.account
    }

    pub fn attributes(&self) -> ItemAttributes {
        ItemAttributes {
            class: self.class,
            service: self.service.clone(),
            account: self.account.clone(),
            label: self.label.clone(),
            created_at: self.created_at,
            modified_at: self.modified_at,
        }
    }

    pub fn to_item(&self, return_secret: bool) -> Item {
        Item {
            attributes: self.attributes(),
            secret: return_secret.then(|| self.secret.clone()),
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("class", &self.class)
            .field("service", &self.service)
            .field("account", &self.account)
            .field("label", &self.label)
            .field("secret", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("modified_at", &self.modified_at)
            .field("revision", &self.revision)
            .finish()
    }
}

/// Non-secret attributes returned by a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemAttributes {
    pub class: ItemClass,
    pub service: String,
    pub account: String,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl ItemAttributes {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.class, self.service.clone(), self.account.clone())
    }
}

/// A query result: attributes plus the secret when it was requested.
#[derive(Clone)]
pub struct Item {
    pub attributes: ItemAttributes,
    pub secret: Option<Secret>,
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("attributes", &self.attributes)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        let now = Utc::now();
        Record {
            class: ItemClass::GenericPassword,
            service: "com.example.app".into(),
            account: "Kim".into(),
            label: None,
            secret: Zeroizing::new(b"password".to_vec()),
            created_at: now,
            modified_at: now,
            revision: 1,
        }
    }

    #[test]
    fn test_debug_redacts_secret() {
        let out = format!("{:?}", record());
        assert!(out.contains("[REDACTED]"));
        assert!(!out.contains("password"));
    }

    #[test]
    fn test_to_item_without_secret() {
        let item = record().to_item(false);
        assert!(item.secret.is_none());
        assert_eq!(item.attributes.account, "Kim");
    }

    #[test]
    fn test_to_item_with_secret() {
        let item = record().to_item(true);
        assert_eq!(item.secret.as_deref().map(Vec::as_slice), Some(&b"password"[..]));
    }

    #[test]
    fn test_class_serde_names() {
        let json = serde_json::to_string(&ItemClass::InternetPassword).unwrap();
        assert_eq!(json, "\"internet-password\"");
        let parsed: ItemClass = serde_json::from_str("\"generic-password\"").unwrap();
        assert_eq!(parsed, ItemClass::GenericPassword);
    }
}
