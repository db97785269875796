//! The credential store facade.
//!
//! Validates requests, evaluates filters and enforces key uniqueness. All
//! persistence goes through the injected [`Backend`]; each operation is a
//! single backend snapshot or transaction.

use crate::core::backend::{Backend, BackendError};
use crate::error::{Result, StoreError};
use crate::models::item::{Item, ItemAttributes, ItemClass, ItemKey, Record};
use crate::models::query::{Changes, Filter, MatchLimit, NewItem, Query};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

pub struct CredentialStore<B: Backend> {
    backend: Mutex<B>,
}

impl<B: Backend> CredentialStore<B> {
    /// Open `backend` and wrap it in a store.
    pub fn open(mut backend: B) -> Result<Self> {
        backend.open()?;
        Ok(Self {
            backend: Mutex::new(backend),
        })
    }

    /// Close the backend and hand it back so it can be reopened.
    pub fn close(self) -> Result<B> {
        let mut backend = self
            .backend
            .into_inner()
            .map_err(|_| BackendError::Poisoned)?;
        backend.close()?;
        Ok(backend)
    }

    fn backend(&self) -> Result<MutexGuard<'_, B>> {
        self.backend
            .lock()
            .map_err(|_| StoreError::from(BackendError::Poisoned))
    }

    /// Store a new item. Fails with `DuplicateItem` if its key is taken.
    pub fn add(&self, item: NewItem) -> Result<ItemAttributes> {
        let item = item.validate()?;
        let key = ItemKey::new(item.class, item.service.clone(), item.account.clone());
        tracing::debug!(%key, "add");

        let mut backend = self.backend()?;
        backend.transact(move |records| {
            if records.iter().any(|r| r.has_key(&key)) {
                return Err(StoreError::DuplicateItem(key));
            }
            let now = Utc::now();
            let record = Record {
                class: item.class,
                service: item.service,
                account: item.account,
                label: item.label,
                secret: item.secret,
                created_at: now,
                modified_at: now,
                revision: next_revision(records),
            };
            let attributes = record.attributes();
            records.push(record);
            Ok(attributes)
        })
    }

    /// Search. With `MatchLimit::One` the most recently written match is
    /// returned and no match is `ItemNotFound`; with `MatchLimit::All`
    /// every match is returned in insertion order, possibly none.
    pub fn find(&self, query: &Query) -> Result<Vec<Item>> {
        let predicate = query.filter.predicate()?;
        let records = self.backend()?.snapshot()?;
        let matches = records.iter().filter(|r| predicate.matches(r));
        let items: Vec<Item> = match query.limit {
            MatchLimit::All => matches.map(|r| r.to_item(query.return_secret)).collect(),
            MatchLimit::One => {
                let record = matches
                    .max_by_key(|r| r.revision)
                    .ok_or(StoreError::ItemNotFound)?;
                vec![record.to_item(query.return_secret)]
            }
        };
        tracing::debug!(
            filter = ?query.filter,
            limit = ?query.limit,
            found = items.len(),
            "find"
        );
        Ok(items)
    }

    pub fn find_one(&self, filter: &Filter, return_secret: bool) -> Result<Item> {
        let query = Query {
            filter: filter.clone(),
            return_secret,
            limit: MatchLimit::One,
        };
        self.find(&query)?
            .pop()
            .ok_or(StoreError::ItemNotFound)
    }

    pub fn find_all(&self, filter: &Filter, return_secret: bool) -> Result<Vec<Item>> {
        let query = Query {
            filter: filter.clone(),
            return_secret,
            limit: MatchLimit::All,
        };
        self.find(&query)
    }

    /// Apply `changes` to every item matching `filter`. Returns the number
    /// of updated items. Nothing is written if any resulting key would
    /// collide with another item.
    pub fn update(&self, filter: &Filter, changes: &Changes) -> Result<usize> {
        let predicate = filter.predicate()?;
        let changes = changes.validate()?;
        tracing::debug!(?filter, "update");

        let mut backend = self.backend()?;
        backend.transact(|records| {
            let matched: Vec<bool> = records.iter().map(|r| predicate.matches(r)).collect();
            if !matched.contains(&true) {
                return Err(StoreError::ItemNotFound);
            }

            if changes.touches_key() {
                let mut taken: HashSet<ItemKey> = records
                    .iter()
                    .zip(&matched)
                    .filter(|(_, hit)| !**hit)
                    .map(|(r, _)| r.key())
                    .collect();
                let hits = records.iter().zip(&matched).filter(|(_, hit)| **hit);
                for (record, _) in hits {
                    let mut key = record.key();
                    if let Some(service) = changes.service {
                        key.service = service.to_string();
                    }
                    if let Some(account) = changes.account {
                        key.account = account.to_string();
                    }
                    if taken.contains(&key) {
                        return Err(StoreError::DuplicateItem(key));
                    }
                    taken.insert(key);
                }
            }

            let now = Utc::now();
            let mut revision = next_revision(records);
            let mut updated = 0;
            for (record, hit) in records.iter_mut().zip(&matched) {
                if !*hit {
                    continue;
                }
                changes.apply(record);
                record.modified_at = now;
                record.revision = revision;
                revision += 1;
                updated += 1;
            }
            Ok(updated)
        })
    }

    /// Delete every item matching `filter`. No match is `ItemNotFound`.
    pub fn delete(&self, filter: &Filter) -> Result<usize> {
        let predicate = filter.predicate()?;
        tracing::debug!(?filter, "delete");

        let mut backend = self.backend()?;
        backend.transact(|records| {
            let removed = remove_matching(records, |r| predicate.matches(r));
            if removed == 0 {
                return Err(StoreError::ItemNotFound);
            }
            Ok(removed)
        })
    }

    /// Delete every item of `class`. Succeeds with 0 when there are none.
    pub fn delete_all(&self, class: ItemClass) -> Result<usize> {
        tracing::debug!(%class, "delete all");
        let mut backend = self.backend()?;
        backend.transact(|records| Ok(remove_matching(records, |r| r.class == class)))
    }
}

fn next_revision(records: &[Record]) -> u64 {
    records.iter().map(|r| r.revision).max().unwrap_or(0) + 1
}

fn remove_matching(records: &mut Vec<Record>, hit: impl Fn(&Record) -> bool) -> usize {
    let before = records.len();
    records.retain(|r| !hit(r));
    before - records.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::MemoryBackend;
    use crate::models::attr::Field;
    use std::sync::Arc;
    use std::thread;

    const CLASS: ItemClass = ItemClass::GenericPassword;
    const SERVICE: &str = "com.example.app";

    fn store() -> CredentialStore<MemoryBackend> {
        CredentialStore::open(MemoryBackend::new()).unwrap()
    }

    fn add(store: &CredentialStore<MemoryBackend>, account: &str, secret: &[u8]) {
        store
            .add(NewItem::new(CLASS, SERVICE, account, secret.to_vec()))
            .unwrap();
    }

    fn by_account(account: &str) -> Filter {
        Filter::class(CLASS).with_service(SERVICE).with_account(account)
    }

    fn secret_of(store: &CredentialStore<MemoryBackend>, account: &str) -> Vec<u8> {
        let item = store.find_one(&by_account(account), true).unwrap();
        item.secret.unwrap().to_vec()
    }

    #[test]
    fn test_add_then_find_returns_secret() {
        let store = store();
        add(&store, "Kim", b"password");
        assert_eq!(secret_of(&store, "Kim"), b"password");
    }

    #[test]
    fn test_find_without_secret_returns_attributes_only() {
        let store = store();
        add(&store, "Kim", b"password");
        let item = store.find_one(&by_account("Kim"), false).unwrap();
        assert!(item.secret.is_none());
        assert_eq!(item.attributes.account, "Kim");
        assert_eq!(item.attributes.service, SERVICE);
    }

    #[test]
    fn test_add_duplicate_fails() {
        let store = store();
        add(&store, "Kim", b"password");
        let err = store
            .add(NewItem::new(CLASS, SERVICE, "Kim", b"other".to_vec()))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateItem(_)));
        assert_eq!(secret_of(&store, "Kim"), b"password");
    }

    #[test]
    fn test_same_account_in_other_class_is_not_duplicate() {
        let store = store();
        add(&store, "Kim", b"password");
        store
            .add(NewItem::new(ItemClass::InternetPassword, SERVICE, "Kim", b"x".to_vec()))
            .unwrap();
    }

    #[test]
    fn test_add_with_null_label_fails() {
        let store = store();
        let item =
            NewItem::new(CLASS, SERVICE, "Kim", b"password".to_vec()).with_null(Field::Label);
        assert!(matches!(
            store.add(item),
            Err(StoreError::InvalidParameter(_))
        ));
        assert!(store.find_all(&Filter::class(CLASS), false).unwrap().is_empty());
    }

    #[test]
    fn test_find_with_null_account_is_invalid_even_if_item_exists() {
        let store = store();
        add(&store, "Kim", b"password");
        let filter = Filter::class(CLASS)
            .with_service(SERVICE)
            .with_null(Field::Account)
            .unwrap();
        let err = store.find_one(&filter, true).unwrap_err();
        assert!(matches!(err, StoreError::InvalidParameter(_)));
    }

    #[test]
    fn test_find_all_in_insertion_order() {
        let store = store();
        add(&store, "Kim", b"password");
        add(&store, "Kim2", b"password2");
        let items = store
            .find_all(&Filter::class(CLASS).with_service(SERVICE), true)
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].secret.as_deref().unwrap().as_slice(), b"password");
        assert_eq!(items[1].secret.as_deref().unwrap().as_slice(), b"password2");
    }

    #[test]
    fn test_find_all_without_matches_is_empty() {
        let store = store();
        assert!(store.find_all(&Filter::class(CLASS), true).unwrap().is_empty());
    }

    #[test]
    fn test_find_one_without_matches_is_not_found() {
        let store = store();
        assert!(matches!(
            store.find_one(&by_account("Kim"), true),
            Err(StoreError::ItemNotFound)
        ));
    }

    #[test]
    fn test_find_one_prefers_most_recently_written() {
        let store = store();
        add(&store, "Kim", b"password");
        add(&store, "Kim2", b"password2");
        let under_constrained = Filter::class(CLASS).with_service(SERVICE);
        let item = store.find_one(&under_constrained, false).unwrap();
        assert_eq!(item.attributes.account, "Kim2");

        store
            .update(&by_account("Kim"), &Changes::new().secret(b"new".to_vec()))
            .unwrap();
        let item = store.find_one(&under_constrained, false).unwrap();
        assert_eq!(item.attributes.account, "Kim");
    }

    #[test]
    fn test_update_secret_keeps_key() {
        let store = store();
        add(&store, "Kim", b"password");
        let n = store
            .update(&by_account("Kim"), &Changes::new().secret(b"newPassword".to_vec()))
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(secret_of(&store, "Kim"), b"newPassword");
    }

    #[test]
    fn test_update_account_migrates_key() {
        let store = store();
        add(&store, "Kim", b"password");
        store
            .update(
                &by_account("Kim"),
                &Changes::new().account("Lee").secret(b"newPassword".to_vec()),
            )
            .unwrap();
        assert!(matches!(
            store.find_one(&by_account("Kim"), true),
            Err(StoreError::ItemNotFound)
        ));
        let item = store.find_one(&by_account("Lee"), true).unwrap();
        assert_eq!(item.attributes.account, "Lee");
        assert_eq!(item.secret.unwrap().as_slice(), b"newPassword");
    }

    #[test]
    fn test_update_one_of_two_leaves_other() {
        let store = store();
        add(&store, "Kim", b"password");
        add(&store, "Kim2", b"password2");
        store
            .update(&by_account("Kim2"), &Changes::new().account("Lee"))
            .unwrap();
        assert_eq!(secret_of(&store, "Kim"), b"password");
        assert_eq!(secret_of(&store, "Lee"), b"password2");
        assert!(store.find_one(&by_account("Kim2"), false).is_err());
    }

    #[test]
    fn test_update_collision_is_duplicate_and_atomic() {
        let store = store();
        add(&store, "Kim", b"password");
        add(&store, "Kim2", b"password2");
        let err = store
            .update(
                &by_account("Kim2"),
                &Changes::new().account("Kim").secret(b"clobber".to_vec()),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateItem(_)));
        assert_eq!(secret_of(&store, "Kim"), b"password");
        assert_eq!(secret_of(&store, "Kim2"), b"password2");
    }

    #[test]
    fn test_update_service_moves_item() {
        let store = store();
        add(&store, "Kim", b"password");
        let n = store
            .update(&by_account("Kim"), &Changes::new().service("com.example.other"))
            .unwrap();
        assert_eq!(n, 1);
        assert!(matches!(
            store.find_one(&by_account("Kim"), false),
            Err(StoreError::ItemNotFound)
        ));
        let moved = Filter::class(CLASS)
            .with_service("com.example.other")
            .with_account("Kim");
        let items = store.find(&Query::all(moved).with_secret()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].attributes.service, "com.example.other");
        assert_eq!(items[0].secret.as_deref().map(Vec::as_slice), Some(&b"password"[..]));
    }

    #[test]
    fn test_update_service_collision_is_duplicate() {
        let store = store();
        add(&store, "Kim", b"password");
        store
            .add(NewItem::new(CLASS, "com.example.other", "Kim", b"other".to_vec()))
            .unwrap();
        let err = store
            .update(&by_account("Kim"), &Changes::new().service("com.example.other"))
            .unwrap_err();
        match err {
            StoreError::DuplicateItem(key) => {
                assert_eq!(key, ItemKey::new(CLASS, "com.example.other", "Kim"));
            }
            other => panic!("expected DuplicateItem, got {other:?}"),
        }
        assert_eq!(secret_of(&store, "Kim"), b"password");
        let all = store.find(&Query::all(Filter::class(CLASS))).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|i| i.secret.is_none()));
    }

    #[test]
    fn test_update_many_onto_one_key_is_duplicate() {
        let store = store();
        add(&store, "Kim", b"password");
        add(&store, "Kim2", b"password2");
        let err = store
            .update(
                &Filter::class(CLASS).with_service(SERVICE),
                &Changes::new().account("Lee"),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateItem(_)));
        assert_eq!(store.find_all(&Filter::class(CLASS), false).unwrap().len(), 2);
    }

    #[test]
    fn test_update_label_on_all_matches() {
        let store = store();
        add(&store, "Kim", b"password");
        add(&store, "Kim2", b"password2");
        let n = store
            .update(&Filter::class(CLASS), &Changes::new().label("team"))
            .unwrap();
        assert_eq!(n, 2);
        let items = store
            .find_all(&Filter::new().with_label("team"), false)
            .unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_update_keeps_position() {
        let store = store();
        add(&store, "Kim", b"password");
        add(&store, "Kim2", b"password2");
        store
            .update(&by_account("Kim"), &Changes::new().account("Lee"))
            .unwrap();
        let items = store.find_all(&Filter::class(CLASS), false).unwrap();
        let accounts: Vec<_> = items.iter().map(|i| i.attributes.account.as_str()).collect();
        assert_eq!(accounts, vec!["Lee", "Kim2"]);
    }

    #[test]
    fn test_update_not_found() {
        let store = store();
        assert!(matches!(
            store.update(&by_account("Kim"), &Changes::new().secret(b"x".to_vec())),
            Err(StoreError::ItemNotFound)
        ));
    }

    #[test]
    fn test_update_with_null_filter_is_invalid() {
        let store = store();
        add(&store, "Kim", b"password");
        let filter = Filter::class(CLASS).with_null(Field::Service).unwrap();
        assert!(matches!(
            store.update(&filter, &Changes::new().secret(b"x".to_vec())),
            Err(StoreError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_delete_all_then_find_not_found() {
        let store = store();
        add(&store, "Kim", b"password");
        add(&store, "Kim2", b"password2");
        assert_eq!(store.delete_all(CLASS).unwrap(), 2);
        assert!(matches!(
            store.find_one(&by_account("Kim"), true),
            Err(StoreError::ItemNotFound)
        ));
    }

    #[test]
    fn test_delete_all_is_idempotent() {
        let store = store();
        assert_eq!(store.delete_all(CLASS).unwrap(), 0);
        assert_eq!(store.delete_all(CLASS).unwrap(), 0);
    }

    #[test]
    fn test_delete_all_spares_other_classes() {
        let store = store();
        add(&store, "Kim", b"password");
        store
            .add(NewItem::new(ItemClass::Key, SERVICE, "Kim", b"k".to_vec()))
            .unwrap();
        store.delete_all(CLASS).unwrap();
        let left = store.find_all(&Filter::new(), false).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].attributes.class, ItemClass::Key);
    }

    #[test]
    fn test_delete_targeted() {
        let store = store();
        add(&store, "Kim", b"password");
        add(&store, "Kim2", b"password2");
        assert_eq!(store.delete(&by_account("Kim")).unwrap(), 1);
        assert!(store.find_one(&by_account("Kim"), false).is_err());
        assert_eq!(secret_of(&store, "Kim2"), b"password2");
    }

    #[test]
    fn test_delete_when_no_item_is_not_found() {
        let store = store();
        assert!(matches!(
            store.delete(&by_account("Kim")),
            Err(StoreError::ItemNotFound)
        ));
    }

    #[test]
    fn test_closed_store_is_unavailable_and_reopens() {
        let store = store();
        add(&store, "Kim", b"password");
        let backend = store.close().unwrap();
        let store = CredentialStore::open(backend).unwrap();
        assert_eq!(secret_of(&store, "Kim"), b"password");
    }

    #[test]
    fn test_unopened_backend_is_unavailable() {
        let store = CredentialStore {
            backend: Mutex::new(MemoryBackend::new()),
        };
        let err = store.find_one(&by_account("Kim"), false).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_concurrent_add_of_same_key_has_one_winner() {
        let store = Arc::new(store());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store.add(NewItem::new(CLASS, SERVICE, "Kim", vec![i as u8]))
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let ok = results.iter().filter(|r| r.is_ok()).count();
        let dup = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::DuplicateItem(_))))
            .count();
        assert_eq!(ok, 1);
        assert_eq!(dup, 7);
    }
}
