//! Store behaviour shared by every backend.

use goamet_keychain::core::paths::KeychainPaths;
use goamet_keychain::models::attr::Field;
use goamet_keychain::models::item::ItemClass;
use goamet_keychain::models::query::{Changes, Filter, NewItem, Query};
use goamet_keychain::{Backend, CredentialStore, FileBackend, MemoryBackend, StoreError};
use tempfile::TempDir;

const CLASS: ItemClass = ItemClass::GenericPassword;
const SERVICE: &str = "com.example.keychain-tests";

struct Harness<B: Backend> {
    store: CredentialStore<B>,
    _dir: Option<TempDir>,
}

fn memory() -> Harness<MemoryBackend> {
    Harness {
        store: CredentialStore::open(MemoryBackend::new()).unwrap(),
        _dir: None,
    }
}

fn file() -> Harness<FileBackend> {
    let dir = TempDir::new().unwrap();
    let paths = KeychainPaths::from_root(dir.path().join("keychain"));
    FileBackend::init(&paths).unwrap();
    Harness {
        store: CredentialStore::open(FileBackend::new(paths)).unwrap(),
        _dir: Some(dir),
    }
}

fn item(account: &str, secret: &[u8]) -> NewItem {
    NewItem::new(CLASS, SERVICE, account, secret.to_vec())
}

fn by_account(account: &str) -> Filter {
    Filter::class(CLASS).with_service(SERVICE).with_account(account)
}

fn everything() -> Filter {
    Filter::class(CLASS).with_service(SERVICE)
}

fn secret_of<B: Backend>(store: &CredentialStore<B>, account: &str) -> Vec<u8> {
    let found = store.find_one(&by_account(account), true).unwrap();
    found.secret.unwrap().to_vec()
}

macro_rules! behaviour_suite {
    ($name:ident, $harness:expr) => {
        mod $name {
            use super::*;

            #[test]
            fn add_then_find_returns_secret() {
                let h = $harness;
                h.store.add(item("Kim", b"password")).unwrap();
                assert_eq!(secret_of(&h.store, "Kim"), b"password");
            }

            #[test]
            fn binary_secret_round_trips() {
                let h = $harness;
                let value: i64 = 1_234_567_890_123;
                h.store.add(item("Kim", &value.to_le_bytes())).unwrap();
                let bytes: [u8; 8] = secret_of(&h.store, "Kim").try_into().unwrap();
                assert_eq!(i64::from_le_bytes(bytes), value);
            }

            #[test]
            fn add_with_null_label_is_invalid() {
                let h = $harness;
                let err = h
                    .store
                    .add(item("Kim", b"password").with_null(Field::Label))
                    .unwrap_err();
                assert!(matches!(err, StoreError::InvalidParameter(_)));
                let all = h.store.find_all(&everything(), false).unwrap();
                assert!(all.is_empty());
            }

            #[test]
            fn add_with_label_keeps_it() {
                let h = $harness;
                let attrs = h
                    .store
                    .add(item("Kim", b"password").with_label("Kim's login"))
                    .unwrap();
                assert_eq!(attrs.label.as_deref(), Some("Kim's login"));
                let found = h.store.find_one(&by_account("Kim"), false).unwrap();
                assert_eq!(found.attributes.label.as_deref(), Some("Kim's login"));
            }

            #[test]
            fn add_duplicate_is_rejected() {
                let h = $harness;
                h.store.add(item("Kim", b"password")).unwrap();
                let err = h.store.add(item("Kim", b"password2")).unwrap_err();
                assert!(matches!(err, StoreError::DuplicateItem(_)));
                assert_eq!(secret_of(&h.store, "Kim"), b"password");
            }

            #[test]
            fn find_with_null_account_is_invalid() {
                let h = $harness;
                h.store.add(item("Kim", b"password")).unwrap();
                let filter = everything().with_null(Field::Account).unwrap();
                let err = h.store.find(&Query::one(filter)).unwrap_err();
                assert!(matches!(err, StoreError::InvalidParameter(_)));
            }

            #[test]
            fn find_all_returns_every_match_in_insertion_order() {
                let h = $harness;
                h.store.add(item("Kim", b"password")).unwrap();
                h.store.add(item("Kim2", b"password2")).unwrap();
                let all = h.store.find_all(&everything(), true).unwrap();
                let accounts: Vec<_> = all.iter().map(|i| i.attributes.account.as_str()).collect();
                assert_eq!(accounts, ["Kim", "Kim2"]);
                assert_eq!(all[1].secret.as_deref().map(Vec::as_slice), Some(&b"password2"[..]));
            }

            #[test]
            fn empty_store_find_and_delete() {
                let h = $harness;
                assert!(matches!(
                    h.store.find_one(&by_account("Kim"), false).unwrap_err(),
                    StoreError::ItemNotFound
                ));
                assert!(matches!(
                    h.store.delete(&by_account("Kim")).unwrap_err(),
                    StoreError::ItemNotFound
                ));
                assert!(h.store.find_all(&everything(), false).unwrap().is_empty());
                assert_eq!(h.store.delete_all(CLASS).unwrap(), 0);
            }

            #[test]
            fn delete_removes_only_matching_item() {
                let h = $harness;
                h.store.add(item("Kim", b"password")).unwrap();
                h.store.add(item("Kim2", b"password2")).unwrap();
                assert_eq!(h.store.delete(&by_account("Kim")).unwrap(), 1);
                assert!(h.store.find_one(&by_account("Kim"), false).is_err());
                assert_eq!(secret_of(&h.store, "Kim2"), b"password2");
            }

            #[test]
            fn delete_all_clears_class() {
                let h = $harness;
                h.store.add(item("Kim", b"password")).unwrap();
                h.store.add(item("Kim2", b"password2")).unwrap();
                assert_eq!(h.store.delete_all(CLASS).unwrap(), 2);
                assert!(h.store.find_all(&everything(), false).unwrap().is_empty());
                assert_eq!(h.store.delete_all(CLASS).unwrap(), 0);
            }

            #[test]
            fn update_secret() {
                let h = $harness;
                h.store.add(item("Kim", b"password")).unwrap();
                let updated = h
                    .store
                    .update(&by_account("Kim"), &Changes::new().secret(b"password2".to_vec()))
                    .unwrap();
                assert_eq!(updated, 1);
                assert_eq!(secret_of(&h.store, "Kim"), b"password2");
            }

            #[test]
            fn update_account_and_secret() {
                let h = $harness;
                h.store.add(item("Kim", b"password")).unwrap();
                let changes = Changes::new().account("Kim2").secret(b"password2".to_vec());
                h.store.update(&by_account("Kim"), &changes).unwrap();
                assert!(matches!(
                    h.store.find_one(&by_account("Kim"), false).unwrap_err(),
                    StoreError::ItemNotFound
                ));
                assert_eq!(secret_of(&h.store, "Kim2"), b"password2");
            }

            #[test]
            fn update_touches_only_matching_item() {
                let h = $harness;
                h.store.add(item("Kim", b"password")).unwrap();
                h.store.add(item("Kim2", b"password2")).unwrap();
                h.store
                    .update(&by_account("Kim"), &Changes::new().secret(b"changed".to_vec()))
                    .unwrap();
                assert_eq!(secret_of(&h.store, "Kim"), b"changed");
                assert_eq!(secret_of(&h.store, "Kim2"), b"password2");
            }

            #[test]
            fn update_onto_existing_key_is_rejected() {
                let h = $harness;
                h.store.add(item("Kim", b"password")).unwrap();
                h.store.add(item("Kim2", b"password2")).unwrap();
                let err = h
                    .store
                    .update(&by_account("Kim"), &Changes::new().account("Kim2"))
                    .unwrap_err();
                assert!(matches!(err, StoreError::DuplicateItem(_)));
                assert_eq!(secret_of(&h.store, "Kim"), b"password");
                assert_eq!(secret_of(&h.store, "Kim2"), b"password2");
            }

            #[test]
            fn update_without_match_is_not_found() {
                let h = $harness;
                let err = h
                    .store
                    .update(&by_account("Kim"), &Changes::new().secret(b"x".to_vec()))
                    .unwrap_err();
                assert!(matches!(err, StoreError::ItemNotFound));
            }

            #[test]
            fn update_with_null_change_is_invalid() {
                let h = $harness;
                h.store.add(item("Kim", b"password")).unwrap();
                let changes = Changes::new().with_null(Field::Account).unwrap();
                let err = h.store.update(&by_account("Kim"), &changes).unwrap_err();
                assert!(matches!(err, StoreError::InvalidParameter(_)));
                assert_eq!(secret_of(&h.store, "Kim"), b"password");
            }
        }
    };
}

behaviour_suite!(memory_backend, memory());
behaviour_suite!(file_backend, file());

#[test]
fn file_backend_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let paths = KeychainPaths::from_root(dir.path().join("keychain"));
    FileBackend::init(&paths).unwrap();

    let store = CredentialStore::open(FileBackend::new(paths.clone())).unwrap();
    store.add(item("Kim", b"password")).unwrap();
    store.close().unwrap();

    let store = CredentialStore::open(FileBackend::new(paths)).unwrap();
    assert_eq!(secret_of(&store, "Kim"), b"password");
}

#[test]
fn uninitialized_file_backend_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let paths = KeychainPaths::from_root(dir.path().join("missing"));
    let err = CredentialStore::open(FileBackend::new(paths)).err().unwrap();
    assert!(matches!(err, StoreError::BackendUnavailable(_)));
}
