//! Centralized constants for permissions, paths, and limits.

/// Fallback keychain root when neither XDG_DATA_HOME nor HOME is set.
pub const DEFAULT_KEYCHAIN_ROOT: &str = "/var/lib/goamet-keychain";

/// Directory name used below the XDG data directory.
pub const KEYCHAIN_DIR_NAME: &str = "goamet-keychain";

/// Environment variable overriding the keychain root.
pub const ROOT_ENV: &str = "GOAMET_KEYCHAIN_ROOT";

/// Permission mode for the keychain root directory.
pub const KEYCHAIN_DIR_MODE: u32 = 0o700;

/// Permission mode for the records file, the sealing key, and keychain.toml.
pub const SECRET_FILE_MODE: u32 = 0o600;

/// Permission mode for the audit log.
pub const AUDIT_LOG_MODE: u32 = 0o640;

/// Maximum secret size in bytes (1 MiB).
pub const MAX_SECRET_SIZE: usize = 1_048_576;

/// Default time to wait for the keychain lock before giving up.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;

/// Poll interval while waiting for a contended lock.
pub const LOCK_POLL_INTERVAL_MS: u64 = 25;

/// On-disk format version of keychain.json.
pub const KEYCHAIN_FORMAT_VERSION: u32 = 1;

/// Highest keychain.toml schema version this build understands.
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Length of the sealing key in bytes.
pub const SEALING_KEY_LEN: usize = 32;

/// Length of an XChaCha20-Poly1305 nonce in bytes.
pub const NONCE_LEN: usize = 24;

/// Platform status codes reported alongside store errors.
pub const STATUS_PARAM: i32 = -50;
pub const STATUS_DUPLICATE_ITEM: i32 = -25299;
pub const STATUS_ITEM_NOT_FOUND: i32 = -25300;
pub const STATUS_NOT_AVAILABLE: i32 = -25291;
