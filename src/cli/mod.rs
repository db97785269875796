//! CLI routing and command dispatch.

use crate::core::audit_log::{self, AuditOutcome};
use crate::core::backend::FileBackend;
use crate::core::paths::KeychainPaths;
use crate::core::store::CredentialStore;
use crate::error::StoreError;
use crate::models::keychain_config::KeychainConfig;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod audit;
pub mod init;
pub mod item;

/// Shared context passed to all command handlers.
pub struct CliContext {
    pub paths: KeychainPaths,
    pub non_interactive: bool,
    pub config: KeychainConfig,
}

impl CliContext {
    /// Open the on-disk keychain with the configured lock timeout.
    pub fn open_store(&self) -> Result<CredentialStore<FileBackend>, StoreError> {
        let backend = FileBackend::new(self.paths.clone())
            .with_lock_timeout(self.config.keychain.lock_timeout());
        CredentialStore::open(backend)
    }

    /// Record the outcome of a store operation, then pass it through.
    pub fn audited<T>(
        &self,
        action: &str,
        target: &str,
        result: Result<T, StoreError>,
        affected: impl Fn(&T) -> usize,
    ) -> Result<T, StoreError> {
        if self.config.policy.audit {
            let outcome = match &result {
                Ok(value) => AuditOutcome::ok(affected(value)),
                Err(e) => AuditOutcome::failed(e),
            };
            // audit problems should be visible but never fail the operation
            if let Err(e) = audit_log::record(&self.paths, action, target, outcome) {
                tracing::warn!("audit log failed: {:#}", e);
            }
        }
        result
    }
}

#[derive(Parser, Debug)]
#[command(name = "goamet-keychain", version, about = "Encrypted local keychain for service credentials")]
pub struct Cli {
    /// Keychain directory (default: $GOAMET_KEYCHAIN_ROOT, then the XDG data dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub root: Option<PathBuf>,

    /// Run in non-interactive mode (no prompts, suitable for automation)
    #[arg(long, global = true, env = "GOAMET_KEYCHAIN_NON_INTERACTIVE")]
    pub non_interactive: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let paths = KeychainPaths::resolve(self.root);
        let config = crate::core::config::load(&paths.config)?;
        let ctx = CliContext {
            paths,
            non_interactive: self.non_interactive,
            config,
        };

        match self.command {
            Commands::Init(args) => init::run(&ctx, args),
            Commands::Add(args) => item::run_add(&ctx, args),
            Commands::Find(args) => item::run_find(&ctx, args),
            Commands::Update(args) => item::run_update(&ctx, args),
            Commands::Delete(args) => item::run_delete(&ctx, args),
            Commands::DeleteAll(args) => item::run_delete_all(&ctx, args),
            Commands::Audit { command } => audit::run(&ctx, command),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the keychain directory, sealing key, and default config
    Init(init::InitArgs),
    /// Add a new item
    Add(item::AddArgs),
    /// Search items
    Find(item::FindArgs),
    /// Change attributes or the secret of matching items
    Update(item::UpdateArgs),
    /// Delete matching items
    Delete(item::DeleteArgs),
    /// Delete every item of a class
    DeleteAll(item::DeleteAllArgs),
    /// View or verify the audit trail
    Audit {
        #[command(subcommand)]
        command: audit::AuditCommand,
    },
}
