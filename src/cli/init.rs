use crate::cli::CliContext;
use crate::core::backend::FileBackend;
use crate::core::config;
use crate::models::item::ItemClass;
use anyhow::{Context, Result};
use clap::Args;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Class used by `add` when --class is omitted
    #[arg(long, value_enum)]
    pub default_class: Option<ItemClass>,
}

pub fn run(ctx: &CliContext, args: InitArgs) -> Result<()> {
    let paths = &ctx.paths;
    let created = FileBackend::init(paths).context("initialize keychain")?;

    let mut cfg = ctx.config.clone();
    if let Some(class) = args.default_class {
        cfg.keychain.default_class = class;
    }
    if !paths.config.exists() || args.default_class.is_some() {
        config::save(&paths.config, &cfg)?;
    }

    if created {
        println!("keychain initialized at {}", paths.root.display());
    } else {
        println!("keychain already initialized at {}", paths.root.display());
    }
    println!("default class: {}", cfg.keychain.default_class);
    Ok(())
}
