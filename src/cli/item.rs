use crate::cli::CliContext;
use crate::constants;
use crate::error::StoreError;
use crate::models::attr::{Attr, Field};
use crate::models::item::{Item, ItemClass, ItemKey, Secret};
use crate::models::query::{Changes, Filter, NewItem, Query};
use crate::util::fs as keychain_fs;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use clap::{Args, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Table};
use dialoguer::Password;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use zeroize::Zeroizing;

/// Attribute filter shared by find, update and delete.
#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Item class
    #[arg(long, value_enum)]
    pub class: Option<ItemClass>,

    #[arg(long)]
    pub service: Option<String>,

    #[arg(long)]
    pub account: Option<String>,

    #[arg(long)]
    pub label: Option<String>,

    /// Set an attribute to an explicit null (repeatable)
    #[arg(long, value_enum, value_name = "FIELD")]
    pub null: Vec<Field>,

    /// Filter as a JSON object; `null` values are explicit nulls
    #[arg(
        long,
        value_name = "JSON",
        conflicts_with_all = ["class", "service", "account", "label", "null"]
    )]
    pub query: Option<String>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> Result<Filter> {
        if let Some(json) = &self.query {
            let filter = serde_json::from_str(json)
                .map_err(|e| StoreError::invalid(format!("--query: {}", e)))?;
            return Ok(filter);
        }
        let mut filter = Filter {
            class: flag(self.class),
            service: flag(self.service.clone()),
            account: flag(self.account.clone()),
            label: flag(self.label.clone()),
        };
        for field in &self.null {
            let has_value = match field {
                Field::Class => self.class.is_some(),
                Field::Service => self.service.is_some(),
                Field::Account => self.account.is_some(),
                Field::Label => self.label.is_some(),
                Field::Secret => false,
            };
            if has_value {
                return Err(StoreError::invalid(format!(
                    "--{} and --null {} cannot be used together",
                    field, field
                ))
                .into());
            }
            filter = filter.with_null(*field)?;
        }
        Ok(filter)
    }
}

/// A flag that was not passed is unset, never null.
fn flag<T>(value: Option<T>) -> Attr<T> {
    value.map_or(Attr::Unset, Attr::Value)
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Item class (default: keychain.default_class)
    #[arg(long, value_enum)]
    pub class: Option<ItemClass>,

    #[arg(long)]
    pub service: Option<String>,

    #[arg(long)]
    pub account: Option<String>,

    /// Display label
    #[arg(long)]
    pub label: Option<String>,

    /// Set an attribute to an explicit null (repeatable)
    #[arg(long, value_enum, value_name = "FIELD")]
    pub null: Vec<Field>,

    /// Read secret from stdin instead of interactive prompt
    #[arg(long)]
    pub from_stdin: bool,

    /// Drop one trailing newline from the stdin secret (text secrets)
    #[arg(long, requires = "from_stdin")]
    pub trim_newline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Args, Debug)]
pub struct FindArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Return every match instead of the most recently written one
    #[arg(long)]
    pub all: bool,

    /// Output format for attributes
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Write the secret to a file (mode 0600)
    #[arg(long, value_name = "PATH", conflicts_with = "all")]
    pub output: Option<PathBuf>,

    /// Print the secret to stdout (requires --confirm)
    #[arg(long, conflicts_with_all = ["all", "output"])]
    pub reveal: bool,

    /// Allow --reveal
    #[arg(long)]
    pub confirm: bool,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    #[arg(long, value_name = "SERVICE")]
    pub set_service: Option<String>,

    #[arg(long, value_name = "ACCOUNT")]
    pub set_account: Option<String>,

    #[arg(long, value_name = "LABEL")]
    pub set_label: Option<String>,

    /// Replace the secret
    #[arg(long)]
    pub new_secret: bool,

    /// Read the new secret from stdin instead of interactive prompt
    #[arg(long, requires = "new_secret")]
    pub from_stdin: bool,

    /// Drop one trailing newline from the stdin secret (text secrets)
    #[arg(long, requires = "from_stdin")]
    pub trim_newline: bool,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args, Debug)]
pub struct DeleteAllArgs {
    /// Class to clear
    #[arg(long, value_enum)]
    pub class: ItemClass,
}

fn check_service(ctx: &CliContext, service: &str) -> Result<()> {
    if !ctx.config.policy.is_service_allowed(service) {
        bail!(
            "policy: service '{}' not allowed (service_allowlist enforced)",
            service
        );
    }
    Ok(())
}

pub fn run_add(ctx: &CliContext, args: AddArgs) -> Result<()> {
    let needs_secret = !args.null.contains(&Field::Secret);
    if needs_secret && ctx.non_interactive && !args.from_stdin {
        bail!("--non-interactive requires --from-stdin for add");
    }

    let class = args.class.unwrap_or(ctx.config.keychain.default_class);
    let mut item = NewItem {
        class: Attr::Value(class),
        service: flag(args.service),
        account: flag(args.account),
        label: flag(args.label),
        secret: Attr::Unset,
    };
    for field in &args.null {
        item = item.with_null(*field);
    }
    if let Some(service) = item.service.as_value() {
        check_service(ctx, service)?;
    }
    if needs_secret {
        let prompt = format!(
            "Secret for {}",
            item.account.as_value().map_or("new item", String::as_str)
        );
        let secret = read_secret(args.from_stdin, args.trim_newline, &prompt)?;
        ctx.config.policy.check_secret_size(secret.len())?;
        item.secret = Attr::Value(secret);
    }

    let target = describe_new_item(&item);
    let store = ctx.open_store()?;
    let attrs = ctx.audited("add", &target, store.add(item), |_| 1)?;
    println!("Added {}", attrs.key());
    Ok(())
}

pub fn run_find(ctx: &CliContext, args: FindArgs) -> Result<()> {
    if args.reveal && !args.confirm {
        bail!("refusing to print secret to stdout without --confirm");
    }
    let wants_secret = args.reveal || args.output.is_some();
    let filter = args.filter.to_filter()?;
    let mut query = if args.all {
        Query::all(filter)
    } else {
        Query::one(filter)
    };
    if wants_secret {
        query = query.with_secret();
    }

    let action = if wants_secret { "read-secret" } else { "find" };
    let target = describe_filter(&query.filter);
    let store = ctx.open_store()?;
    let items = ctx.audited(action, &target, store.find(&query), Vec::len)?;

    if let Some(output) = args.output {
        let secret = single_secret(&items)?;
        keychain_fs::write_atomic(&output, secret, constants::SECRET_FILE_MODE)
            .with_context(|| format!("write {}", output.display()))?;
        println!("Wrote {}", output.display());
        return Ok(());
    }
    if args.reveal {
        let secret = single_secret(&items)?;
        let mut stdout = std::io::stdout();
        stdout.write_all(secret).context("write to stdout")?;
        stdout.flush().context("flush stdout")?;
        return Ok(());
    }

    print_items(&items, args.format)
}

pub fn run_update(ctx: &CliContext, args: UpdateArgs) -> Result<()> {
    if let Some(service) = &args.set_service {
        check_service(ctx, service)?;
    }
    if args.new_secret && ctx.non_interactive && !args.from_stdin {
        bail!("--non-interactive requires --from-stdin for update --new-secret");
    }
    let filter = args.filter.to_filter()?;

    let mut changes = Changes {
        service: flag(args.set_service),
        account: flag(args.set_account),
        label: flag(args.set_label),
        secret: Attr::Unset,
    };
    if args.new_secret {
        let secret = read_secret(args.from_stdin, args.trim_newline, "New secret")?;
        ctx.config.policy.check_secret_size(secret.len())?;
        changes.secret = Attr::Value(secret);
    }

    let target = describe_filter(&filter);
    let store = ctx.open_store()?;
    let updated = ctx.audited("update", &target, store.update(&filter, &changes), |n| *n)?;
    println!("Updated {} item(s)", updated);
    Ok(())
}

pub fn run_delete(ctx: &CliContext, args: DeleteArgs) -> Result<()> {
    let filter = args.filter.to_filter()?;
    let target = describe_filter(&filter);
    let store = ctx.open_store()?;
    let deleted = ctx.audited("delete", &target, store.delete(&filter), |n| *n)?;
    println!("Deleted {} item(s)", deleted);
    Ok(())
}

pub fn run_delete_all(ctx: &CliContext, args: DeleteAllArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let target = format!("class={}", args.class);
    let deleted = ctx.audited("delete-all", &target, store.delete_all(args.class), |n| *n)?;
    println!("Deleted {} {} item(s)", deleted, args.class);
    Ok(())
}

fn single_secret(items: &[Item]) -> Result<&[u8]> {
    match items {
        [item] => item
            .secret
            .as_deref()
            .map(Vec::as_slice)
            .context("secret was not returned"),
        _ => bail!("expected exactly one item, found {}", items.len()),
    }
}

fn print_items(items: &[Item], format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        let attrs: Vec<_> = items.iter().map(|i| &i.attributes).collect();
        let json = serde_json::to_string_pretty(&attrs).context("serialize items")?;
        println!("{}", json);
        return Ok(());
    }

    if items.is_empty() {
        println!("No items found");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Class").add_attribute(Attribute::Bold),
        Cell::new("Service").add_attribute(Attribute::Bold),
        Cell::new("Account").add_attribute(Attribute::Bold),
        Cell::new("Label").add_attribute(Attribute::Bold),
        Cell::new("Modified").add_attribute(Attribute::Bold),
    ]);
    for item in items {
        let attrs = &item.attributes;
        let modified: DateTime<Local> = attrs.modified_at.into();
        table.add_row(vec![
            attrs.class.to_string(),
            attrs.service.clone(),
            attrs.account.clone(),
            attrs.label.clone().unwrap_or_else(|| "-".to_string()),
            modified.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }
    println!("{}", table);
    Ok(())
}

fn read_secret(from_stdin: bool, trim_newline: bool, prompt: &str) -> Result<Secret> {
    if from_stdin {
        return read_stdin_secret(io::stdin().lock(), trim_newline)
            .context("read secret from stdin");
    }
    let secret = Zeroizing::new(
        Password::new()
            .with_prompt(prompt)
            .allow_empty_password(false)
            .interact()
            .context("read secret from prompt")?,
    );
    Ok(Zeroizing::new(secret.as_bytes().to_vec()))
}

/// Secret bytes exactly as read. With `trim_newline`, a single trailing
/// `\n` or `\r\n` is dropped.
fn read_stdin_secret(mut reader: impl Read, trim_newline: bool) -> io::Result<Secret> {
    let mut buf = Zeroizing::new(Vec::new());
    reader.read_to_end(&mut buf)?;
    if trim_newline {
        if buf.ends_with(b"\r\n") {
            let len = buf.len() - 2;
            buf.truncate(len);
        } else if buf.ends_with(b"\n") {
            buf.pop();
        }
    }
    Ok(buf)
}

fn describe_attr<T: std::fmt::Display>(out: &mut Vec<String>, name: &str, attr: &Attr<T>) {
    match attr {
        Attr::Unset => {}
        Attr::Null => out.push(format!("{}=<null>", name)),
        Attr::Value(v) => out.push(format!("{}={}", name, v)),
    }
}

/// Audit-friendly rendering of a filter. Omitted fields are left out.
fn describe_filter(filter: &Filter) -> String {
    let mut parts = Vec::new();
    describe_attr(&mut parts, "class", &filter.class);
    describe_attr(&mut parts, "service", &filter.service);
    describe_attr(&mut parts, "account", &filter.account);
    describe_attr(&mut parts, "label", &filter.label);
    if parts.is_empty() {
        "*".to_string()
    } else {
        parts.join(" ")
    }
}

fn describe_new_item(item: &NewItem) -> String {
    match (&item.class, &item.service, &item.account) {
        (Attr::Value(class), Attr::Value(service), Attr::Value(account)) => {
            ItemKey::new(*class, service.clone(), account.clone()).to_string()
        }
        _ => describe_filter(&Filter {
            class: item.class.clone(),
            service: item.service.clone(),
            account: item.account.clone(),
            label: item.label.clone(),
        }),
    }
}
