use crate::cli::CliContext;
use crate::core::audit_log::{self, AuditEntry};
use anyhow::{bail, Result};
use chrono::{DateTime, Local};
use clap::{Args, Subcommand};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Table};

#[derive(Subcommand, Debug)]
pub enum AuditCommand {
    /// Display the audit trail
    #[command(visible_alias = "log")]
    Show(AuditShowArgs),
    /// Verify the hash chain of the audit trail
    Verify,
}

#[derive(Args, Debug)]
pub struct AuditShowArgs {
    /// Maximum number of entries to display
    #[arg(long, default_value_t = 50)]
    pub limit: usize,

    /// Only show entries for this action (add, find, read-secret, update, delete, delete-all)
    #[arg(long)]
    pub action: Option<String>,
}

pub fn run(ctx: &CliContext, cmd: AuditCommand) -> Result<()> {
    match cmd {
        AuditCommand::Show(args) => run_show(ctx, args),
        AuditCommand::Verify => run_verify(ctx),
    }
}

fn outcome_cell(entry: &AuditEntry) -> String {
    let result = &entry.result;
    match (result.success, result.affected) {
        (true, Some(n)) => format!("OK ({})", n),
        (true, None) => "OK".to_string(),
        (false, _) => format!("FAIL: {}", result.error.as_deref().unwrap_or("?")),
    }
}

fn run_show(ctx: &CliContext, args: AuditShowArgs) -> Result<()> {
    let mut entries = audit_log::read_log(&ctx.paths, Some(args.limit))?;
    if let Some(action) = &args.action {
        entries.retain(|e| &e.action == action);
    }

    if entries.is_empty() {
        println!("No audit entries found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Timestamp").add_attribute(Attribute::Bold),
        Cell::new("Action").add_attribute(Attribute::Bold),
        Cell::new("Target").add_attribute(Attribute::Bold),
        Cell::new("Actor").add_attribute(Attribute::Bold),
        Cell::new("Result").add_attribute(Attribute::Bold),
    ]);

    for entry in &entries {
        let local: DateTime<Local> = entry.timestamp.into();
        table.add_row(vec![
            local.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.action.clone(),
            entry.target.clone(),
            entry.actor.clone(),
            outcome_cell(entry),
        ]);
    }

    println!("{}", table);
    println!("\n{} entries shown.", entries.len());
    Ok(())
}

fn run_verify(ctx: &CliContext) -> Result<()> {
    let report = audit_log::verify_chain(&ctx.paths)?;

    if report.total == 0 {
        println!("No audit entries to verify.");
        return Ok(());
    }

    for err in &report.errors {
        println!("  [FAIL] {}", err);
    }

    println!();
    if !report.is_intact() {
        bail!(
            "audit chain broken: {} entries, {} errors",
            report.total,
            report.errors.len()
        );
    }
    println!("Audit chain: {} entries verified, 0 errors", report.total);
    Ok(())
}
