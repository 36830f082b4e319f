// cdb - weekly C11/BW upload into the project database

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};

use cdb_cli::exit_codes::{
    upload_exit_code, EXIT_ERROR, EXIT_STORE, EXIT_SUCCESS, EXIT_USAGE,
};
use cdb_cli::logging::init_logging;
use cdb_cli::{run_upload, UploadFailure, UploadFile, UploadSuccess};
use cdb_config::Settings;
use cdb_core::{Actor, Project};
use cdb_io::RowError;
use cdb_recon::UploadPolicy;
use cdb_store::{Store, UploadRecord};

#[derive(Parser)]
#[command(name = "cdb")]
#[command(about = "Merge C11 and BW exports into the project database")]
#[command(version)]
struct Cli {
    /// Settings file (default: <config dir>/cdb/settings.toml)
    #[arg(long, global = true, env = "CDB_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database (default: [store].path or <data dir>/cdb/cdb.sqlite3)
    #[arg(long, global = true, env = "CDB_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ActorArgs {
    /// User performing the action
    #[arg(long)]
    actor: String,

    /// Group membership (repeatable)
    #[arg(long = "group", value_name = "GROUP")]
    groups: Vec<String>,

    /// Staff users skip the upload cooldown
    #[arg(long)]
    staff: bool,

    /// Superusers skip the cooldown and group checks
    #[arg(long)]
    superuser: bool,
}

impl ActorArgs {
    fn into_actor(self) -> Actor {
        let mut actor = Actor::new(self.actor).with_groups(self.groups);
        actor.staff = self.staff;
        actor.superuser = self.superuser;
        actor
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a C11 and a BW export and reconcile the project table
    #[command(after_help = "\
Examples:
  cdb upload --c11 c11_week42.xlsx --bw bw_week42.xlsx --actor ana --group Sales
  cdb upload --c11 c11.csv --bw bw.csv --actor root --superuser --json

Projects not present in either file are deleted. Every attempt that passes
the permission and cooldown checks is recorded in the upload log.")]
    Upload {
        /// C11 export (xlsx, xls, xlsb, ods or csv)
        #[arg(long)]
        c11: PathBuf,

        /// BW export (xlsx, xls, xlsb, ods or csv)
        #[arg(long)]
        bw: PathBuf,

        #[command(flatten)]
        actor: ActorArgs,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show whether an actor may upload now, plus the upload history
    Status {
        #[command(flatten)]
        actor: ActorArgs,

        #[arg(long)]
        json: bool,
    },

    /// List recorded upload attempts, newest first
    Uploads {
        /// Show at most N entries
        #[arg(long, value_name = "N")]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// List stored projects by order number
    Projects {
        #[arg(long)]
        json: bool,
    },

    /// Print the settings path and effective values
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.unwrap_or_else(Settings::config_path);
    let settings = Settings::load_from(&config_path).map_err(|e| {
        CliError::usage(e.to_string()).with_hint(format!("check {}", config_path.display()))
    })?;

    init_logging(&settings.logging.level, settings.logging.directory.as_deref())
        .map_err(|e| CliError::usage(e).with_hint("check [logging] in the settings file"))?;

    let db_path = cli.db.unwrap_or_else(|| settings.store_path());

    match cli.command {
        Commands::Upload { c11, bw, actor, json } => {
            cmd_upload(&db_path, &settings, &c11, &bw, actor.into_actor(), json)
        }
        Commands::Status { actor, json } => cmd_status(&db_path, &settings, actor.into_actor(), json),
        Commands::Uploads { limit, json } => cmd_uploads(&db_path, limit, json),
        Commands::Projects { json } => cmd_projects(&db_path, json),
        Commands::Config => cmd_config(&config_path, &settings, &db_path),
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self { code: EXIT_STORE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Upload failure with its exit code and the user-facing warning as hint.
    pub fn upload(failure: &UploadFailure) -> Self {
        Self {
            code: upload_exit_code(&failure.error),
            message: failure.error.to_string(),
            hint: Some(failure.warning()),
        }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn open_store(path: &Path) -> Result<Store, CliError> {
    Store::open(path).map_err(|e| {
        CliError::store(format!("cannot open {}: {}", path.display(), e))
            .with_hint("set --db, CDB_DB or [store].path")
    })
}

fn print_json(value: &impl serde::Serialize) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::io(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// ============================================================================
// upload
// ============================================================================

fn cmd_upload(
    db_path: &Path,
    settings: &Settings,
    c11_path: &Path,
    bw_path: &Path,
    actor: Actor,
    json: bool,
) -> Result<(), CliError> {
    let read = |path: &Path| {
        UploadFile::read(path)
            .map_err(|e| CliError::usage(format!("cannot read {}: {}", path.display(), e)))
    };
    let c11 = read(c11_path)?;
    let bw = read(bw_path)?;

    let mut store = open_store(db_path)?;

    match run_upload(&mut store, settings, &actor, &c11, &bw, Utc::now()) {
        Ok(success) => {
            if json {
                print_json(&serde_json::json!({ "ok": true, "upload": success }))
            } else {
                print_upload_success(&success).map_err(|e| CliError::io(e.to_string()))
            }
        }
        Err(failure) => {
            if json {
                print_json(&serde_json::json!({
                    "ok": false,
                    "error": failure.error.to_string(),
                    "warning": failure.warning(),
                    "c11_errors": failure.c11_errors,
                    "bw_errors": failure.bw_errors,
                    "record": failure.record,
                }))?;
            } else {
                print_row_errors(&mut io::stderr().lock(), &failure.c11_errors, &failure.bw_errors)
                    .map_err(|e| CliError::io(e.to_string()))?;
            }
            Err(CliError::upload(&failure))
        }
    }
}

fn print_upload_success(success: &UploadSuccess) -> io::Result<()> {
    let stats = &success.statistics;
    let mut out = io::stdout().lock();

    writeln!(out, "upload #{} recorded ({})", success.record.id, success.record.file_name)?;
    writeln!(out)?;
    writeln!(out, "  C11 records      {:>8}  ({} duplicate rows replaced)", stats.c11_records, stats.c11_duplicates)?;
    writeln!(out, "  BW records       {:>8}  ({} duplicate rows replaced)", stats.bw_records, stats.bw_duplicates)?;
    writeln!(out, "  projects         {:>8}", stats.projects)?;
    writeln!(out, "    matched        {:>8}", stats.matched)?;
    writeln!(out, "    C11 only       {:>8}", stats.c11_only)?;
    writeln!(out, "    BW only        {:>8}", stats.bw_only)?;
    writeln!(out, "  order value      {:>14}", format_cents(stats.total_order_value_cents))?;
    writeln!(out, "  invoiced         {:>14}", format_cents(stats.total_invoiced_cents))?;
    writeln!(out, "  open             {:>14}", format_cents(stats.total_open_cents))?;
    writeln!(out, "  hours booked     {:>14.2}", stats.total_hours_booked)?;
    writeln!(out, "  over-invoiced    {:>8}", stats.over_invoiced)?;

    if !stats.by_sales_manager.is_empty() {
        writeln!(out)?;
        writeln!(out, "  by sales manager")?;
        for (manager, summary) in &stats.by_sales_manager {
            writeln!(
                out,
                "    {:<24} {:>5} projects {:>14}",
                manager,
                summary.projects,
                format_cents(summary.order_value_cents)
            )?;
        }
    }

    let deletions = &success.deletions;
    writeln!(out)?;
    writeln!(
        out,
        "  store: {} inserted, {} updated, {} deleted",
        deletions.inserted.len(),
        deletions.updated.len(),
        deletions.deleted.len()
    )?;
    if !deletions.deleted.is_empty() {
        let listed: Vec<String> = deletions.deleted.iter().map(|n| n.to_string()).collect();
        writeln!(out, "  deleted: {}", listed.join(", "))?;
    }

    print_row_errors(&mut out, &success.c11_errors, &success.bw_errors)
}

fn print_row_errors(out: &mut impl Write, c11: &[RowError], bw: &[RowError]) -> io::Result<()> {
    for (label, errors) in [("C11", c11), ("BW", bw)] {
        if errors.is_empty() {
            continue;
        }
        writeln!(out)?;
        writeln!(out, "  {} rows skipped: {}", label, errors.len())?;
        for error in errors {
            writeln!(out, "    {}", error)?;
        }
    }
    Ok(())
}

/// 1234567 -> "12345.67", keeping the sign.
fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

// ============================================================================
// status
// ============================================================================

fn cmd_status(db_path: &Path, settings: &Settings, actor: Actor, json: bool) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let last_upload = store
        .latest_upload_timestamp(!settings.upload.count_failed_uploads)
        .map_err(|e| CliError::store(e.to_string()))?;
    let policy = UploadPolicy::evaluate(
        &actor,
        last_upload,
        settings.upload.cooldown_days,
        &settings.upload.allowed_groups,
        Utc::now(),
    );

    // Outsiders see the policy but not the history.
    let history = if policy.may_view {
        store.list_uploads(None).map_err(|e| CliError::store(e.to_string()))?
    } else {
        log::error!("user {} is not allowed to see upload content", actor.name);
        Vec::new()
    };

    if json {
        return print_json(&serde_json::json!({
            "actor": actor.name,
            "policy": policy,
            "last_upload": last_upload,
            "uploads": history,
        }));
    }

    if !policy.may_view {
        println!("User not allowed to perform this action");
    } else if policy.upload_enabled {
        println!("upload: enabled");
    } else {
        println!(
            "upload: disabled, next upload possible after {} day/s",
            policy.days_to_next_upload
        );
    }
    if policy.may_view {
        println!();
        print_uploads(&history).map_err(|e| CliError::io(e.to_string()))?;
    }
    Ok(())
}

// ============================================================================
// uploads / projects
// ============================================================================

fn cmd_uploads(db_path: &Path, limit: Option<usize>, json: bool) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let uploads = store.list_uploads(limit).map_err(|e| CliError::store(e.to_string()))?;
    if json {
        return print_json(&uploads);
    }
    print_uploads(&uploads).map_err(|e| CliError::io(e.to_string()))
}

fn print_uploads(uploads: &[UploadRecord]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if uploads.is_empty() {
        return writeln!(out, "no uploads recorded");
    }
    for upload in uploads {
        writeln!(
            out,
            "#{:<5} {}  {:<16} {:<6} {}",
            upload.id,
            upload.timestamp.format("%Y-%m-%d %H:%M:%S"),
            upload.creator,
            if upload.read_successful { "ok" } else { "FAILED" },
            upload.file_name
        )?;
    }
    Ok(())
}

fn cmd_projects(db_path: &Path, json: bool) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let projects = store.list_projects().map_err(|e| CliError::store(e.to_string()))?;
    if json {
        return print_json(&projects);
    }
    print_projects(&projects).map_err(|e| CliError::io(e.to_string()))
}

fn print_projects(projects: &[Project]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if projects.is_empty() {
        return writeln!(out, "no projects stored");
    }
    writeln!(
        out,
        "{:>10}  {:<8}  {:<24} {:>14} {:>14} {:>14}",
        "order", "source", "customer", "order value", "invoiced", "open"
    )?;
    for p in projects {
        writeln!(
            out,
            "{:>10}  {:<8}  {:<24} {:>14} {:>14} {:>14}",
            p.order_number,
            p.source.as_str(),
            p.customer.as_deref().unwrap_or("-"),
            format_cents(p.order_value_cents),
            format_cents(p.invoiced_cents),
            format_cents(p.open_amount_cents())
        )?;
    }
    Ok(())
}

// ============================================================================
// config
// ============================================================================

fn cmd_config(config_path: &Path, settings: &Settings, db_path: &Path) -> Result<(), CliError> {
    let text = settings.to_toml().map_err(|e| CliError::io(e.to_string()))?;
    println!("# settings: {}", config_path.display());
    println!("# database: {}", db_path.display());
    println!();
    print!("{}", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_render_with_two_decimals() {
        assert_eq!(format_cents(1_234_567), "12345.67");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(-250), "-2.50");
        assert_eq!(format_cents(0), "0.00");
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn actor_flags_map_onto_actor() {
        let cli = Cli::try_parse_from([
            "cdb", "status", "--actor", "ana", "--group", "Sales", "--group", "Ops", "--staff",
        ])
        .unwrap();
        let Commands::Status { actor, .. } = cli.command else {
            panic!("expected status");
        };
        let actor = actor.into_actor();
        assert_eq!(actor.name, "ana");
        assert_eq!(actor.groups, vec!["Sales", "Ops"]);
        assert!(actor.staff);
        assert!(!actor.superuser);
    }
}
