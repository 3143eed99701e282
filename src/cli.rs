//! CLI interface for Armory.
//!
//! Every subcommand is non-interactive: arguments in, output on stdout,
//! errors on stderr with exit code 1. `register` goes through the same
//! engine as the HTTP endpoint.

mod format;

use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::{Config, Overrides};
use crate::engine::{ActionError, Engine};
use crate::export;
use crate::http;
use crate::model::{IdField, ItemKind, LogFilter, RawActionRequest};
use crate::storage::Storage;

use format::{format_item, format_log, format_operator};

/// Armory: issue, return, and maintain inventory with an auditable log.
#[derive(Debug, Parser)]
#[command(name = "armory", after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// SQLite database file. Overrides `ARMORY_DATABASE` and the config file.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log at debug level. `RUST_LOG` takes precedence.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r#"Workflow:
  1. armory init
  2. armory register --operator 1 --action 1 --status 3 --weapon 101
  3. armory register --operator 1 --action 2 --status 1 --weapon 101
  4. armory logs --item "AK-12 #101"

Actions: 1 Taken, 2 Returned, 3 Maintenance.
Statuses: 1 In stock, 2 Issued, 3 Taken, 4 Under repair."#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the schema and seed the fixed catalogues. Safe to repeat.
    Init,

    /// Run the HTTP service until interrupted.
    Serve {
        /// Socket address to bind. Overrides `ARMORY_LISTEN` and the config file.
        #[arg(long)]
        listen: Option<String>,
    },

    /// Record an action and apply its status transition.
    ///
    /// Prints the enriched log entry as JSON. Fails without writing
    /// anything if an item's status does not permit the action.
    Register {
        /// Operator performing the action.
        #[arg(long)]
        operator: i64,

        /// Action kind id.
        #[arg(long)]
        action: i64,

        /// Requested target status id, recorded on the log entry.
        #[arg(long)]
        status: i64,

        /// Weapon involved.
        #[arg(long)]
        weapon: Option<i64>,

        /// Special device involved.
        #[arg(long)]
        special: Option<i64>,

        /// Free-text note.
        #[arg(long)]
        comment: Option<String>,
    },

    /// List log entries, newest first.
    Logs {
        /// Earliest action time: RFC 3339 or `YYYY-MM-DD`.
        #[arg(long)]
        start: Option<String>,

        /// Latest action time: RFC 3339 or `YYYY-MM-DD` (whole day).
        #[arg(long)]
        end: Option<String>,

        /// Action name, e.g. `Taken`.
        #[arg(long)]
        action: Option<String>,

        /// Weapon or special device name.
        #[arg(long)]
        item: Option<String>,

        /// Log status name.
        #[arg(long)]
        status: Option<String>,

        /// Write CSV instead of a table.
        #[arg(long)]
        csv: bool,
    },

    /// List weapons.
    Weapons,

    /// List special devices.
    Specials,

    /// List operators.
    Operators,
}

impl Cli {
    /// Flags that take precedence over environment and config file.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            database: self.db.clone(),
            listen: match &self.command {
                Command::Serve { listen } => listen.clone(),
                _ => None,
            },
        }
    }
}

/// Run a command, returning an error message on failure.
pub fn run(command: Command, config: &Config) -> Result<(), String> {
    let storage = Storage::new(&config.database, config.busy_timeout)
        .map_err(|e| format!("failed to open {}: {e}", config.database.display()))?;

    match command {
        Command::Init => cmd_init(&storage),
        Command::Serve { .. } => cmd_serve(storage, &config.listen),
        Command::Register {
            operator,
            action,
            status,
            weapon,
            special,
            comment,
        } => {
            let raw = RawActionRequest {
                operator_id: Some(IdField::from(operator)),
                action_kind: Some(IdField::from(action)),
                status_goal: Some(IdField::from(status)),
                weapon_id: weapon.map(IdField::from),
                special_device_id: special.map(IdField::from),
                comment,
            };
            cmd_register(storage, raw)
        }
        Command::Logs {
            start,
            end,
            action,
            item,
            status,
            csv,
        } => {
            let filter = LogFilter::parse(
                start.as_deref(),
                end.as_deref(),
                action.as_deref(),
                item.as_deref(),
                status.as_deref(),
            )
            .map_err(|e| e.to_string())?;
            cmd_logs(&storage, &filter, csv)
        }
        Command::Weapons => cmd_items(&storage, ItemKind::Weapon),
        Command::Specials => cmd_items(&storage, ItemKind::SpecialDevice),
        Command::Operators => cmd_operators(&storage),
    }
}

fn cmd_init(storage: &Storage) -> Result<(), String> {
    storage
        .init()
        .map_err(|e| format!("failed to initialize database: {e}"))?;
    println!("initialized {}", storage.path().display());
    Ok(())
}

fn cmd_serve(storage: Storage, listen: &str) -> Result<(), String> {
    let addr: SocketAddr = listen
        .parse()
        .map_err(|e| format!("invalid listen address {listen:?}: {e}"))?;
    storage
        .init()
        .map_err(|e| format!("failed to initialize database: {e}"))?;
    info!(database = %storage.path().display(), "opened database");

    let runtime =
        tokio::runtime::Runtime::new().map_err(|e| format!("failed to start runtime: {e}"))?;
    runtime
        .block_on(http::serve(addr, storage))
        .map_err(|e| format!("server failed: {e}"))
}

fn cmd_register(storage: Storage, raw: RawActionRequest) -> Result<(), String> {
    let engine = Engine::new(storage);
    let log = engine.register_raw(raw).map_err(|e| match e {
        ActionError::Storage(e) => format!("failed to register action: {e}"),
        other => other.to_string(),
    })?;
    let json =
        serde_json::to_string_pretty(&log).map_err(|e| format!("failed to encode log entry: {e}"))?;
    println!("{json}");
    Ok(())
}

fn cmd_logs(storage: &Storage, filter: &LogFilter, csv: bool) -> Result<(), String> {
    let logs = storage
        .list_logs(filter)
        .map_err(|e| format!("failed to list logs: {e}"))?;

    if csv {
        return export::write_csv(io::stdout().lock(), &logs)
            .map_err(|e| format!("failed to write CSV: {e}"));
    }

    if logs.is_empty() {
        println!("No log entries.");
        return Ok(());
    }
    let mut out = io::stdout().lock();
    for log in &logs {
        writeln!(out, "{}", format_log(log)).map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn cmd_items(storage: &Storage, kind: ItemKind) -> Result<(), String> {
    let items = storage
        .list_items(kind)
        .map_err(|e| format!("failed to list {}s: {e}", kind.label()))?;

    if items.is_empty() {
        println!("No {}s.", kind.label());
        return Ok(());
    }
    for item in &items {
        println!("{}", format_item(item));
    }
    Ok(())
}

fn cmd_operators(storage: &Storage) -> Result<(), String> {
    let operators = storage
        .list_operators()
        .map_err(|e| format!("failed to list operators: {e}"))?;

    if operators.is_empty() {
        println!("No operators.");
        return Ok(());
    }
    for operator in &operators {
        println!("{}", format_operator(operator));
    }
    Ok(())
}
