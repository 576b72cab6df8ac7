use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use meridian_config::AppConfig;
use meridian_core::{Scope, ScopeType};
use meridian_runtime::MemoryService;
use meridian_storage::{ImportRow, DEFAULT_BACKUP_KEEP};

#[derive(Parser)]
#[command(name = "meridian", version, about = "Meridian memory service")]
struct Cli {
    /// Path to the TOML config file, loaded with env var overrides on top.
    #[arg(long, global = true, default_value = "meridian.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Starts the HTTP façade.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8787")]
        bind: String,
    },
    /// Backup, restore and retention management for the live database.
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },
    /// Runs one query through the full retrieval pipeline and prints the result.
    Query {
        text: String,
        #[arg(long, default_value = "global")]
        scope: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        inherit: bool,
    },
    /// Bulk-imports entries from a JSON array of rows.
    Import {
        path: PathBuf,
        #[arg(long, default_value = "cli-import")]
        agent_id: String,
    },
    /// Exports every active entry in a scope as a JSON array.
    Export {
        #[arg(long, default_value = "global")]
        scope: String,
        #[arg(long)]
        inherit: bool,
    },
}

#[derive(Subcommand)]
enum BackupAction {
    /// Takes a new backup, optionally under a caller-chosen name.
    Create { name: Option<String> },
    /// Lists existing backups, newest first.
    List,
    /// Replaces the live database with a backup's contents.
    Restore { name: String },
    /// Deletes all but the `keep` newest backups.
    Cleanup {
        #[arg(long, default_value_t = DEFAULT_BACKUP_KEEP)]
        keep: usize,
    },
}

/// Parses `--scope` as either `global` or `<type>:<uuid>`
/// (e.g. `project:3fa85f64-5717-4562-b3fc-2c963f66afa6`).
fn parse_scope(raw: &str) -> anyhow::Result<Scope> {
    if raw.eq_ignore_ascii_case("global") {
        return Ok(Scope::global());
    }
    let (type_part, id_part) = raw
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("scope must be 'global' or '<type>:<uuid>', got '{raw}'"))?;
    let scope_type = match type_part.to_ascii_lowercase().as_str() {
        "session" => ScopeType::Session,
        "agent" => ScopeType::Agent,
        "project" => ScopeType::Project,
        "organization" | "org" => ScopeType::Organization,
        other => anyhow::bail!("unknown scope type '{other}'"),
    };
    let scope_id = uuid::Uuid::parse_str(id_part)?;
    Ok(Scope::new(scope_type, Some(scope_id))?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)?;

    match cli.command {
        Commands::Serve { bind } => serve(config, &bind).await,
        Commands::Backup { action } => run_backup_action(config, action),
        Commands::Query { text, scope, limit, inherit } => run_query(config, text, scope, limit, inherit).await,
        Commands::Import { path, agent_id } => run_import(config, path, agent_id),
        Commands::Export { scope, inherit } => run_export(config, scope, inherit),
    }
}

async fn serve(config: AppConfig, bind: &str) -> anyhow::Result<()> {
    let service = Arc::new(MemoryService::new(config)?);
    let app = meridian_http::router(meridian_http::AppState::new(service));
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "meridian serving");
    axum::serve(listener, app).await?;
    Ok(())
}

fn run_backup_action(config: AppConfig, action: BackupAction) -> anyhow::Result<()> {
    let mut service = MemoryService::new(config)?;
    match action {
        BackupAction::Create { name } => {
            let path = service.backup(name.as_deref())?;
            println!("backup written to {}", path.display());
        }
        BackupAction::List => {
            for backup in service.list_backups()? {
                println!("{}\t{} bytes\t{}", backup.name, backup.size_bytes, backup.modified.to_rfc3339());
            }
        }
        BackupAction::Restore { name } => {
            service.restore(&name)?;
            println!("restored from {name}");
        }
        BackupAction::Cleanup { keep } => {
            let deleted = service.cleanup_backups(keep)?;
            println!("deleted {deleted} backup(s), kept {keep} newest");
        }
    }
    Ok(())
}

async fn run_query(config: AppConfig, text: String, scope: String, limit: usize, inherit: bool) -> anyhow::Result<()> {
    let scope = parse_scope(&scope)?;
    let service = MemoryService::new(config)?;
    let ctx = meridian_boundary::AuthContext { agent_id: "cli".to_string(), is_admin: true };
    let params = serde_json::json!({
        "action": "search",
        "text": text,
        "kinds": [],
        "scope": scope,
        "inherit": inherit,
        "limit": limit,
        "seed_ids": [],
        "flags": {},
    });
    let response = service.execute_tool("memory_query", params, &ctx).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn run_import(config: AppConfig, path: PathBuf, agent_id: String) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&path)?;
    let rows: Vec<ImportRow> = serde_json::from_str(&raw)?;
    let service = MemoryService::new(config)?;
    let report = service.import(rows, agent_id)?;
    println!("created {}, skipped {} (already present)", report.created, report.skipped_existing);
    Ok(())
}

fn run_export(config: AppConfig, scope: String, inherit: bool) -> anyhow::Result<()> {
    let scope = parse_scope(&scope)?;
    let service = MemoryService::new(config)?;
    let entries = service.export(scope, inherit)?;
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}
