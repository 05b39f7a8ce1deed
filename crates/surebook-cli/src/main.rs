//! Surebook CLI - operator commands for the encrypted records store

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use surebook_core::config::AppConfig;
use surebook_core::crypto::FieldKey;
use surebook_core::domain::{AuditAction, AuditFilter};
use surebook_core::{Bootstrap, ServiceContainer};

#[derive(Parser)]
#[command(name = "surebook")]
#[command(author, version, about = "Encrypted customer and insurance records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a record-encryption key and print it (base64)
    Keygen,

    /// Resolve keys, create the database, and write the default config
    Init,

    /// Bulk-import records from CSV files
    Import {
        #[command(subcommand)]
        action: ImportAction,
    },

    /// Inspect or maintain the audit trail
    Audit {
        #[command(subcommand)]
        action: AuditCommand,
    },
}

#[derive(Subcommand)]
enum ImportAction {
    /// Import customers from a CSV file
    Customers { path: PathBuf },
    /// Import insurance contracts from a CSV file
    Insurances { path: PathBuf },
}

#[derive(Subcommand)]
enum AuditCommand {
    /// List audit entries, newest first
    List {
        /// Filter by action (CREATE, READ, UPDATE, DELETE)
        #[arg(long)]
        action: Option<String>,
        /// Filter by entity (customer, insurance)
        #[arg(long)]
        entity: Option<String>,
        /// Substring match on the detail payload
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Delete entries older than the configured retention window
    Prune,

    /// Delete every audit entry (irreversible)
    Purge {
        /// Required confirmation flag
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("surebook=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen => cmd_keygen(),
        Commands::Init => cmd_init(cli.quiet),
        Commands::Import { action } => cmd_import(action, cli.quiet),
        Commands::Audit { action } => cmd_audit(action, cli.quiet),
    }
}

fn cmd_keygen() -> anyhow::Result<()> {
    // Printed once for the operator to store; never logged
    println!("{}", FieldKey::generate().to_base64());
    Ok(())
}

fn cmd_init(quiet: bool) -> anyhow::Result<()> {
    let config_path = AppConfig::config_path();
    let config = if config_path.exists() {
        AppConfig::load()?
    } else {
        let config = AppConfig::default();
        config.save_to(&config_path)?;
        info!(path = %config_path.display(), "wrote default configuration");
        config
    };

    ServiceContainer::build_with(&Bootstrap::new(), &config)?;
    if !quiet {
        println!("Database ready at {}", config.database.path.display());
    }
    Ok(())
}

fn cmd_import(action: ImportAction, quiet: bool) -> anyhow::Result<()> {
    let app = ServiceContainer::build()?;
    let result = match action {
        ImportAction::Customers { path } => app.csv_import.import_customers_file(&path)?,
        ImportAction::Insurances { path } => app.csv_import.import_insurances_file(&path)?,
    };

    if !quiet {
        println!("Imported: {}  Failed: {}", result.created, result.failed);
        for error in &result.errors {
            println!("  {error}");
        }
        if (result.failed as usize) > result.errors.len() {
            println!("  ... and {} more", result.failed as usize - result.errors.len());
        }
    }
    Ok(())
}

fn cmd_audit(action: AuditCommand, quiet: bool) -> anyhow::Result<()> {
    let app = ServiceContainer::build()?;
    match action {
        AuditCommand::List {
            action,
            entity,
            keyword,
            limit,
            offset,
        } => {
            let action = match action.as_deref() {
                Some(raw) => Some(
                    AuditAction::parse(&raw.to_uppercase())
                        .ok_or_else(|| anyhow::anyhow!("unknown action: {raw}"))?,
                ),
                None => None,
            };
            let entries = app.audit.list(&AuditFilter {
                limit: Some(limit),
                offset,
                action,
                entity,
                keyword,
                ..Default::default()
            })?;
            for entry in entries {
                println!(
                    "{:>6}  {:19}  {:6}  {:9}  {:>6}  {}",
                    entry.id,
                    entry.created_at,
                    entry.action,
                    entry.entity,
                    entry
                        .entity_id
                        .map(|id| id.to_string())
                        .unwrap_or_default(),
                    entry.detail.unwrap_or_default()
                );
            }
            Ok(())
        }

        AuditCommand::Prune => {
            let config = AppConfig::load()?;
            let removed = app.audit.prune(config.audit.retention_days)?;
            if !quiet {
                println!("Removed {removed} entries");
            }
            Ok(())
        }

        AuditCommand::Purge { yes } => {
            if !yes {
                anyhow::bail!("refusing to purge the audit trail without --yes");
            }
            let removed = app.audit.purge_all()?;
            if !quiet {
                println!("Removed {removed} entries");
            }
            Ok(())
        }
    }
}
