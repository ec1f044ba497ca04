mod sync;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "geocrm-cli")]
#[command(about = "Reconcile the CRM roster with the local customer store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one reconciliation pass and exit
    Sync,
    /// Run a pass now, then on the configured interval until interrupted
    Run,
    /// Print the roster as the reconciler will read it
    Roster {
        /// Workbook to read instead of `GEOCRM_ROSTER_PATH`
        #[arg(long)]
        path: Option<PathBuf>,
        /// Worksheet to read instead of `GEOCRM_ROSTER_SHEET`
        #[arg(long)]
        sheet: Option<String>,
    },
    /// Database operations
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Show recent reconciliation passes
    Runs {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Verify the database connection
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("geocrm-cli: no command given, see --help");
        return Ok(());
    };

    let config = geocrm_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match command {
        Commands::Roster { path, sheet } => {
            let path = path.unwrap_or_else(|| config.roster_path.clone());
            let sheet = sheet.or_else(|| config.roster_sheet.clone());
            print_roster(&path, sheet.as_deref())?;
            return Ok(());
        }
        Commands::Sync | Commands::Run | Commands::Db { .. } | Commands::Runs { .. } => {}
    }

    let pool_config = geocrm_db::PoolConfig::from_app_config(&config);
    let pool = geocrm_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Sync => {
            geocrm_db::run_migrations(&pool).await?;
            sync::run_once(&config, pool).await?;
        }
        Commands::Run => {
            geocrm_db::run_migrations(&pool).await?;
            sync::run_scheduled(&config, pool).await?;
        }
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                geocrm_db::ping(&pool).await?;
                println!("database connection ok");
            }
            DbCommands::Migrate => {
                let applied = geocrm_db::run_migrations(&pool).await?;
                println!("applied {applied} migration(s)");
            }
        },
        Commands::Runs { limit } => print_runs(&pool, limit).await?,
        Commands::Roster { .. } => {}
    }

    Ok(())
}

fn print_roster(path: &std::path::Path, sheet: Option<&str>) -> anyhow::Result<()> {
    let entries = geocrm_sync::read_roster(path, sheet)?;
    for entry in &entries {
        let items = geocrm_sync::parse_equipment(&entry.equipment_raw);
        let summary: Vec<String> = items
            .iter()
            .map(|item| match item.quantity {
                Some(quantity) => format!("{} x{quantity}", item.name),
                None => item.name.clone(),
            })
            .collect();
        println!("{}\t{}", entry.name, summary.join(", "));
    }
    println!("{} entries", entries.len());
    Ok(())
}

async fn print_runs(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = geocrm_db::list_sync_runs(pool, limit.max(1)).await?;
    if runs.is_empty() {
        println!("no reconciliation passes recorded");
        return Ok(());
    }
    for run in &runs {
        println!(
            "{:>6}  {:<9}  {}  entries={} matched={} unmatched={} processed={} failed={}{}",
            run.id,
            run.status,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.entries_total,
            run.matched,
            run.unmatched,
            run.processed,
            run.failed,
            run.error_message
                .as_deref()
                .map(|m| format!("  error={m}"))
                .unwrap_or_default(),
        );
    }
    Ok(())
}
