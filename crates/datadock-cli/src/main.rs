use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use datadock_cli::{fill_summary, init_tracing, scan_summary};
use datadock_core::Config;
use datadock_db::{PostgresDataFileRepository, PostgresUserRepository};
use datadock_ingest::{IngestService, InboxWatcher};
use datadock_services::{create_storage, CacheManager, DataFileLifecycle};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "datadock")]
#[command(about = "Ingest tabular files from the inbox and maintain their caches")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the inbox and ingest stable files
    Ingest {
        /// Run a single scan pass and exit
        #[arg(long)]
        once: bool,

        /// Seconds between scans (default: INGEST_INTERVAL_SECONDS)
        #[arg(long, value_name = "SECONDS")]
        interval: Option<u64>,

        /// Detect and log only; no moves, uploads or records
        #[arg(long)]
        dry_run: bool,
    },
    /// Rebuild the cache artifacts of a record from its original bytes
    RefreshCache {
        #[arg(value_name = "UUID")]
        id: Uuid,
    },
    /// Remove the cache directory of a record
    PurgeCache {
        #[arg(value_name = "UUID")]
        id: Uuid,
    },
    /// Delete a record with its stored bytes and cache
    Delete {
        #[arg(value_name = "UUID")]
        id: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = datadock_db::setup_database(&config)
        .await
        .context("Failed to connect to the database")?;
    let users = Arc::new(PostgresUserRepository::new(pool.clone()));
    let records = Arc::new(PostgresDataFileRepository::new(pool));
    let storage = create_storage(&config)
        .await
        .context("Failed to initialize storage")?;
    let cache = CacheManager::detect(config.cache_settings().clone());

    match cli.command {
        Command::Ingest {
            once,
            interval,
            dry_run,
        } => {
            let mut settings = config.ingest_settings().clone();
            settings.dry_run |= dry_run;
            if settings.dry_run {
                tracing::info!("Dry run: no files will be moved, uploaded or recorded");
            }

            let watcher = Arc::new(InboxWatcher::new(settings, users, records, storage, cache));
            let mut service = IngestService::new(watcher);
            if let Some(secs) = interval {
                service = service.with_interval(Duration::from_secs(secs.max(1)));
            }

            if once {
                let report = service.run_once().await.context("Inbox scan failed")?;
                println!("{}", scan_summary(&report));
                return Ok(());
            }

            let handle = Arc::new(service).start();
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl+C")?;
            tracing::info!("Stopping ingest service");
            handle.abort();
        }
        Command::RefreshCache { id } => {
            let lifecycle = DataFileLifecycle::new(records, storage, cache);
            let record = lifecycle.get(id).await?;
            let report = lifecycle
                .refresh_cache(&record)
                .await
                .with_context(|| format!("Failed to refresh cache of {}", id))?;
            println!("{}: {}", record.filename(), fill_summary(&report));
        }
        Command::PurgeCache { id } => {
            let lifecycle = DataFileLifecycle::new(records, storage, cache.clone());
            let record = lifecycle.get(id).await?;
            cache
                .purge(record.owner_id, record.id)
                .with_context(|| format!("Failed to purge cache of {}", id))?;
            println!("Purged cache of {}", record.filename());
        }
        Command::Delete { id } => {
            let lifecycle = DataFileLifecycle::new(records, storage, cache);
            let record = lifecycle.get(id).await?;
            let report = lifecycle.delete(&record).await?;
            println!(
                "Deleted {} (bytes: {}, cache: {}, record: {})",
                record.filename(),
                report.bytes_deleted,
                report.cache_purged,
                report.record_deleted
            );
        }
    }

    Ok(())
}
