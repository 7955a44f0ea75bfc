use clap::Parser;
use groupfund::application::reconciler::{LedgerReconciler, Reconciliation};
use groupfund::domain::ports::LedgerStoreBox;
use groupfund::infrastructure::in_memory::InMemoryLedgerStore;
use groupfund::interfaces::csv::group_writer::GroupWriter;
use groupfund::interfaces::csv::notification_reader::NotificationReader;
use groupfund::observability::{LogFormat, init_logging};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};

/// Replays payment notifications into the ledger cache and prints group totals.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Payment notifications CSV file
    input: PathBuf,

    /// Path to persistent ledger (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Log output format (logs go to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreBox> {
    use groupfund::infrastructure::rocksdb::RocksDBLedgerStore;

    match db_path {
        Some(path) => Ok(Box::new(RocksDBLedgerStore::open(path).into_diagnostic()?)),
        None => Ok(Box::new(InMemoryLedgerStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreBox> {
    if db_path.is_some() {
        warn!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Box::new(InMemoryLedgerStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let reconciler = LedgerReconciler::new(open_store(cli.db_path)?);

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = NotificationReader::new(file);
    let mut applied = 0usize;
    for notification in reader.notifications() {
        let notification = match notification {
            Ok(notification) => notification,
            Err(e) => {
                warn!(error = %e, "Error reading notification");
                continue;
            }
        };

        if let Err(e) = reconciler
            .store()
            .record_contribution(notification.contribution_record())
            .await
        {
            warn!(contribution_id = %notification.contribution, error = %e, "Error recording contribution");
            continue;
        }
        match reconciler.apply(&notification.verification()).await {
            Ok(Reconciliation::Applied) => applied += 1,
            Ok(_) => {}
            Err(e) => {
                warn!(contribution_id = %notification.contribution, error = %e, "Error applying notification");
            }
        }
    }
    info!(applied, "replay finished");

    let groups = reconciler.store().all_groups().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = GroupWriter::new(stdout.lock());
    writer.write_groups(groups).into_diagnostic()?;

    Ok(())
}
