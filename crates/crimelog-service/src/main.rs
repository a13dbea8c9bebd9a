//! Crimelog Service - keeps a crime-log workbook and its database in sync.
//!
//! Run with: `cargo run -p crimelog-service -- run --source crime.xlsx`

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use crimelog_service::{Config, StatusReport};
use crimelog_store::Store;
use crimelog_sync::{DatasetEvent, SyncEngine};

/// Crimelog Service - workbook sync daemon and dataset tools.
#[derive(Parser, Debug)]
#[command(name = "crimelog-service")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path (overrides config).
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync in the foreground until Ctrl-C (default behavior).
    Run {
        /// Workbook to bind (overrides config and the saved binding).
        #[arg(short, long)]
        source: Option<PathBuf>,
    },

    /// Replace the dataset with the contents of a workbook.
    Import { path: PathBuf },

    /// Write the dataset to a workbook.
    Export { path: PathBuf },

    /// Print the bound source, record count and summary as JSON.
    Status,

    /// Forget the bound workbook. The dataset is kept.
    Unbind,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("crimelog_service=info".parse()?)
                .add_directive("crimelog_sync=info".parse()?),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    if let Some(db_path) = args.database {
        config.storage.path = db_path;
    }
    config.validate()?;

    let command = args.command.unwrap_or(Command::Run { source: None });
    let engine = open_engine(&config)?;

    match command {
        Command::Run { source } => run(engine, source.or(config.source.path)).await,
        Command::Import { path } => {
            let count = engine.import_from(&path).await?;
            println!("Imported {} records from {}", count, path.display());
            Ok(())
        }
        Command::Export { path } => {
            let count = engine.export_to(&path).await?;
            println!("Exported {} records to {}", count, path.display());
            Ok(())
        }
        Command::Status => {
            let report = StatusReport::collect(&engine).await?;
            println!("{}", report.to_json()?);
            Ok(())
        }
        Command::Unbind => {
            engine.unbind_source().await?;
            println!("Data source unbound");
            Ok(())
        }
    }
}

fn open_engine(config: &Config) -> anyhow::Result<SyncEngine> {
    info!("Opening database at {:?}", config.storage.path);
    let store = Store::open(&config.storage.path)
        .with_context(|| format!("cannot open {}", config.storage.path.display()))?;
    Ok(SyncEngine::new(store, config.sync.clone()))
}

async fn run(engine: SyncEngine, source: Option<PathBuf>) -> anyhow::Result<()> {
    match source {
        Some(path) => {
            let count = engine.bind_source(&path).await?;
            info!("Loaded {} records from {}", count, path.display());
        }
        None => {
            let status = engine.restore().await?;
            if !status.is_healthy() {
                warn!("No workbook is being watched ({:?})", status);
            }
        }
    }

    let mut events = engine.subscribe();
    let mut watcher = engine.subscribe_watcher_state();

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Shutting down");
                break;
            }
            event = events.recv() => match event {
                Some(DatasetEvent::KeepAlive { .. }) => debug!("Keep-alive"),
                Some(event) => info!("Dataset event: {}", event.kind()),
                None => break,
            },
            changed = watcher.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *watcher.borrow_and_update();
                info!("Watcher is {:?}", state);
            }
        }
    }

    engine.shutdown();
    Ok(())
}
