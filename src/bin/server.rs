//! LedgerKV Server Binary
//!
//! Starts the TCP gateway for LedgerKV.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::Parser;
use ledgerkv::config::WalSyncStrategy;
use ledgerkv::network::Server;
use ledgerkv::{Config, Contract, LedgerStore};
use tracing_subscriber::{fmt, EnvFilter};

/// LedgerKV Server
#[derive(Parser, Debug)]
#[command(name = "ledgerkv-server")]
#[command(about = "Versioned key-value ledger with history")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./ledgerkv_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    listen: String,

    /// Number of connection worker threads
    #[arg(short, long, default_value = "8")]
    workers: usize,

    /// fsync the commit log after every write
    #[arg(long)]
    sync_every_write: bool,

    /// Seed the sample accreditations if the ledger is empty
    #[arg(long)]
    seed: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ledgerkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("LedgerKV Server v{}", ledgerkv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    let sync_strategy = if args.sync_every_write {
        WalSyncStrategy::EveryWrite
    } else {
        Config::default().wal_sync_strategy
    };

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .worker_threads(args.workers)
        .wal_sync_strategy(sync_strategy)
        .seed_on_empty(args.seed)
        .build();

    let store = match LedgerStore::open(&config) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Failed to open ledger: {}", e);
            std::process::exit(1);
        }
    };

    if config.seed_on_empty && store.key_count() == 0 {
        match Contract::new(&store).init_ledger() {
            Ok(count) => tracing::info!("Seeded {} accreditations", count),
            Err(e) => {
                tracing::error!("Failed to seed ledger: {}", e);
                std::process::exit(1);
            }
        }
    }

    let mut server = Server::new(config, Arc::clone(&store));

    let shutdown = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        shutdown.store(true, Ordering::Relaxed);
    }) {
        tracing::warn!("Could not install Ctrl+C handler: {}", e);
    }

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
