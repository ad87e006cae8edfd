//! ACE Server - Entry Point

use ace_engine::{AceManager, AceServer, Config, PlaybookSnapshotStore};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    let json_logs = std::env::var("ACE_LOG_JSON")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    if json_logs {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("ACE Server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let addr = config.socket_addr();
    let snapshots = config
        .playbook_dir
        .as_ref()
        .map(PlaybookSnapshotStore::open)
        .transpose()?;

    let mut manager = AceManager::new(config);
    if !manager.initialize() {
        warn!("ACE learning unavailable; serving administrative endpoints only");
    }

    if let Some(store) = &snapshots {
        store.load_all(&manager)?;
    }

    let manager = Arc::new(manager);
    AceServer::new(addr, Arc::clone(&manager))
        .with_snapshots(snapshots.clone())
        .run()
        .await?;

    if let Some(store) = &snapshots {
        store.save_all(&manager)?;
    }

    Ok(())
}

fn print_help() {
    println!("ACE Server v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: ace-engine [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --help, -h   Show this help");
    println!();
    println!("Environment variables:");
    println!("  OPENAI_API_KEY            Completions API key (ACE_API_KEY overrides)");
    println!("  ACE_MODEL                 Reflection model (default: gpt-4o-mini)");
    println!("  ACE_API_BASE              OpenAI-compatible base URL");
    println!("  ACE_ENABLED               Master switch (default: true)");
    println!("  ACE_REQUEST_TIMEOUT_SECS  Per-call timeout (default: 30)");
    println!("  ACE_MAX_STRATEGIES        Per-playbook cap (default: unbounded)");
    println!("  ACE_SYSTEM_MESSAGE        Base system message");
    println!("  ACE_PLAYBOOK_DIR          Snapshot directory (default: in-memory only)");
    println!("  ACE_BIND_ADDR             Bind address (default: 127.0.0.1)");
    println!("  ACE_PORT                  Port (default: 12003)");
    println!("  ACE_LOG_JSON              JSON logs (default: false)");
    println!("  RUST_LOG                  trace|debug|info|warn|error");
}
