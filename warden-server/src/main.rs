use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};
use warden_core::{
    create_dispatcher, AlertDispatcher, BoundedSampleStore, NoopDispatcher, NoopSpecDiffer,
    PgStore, SettingsCache, StaticSettingsSource, WardenConfig, WardenStore,
};

use warden_server::router::AppState;
use warden_server::server;
use warden_server::subsystems::sweep;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "warden.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config
    let config = match WardenConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Connect to DB
    let pool = match warden_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match warden_core::db::health_check(&pool).await {
            Ok(v) => println!("PostgreSQL connected: {}", v),
            Err(e) => {
                println!("PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }
        println!("Warden DB health check passed");
        return Ok(());
    }

    // Shutdown signal fan-out
    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    // Collaborator wiring
    let store: Arc<dyn WardenStore> = Arc::new(PgStore::new(pool.clone()));
    let samples = BoundedSampleStore::new();
    let settings = Arc::new(SettingsCache::new(
        Arc::new(StaticSettingsSource::new(&config.analysis)),
        Duration::from_secs(config.analysis.settings_ttl_seconds),
    ));
    let dispatcher: Arc<dyn AlertDispatcher> = match create_dispatcher(&config.webhook) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!("Webhook dispatcher disabled: {}", e);
            Arc::new(NoopDispatcher)
        }
    };

    // Background inference sweep
    tokio::spawn(sweep::run_inference_loop(
        store.clone(),
        samples.clone(),
        settings.clone(),
        config.service.tenant.clone(),
        config.inference.clone(),
        tx.subscribe(),
    ));

    let state = AppState {
        pool,
        store,
        samples,
        settings,
        differ: Arc::new(NoopSpecDiffer),
        dispatcher,
        config: config.clone(),
    };

    let socket_path = config.service.socket_path.clone();
    server::run_unix_server(&socket_path, state, tx.subscribe()).await?;

    Ok(())
}
