use clap::{Parser, Subcommand};
use spreadscan_core::{AppConfig, ConfigLoader};
use spreadscan_exchanges::{
    backpack, binance, bitget, bybit, gate, huobi, kraken, kucoin, mexc, okx, whitebit,
};
use spreadscan_scheduler::{JobSet, UpdaterScheduler, VenueJob};
use spreadscan_web_api::ApiServer;
use sqlx::PgPool;

#[derive(Parser)]
#[command(name = "spreadscan")]
#[command(about = "Cross-venue ticker aggregator and differential engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the aggregator: scheduler plus read API
    Run,
    /// Start the read API only
    Serve,
    /// Drop and re-create the snapshot and differential tables
    RecreateTables,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // An optional .env supplies DATABASE_URL and venue keys in development.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::load()?;
    if config.database.url.is_empty() {
        anyhow::bail!("DATABASE_URL is not set");
    }

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Serve => serve(config).await,
        Commands::RecreateTables => recreate(config).await,
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let pool = spreadscan_data::connect(&config.database.url, config.database.max_connections)
        .await?;

    let jobs = build_jobs(&config);
    let scheduler =
        UpdaterScheduler::new(config.scheduler.clone(), pool.clone(), jobs).start().await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let server = ApiServer::new(pool.clone());
    let api = tokio::spawn(async move { server.serve(&addr).await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, draining jobs");

    let mut scheduler = scheduler;
    scheduler.shutdown().await?;
    api.abort();
    pool.close().await;

    Ok(())
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let pool = spreadscan_data::connect(&config.database.url, config.database.max_connections)
        .await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    ApiServer::new(pool).serve(&addr).await
}

async fn recreate(config: AppConfig) -> anyhow::Result<()> {
    let pool = spreadscan_data::connect(&config.database.url, config.database.max_connections)
        .await?;
    spreadscan_data::recreate_tables(&pool).await
}

/// The job registry: which venue operations run on which cadence. Spot
/// fires every 20s, networks every 150s, futures every 10s; the two
/// differential jobs are wired inside the scheduler itself.
fn build_jobs(config: &AppConfig) -> JobSet {
    let spot = vec![
        VenueJob::new("Backpack", |pool: PgPool| async move {
            backpack::update_spot_pairs(&pool).await
        }),
        VenueJob::new("Binance", |pool: PgPool| async move {
            binance::update_spot_pairs(&pool).await
        }),
        VenueJob::new("Bitget", |pool: PgPool| async move {
            bitget::update_spot_pairs(&pool).await
        }),
        VenueJob::new("Bybit", |pool: PgPool| async move {
            bybit::update_spot_pairs(&pool).await
        }),
        VenueJob::new("Gate", |pool: PgPool| async move {
            gate::update_spot_pairs(&pool).await
        }),
        VenueJob::new("Huobi", |pool: PgPool| async move {
            huobi::update_spot_pairs(&pool).await
        }),
        VenueJob::new("Kraken", |pool: PgPool| async move {
            kraken::update_spot_pairs(&pool).await
        }),
        VenueJob::new("KuCoin", |pool: PgPool| async move {
            kucoin::update_spot_pairs(&pool).await
        }),
        VenueJob::new("MEXC", |pool: PgPool| async move {
            mexc::update_spot_pairs(&pool).await
        }),
        VenueJob::new("OKX", |pool: PgPool| async move {
            okx::update_spot_pairs(&pool).await
        }),
        VenueJob::new("WhiteBIT", |pool: PgPool| async move {
            whitebit::update_spot_pairs(&pool).await
        }),
    ];

    let mut networks = vec![
        VenueJob::new("Bitget", |pool: PgPool| async move {
            bitget::update_networks(&pool).await
        }),
        VenueJob::new("Huobi", |pool: PgPool| async move {
            huobi::update_networks(&pool).await
        }),
        VenueJob::new("WhiteBIT", |pool: PgPool| async move {
            whitebit::update_networks(&pool).await
        }),
    ];
    {
        let keys = config.binance.clone();
        networks.push(VenueJob::new("Binance", move |pool: PgPool| {
            let keys = keys.clone();
            async move { binance::update_networks(&pool, &keys.api_key, &keys.api_secret).await }
        }));
    }
    if config.backpack.is_configured() {
        let keys = config.backpack.clone();
        networks.push(VenueJob::new("Backpack", move |pool: PgPool| {
            let keys = keys.clone();
            async move { backpack::update_networks(&pool, &keys.api_key, &keys.api_secret).await }
        }));
    } else {
        tracing::info!("Backpack network job disabled: no API keys configured");
    }

    let futures = vec![
        VenueJob::new("Backpack", |pool: PgPool| async move {
            backpack::update_futures_pairs(&pool).await
        }),
        VenueJob::new("Binance", |pool: PgPool| async move {
            binance::update_futures_pairs(&pool).await
        }),
        VenueJob::new("Bybit", |pool: PgPool| async move {
            bybit::update_futures_pairs(&pool).await
        }),
        VenueJob::new("MEXC", |pool: PgPool| async move {
            mexc::update_futures_pairs(&pool).await
        }),
    ];

    JobSet {
        spot,
        networks,
        futures,
    }
}
