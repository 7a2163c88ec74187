use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nba_etl::{
    config::{defaults::DEFAULT_CONFIG_FILE, Config},
    database::Database,
    lifecycle::{RunLifecycle, SqlMetadataStore},
    loader::LoadEngine,
    models::League,
    pipeline::Pipeline,
    sources::ApiSportsClient,
};

#[derive(Parser)]
#[command(name = "nba-etl")]
#[command(version)]
#[command(about = "Loads basketball games, standings and player statistics from api-sports")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// League to load (overrides config file)
    #[arg(short, long, value_name = "LEAGUE")]
    league: Option<League>,

    /// Season year to load (overrides config file)
    #[arg(short, long, value_name = "YEAR")]
    season: Option<i32>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Write a starter configuration to --config and exit
    #[arg(long)]
    write_default_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("nba_etl={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.write_default_config {
        Config::write_template(&cli.config)?;
        info!("Default configuration written to {}", cli.config.display());
        return Ok(());
    }

    info!("Starting NBA ETL v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    if let Some(league) = cli.league {
        config.pipeline.league = league;
    }
    if let Some(season) = cli.season {
        config.pipeline.season = season;
    }
    config.validate()?;
    info!(
        "Configuration loaded from {} (league {}, season {})",
        cli.config.display(),
        config.pipeline.league,
        config.pipeline.season
    );

    let metadata_db = Database::connect(
        config.metadata_database_url()?,
        config.metadata_database.max_connections,
    )
    .await?;
    let store = SqlMetadataStore::new(&metadata_db);
    store.initialize().await?;

    let lifecycle = RunLifecycle::new(store, &config.pipeline.name, config.snapshot())
        .with_log_folder(config.pipeline.log_folder_path.clone());

    let outcome = lifecycle
        .run(|log| {
            let config = &config;
            async move {
                let source = Arc::new(ApiSportsClient::from_config(config)?);
                let database =
                    Database::connect(config.database_url()?, config.database.max_connections)
                        .await?;
                let pipeline = Pipeline::new(&config.pipeline, source, LoadEngine::new(&database));
                let summary = pipeline.run(&log).await;
                database.close().await;
                summary
            }
        })
        .await;

    metadata_db.close().await;

    match outcome {
        Ok(summary) => {
            info!(
                "Pipeline finished: {} rows written across {} entities",
                summary.rows_written(),
                summary.loads.len()
            );
            Ok(())
        }
        Err(e) => {
            error!("Pipeline failed: {}", e);
            Err(e.into())
        }
    }
}
