//! Pipeline configuration
//!
//! Configuration is read once at startup from a TOML file, layered with
//! `NBA_ETL_*` environment overrides and the three secrets (`API_KEY`,
//! `DATABASE_URL`, `LOGGING_DATABASE_URL`). The resulting [`Config`] is
//! passed by reference to every component that needs it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{EtlError, EtlResult};
use crate::models::{Entity, League};

pub mod defaults;

use defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub metadata_database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_pipeline_name")]
    pub name: String,
    pub league: League,
    pub season: i32,
    /// Folder receiving one log file per run
    pub log_folder_path: Option<PathBuf>,
    /// Entities to process, in order
    #[serde(default = "default_entities")]
    pub entities: Vec<Entity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_source_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: Option<u32>,
}

fn default_entities() -> Vec<Entity> {
    Entity::ALL.to_vec()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_secs: default_source_timeout_secs(),
            api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from `path`, then apply environment overrides and secrets.
    pub fn load(path: &Path) -> EtlResult<Self> {
        if !path.exists() {
            return Err(EtlError::configuration(format!(
                "missing configuration file {} (create one with --write-default-config)",
                path.display()
            )));
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("source.api_key", std::env::var(API_KEY_ENV).ok())?
            .set_override_option("database.url", std::env::var(DATABASE_URL_ENV).ok())?
            .set_override_option(
                "metadata_database.url",
                std::env::var(LOGGING_DATABASE_URL_ENV).ok(),
            )?
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        debug!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> EtlResult<()> {
        if self.pipeline.name.trim().is_empty() {
            return Err(EtlError::configuration("pipeline.name must not be empty"));
        }
        if !(1946..=2100).contains(&self.pipeline.season) {
            return Err(EtlError::configuration(format!(
                "pipeline.season {} is not a plausible season year",
                self.pipeline.season
            )));
        }
        if self.pipeline.entities.is_empty() {
            return Err(EtlError::configuration(
                "pipeline.entities must name at least one entity",
            ));
        }
        for (i, entity) in self.pipeline.entities.iter().enumerate() {
            if self.pipeline.entities[..i].contains(entity) {
                return Err(EtlError::configuration(format!(
                    "pipeline.entities lists {entity} more than once"
                )));
            }
        }
        if self.source.timeout_secs == 0 {
            return Err(EtlError::configuration("source.timeout_secs must be positive"));
        }
        Ok(())
    }

    pub fn api_key(&self) -> EtlResult<&str> {
        self.source
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                EtlError::configuration(format!("environment variable {API_KEY_ENV} is not set"))
            })
    }

    pub fn database_url(&self) -> EtlResult<&str> {
        self.database.url.as_deref().ok_or_else(|| {
            EtlError::configuration(format!(
                "database.url is not configured and {DATABASE_URL_ENV} is not set"
            ))
        })
    }

    pub fn metadata_database_url(&self) -> EtlResult<&str> {
        self.metadata_database.url.as_deref().ok_or_else(|| {
            EtlError::configuration(format!(
                "metadata_database.url is not configured and {LOGGING_DATABASE_URL_ENV} is not set"
            ))
        })
    }

    /// Configuration snapshot persisted with every run. Never contains secrets.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.pipeline.name,
            "league": self.pipeline.league.as_str(),
            "season": self.pipeline.season,
            "log_folder_path": self.pipeline.log_folder_path.as_ref().map(|p| p.display().to_string()),
            "entities": self.pipeline.entities.iter().map(Entity::as_str).collect::<Vec<_>>(),
            "source_base_url": self.source.base_url,
        })
    }

    /// Starter configuration written by `--write-default-config`
    pub fn template() -> Self {
        Self {
            pipeline: PipelineConfig {
                name: default_pipeline_name(),
                league: League::Standard,
                season: 2023,
                log_folder_path: Some(PathBuf::from("./logs")),
                entities: default_entities(),
            },
            source: SourceConfig::default(),
            database: DatabaseConfig {
                url: Some(DEFAULT_DATABASE_URL.to_string()),
                max_connections: Some(DEFAULT_MAX_CONNECTIONS),
            },
            metadata_database: DatabaseConfig {
                url: Some(DEFAULT_METADATA_DATABASE_URL.to_string()),
                max_connections: Some(1),
            },
        }
    }

    pub fn write_template(path: &Path) -> EtlResult<()> {
        if path.exists() {
            return Err(EtlError::configuration(format!(
                "refusing to overwrite existing {}",
                path.display()
            )));
        }
        let contents = toml::to_string_pretty(&Self::template())
            .map_err(|e| EtlError::internal(format!("failed to render default config: {e}")))?;
        std::fs::write(path, contents).map_err(|e| {
            EtlError::configuration(format!("failed to write {}: {e}", path.display()))
        })
    }
}
