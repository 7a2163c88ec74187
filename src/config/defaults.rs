//! Default values shared by the configuration structs

pub const DEFAULT_CONFIG_FILE: &str = "nba.toml";
pub const DEFAULT_PIPELINE_NAME: &str = "nba";
pub const DEFAULT_API_BASE_URL: &str = "https://v2.nba.api-sports.io";
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/nba.db";
pub const DEFAULT_METADATA_DATABASE_URL: &str = "sqlite://./data/nba_metadata.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Environment prefix for layered overrides, e.g. `NBA_ETL_PIPELINE__SEASON`
pub const ENV_PREFIX: &str = "NBA_ETL";

pub const API_KEY_ENV: &str = "API_KEY";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const LOGGING_DATABASE_URL_ENV: &str = "LOGGING_DATABASE_URL";

pub fn default_pipeline_name() -> String {
    DEFAULT_PIPELINE_NAME.to_string()
}

pub fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

pub fn default_source_timeout_secs() -> u64 {
    DEFAULT_SOURCE_TIMEOUT_SECS
}
