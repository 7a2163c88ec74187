//! api-sports basketball (NBA v2) record source
//!
//! Thin HTTP client over the `games`, `teams`, `players`,
//! `players/statistics` and `standings` endpoints. Every endpoint wraps its
//! payload as `{"errors": ..., "response": [...]}`; anything else is treated
//! as the source being unavailable.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::traits::{RawRecord, RecordSource};
use crate::config::Config;
use crate::errors::{EtlError, EtlResult};
use crate::models::League;

const MAX_ERROR_BODY: usize = 512;

pub struct ApiSportsClient {
    client: Client,
    base_url: Url,
    api_key: String,
    host: String,
}

impl ApiSportsClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> EtlResult<Self> {
        if api_key.trim().is_empty() {
            return Err(EtlError::configuration("API key cannot be empty"));
        }

        let mut base_url = Url::parse(base_url).map_err(|e| {
            EtlError::configuration(format!("invalid source base url '{base_url}': {e}"))
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let host = base_url
            .host_str()
            .ok_or_else(|| EtlError::configuration(format!("source base url {base_url} has no host")))?
            .to_string();

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("nba-etl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EtlError::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
            host,
        })
    }

    pub fn from_config(config: &Config) -> EtlResult<Self> {
        Self::new(
            &config.source.base_url,
            config.api_key()?,
            Duration::from_secs(config.source.timeout_secs),
        )
    }

    async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> EtlResult<Vec<RawRecord>> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| EtlError::source_unavailable(endpoint, format!("invalid url: {e}")))?;

        debug!("Requesting {} with {:?}", url, params);

        let response = self
            .client
            .get(url)
            .query(params)
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", &self.host)
            .send()
            .await
            .map_err(|e| EtlError::source_unavailable(endpoint, e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY)
                .collect();
            return Err(EtlError::source_unavailable(
                endpoint,
                format!("status code {}. Response: {}", status.as_u16(), body),
            ));
        }

        let body: JsonValue = response.json().await.map_err(|e| {
            EtlError::source_unavailable(endpoint, format!("response is not valid JSON: {e}"))
        })?;

        let records = extract_response(endpoint, body)?;
        debug!("{} returned {} records", endpoint, records.len());
        Ok(records)
    }
}

/// Unwrap the `response` array of an api-sports payload
fn extract_response(endpoint: &str, body: JsonValue) -> EtlResult<Vec<RawRecord>> {
    let mut body = match body {
        JsonValue::Object(map) => map,
        other => {
            return Err(EtlError::source_unavailable(
                endpoint,
                format!("expected a JSON object, got {other}"),
            ))
        }
    };

    if let Some(errors) = body.get("errors") {
        let reported = match errors {
            JsonValue::Array(items) => !items.is_empty(),
            JsonValue::Object(map) => !map.is_empty(),
            JsonValue::Null => false,
            _ => true,
        };
        if reported {
            return Err(EtlError::source_unavailable(
                endpoint,
                format!("api reported errors: {errors}"),
            ));
        }
    }

    match body.remove("response") {
        Some(JsonValue::Array(items)) => Ok(items),
        Some(other) => Err(EtlError::source_unavailable(
            endpoint,
            format!("expected `response` to be an array, got {other}"),
        )),
        None => Err(EtlError::source_unavailable(
            endpoint,
            "payload has no `response` field",
        )),
    }
}

#[async_trait]
impl RecordSource for ApiSportsClient {
    async fn fetch_games(&self, league: League, season: i32) -> EtlResult<Vec<RawRecord>> {
        self.get(
            "games/",
            &[("league", league.to_string()), ("season", season.to_string())],
        )
        .await
    }

    async fn fetch_teams(&self, league: League) -> EtlResult<Vec<RawRecord>> {
        self.get("teams/", &[("league", league.to_string())]).await
    }

    // The players endpoints are keyed by team and season only.
    async fn fetch_players(
        &self,
        _league: League,
        season: i32,
        team_id: i64,
    ) -> EtlResult<Vec<RawRecord>> {
        self.get(
            "players/",
            &[("season", season.to_string()), ("team", team_id.to_string())],
        )
        .await
    }

    async fn fetch_player_statistics(
        &self,
        _league: League,
        season: i32,
        team_id: i64,
    ) -> EtlResult<Vec<RawRecord>> {
        self.get(
            "players/statistics/",
            &[("season", season.to_string()), ("team", team_id.to_string())],
        )
        .await
    }

    async fn fetch_standings(&self, league: League, season: i32) -> EtlResult<Vec<RawRecord>> {
        self.get(
            "standings/",
            &[("league", league.to_string()), ("season", season.to_string())],
        )
        .await
    }
}
