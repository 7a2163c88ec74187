//! Record source trait definitions

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::errors::EtlResult;
use crate::models::League;

/// Raw JSON record as returned by the remote API
pub type RawRecord = JsonValue;

/// Remote provider of league data.
///
/// Each call either returns the full collection for its parameters or fails
/// with [`crate::errors::EtlError::SourceUnavailable`]. Implementations never
/// retry internally.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch_games(&self, league: League, season: i32) -> EtlResult<Vec<RawRecord>>;

    /// Teams of a league; every record carries an integer `id`
    async fn fetch_teams(&self, league: League) -> EtlResult<Vec<RawRecord>>;

    async fn fetch_players(
        &self,
        league: League,
        season: i32,
        team_id: i64,
    ) -> EtlResult<Vec<RawRecord>>;

    /// Per-game statistic lines of a team's players
    async fn fetch_player_statistics(
        &self,
        league: League,
        season: i32,
        team_id: i64,
    ) -> EtlResult<Vec<RawRecord>>;

    async fn fetch_standings(&self, league: League, season: i32) -> EtlResult<Vec<RawRecord>>;
}
