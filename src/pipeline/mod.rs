//! Pipeline orchestration
//!
//! Runs extract → transform → load for each configured entity, one entity
//! at a time. The first error aborts the remaining entities and is returned
//! to the caller (normally [`crate::lifecycle::RunLifecycle::run`]).

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::errors::EtlResult;
use crate::lifecycle::RunLog;
use crate::loader::{LoadEngine, LoadSummary};
use crate::models::{Entity, League, Record};
use crate::schema::SchemaRegistry;
use crate::sources::RecordSource;
use crate::transform::{self, TeamRoster};

/// Per-entity load outcomes of one run, in processing order
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineSummary {
    pub loads: Vec<(Entity, LoadSummary)>,
}

impl PipelineSummary {
    pub fn rows_written(&self) -> u64 {
        self.loads.iter().map(|(_, load)| load.rows_written).sum()
    }

    pub fn get(&self, entity: Entity) -> Option<&LoadSummary> {
        self.loads
            .iter()
            .find(|(e, _)| *e == entity)
            .map(|(_, load)| load)
    }
}

pub struct Pipeline {
    league: League,
    season: i32,
    entities: Vec<Entity>,
    run_date: NaiveDate,
    source: Arc<dyn RecordSource>,
    loader: LoadEngine,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig, source: Arc<dyn RecordSource>, loader: LoadEngine) -> Self {
        Self {
            league: config.league,
            season: config.season,
            entities: config.entities.clone(),
            run_date: Utc::now().date_naive(),
            source,
            loader,
        }
    }

    /// Date player ages are computed against; defaults to today (UTC)
    pub fn with_run_date(mut self, run_date: NaiveDate) -> Self {
        self.run_date = run_date;
        self
    }

    pub async fn run(&self, log: &RunLog) -> EtlResult<PipelineSummary> {
        log.info(format!(
            "Processing league {} season {} ({} entities)",
            self.league,
            self.season,
            self.entities.len()
        ));

        let mut summary = PipelineSummary::default();
        for &entity in &self.entities {
            let load = self.process(entity, log).await?;
            summary.loads.push((entity, load));
        }

        log.info(format!(
            "Processed {} entities, {} rows written",
            summary.loads.len(),
            summary.rows_written()
        ));
        Ok(summary)
    }

    async fn process(&self, entity: Entity, log: &RunLog) -> EtlResult<LoadSummary> {
        log.info(format!("Extracting {entity}"));
        let records = self.extract_and_transform(entity, log).await?;
        log.info(format!("Transformed {} {} records", records.len(), entity));

        let schema = SchemaRegistry::for_entity(entity);
        let strategy = entity.load_strategy();
        let load = self.loader.load(&records, &schema, strategy).await?;

        log.info(format!(
            "Loaded {} rows into {} ({}, {} removed)",
            load.rows_written, load.table, load.strategy, load.rows_removed
        ));
        Ok(load)
    }

    async fn extract_and_transform(&self, entity: Entity, log: &RunLog) -> EtlResult<Vec<Record>> {
        match entity {
            Entity::Games => {
                let raw = self.source.fetch_games(self.league, self.season).await?;
                log.info(format!("Fetched {} games", raw.len()));
                transform::transform_games(&raw)
            }
            Entity::Standings => {
                let raw = self.source.fetch_standings(self.league, self.season).await?;
                log.info(format!("Fetched {} standings", raw.len()));
                transform::transform_standings(&raw)
            }
            Entity::PlayerStatistics => {
                let rosters = self.extract_rosters(log).await?;
                transform::transform_player_statistics(
                    &rosters,
                    self.league,
                    self.season,
                    self.run_date,
                )
            }
        }
    }

    async fn extract_rosters(&self, log: &RunLog) -> EtlResult<Vec<TeamRoster>> {
        let teams = self.source.fetch_teams(self.league).await?;
        let team_ids = transform::team_ids(&teams)?;
        log.info(format!("Fetched {} teams", team_ids.len()));

        let mut rosters = Vec::with_capacity(team_ids.len());
        for team_id in team_ids {
            let players = self
                .source
                .fetch_players(self.league, self.season, team_id)
                .await?;
            let statistics = self
                .source
                .fetch_player_statistics(self.league, self.season, team_id)
                .await?;
            log.info(format!(
                "Team {}: {} players, {} statistic lines",
                team_id,
                players.len(),
                statistics.len()
            ));
            rosters.push(TeamRoster {
                team_id,
                players,
                statistics,
            });
        }
        Ok(rosters)
    }
}
