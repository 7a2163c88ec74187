use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use nba_etl::{
    config::PipelineConfig,
    database::Database,
    lifecycle::{RunLifecycle, RunLog, RunStatus, SqlMetadataStore},
    loader::LoadEngine,
    models::{Entity, League, Value},
    pipeline::Pipeline,
    schema::SchemaRegistry,
    sources::{RawRecord, RecordSource},
    EtlError, EtlResult, ErrorKind,
};

/// In-process source serving canned api-sports payloads
#[derive(Default)]
struct ScriptedSource {
    games: Vec<RawRecord>,
    standings: Vec<RawRecord>,
    teams: Vec<RawRecord>,
    players: HashMap<i64, Vec<RawRecord>>,
    statistics: HashMap<i64, Vec<RawRecord>>,
    unavailable: Option<&'static str>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedSource {
    fn serve(&self, endpoint: &str, records: Vec<RawRecord>) -> EtlResult<Vec<RawRecord>> {
        self.requests.lock().unwrap().push(endpoint.to_string());
        if self.unavailable == Some(endpoint) {
            return Err(EtlError::source_unavailable(endpoint, "status code 503"));
        }
        Ok(records)
    }
}

#[async_trait]
impl RecordSource for ScriptedSource {
    async fn fetch_games(&self, _league: League, _season: i32) -> EtlResult<Vec<RawRecord>> {
        self.serve("games/", self.games.clone())
    }

    async fn fetch_teams(&self, _league: League) -> EtlResult<Vec<RawRecord>> {
        self.serve("teams/", self.teams.clone())
    }

    async fn fetch_players(
        &self,
        _league: League,
        _season: i32,
        team_id: i64,
    ) -> EtlResult<Vec<RawRecord>> {
        let players = self.players.get(&team_id).cloned().unwrap_or_default();
        self.serve("players/", players)
    }

    async fn fetch_player_statistics(
        &self,
        _league: League,
        _season: i32,
        team_id: i64,
    ) -> EtlResult<Vec<RawRecord>> {
        let statistics = self.statistics.get(&team_id).cloned().unwrap_or_default();
        self.serve("players/statistics/", statistics)
    }

    async fn fetch_standings(&self, _league: League, _season: i32) -> EtlResult<Vec<RawRecord>> {
        self.serve("standings/", self.standings.clone())
    }
}

fn game(id: i64, home_points: i64, away_points: i64) -> RawRecord {
    json!({
        "id": id,
        "league": "standard",
        "season": 2022,
        "date": {"start": "2022-10-18T23:30:00.000Z"},
        "teams": {
            "home": {"id": 10, "name": "Boston Celtics"},
            "visitors": {"id": 20, "name": "Philadelphia 76ers"}
        },
        "scores": {
            "home": {"points": home_points},
            "visitors": {"points": away_points}
        }
    })
}

fn standing(team_id: i64, wins: i64) -> RawRecord {
    json!({
        "league": "standard",
        "season": 2022,
        "team": {"id": team_id, "name": format!("Team {team_id}")},
        "conference": {"name": "east", "rank": team_id},
        "division": {"name": "atlantic", "rank": 1},
        "win": {"total": wins},
        "loss": {"total": 82 - wins}
    })
}

fn player(id: i64) -> RawRecord {
    json!({
        "id": id,
        "firstname": "First",
        "lastname": format!("Player {id}"),
        "birth": {"date": "2000-01-15"},
        "leagues": {"standard": {"jersey": id, "pos": "G"}}
    })
}

fn stat_line(player_id: i64, points: i64) -> RawRecord {
    json!({"player": {"id": player_id}, "points": points})
}

fn full_source() -> ScriptedSource {
    ScriptedSource {
        games: vec![game(1, 100, 98), game(2, 90, 110)],
        standings: vec![standing(10, 57), standing(20, 54)],
        teams: vec![json!({"id": 10}), json!({"id": 20})],
        players: HashMap::from([
            (10, vec![player(1), player(2)]),
            (20, vec![player(3)]),
        ]),
        statistics: HashMap::from([
            (10, vec![stat_line(1, 20), stat_line(1, 31), stat_line(2, 8)]),
            (20, vec![stat_line(3, 12)]),
        ]),
        ..Default::default()
    }
}

fn pipeline_config(entities: Vec<Entity>) -> PipelineConfig {
    PipelineConfig {
        name: "nba".to_string(),
        league: League::Standard,
        season: 2022,
        log_folder_path: None,
        entities,
    }
}

fn pipeline(source: Arc<ScriptedSource>, engine: LoadEngine, entities: Vec<Entity>) -> Pipeline {
    Pipeline::new(&pipeline_config(entities), source, engine)
        .with_run_date(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap())
}

#[tokio::test]
async fn test_full_run_loads_every_entity() {
    let database = Database::in_memory().await.unwrap();
    let engine = LoadEngine::new(&database);
    let source = Arc::new(full_source());
    let log = RunLog::new("nba");

    let summary = pipeline(source, engine.clone(), Entity::ALL.to_vec())
        .run(&log)
        .await
        .unwrap();

    assert_eq!(summary.loads.len(), 3);
    assert_eq!(summary.rows_written(), 2 + 2 + 3);

    let games = engine.fetch_all(&SchemaRegistry::games()).await.unwrap();
    assert_eq!(games.len(), 2);
    assert_eq!(games[0].get("winner_team_id"), Some(&Value::Integer(10)));
    assert_eq!(games[0].get("loser_team_id"), Some(&Value::Integer(20)));
    assert_eq!(games[1].get("winner_team_id"), Some(&Value::Integer(20)));

    let standings = engine.fetch_all(&SchemaRegistry::standings()).await.unwrap();
    assert_eq!(
        standings[0].get("standings_table_id"),
        Some(&Value::Text("10-standard-2022".to_string()))
    );

    let players = engine
        .fetch_all(&SchemaRegistry::players_statistics())
        .await
        .unwrap();
    assert_eq!(players.len(), 3);
    assert_eq!(players[0].get("points"), Some(&Value::Integer(51)));
    assert_eq!(players[0].get("current_age"), Some(&Value::Integer(22)));
    assert_eq!(players[2].get("team_id"), Some(&Value::Integer(20)));

    assert!(log.text().contains("Loaded 3 rows into players_statistics"));
}

#[tokio::test]
async fn test_rerun_keeps_tables_stable() {
    let database = Database::in_memory().await.unwrap();
    let engine = LoadEngine::new(&database);
    let source = Arc::new(full_source());
    let log = RunLog::new("nba");

    let pipeline = pipeline(source, engine.clone(), Entity::ALL.to_vec());
    pipeline.run(&log).await.unwrap();
    let summary = pipeline.run(&log).await.unwrap();

    let overwrite = summary.get(Entity::PlayerStatistics).unwrap();
    assert_eq!(overwrite.rows_removed, 3);
    assert_eq!(engine.count(&SchemaRegistry::games()).await.unwrap(), 2);
    assert_eq!(engine.count(&SchemaRegistry::standings()).await.unwrap(), 2);
    assert_eq!(
        engine
            .count(&SchemaRegistry::players_statistics())
            .await
            .unwrap(),
        3
    );
}

#[tokio::test]
async fn test_source_failure_aborts_remaining_entities() {
    let database = Database::in_memory().await.unwrap();
    let engine = LoadEngine::new(&database);
    let source = Arc::new(ScriptedSource {
        unavailable: Some("standings/"),
        ..full_source()
    });
    let log = RunLog::new("nba");

    let err = pipeline(source.clone(), engine.clone(), Entity::ALL.to_vec())
        .run(&log)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert_eq!(engine.count(&SchemaRegistry::games()).await.unwrap(), 2);
    assert_eq!(engine.count(&SchemaRegistry::standings()).await.unwrap(), 0);
    assert!(!source
        .requests
        .lock()
        .unwrap()
        .iter()
        .any(|r| r == "teams/"));
}

#[tokio::test]
async fn test_configured_entity_order_is_followed() {
    let database = Database::in_memory().await.unwrap();
    let source = Arc::new(full_source());
    let log = RunLog::new("nba");

    let summary = pipeline(
        source.clone(),
        LoadEngine::new(&database),
        vec![Entity::Standings, Entity::Games],
    )
    .run(&log)
    .await
    .unwrap();

    let order: Vec<Entity> = summary.loads.iter().map(|(e, _)| *e).collect();
    assert_eq!(order, vec![Entity::Standings, Entity::Games]);
    assert_eq!(
        *source.requests.lock().unwrap(),
        vec!["standings/".to_string(), "games/".to_string()]
    );
}

#[tokio::test]
async fn test_malformed_record_fails_transform() {
    let database = Database::in_memory().await.unwrap();
    let mut source = full_source();
    source.games.push(json!({"league": "standard", "season": 2022}));
    let log = RunLog::new("nba");

    let err = pipeline(
        Arc::new(source),
        LoadEngine::new(&database),
        vec![Entity::Games],
    )
    .run(&log)
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransformFailed);
}

#[tokio::test]
async fn test_failed_run_is_recorded_by_lifecycle() {
    let metadata = Database::in_memory().await.unwrap();
    let store = SqlMetadataStore::new(&metadata);
    store.initialize().await.unwrap();
    let lifecycle = RunLifecycle::new(store, "nba", json!({"season": 2022}));

    let database = Database::in_memory().await.unwrap();
    let source = Arc::new(ScriptedSource {
        unavailable: Some("players/"),
        ..full_source()
    });
    let pipeline = pipeline(source, LoadEngine::new(&database), Entity::ALL.to_vec());

    let result = lifecycle
        .run(|log| async move { pipeline.run(&log).await })
        .await;
    assert_eq!(result.unwrap_err().kind(), ErrorKind::SourceUnavailable);

    let runs = lifecycle.store().list_runs("nba").await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failure);
    assert!(runs[0].log_text.contains("Loaded 2 rows into games"));
    // Emitted by the load engine itself, not through the run log
    assert!(runs[0]
        .log_text
        .contains("Loaded 2 rows into games using upsert (0 rows removed)"));
    assert!(runs[0].log_text.contains("players/"));
}
