//! Pure reshaping of raw API records into table rows
//!
//! Each entity has an explicit mapping table from source path to target
//! column. Derived columns (winner/loser, standings key, player age and
//! point totals) are computed here so the load step only ever sees records
//! matching the registered [`TableSchema`](crate::schema::TableSchema).

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use crate::errors::{EtlError, EtlResult};
use crate::models::{Entity, League, Record, Value};
use crate::schema::{ColumnType, SchemaRegistry};
use crate::sources::RawRecord;
use crate::utils::datetime::calculate_age;

pub mod mapping;

pub use mapping::{apply_mapping, coerce, flatten, FieldMapping, FlatRecord};

pub const GAME_FIELDS: &[FieldMapping<'static>] = &[
    ("id", "game_id"),
    ("league", "league"),
    ("season", "season"),
    ("date.start", "date"),
    ("teams.home.id", "home_team_id"),
    ("teams.home.name", "home_team_name"),
    ("scores.home.points", "home_team_score"),
    ("teams.visitors.id", "away_team_id"),
    ("teams.visitors.name", "away_team_name"),
    ("scores.visitors.points", "away_team_score"),
];

pub const STANDING_FIELDS: &[FieldMapping<'static>] = &[
    ("league", "league"),
    ("season", "season"),
    ("team.id", "team_id"),
    ("team.name", "team_name"),
    ("conference.name", "conference_name"),
    ("conference.rank", "conference_rank"),
    ("division.name", "division_name"),
    ("division.rank", "division_rank"),
    ("win.total", "win_total"),
    ("loss.total", "loss_total"),
];

/// Player paths; `{league}` is replaced by the run's league identifier
pub const PLAYER_FIELDS: &[FieldMapping<'static>] = &[
    ("id", "player_id"),
    ("firstname", "first_name"),
    ("lastname", "last_name"),
    ("birth.date", "birth_date"),
    ("leagues.{league}.jersey", "jersey_number"),
    ("leagues.{league}.pos", "position"),
];

/// Roster and per-game statistic lines fetched for one team
#[derive(Debug, Clone, Default)]
pub struct TeamRoster {
    pub team_id: i64,
    pub players: Vec<RawRecord>,
    pub statistics: Vec<RawRecord>,
}

/// Team ids of a `teams` response
pub fn team_ids(teams: &[RawRecord]) -> EtlResult<Vec<i64>> {
    teams
        .iter()
        .map(|team| {
            coerce(
                Entity::PlayerStatistics,
                "id",
                team.get("id"),
                ColumnType::Integer,
            )?
            .as_i64()
            .ok_or_else(|| EtlError::transform_failed("teams", format!("team without id: {team}")))
        })
        .collect()
}

/// Games rows; the higher-scoring side is the winner, ties and unplayed games
/// have neither winner nor loser.
pub fn transform_games(raw: &[RawRecord]) -> EtlResult<Vec<Record>> {
    let schema = SchemaRegistry::games();
    raw.iter()
        .map(|game| {
            let flat = flatten(game);
            let mut record = Record::new();
            apply_mapping(Entity::Games, &flat, GAME_FIELDS, &schema, &mut record)?;
            require(Entity::Games, &record, "game_id")?;

            let home_id = record.get("home_team_id").cloned().unwrap_or(Value::Null);
            let away_id = record.get("away_team_id").cloned().unwrap_or(Value::Null);
            let home_score = record.get("home_team_score").and_then(Value::as_f64);
            let away_score = record.get("away_team_score").and_then(Value::as_f64);

            let (winner, loser) = match (home_score, away_score) {
                (Some(home), Some(away)) if home > away => (home_id, away_id),
                (Some(home), Some(away)) if away > home => (away_id, home_id),
                _ => (Value::Null, Value::Null),
            };
            record.insert("winner_team_id", winner);
            record.insert("loser_team_id", loser);
            Ok(record)
        })
        .collect()
}

/// Standings rows keyed by `"{team_id}-{league}-{season}"`
pub fn transform_standings(raw: &[RawRecord]) -> EtlResult<Vec<Record>> {
    let schema = SchemaRegistry::standings();
    raw.iter()
        .map(|standing| {
            let flat = flatten(standing);
            let mut record = Record::new();
            apply_mapping(
                Entity::Standings,
                &flat,
                STANDING_FIELDS,
                &schema,
                &mut record,
            )?;

            let team_id = require(Entity::Standings, &record, "team_id")?;
            let league = require(Entity::Standings, &record, "league")?;
            let season = require(Entity::Standings, &record, "season")?;
            record.insert(
                "standings_table_id",
                format!("{team_id}-{league}-{season}"),
            );
            Ok(record)
        })
        .collect()
}

/// One row per player on each team's roster for the season.
///
/// `points` is the sum of the player's per-game points for that team (a
/// player without statistic lines scores 0), `current_age` is computed on
/// `today`, and `player_table_id` is `"{player_id}-{team_id}-{season}"`.
pub fn transform_player_statistics(
    rosters: &[TeamRoster],
    league: League,
    season: i32,
    today: NaiveDate,
) -> EtlResult<Vec<Record>> {
    let entity = Entity::PlayerStatistics;
    let schema = SchemaRegistry::players_statistics();
    let paths: Vec<(String, &str)> = PLAYER_FIELDS
        .iter()
        .map(|(path, column)| (path.replace("{league}", league.as_str()), *column))
        .collect();
    let mappings: Vec<FieldMapping<'_>> = paths.iter().map(|(p, c)| (p.as_str(), *c)).collect();

    let mut rows = Vec::new();
    for roster in rosters {
        let points = points_by_player(&roster.statistics)?;
        let mut seen = HashSet::new();

        for player in &roster.players {
            let flat = flatten(player);
            let mut record = Record::new();
            apply_mapping(entity, &flat, &mappings, &schema, &mut record)?;

            let player_id = require(entity, &record, "player_id")?
                .as_i64()
                .unwrap_or_default();
            if !seen.insert(player_id) {
                continue;
            }

            let age = record
                .get("birth_date")
                .and_then(Value::as_date)
                .map(|birth| calculate_age(birth, today));

            record.insert(
                "player_table_id",
                format!("{player_id}-{}-{season}", roster.team_id),
            );
            record.insert("season", season);
            record.insert("league", league.as_str());
            record.insert("team_id", roster.team_id);
            record.insert("current_age", age);
            record.insert("points", points.get(&player_id).copied().unwrap_or(0));
            rows.push(record);
        }
    }

    Ok(rows)
}

fn points_by_player(statistics: &[RawRecord]) -> EtlResult<HashMap<i64, i64>> {
    let entity = Entity::PlayerStatistics;
    let mut totals = HashMap::new();
    for line in statistics {
        let flat = flatten(line);
        let player_id = coerce(entity, "player.id", flat.get("player.id"), ColumnType::Integer)?
            .as_i64()
            .ok_or_else(|| {
                EtlError::transform_failed(entity.as_str(), format!("statistic line without player id: {line}"))
            })?;
        let points = coerce(entity, "points", flat.get("points"), ColumnType::Integer)?
            .as_i64()
            .unwrap_or(0);
        let total = totals.entry(player_id).or_insert(0i64);
        *total = total.checked_add(points).ok_or_else(|| {
            EtlError::transform_failed(
                entity.as_str(),
                format!("points total of player {player_id} overflows"),
            )
        })?;
    }
    Ok(totals)
}

fn require<'r>(entity: Entity, record: &'r Record, column: &str) -> EtlResult<&'r Value> {
    match record.get(column) {
        Some(value) if !value.is_null() => Ok(value),
        _ => Err(EtlError::transform_failed(
            entity.as_str(),
            format!("record has no value for required column '{column}'"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use serde_json::json;

    fn game(id: i64, home: (i64, Option<i64>), away: (i64, Option<i64>)) -> RawRecord {
        json!({
            "id": id,
            "league": "standard",
            "season": 2022,
            "date": {"start": "2022-10-18T23:30:00.000Z", "end": null},
            "teams": {
                "home": {"id": home.0, "name": "Home", "code": "HOM"},
                "visitors": {"id": away.0, "name": "Away", "code": "AWY"}
            },
            "scores": {
                "home": {"points": home.1, "linescore": ["25", "30"]},
                "visitors": {"points": away.1}
            }
        })
    }

    #[test]
    fn test_games_winner_and_loser() {
        let rows = transform_games(&[game(1, (10, Some(100)), (20, Some(98)))]).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.get("game_id"), Some(&Value::Integer(1)));
        assert_eq!(row.get("winner_team_id"), Some(&Value::Integer(10)));
        assert_eq!(row.get("loser_team_id"), Some(&Value::Integer(20)));
        assert_eq!(row.get("home_team_score"), Some(&Value::Float(100.0)));
        assert_eq!(
            row.get("date"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2022, 10, 18).unwrap()))
        );
        assert!(SchemaRegistry::games().validate_record(row, 0).is_ok());
    }

    #[test]
    fn test_games_away_win_tie_and_unplayed() {
        let rows = transform_games(&[
            game(2, (10, Some(90)), (20, Some(101))),
            game(3, (10, Some(99)), (20, Some(99))),
            game(4, (10, None), (20, None)),
        ])
        .unwrap();

        assert_eq!(rows[0].get("winner_team_id"), Some(&Value::Integer(20)));
        assert_eq!(rows[0].get("loser_team_id"), Some(&Value::Integer(10)));
        for row in &rows[1..] {
            assert!(row.get("winner_team_id").unwrap().is_null());
            assert!(row.get("loser_team_id").unwrap().is_null());
        }
    }

    #[test]
    fn test_game_without_id_fails() {
        let mut raw = game(1, (10, Some(1)), (20, Some(0)));
        raw.as_object_mut().unwrap().remove("id");
        let err = transform_games(&[raw]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransformFailed);
    }

    #[test]
    fn test_standings_key() {
        let rows = transform_standings(&[json!({
            "league": "standard",
            "season": 2022,
            "team": {"id": 5, "name": "Chicago Bulls", "nickname": "Bulls"},
            "conference": {"name": "east", "rank": 10, "win": 20, "loss": 21},
            "division": {"name": "central", "rank": 3, "win": 8, "loss": 7, "gamesBehind": "4.0"},
            "win": {"home": 17, "away": 13, "total": 30, "percentage": ".500"},
            "loss": {"home": 12, "away": 18, "total": 30},
            "streak": 2
        })])
        .unwrap();

        let row = &rows[0];
        assert_eq!(
            row.get("standings_table_id"),
            Some(&Value::Text("5-standard-2022".to_string()))
        );
        assert_eq!(row.get("win_total"), Some(&Value::Integer(30)));
        assert_eq!(row.get("division_name"), Some(&Value::Text("central".to_string())));
        assert!(SchemaRegistry::standings().validate_record(row, 0).is_ok());
    }

    #[test]
    fn test_player_statistics_sum_points_per_team() {
        let roster = TeamRoster {
            team_id: 1,
            players: vec![
                json!({
                    "id": 265,
                    "firstname": "LeBron",
                    "lastname": "James",
                    "birth": {"date": "1984-12-30", "country": "USA"},
                    "leagues": {"standard": {"jersey": 6, "active": true, "pos": "F"}}
                }),
                json!({
                    "id": 300,
                    "firstname": "Rookie",
                    "lastname": "Player",
                    "birth": {"date": null},
                    "leagues": {"vegas": {"jersey": 99, "pos": "G"}}
                }),
            ],
            statistics: vec![
                json!({"player": {"id": 265}, "team": {"id": 1}, "game": {"id": 1}, "points": 30}),
                json!({"player": {"id": 265}, "team": {"id": 1}, "game": {"id": 2}, "points": "25"}),
                json!({"player": {"id": 265}, "team": {"id": 1}, "game": {"id": 3}, "points": null}),
            ],
        };
        let today = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        let rows = transform_player_statistics(&[roster], League::Standard, 2022, today).unwrap();

        assert_eq!(rows.len(), 2);
        let lebron = &rows[0];
        assert_eq!(lebron.get("points"), Some(&Value::Integer(55)));
        assert_eq!(lebron.get("current_age"), Some(&Value::Integer(38)));
        assert_eq!(lebron.get("jersey_number"), Some(&Value::Integer(6)));
        assert_eq!(lebron.get("position"), Some(&Value::Text("F".to_string())));
        assert_eq!(
            lebron.get("player_table_id"),
            Some(&Value::Text("265-1-2022".to_string()))
        );

        let rookie = &rows[1];
        assert_eq!(rookie.get("points"), Some(&Value::Integer(0)));
        assert!(rookie.get("current_age").unwrap().is_null());
        assert!(rookie.get("jersey_number").unwrap().is_null());

        let schema = SchemaRegistry::players_statistics();
        for (i, row) in rows.iter().enumerate() {
            assert!(schema.validate_record(row, i).is_ok());
        }
    }

    #[test]
    fn test_points_overflow_fails() {
        let roster = TeamRoster {
            team_id: 1,
            players: vec![json!({"id": 7, "firstname": "A", "lastname": "B"})],
            statistics: vec![
                json!({"player": {"id": 7}, "points": i64::MAX}),
                json!({"player": {"id": 7}, "points": 1}),
            ],
        };
        let today = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        let err = transform_player_statistics(&[roster], League::Standard, 2022, today).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransformFailed);
    }

    #[test]
    fn test_team_ids() {
        let ids = team_ids(&[json!({"id": 1, "name": "Atlanta Hawks"}), json!({"id": "2"})]).unwrap();
        assert_eq!(ids, vec![1, 2]);
        assert!(team_ids(&[json!({"name": "No id"})]).is_err());
    }
}
