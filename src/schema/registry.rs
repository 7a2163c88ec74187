use super::{ColumnType, TableSchema};
use crate::models::Entity;

/// Declares the target table of every pipeline entity
pub struct SchemaRegistry;

impl SchemaRegistry {
    pub fn for_entity(entity: Entity) -> TableSchema {
        match entity {
            Entity::Games => Self::games(),
            Entity::Standings => Self::standings(),
            Entity::PlayerStatistics => Self::players_statistics(),
        }
    }

    pub fn games() -> TableSchema {
        TableSchema::new("games")
            .column("game_id", ColumnType::Integer)
            .column("league", ColumnType::String)
            .column("season", ColumnType::Integer)
            .column("date", ColumnType::Date)
            .column("home_team_id", ColumnType::Integer)
            .column("home_team_name", ColumnType::String)
            .column("home_team_score", ColumnType::Float)
            .column("away_team_id", ColumnType::Integer)
            .column("away_team_name", ColumnType::String)
            .column("away_team_score", ColumnType::Float)
            .column("winner_team_id", ColumnType::Integer)
            .column("loser_team_id", ColumnType::Integer)
            .primary_key(["game_id"])
    }

    pub fn standings() -> TableSchema {
        TableSchema::new("standings")
            .column("standings_table_id", ColumnType::String)
            .column("team_id", ColumnType::Integer)
            .column("team_name", ColumnType::String)
            .column("league", ColumnType::String)
            .column("season", ColumnType::Integer)
            .column("conference_name", ColumnType::String)
            .column("conference_rank", ColumnType::Integer)
            .column("division_name", ColumnType::String)
            .column("division_rank", ColumnType::Integer)
            .column("win_total", ColumnType::Integer)
            .column("loss_total", ColumnType::Integer)
            .primary_key(["standings_table_id"])
    }

    /// Fully replaced every run, so no primary key is declared
    pub fn players_statistics() -> TableSchema {
        TableSchema::new("players_statistics")
            .column("player_table_id", ColumnType::String)
            .column("player_id", ColumnType::Integer)
            .column("birth_date", ColumnType::Date)
            .column("jersey_number", ColumnType::Integer)
            .column("season", ColumnType::Integer)
            .column("league", ColumnType::String)
            .column("first_name", ColumnType::String)
            .column("last_name", ColumnType::String)
            .column("team_id", ColumnType::Integer)
            .column("position", ColumnType::String)
            .column("current_age", ColumnType::Integer)
            .column("points", ColumnType::Integer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_schemas_are_valid() {
        for entity in Entity::ALL {
            let schema = SchemaRegistry::for_entity(entity);
            assert!(schema.validate().is_ok(), "{} schema invalid", schema.name());
        }
    }

    #[test]
    fn test_primary_keys() {
        assert_eq!(SchemaRegistry::games().primary_key_columns(), ["game_id"]);
        assert_eq!(
            SchemaRegistry::standings().primary_key_columns(),
            ["standings_table_id"]
        );
        assert!(!SchemaRegistry::players_statistics().has_primary_key());
        assert_eq!(SchemaRegistry::players_statistics().columns().len(), 12);
    }
}
