use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A scalar cell value carried by a [`Record`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(v) => Some(*v),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "string",
            Value::Date(_) => "date",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One flat row destined for a single table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for fixtures and transforms
    pub fn with<K: Into<String>, V: Into<Value>>(mut self, column: K, value: V) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, column: K, value: V) {
        self.values.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Logical datasets produced by the pipeline, one table each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Games,
    Standings,
    PlayerStatistics,
}

impl Entity {
    pub const ALL: [Entity; 3] = [Entity::Games, Entity::Standings, Entity::PlayerStatistics];

    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Games => "games",
            Entity::Standings => "standings",
            Entity::PlayerStatistics => "player_statistics",
        }
    }

    /// Load policy each dataset is reconciled with
    pub fn load_strategy(&self) -> LoadStrategy {
        match self {
            Entity::Games => LoadStrategy::Upsert,
            Entity::Standings => LoadStrategy::Upsert,
            Entity::PlayerStatistics => LoadStrategy::Overwrite,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStrategy {
    /// Append every record; existing keys are a constraint violation
    Insert,
    /// Insert new keys, replace non-key columns of existing keys
    Upsert,
    /// Replace the whole table with the batch
    Overwrite,
}

impl LoadStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStrategy::Insert => "insert",
            LoadStrategy::Upsert => "upsert",
            LoadStrategy::Overwrite => "overwrite",
        }
    }
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// League identifiers accepted by the api-sports basketball endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum League {
    Africa,
    Orlando,
    Sacramento,
    Standard,
    Utah,
    Vegas,
}

impl League {
    pub fn as_str(&self) -> &'static str {
        match self {
            League::Africa => "africa",
            League::Orlando => "orlando",
            League::Sacramento => "sacramento",
            League::Standard => "standard",
            League::Utah => "utah",
            League::Vegas => "vegas",
        }
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for League {
    type Err = crate::errors::EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "africa" => Ok(League::Africa),
            "orlando" => Ok(League::Orlando),
            "sacramento" => Ok(League::Sacramento),
            "standard" => Ok(League::Standard),
            "utah" => Ok(League::Utah),
            "vegas" => Ok(League::Vegas),
            other => Err(crate::errors::EtlError::configuration(format!(
                "unknown league '{other}', expected one of: africa, orlando, sacramento, standard, utah, vegas"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder_and_lookup() {
        let record = Record::new()
            .with("game_id", 1)
            .with("league", "standard")
            .with("home_team_score", 100.0)
            .with("winner_team_id", None::<i64>);

        assert_eq!(record.columns().count(), 4);
        assert_eq!(record.get("game_id"), Some(&Value::Integer(1)));
        assert!(record.get("winner_team_id").unwrap().is_null());
        assert_eq!(
            record.columns().collect::<Vec<_>>(),
            vec!["game_id", "home_team_score", "league", "winner_team_id"]
        );
    }

    #[test]
    fn test_designated_strategies() {
        assert_eq!(Entity::Games.load_strategy(), LoadStrategy::Upsert);
        assert_eq!(Entity::Standings.load_strategy(), LoadStrategy::Upsert);
        assert_eq!(
            Entity::PlayerStatistics.load_strategy(),
            LoadStrategy::Overwrite
        );
    }

    #[test]
    fn test_league_parsing() {
        assert_eq!("standard".parse::<League>().unwrap(), League::Standard);
        assert_eq!("Vegas".parse::<League>().unwrap(), League::Vegas);
        assert!("euroleague".parse::<League>().is_err());
    }

    #[test]
    fn test_value_display() {
        let date = NaiveDate::from_ymd_opt(2022, 10, 18).unwrap();
        assert_eq!(Value::Date(date).to_string(), "2022-10-18");
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::from(Some(3)).as_i64(), Some(3));
    }
}
