use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use crate::database::Database;
use crate::errors::{EtlError, EtlResult};
use crate::utils::datetime::parse_timestamp;

const RUNS_TABLE: &str = "pipeline_runs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failure,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failure => "failure",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "success" => Ok(RunStatus::Success),
            "failure" => Ok(RunStatus::Failure),
            other => Err(EtlError::store(format!("unknown run status '{other}'"))),
        }
    }
}

/// Audit row describing one pipeline execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub pipeline_name: String,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub log_text: String,
    pub config_snapshot: serde_json::Value,
}

impl RunMetadata {
    pub fn started(pipeline_name: &str, config_snapshot: serde_json::Value) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline_name: pipeline_name.to_string(),
            status: RunStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            log_text: String::new(),
            config_snapshot,
        }
    }

    /// Terminal copy of this run; `status` must be success or failure
    pub fn finished(&self, status: RunStatus, log_text: String) -> Self {
        Self {
            status,
            end_time: Some(Utc::now()),
            log_text,
            ..self.clone()
        }
    }
}

/// Persistence for run metadata rows
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Persist a new row with status `running`
    async fn record_start(&self, run: &RunMetadata) -> EtlResult<()>;

    /// Move a `running` row to its terminal status. Rows that are not
    /// `running` are never updated.
    async fn record_end(&self, run: &RunMetadata) -> EtlResult<()>;
}

/// [`MetadataStore`] backed by the metadata SQLite database
#[derive(Clone)]
pub struct SqlMetadataStore {
    pool: SqlitePool,
}

impl SqlMetadataStore {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool(),
        }
    }

    /// Create the runs table if it doesn't exist
    pub async fn initialize(&self) -> EtlResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pipeline_runs (
                run_id TEXT PRIMARY KEY NOT NULL,
                pipeline_name TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('running', 'success', 'failure')),
                start_time TEXT NOT NULL,
                end_time TEXT,
                log_text TEXT NOT NULL DEFAULT '',
                config_snapshot TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| EtlError::from_store(RUNS_TABLE, e))?;
        Ok(())
    }

    pub async fn get_run(&self, run_id: Uuid) -> EtlResult<Option<RunMetadata>> {
        let row = sqlx::query(
            "SELECT run_id, pipeline_name, status, start_time, end_time, log_text, config_snapshot
             FROM pipeline_runs WHERE run_id = ?",
        )
        .bind(run_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| EtlError::from_store(RUNS_TABLE, e))?;

        row.map(|row| Self::row_to_run(&row)).transpose()
    }

    /// Runs of `pipeline_name`, oldest first
    pub async fn list_runs(&self, pipeline_name: &str) -> EtlResult<Vec<RunMetadata>> {
        let rows = sqlx::query(
            "SELECT run_id, pipeline_name, status, start_time, end_time, log_text, config_snapshot
             FROM pipeline_runs WHERE pipeline_name = ? ORDER BY start_time, rowid",
        )
        .bind(pipeline_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EtlError::from_store(RUNS_TABLE, e))?;

        rows.iter().map(Self::row_to_run).collect()
    }

    fn row_to_run(row: &sqlx::sqlite::SqliteRow) -> EtlResult<RunMetadata> {
        let decode = |e: sqlx::Error| EtlError::from_store(RUNS_TABLE, e);

        let run_id: String = row.try_get("run_id").map_err(decode)?;
        let status: String = row.try_get("status").map_err(decode)?;
        let start_time: String = row.try_get("start_time").map_err(decode)?;
        let end_time: Option<String> = row.try_get("end_time").map_err(decode)?;
        let config_snapshot: String = row.try_get("config_snapshot").map_err(decode)?;

        Ok(RunMetadata {
            run_id: Uuid::parse_str(&run_id)
                .map_err(|e| EtlError::store(format!("invalid run id '{run_id}': {e}")))?,
            pipeline_name: row.try_get("pipeline_name").map_err(decode)?,
            status: status.parse()?,
            start_time: parse_timestamp(&start_time)?,
            end_time: end_time.as_deref().map(parse_timestamp).transpose()?,
            log_text: row.try_get("log_text").map_err(decode)?,
            config_snapshot: serde_json::from_str(&config_snapshot)
                .map_err(|e| EtlError::store(format!("invalid config snapshot: {e}")))?,
        })
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl MetadataStore for SqlMetadataStore {
    async fn record_start(&self, run: &RunMetadata) -> EtlResult<()> {
        sqlx::query(
            r#"
            INSERT INTO pipeline_runs (run_id, pipeline_name, status, start_time, end_time, log_text, config_snapshot)
            VALUES (?, ?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(run.run_id.to_string())
        .bind(&run.pipeline_name)
        .bind(RunStatus::Running.as_str())
        .bind(format_timestamp(&run.start_time))
        .bind(&run.log_text)
        .bind(run.config_snapshot.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| EtlError::from_store(RUNS_TABLE, e))?;

        debug!("Recorded start of run {} ({})", run.run_id, run.pipeline_name);
        Ok(())
    }

    async fn record_end(&self, run: &RunMetadata) -> EtlResult<()> {
        if !run.status.is_terminal() {
            return Err(EtlError::store(format!(
                "run {} cannot end with status {}",
                run.run_id, run.status
            )));
        }

        let result = sqlx::query(
            r#"
            UPDATE pipeline_runs
            SET status = ?, end_time = ?, log_text = ?
            WHERE run_id = ? AND status = 'running'
            "#,
        )
        .bind(run.status.as_str())
        .bind(run.end_time.as_ref().map(format_timestamp))
        .bind(&run.log_text)
        .bind(run.run_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| EtlError::from_store(RUNS_TABLE, e))?;

        if result.rows_affected() != 1 {
            return Err(EtlError::store(format!(
                "run {} is not in running state",
                run.run_id
            )));
        }

        debug!("Recorded end of run {} as {}", run.run_id, run.status);
        Ok(())
    }
}
