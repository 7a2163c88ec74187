use chrono::{SecondsFormat, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::Level;

use crate::errors::{EtlError, EtlResult};

/// Target of the events [`RunLog`] mirrors to `tracing`
pub(crate) const RUN_LOG_TARGET: &str = module_path!();

/// Log collector for one pipeline run.
///
/// Every line is forwarded to `tracing`, kept in memory so it can be stored
/// with the run's metadata row, and appended to the run's log file once one
/// is attached. Clones share the same buffer.
#[derive(Clone)]
pub struct RunLog {
    pipeline_name: Arc<str>,
    inner: Arc<Mutex<RunLogInner>>,
}

struct RunLogInner {
    lines: Vec<String>,
    file: Option<File>,
    path: Option<PathBuf>,
}

impl RunLog {
    pub fn new(pipeline_name: &str) -> Self {
        Self {
            pipeline_name: Arc::from(pipeline_name),
            inner: Arc::new(Mutex::new(RunLogInner {
                lines: Vec::new(),
                file: None,
                path: None,
            })),
        }
    }

    /// Start writing to `<folder>/<pipeline>_<timestamp>.log`, beginning with
    /// every line collected so far.
    pub fn attach_folder(&self, folder: &Path) -> EtlResult<PathBuf> {
        std::fs::create_dir_all(folder).map_err(|e| {
            EtlError::configuration(format!(
                "cannot create log folder {}: {e}",
                folder.display()
            ))
        })?;

        let file_name = format!(
            "{}_{}.log",
            self.pipeline_name,
            Utc::now().format("%Y%m%d_%H%M%S%.3f")
        );
        let path = folder.join(file_name);
        let open_error =
            |e: std::io::Error| EtlError::configuration(format!("cannot open log file {}: {e}", path.display()));
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(open_error)?;

        let mut inner = self.lock();
        for line in &inner.lines {
            writeln!(file, "{line}").map_err(open_error)?;
        }
        inner.file = Some(file);
        inner.path = Some(path.clone());
        Ok(path)
    }

    pub fn info(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::info!(pipeline = %self.pipeline_name, "{}", message);
        self.append(Level::INFO, message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::warn!(pipeline = %self.pipeline_name, "{}", message);
        self.append(Level::WARN, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::error!(pipeline = %self.pipeline_name, "{}", message);
        self.append(Level::ERROR, message);
    }

    /// Everything collected so far, one line per entry
    pub fn text(&self) -> String {
        self.lock().lines.join("\n")
    }

    pub fn lines(&self) -> Vec<String> {
        self.lock().lines.clone()
    }

    pub fn file_path(&self) -> Option<PathBuf> {
        self.lock().path.clone()
    }

    pub(crate) fn append(&self, level: Level, message: &str) {
        let line = format!(
            "{} - {} - {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            message
        );

        let write_result = {
            let mut inner = self.lock();
            let result = match inner.file.as_mut() {
                Some(file) => writeln!(file, "{line}"),
                None => Ok(()),
            };
            inner.lines.push(line);
            result
        };

        if let Err(e) = write_result {
            tracing::warn!("Failed to write run log file: {}", e);
        }
    }

    // A poisoned buffer still holds every line written before the panic.
    fn lock(&self) -> std::sync::MutexGuard<'_, RunLogInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_are_collected_in_order() {
        let log = RunLog::new("nba");
        log.info("Starting pipeline run");
        log.warn("No games returned");
        log.error("Pipeline run failed");

        let lines = log.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with(" - INFO - Starting pipeline run"));
        assert!(lines[1].ends_with(" - WARN - No games returned"));
        assert!(lines[2].ends_with(" - ERROR - Pipeline run failed"));
        assert_eq!(log.text().lines().count(), 3);
    }

    #[test]
    fn test_clones_share_buffer() {
        let log = RunLog::new("nba");
        let other = log.clone();
        other.info("from clone");
        assert!(log.text().contains("from clone"));
    }

    #[test]
    fn test_attached_folder_receives_backlog_and_new_lines() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("logs");
        let log = RunLog::new("nba");
        log.info("Starting pipeline run");

        let path = log.attach_folder(&folder).unwrap();
        log.info("Extracting games");

        assert_eq!(log.file_path(), Some(path.clone()));
        assert!(path.starts_with(&folder));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("nba_"));
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("INFO - Starting pipeline run"));
        assert!(contents.contains("INFO - Extracting games"));
    }

    #[test]
    fn test_attach_folder_under_file_fails() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let log = RunLog::new("nba");
        let err = log.attach_folder(&file.path().join("logs")).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::ConfigurationError);
        assert!(log.file_path().is_none());
    }
}
