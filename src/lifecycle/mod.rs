//! Run lifecycle and metadata logging
//!
//! [`RunLifecycle::run`] brackets one pipeline execution: a `running` row is
//! persisted before the body starts and exactly one terminal update
//! (`success` or `failure`) is persisted after it finishes, carrying every
//! log line the body and its collaborators emitted. A failing or panicking
//! body is recorded as a failure and its error is returned to the caller
//! unchanged.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use tracing::error;
use tracing::instrument::WithSubscriber;

use crate::errors::{EtlError, EtlResult};

pub mod capture;
pub mod run_log;
pub mod store;

pub use capture::RunCaptureLayer;
pub use run_log::RunLog;
pub use store::{MetadataStore, RunMetadata, RunStatus, SqlMetadataStore};

pub struct RunLifecycle<S> {
    store: S,
    pipeline_name: String,
    config_snapshot: serde_json::Value,
    log_folder: Option<PathBuf>,
}

impl<S: MetadataStore> RunLifecycle<S> {
    pub fn new(store: S, pipeline_name: &str, config_snapshot: serde_json::Value) -> Self {
        Self {
            store,
            pipeline_name: pipeline_name.to_string(),
            config_snapshot,
            log_folder: None,
        }
    }

    /// Also write each run's log lines to a file in `folder`
    pub fn with_log_folder(mut self, folder: Option<PathBuf>) -> Self {
        self.log_folder = folder;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Execute `body` as one tracked run.
    ///
    /// Returns the body's output on success. If the start row can't be
    /// written the body is not executed and that error is returned. Tracing
    /// events emitted while the body runs are captured into the run's log.
    pub async fn run<F, Fut, T>(&self, body: F) -> EtlResult<T>
    where
        F: FnOnce(RunLog) -> Fut,
        Fut: Future<Output = EtlResult<T>>,
    {
        let log = RunLog::new(&self.pipeline_name);
        let run = RunMetadata::started(&self.pipeline_name, self.config_snapshot.clone());
        self.store.record_start(&run).await?;
        log.info(format!("Starting pipeline run {}", run.run_id));

        let outcome = match self.attach_log_file(&log) {
            Ok(()) => Self::execute(body, &log).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(value) => {
                log.info("Pipeline run successful");
                let finished = run.finished(RunStatus::Success, log.text());
                if let Err(store_err) = self.store.record_end(&finished).await {
                    error!(
                        "Run {} succeeded but its success could not be recorded: {}",
                        run.run_id, store_err
                    );
                    return Err(store_err);
                }
                Ok(value)
            }
            Err(err) => {
                log.error(format!(
                    "Pipeline run failed ({}). See detailed logs: {}",
                    err.kind(),
                    err
                ));
                let finished = run.finished(RunStatus::Failure, log.text());
                if let Err(store_err) = self.store.record_end(&finished).await {
                    error!(
                        "Failed to record failure of run {}: {}",
                        run.run_id, store_err
                    );
                }
                Err(err)
            }
        }
    }

    fn attach_log_file(&self, log: &RunLog) -> EtlResult<()> {
        if let Some(folder) = &self.log_folder {
            let path = log.attach_folder(folder)?;
            log.info(format!("Writing run log to {}", path.display()));
        }
        Ok(())
    }

    async fn execute<F, Fut, T>(body: F, log: &RunLog) -> EtlResult<T>
    where
        F: FnOnce(RunLog) -> Fut,
        Fut: Future<Output = EtlResult<T>>,
    {
        let capture = RunCaptureLayer::dispatch_for(log.clone());
        let future = tracing::dispatcher::with_default(&capture, || body(log.clone()));

        AssertUnwindSafe(future.with_subscriber(capture))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(EtlError::internal(format!(
                    "pipeline body panicked: {}",
                    panic_message(panic.as_ref())
                )))
            })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
