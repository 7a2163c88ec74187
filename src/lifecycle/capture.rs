//! Per-run tracing capture
//!
//! While a run body is polled, [`RunCaptureLayer`] is the default subscriber:
//! every event the body or its collaborators (loader, source, database) emit
//! at `INFO` or above is appended to the run's [`RunLog`], then handed on to
//! the subscriber that was active when the run started so console output is
//! unchanged.

use std::fmt::Write;
use tracing::field::{Field, Visit};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use super::run_log::{RunLog, RUN_LOG_TARGET};

pub struct RunCaptureLayer {
    log: RunLog,
    forward: Dispatch,
}

impl RunCaptureLayer {
    pub fn new(log: RunLog, forward: Dispatch) -> Self {
        Self { log, forward }
    }

    /// Dispatcher capturing into `log` and forwarding to the current default
    pub fn dispatch_for(log: RunLog) -> Dispatch {
        let forward = tracing::dispatcher::get_default(Dispatch::clone);
        Dispatch::new(tracing_subscriber::registry().with(Self::new(log, forward)))
    }
}

impl<S> Layer<S> for RunCaptureLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();

        // RunLog writes its own lines directly
        if metadata.target() != RUN_LOG_TARGET && *metadata.level() <= Level::INFO {
            let mut visitor = MessageVisitor::default();
            event.record(&mut visitor);
            self.log.append(*metadata.level(), &visitor.finish());
        }

        if self.forward.enabled(metadata) {
            self.forward.event(event);
        }
    }
}

/// Renders an event as its message followed by `key=value` fields
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields
        } else {
            format!("{} {}", self.message, self.fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let sep = if self.fields.is_empty() { "" } else { " " };
            let _ = write!(self.fields, "{sep}{}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let sep = if self.fields.is_empty() { "" } else { " " };
            let _ = write!(self.fields, "{sep}{}={:?}", field.name(), value);
        }
    }
}
