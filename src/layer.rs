use crate::level::Level;
use crate::logger::{CallSite, LogArgs, Logger};
use crate::record::Fields;
use std::fmt;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns `tracing` events into structured
/// records emitted through a [`Logger`].
///
/// Events pick up the logger's environment and current trace id; a
/// `trace_id` field on the event overrides it for that event only. The
/// logger's threshold applies, so events below it are counted but not
/// written.
pub struct LoggerLayer {
    logger: Arc<Logger>,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Events that passed the logger's threshold.
    pub emitted_events: Arc<AtomicU64>,
}

impl LoggerLayer {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self {
            logger,
            total_events: Arc::new(AtomicU64::new(0)),
            emitted_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<S> Layer<S> for LoggerLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        let level = Level::from(meta.level());
        if !self.logger.is_enabled(level) {
            return;
        }

        let mut fields = Fields::new();
        let mut message: Option<String> = None;
        let mut trace_id: Option<String> = None;

        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
            trace_id: &mut trace_id,
        };
        event.record(&mut visitor);

        let args = LogArgs {
            trace_id,
            fields,
            function: None,
        };
        let site = CallSite::new(meta.file(), meta.line());
        let message = message.unwrap_or_default();

        self.emitted_events.fetch_add(1, Ordering::Relaxed);
        self.logger.emit(level, &message, args, site, None);
    }
}

/// Collects event fields; `message` and `trace_id` are pulled out of the
/// field map.
pub struct FieldVisitor<'a> {
    pub fields: &'a mut Fields,
    pub message: &'a mut Option<String>,
    pub trace_id: &'a mut Option<String>,
}

impl<'a> FieldVisitor<'a> {
    fn insert_str(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => *self.message = Some(value),
            "trace_id" => *self.trace_id = Some(value),
            name => {
                self.fields.insert(name.to_string(), serde_json::Value::String(value));
            }
        }
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert_str(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert_str(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert_str(field, format!("{:?}", value));
    }
}
