use crate::context::TraceContext;
use crate::env::{self, env_flag, env_or, Environment, LOG_INCLUDE_FIELDS_ENV, LOG_LEVEL_ENV};
use crate::exception::ExceptionInfo;
use crate::level::{ConfigError, Level};
use crate::record::{Fields, LogRecord};
use crate::registry::{self, Channel};
use crate::sink::{ConsoleSink, LogSink};
use chrono::Utc;
use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::panic::Location;
use std::path::Path;
use std::sync::Arc;

/// Configuration for [`Logger::with_config`].
///
/// **Fields**
/// - `level`: threshold name (`DEBUG`, `INFO`, `WARNING`, `ERROR`,
///   `CRITICAL`); parsed when the logger is built.
/// - `environment`: fixed environment; `None` classifies the process
///   environment once at construction.
/// - `sink`: destination of serialized lines; `None` writes to stderr.
/// - `include_fields`: append call fields as a `fields` object. Off by
///   default so log lines keep exactly the base key set.
#[derive(Clone)]
pub struct LoggerConfig {
    pub level: String,
    pub environment: Option<Environment>,
    pub sink: Option<Arc<dyn LogSink>>,
    pub include_fields: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: Level::Info.to_string(),
            environment: None,
            sink: None,
            include_fields: false,
        }
    }
}

impl LoggerConfig {
    /// Level from `LOG_LEVEL` (default `INFO`) and `LOG_INCLUDE_FIELDS`.
    pub fn from_env() -> Self {
        Self {
            level: env_or(LOG_LEVEL_ENV, Level::Info.as_str()),
            include_fields: env_flag(LOG_INCLUDE_FIELDS_ENV),
            ..Self::default()
        }
    }
}

/// Per-call options: explicit trace id, structured fields, and the calling
/// function name when the caller knows it.
#[derive(Debug, Clone, Default)]
pub struct LogArgs {
    pub trace_id: Option<String>,
    pub fields: Fields,
    pub function: Option<&'static str>,
}

impl LogArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `trace_id` for this call only.
    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Add a structured field. Values that fail to serialize are skipped.
    pub fn field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.fields.insert(key.into(), value);
        }
        self
    }

    pub fn function(mut self, name: &'static str) -> Self {
        self.function = Some(name);
        self
    }

    /// Macro entry point: `trace_id` sets the override, any other key
    /// becomes a field.
    #[doc(hidden)]
    pub fn entry(self, key: &str, value: impl Serialize) -> Self {
        if key != "trace_id" {
            return self.field(key, value);
        }
        match serde_json::to_value(value) {
            Ok(serde_json::Value::String(id)) => self.trace_id(id),
            _ => self,
        }
    }
}

/// Where a log call came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallSite {
    pub module: Option<String>,
    pub function: Option<String>,
    pub line: Option<u32>,
}

impl CallSite {
    /// `module` is the file stem of `file`, matching how log processors
    /// group records by source file.
    pub fn new(file: Option<&str>, line: Option<u32>) -> Self {
        CallSite {
            module: file
                .and_then(|f| Path::new(f).file_stem())
                .and_then(|stem| stem.to_str())
                .map(str::to_string),
            function: None,
            line,
        }
    }

    fn from_location(location: &Location<'_>) -> Self {
        Self::new(Some(location.file()), Some(location.line()))
    }
}

/// Leveled structured logger.
///
/// Each instance owns its trace context and its environment classification.
/// The output sink and threshold are shared by name: building a logger with
/// a name that already exists re-points every logger of that name at the new
/// sink, so reconfiguring never duplicates output.
pub struct Logger {
    name: String,
    environment: Environment,
    include_fields: bool,
    channel: Arc<Channel>,
    trace: TraceContext,
}

/// Build a logger writing to stderr at `level`.
pub fn get_logger(name: &str, level: &str) -> Result<Logger, ConfigError> {
    Logger::new(name, level)
}

impl Logger {
    pub fn new(name: impl Into<String>, level: &str) -> Result<Self, ConfigError> {
        Self::with_config(
            name,
            LoggerConfig {
                level: level.to_string(),
                ..LoggerConfig::default()
            },
        )
    }

    /// **Returns**
    /// - `Err(ConfigError::InvalidLevel)` if `config.level` names no level;
    ///   nothing is attached in that case.
    pub fn with_config(name: impl Into<String>, config: LoggerConfig) -> Result<Self, ConfigError> {
        let level: Level = config.level.parse()?;
        let name = name.into();
        let sink = config.sink.unwrap_or_else(|| Arc::new(ConsoleSink));
        let channel = registry::attach(&name, level, sink);

        Ok(Logger {
            environment: config.environment.unwrap_or_else(env::detect),
            include_fields: config.include_fields,
            channel,
            trace: TraceContext::new(),
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Current threshold of this logger's name.
    pub fn level(&self) -> Level {
        self.channel.level()
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        level >= self.level()
    }

    /// Set the trace id for all subsequent records.
    pub fn set_trace_id(&self, trace_id: impl Into<String>) {
        self.trace.set(trace_id);
    }

    pub fn clear_trace_id(&self) {
        self.trace.clear();
    }

    pub fn current_trace_id(&self) -> Option<String> {
        self.trace.get()
    }

    #[track_caller]
    pub fn debug(&self, message: impl fmt::Display) {
        self.log(Level::Debug, message, LogArgs::default());
    }

    #[track_caller]
    pub fn info(&self, message: impl fmt::Display) {
        self.log(Level::Info, message, LogArgs::default());
    }

    #[track_caller]
    pub fn warning(&self, message: impl fmt::Display) {
        self.log(Level::Warning, message, LogArgs::default());
    }

    #[track_caller]
    pub fn error(&self, message: impl fmt::Display) {
        self.log(Level::Error, message, LogArgs::default());
    }

    #[track_caller]
    pub fn critical(&self, message: impl fmt::Display) {
        self.log(Level::Critical, message, LogArgs::default());
    }

    #[track_caller]
    pub fn debug_with(&self, message: impl fmt::Display, args: LogArgs) {
        self.log(Level::Debug, message, args);
    }

    #[track_caller]
    pub fn info_with(&self, message: impl fmt::Display, args: LogArgs) {
        self.log(Level::Info, message, args);
    }

    #[track_caller]
    pub fn warning_with(&self, message: impl fmt::Display, args: LogArgs) {
        self.log(Level::Warning, message, args);
    }

    #[track_caller]
    pub fn error_with(&self, message: impl fmt::Display, args: LogArgs) {
        self.log(Level::Error, message, args);
    }

    #[track_caller]
    pub fn critical_with(&self, message: impl fmt::Display, args: LogArgs) {
        self.log(Level::Critical, message, args);
    }

    #[track_caller]
    pub fn log(&self, level: Level, message: impl fmt::Display, args: LogArgs) {
        let site = CallSite::from_location(Location::caller());
        self.emit(level, &message, args, site, None);
    }

    /// Log at `ERROR` with the error's type, message, root cause and the
    /// tail of its trace. With `error = None` the exception keys are still
    /// present, all null.
    #[track_caller]
    pub fn exception(
        &self,
        message: impl fmt::Display,
        error: Option<&(dyn Error + 'static)>,
        args: LogArgs,
    ) {
        if !self.is_enabled(Level::Error) {
            return;
        }
        let site = CallSite::from_location(Location::caller());
        let info = ExceptionInfo::capture(error);
        self.emit(Level::Error, &message, args, site, Some(info));
    }

    pub(crate) fn emit(
        &self,
        level: Level,
        message: &dyn fmt::Display,
        args: LogArgs,
        site: CallSite,
        exception: Option<ExceptionInfo>,
    ) {
        let Some(sink) = self.channel.sink_for(level) else {
            return;
        };

        let LogArgs {
            trace_id,
            fields,
            function,
        } = args;
        let fields = (self.include_fields && !fields.is_empty()).then_some(fields);
        let message = message.to_string();

        let record = LogRecord {
            timestamp: Utc::now(),
            level,
            environment: self.environment,
            trace_id: self.trace.effective(trace_id.as_deref()),
            logger_name: self.name.clone(),
            message,
            module: site.module,
            function: function.map(str::to_string).or(site.function),
            line: site.line,
            exception,
            fields,
        };
        write_record(sink.as_ref(), record);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("environment", &self.environment)
            .field("level", &self.level())
            .field("trace_id", &self.current_trace_id())
            .finish()
    }
}

fn write_record(sink: &dyn LogSink, mut record: LogRecord) {
    let line = match record.to_json_line() {
        Ok(line) => line,
        Err(_) => {
            // Drop the optional part and keep the core record.
            record.fields = None;
            match record.to_json_line() {
                Ok(line) => line,
                Err(_) => return,
            }
        }
    };
    let _ = sink.send(&line);
}
