//! Single-line JSON logging with per-invocation trace ids.
//!
//! A [`Logger`] stamps every record with the deployment environment, the
//! current trace id and the call site, and writes it as one JSON line to
//! stderr. [`setup_trace_id`] starts a new trace for an invocation;
//! [`Logger::exception`] adds root-cause and traceback details to error
//! records.
//!
//! With the `invocation` feature (on by default) the crate also provides the
//! serverless handler that uses the logger: secret → token → protected API.

pub mod context;
pub mod env;
pub mod exception;
pub mod level;
pub mod logger;
pub mod record;
pub mod sink;
pub mod trace;

mod macros;
mod registry;

pub mod init;
pub mod layer;

#[cfg(feature = "invocation")]
pub mod invocation;

pub use env::Environment;
pub use level::{ConfigError, Level};
pub use logger::{get_logger, LogArgs, Logger, LoggerConfig};
pub use trace::{generate_trace_id, setup_trace_id};
