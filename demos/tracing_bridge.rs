use std::sync::Arc;

use lambda_trace_log::init::init_tracing;
use lambda_trace_log::{setup_trace_id, Logger, LoggerConfig};
use tracing::{debug, error, info};

fn main() -> Result<(), lambda_trace_log::ConfigError> {
    let logger = Arc::new(Logger::with_config(
        "auth-service",
        LoggerConfig {
            include_fields: true,
            ..LoggerConfig::default()
        },
    )?);
    init_tracing(Arc::clone(&logger));

    setup_trace_id(&logger);
    debug!("below the INFO threshold, not written");
    info!("starting service");
    error!(user_id = 42, reason = "invalid password", "authentication failed");

    logger.clear_trace_id();
    Ok(())
}
