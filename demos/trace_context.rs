use lambda_trace_log::{critical, exception, get_logger, info, setup_trace_id, warning};

#[derive(Debug, thiserror::Error)]
#[error("connection reset by peer")]
struct ConnectionReset;

#[derive(Debug, thiserror::Error)]
#[error("forecast upload failed")]
struct UploadFailed(#[source] ConnectionReset);

fn main() -> Result<(), lambda_trace_log::ConfigError> {
    let logger = get_logger("RMRForecast", "DEBUG")?;

    let trace_id = setup_trace_id(&logger);
    info!(logger, "invocation started");
    info!(logger, { trace_id = "batch-7", rows = 120 }, "child batch processed");
    warning!(logger, "trace id is back to {}", trace_id);

    let err = UploadFailed(ConnectionReset);
    exception!(logger, Some(&err), "upload step failed");

    logger.clear_trace_id();
    critical!(logger, "no trace id on this line");
    Ok(())
}
