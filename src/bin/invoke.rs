//! Run one invocation locally and print the response envelope.

use std::sync::Arc;

use lambda_trace_log::init::init_tracing;
use lambda_trace_log::invocation::secrets::ExtensionSecretStore;
use lambda_trace_log::invocation::{HandlerConfig, InvocationDriver};
use lambda_trace_log::record::to_json_line;
use lambda_trace_log::{Logger, LoggerConfig};

const LOGGER_NAME: &str = "RMRForecast";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine; the process environment still applies.
    let _ = dotenvy::dotenv();

    let logger = Arc::new(Logger::with_config(LOGGER_NAME, LoggerConfig::from_env())?);
    init_tracing(Arc::clone(&logger));

    let driver = InvocationDriver::new(
        logger,
        Arc::new(ExtensionSecretStore::from_env()),
        HandlerConfig::from_env(),
    );

    let response = driver.handle().await;
    println!("{}", to_json_line(&response)?);

    if response.status_code != 200 {
        std::process::exit(1);
    }
    Ok(())
}
