use crate::layer::LoggerLayer;
use crate::logger::Logger;
use std::sync::Arc;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Install a global `tracing` subscriber that routes every event through
/// `logger`.
///
/// **Parameters**
/// - `logger`: the [`Logger`] whose environment, trace context and sink
///   the events are written with.
///
/// **Returns**
/// - `Err(..)` if a global default subscriber is already installed.
pub fn try_init_tracing(logger: Arc<Logger>) -> Result<(), SetGlobalDefaultError> {
    let subscriber = Registry::default().with(LoggerLayer::new(logger));
    tracing::subscriber::set_global_default(subscriber)
}

/// Like [`try_init_tracing`], but a second installation is reported on
/// stderr and otherwise ignored.
pub fn init_tracing(logger: Arc<Logger>) {
    if let Err(e) = try_init_tracing(logger) {
        eprintln!("tracing subscriber already installed: {}", e);
    }
}
