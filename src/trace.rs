use crate::logger::Logger;
use uuid::Uuid;

/// Fixed suffix kept for compatibility with the `pid@host/guid-span` id
/// shape used by the distributed tracing side. Carries no entropy.
pub const ZERO_SUFFIX: &str = "0000000000000000";

/// `"{pid}@{hostname}/"`, shared by every id generated in this process.
pub fn trace_id_prefix() -> String {
    let hostname = gethostname::gethostname();
    format!("{}@{}/", std::process::id(), hostname.to_string_lossy())
}

/// Generate a new trace id: `{pid}@{hostname}/{uuid4}-{16 zeros}`.
pub fn generate_trace_id() -> String {
    format!("{}{}-{}", trace_id_prefix(), Uuid::new_v4(), ZERO_SUFFIX)
}

/// Generate a trace id, make it the logger's current one and return it.
pub fn setup_trace_id(logger: &Logger) -> String {
    let trace_id = generate_trace_id();
    logger.set_trace_id(trace_id.clone());
    trace_id
}
