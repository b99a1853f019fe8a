use std::sync::{Mutex, PoisonError};

/// Current trace id of one logger instance.
///
/// A per-call override never touches the stored value, so callers sharing
/// the instance never see someone else's override.
#[derive(Debug, Default)]
pub struct TraceContext {
    current: Mutex<Option<String>>,
}

impl TraceContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, trace_id: impl Into<String>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(trace_id.into());
    }

    pub fn clear(&self) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn get(&self) -> Option<String> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Trace id for one call: `explicit` when it is given and non-empty,
    /// otherwise the current value. The lock is released before returning.
    pub fn effective(&self, explicit: Option<&str>) -> Option<String> {
        match explicit.filter(|id| !id.is_empty()) {
            Some(id) => Some(id.to_string()),
            None => self.get(),
        }
    }
}
