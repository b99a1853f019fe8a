use crate::level::Level;
use crate::sink::LogSink;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

/// Output attachment shared by every logger constructed with the same name.
///
/// Only the sink and threshold live here; trace context stays on each
/// logger instance.
pub(crate) struct Channel {
    state: RwLock<Attachment>,
}

#[derive(Clone)]
struct Attachment {
    level: Level,
    sink: Arc<dyn LogSink>,
}

impl Channel {
    pub(crate) fn level(&self) -> Level {
        self.state.read().unwrap_or_else(PoisonError::into_inner).level
    }

    /// Sink to emit a `level` record through, or `None` if it is filtered.
    pub(crate) fn sink_for(&self, level: Level) -> Option<Arc<dyn LogSink>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        (level >= state.level).then(|| Arc::clone(&state.sink))
    }
}

fn channels() -> &'static Mutex<HashMap<String, Arc<Channel>>> {
    static CHANNELS: OnceLock<Mutex<HashMap<String, Arc<Channel>>>> = OnceLock::new();
    CHANNELS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Attach `sink` at `level` to the channel named `name`, replacing any
/// previous attachment so existing loggers of that name stop writing to
/// the old sink.
pub(crate) fn attach(name: &str, level: Level, sink: Arc<dyn LogSink>) -> Arc<Channel> {
    let mut map = channels().lock().unwrap_or_else(PoisonError::into_inner);
    let channel = map
        .entry(name.to_string())
        .or_insert_with(|| {
            Arc::new(Channel {
                state: RwLock::new(Attachment {
                    level,
                    sink: Arc::clone(&sink),
                }),
            })
        })
        .clone();
    drop(map);

    let mut state = channel.state.write().unwrap_or_else(PoisonError::into_inner);
    *state = Attachment { level, sink };
    drop(state);

    channel
}
