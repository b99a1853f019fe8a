use serde::Serialize;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::io;

/// Number of trailing lines of the formatted trace kept on a record.
pub const TRACEBACK_LINES: usize = 10;

/// Exception enrichment attached to records logged through
/// [`Logger::exception`](crate::logger::Logger::exception).
///
/// Every field is nullable: a record on the exception path always carries
/// all five keys, even when no error was supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExceptionInfo {
    pub exception_type: Option<String>,
    pub exception_message: Option<String>,
    pub root_cause_type: Option<String>,
    pub root_cause_message: Option<String>,
    pub traceback: Option<String>,
}

impl ExceptionInfo {
    /// Summarize `error`, capturing a backtrace of the caller when the
    /// runtime has backtraces enabled (`RUST_BACKTRACE` / `RUST_LIB_BACKTRACE`).
    pub fn capture(error: Option<&(dyn Error + 'static)>) -> Self {
        match error {
            Some(error) => Self::from_error(error, Some(&Backtrace::capture())),
            None => Self::default(),
        }
    }

    pub fn from_error(error: &(dyn Error + 'static), backtrace: Option<&Backtrace>) -> Self {
        let root = root_cause(error);
        ExceptionInfo {
            exception_type: Some(type_label(error)),
            exception_message: Some(error.to_string()),
            root_cause_type: Some(type_label(root)),
            root_cause_message: Some(root.to_string()),
            traceback: Some(format_traceback(error, backtrace)),
        }
    }
}

/// Follow `source()` links to the innermost error.
pub fn root_cause<'a>(error: &'a (dyn Error + 'static)) -> &'a (dyn Error + 'static) {
    let mut current = error;
    while let Some(next) = current.source() {
        current = next;
    }
    current
}

/// Best-effort type name for an error behind `dyn Error`.
///
/// Trait objects carry no type name, so this reads the leading identifier
/// of the `Debug` output: the struct name for derived structs, the variant
/// name for derived enums. `io::Error` is labelled by its kind
/// (`ConnectionRefused`, `TimedOut`, ...) since its `Debug` form shows the
/// internal representation. Anything else is labelled `Error`.
pub fn type_label(error: &(dyn Error + 'static)) -> String {
    if let Some(io_error) = error.downcast_ref::<io::Error>() {
        return io_label(io_error);
    }

    let debug = format!("{error:?}");
    let head: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    let name = head
        .trim_end_matches(':')
        .rsplit("::")
        .next()
        .unwrap_or_default();

    if name.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        name.to_string()
    } else {
        "Error".to_string()
    }
}

fn io_label(error: &io::Error) -> String {
    match error.kind() {
        io::ErrorKind::Other => "io::Error".to_string(),
        kind => format!("{kind:?}"),
    }
}

/// Render captured frames (outermost first, so the innermost frames sit
/// next to the error) followed by the error chain (innermost first, one
/// `Type: message` line per error) and keep the last [`TRACEBACK_LINES`]
/// lines.
pub fn format_traceback(error: &(dyn Error + 'static), backtrace: Option<&Backtrace>) -> String {
    let mut lines: Vec<String> = Vec::new();

    if let Some(bt) = backtrace.filter(|bt| bt.status() == BacktraceStatus::Captured) {
        let rendered = bt.to_string();
        let frames = caller_frames(&rendered);
        lines.extend(frames.iter().rev().flatten().map(|l| l.to_string()));
    }

    let mut chain: Vec<&(dyn Error + 'static)> = vec![error];
    let mut current = error;
    while let Some(next) = current.source() {
        chain.push(next);
        current = next;
    }
    chain.reverse();
    lines.extend(chain.iter().map(|e| format!("{}: {}", type_label(*e), e)));

    let start = lines.len().saturating_sub(TRACEBACK_LINES);
    lines[start..].join("\n").trim().to_string()
}

/// Split a rendered backtrace into frames, innermost first, dropping the
/// frames of the capture machinery itself.
///
/// A frame starts at a numbered line (`  12: symbol`); the `at file:line`
/// and inlined-symbol lines that follow belong to it.
fn caller_frames(rendered: &str) -> Vec<Vec<&str>> {
    let mut frames: Vec<Vec<&str>> = Vec::new();
    for line in rendered.lines() {
        if is_frame_start(line) {
            frames.push(vec![line]);
        } else if let Some(frame) = frames.last_mut() {
            frame.push(line);
        }
    }

    let skip = frames
        .iter()
        .take_while(|frame| frame.first().is_some_and(|head| is_capture_frame(head)))
        .count();
    frames.split_off(skip)
}

fn is_frame_start(line: &str) -> bool {
    let trimmed = line.trim_start();
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && trimmed[digits..].starts_with(':')
}

fn is_capture_frame(head: &str) -> bool {
    head.contains("backtrace")
        || head.contains("ExceptionInfo::capture")
        || head.contains("Logger::exception")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("connection refused")]
    struct ConnectRefused;

    #[derive(Debug, thiserror::Error)]
    #[error("token request failed")]
    struct TokenFailed(#[source] ConnectRefused);

    #[derive(Debug, thiserror::Error)]
    #[error("invocation failed")]
    struct InvocationFailed {
        #[source]
        source: TokenFailed,
    }

    #[derive(Debug, thiserror::Error)]
    enum Layered {
        #[error("layer {0}")]
        Wrap(usize, #[source] Box<Layered>),
        #[error("bottom")]
        Bottom,
    }

    fn chained() -> InvocationFailed {
        InvocationFailed {
            source: TokenFailed(ConnectRefused),
        }
    }

    #[test]
    fn finds_innermost_cause() {
        let err = chained();
        let root = root_cause(&err);
        assert_eq!(root.to_string(), "connection refused");
    }

    #[test]
    fn error_without_source_is_its_own_root() {
        let err = ConnectRefused;
        let info = ExceptionInfo::from_error(&err, None);
        assert_eq!(info.exception_type, info.root_cause_type);
        assert_eq!(info.exception_message.as_deref(), Some("connection refused"));
    }

    #[test]
    fn labels_from_debug_output() {
        assert_eq!(type_label(&ConnectRefused), "ConnectRefused");
        assert_eq!(type_label(&TokenFailed(ConnectRefused)), "TokenFailed");
        assert_eq!(type_label(&chained()), "InvocationFailed");
        assert_eq!(type_label(&Layered::Bottom), "Bottom");

        let boxed: Box<dyn Error> = "plain message".into();
        assert_eq!(type_label(boxed.as_ref()), "Error");
    }

    #[test]
    fn io_errors_are_labelled_by_kind() {
        let refused = io::Error::from_raw_os_error(111);
        if refused.kind() == io::ErrorKind::ConnectionRefused {
            assert_eq!(type_label(&refused), "ConnectionRefused");
        }
        assert_eq!(type_label(&io::Error::from(io::ErrorKind::NotFound)), "NotFound");
        assert_eq!(type_label(&io::Error::other("boom")), "io::Error");
    }

    #[derive(Debug, thiserror::Error)]
    #[error("token request failed")]
    struct TransportFailed(#[source] io::Error);

    #[test]
    fn io_root_cause_is_labelled_by_kind() {
        let err = TransportFailed(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"));
        let info = ExceptionInfo::from_error(&err, None);
        assert_eq!(info.exception_type.as_deref(), Some("TransportFailed"));
        assert_eq!(info.root_cause_type.as_deref(), Some("ConnectionRefused"));
        assert_eq!(info.root_cause_message.as_deref(), Some("connection refused"));
        assert!(info
            .traceback
            .unwrap()
            .starts_with("ConnectionRefused: connection refused"));
    }

    #[test]
    fn captured_frames_end_at_call_site() {
        let backtrace = Backtrace::force_capture();
        let traceback = format_traceback(&ConnectRefused, Some(&backtrace));
        let lines: Vec<&str> = traceback.lines().collect();

        assert!(lines.len() <= TRACEBACK_LINES);
        assert_eq!(lines.last().copied(), Some("ConnectRefused: connection refused"));
        assert!(!traceback.contains("thread_start"), "{traceback}");
        assert!(!traceback.contains("backtrace_rs"), "{traceback}");
        assert!(traceback.contains("captured_frames_end_at_call_site"), "{traceback}");
    }

    #[test]
    fn frames_are_grouped_and_capture_frames_skipped() {
        let rendered = "   0: std::backtrace::Backtrace::create\n\
                        \x20            at /rustc/library/std/src/backtrace.rs:331:13\n\
                        \x20  1: app::handler\n\
                        \x20            at ./src/handler.rs:10:5\n\
                        \x20  2: app::main\n";
        let frames = caller_frames(rendered);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].len(), 2);
        assert!(frames[0][0].ends_with("app::handler"));
        assert!(frames[1][0].ends_with("app::main"));
    }

    #[test]
    fn summarizes_chain() {
        let info = ExceptionInfo::from_error(&chained(), None);
        assert_eq!(info.exception_type.as_deref(), Some("InvocationFailed"));
        assert_eq!(info.exception_message.as_deref(), Some("invocation failed"));
        assert_eq!(info.root_cause_type.as_deref(), Some("ConnectRefused"));
        assert_eq!(info.root_cause_message.as_deref(), Some("connection refused"));
        assert_eq!(
            info.traceback.as_deref(),
            Some(
                "ConnectRefused: connection refused\n\
                 TokenFailed: token request failed\n\
                 InvocationFailed: invocation failed"
            )
        );
    }

    #[test]
    fn traceback_keeps_last_lines_only() {
        let mut err = Layered::Bottom;
        for i in 0..12 {
            err = Layered::Wrap(i, Box::new(err));
        }

        let traceback = format_traceback(&err, Some(&Backtrace::capture()));
        let lines: Vec<&str> = traceback.lines().collect();
        assert_eq!(lines.len(), TRACEBACK_LINES);
        assert_eq!(lines.last().copied(), Some("Wrap: layer 11"));
        assert!(!traceback.contains("bottom"));
    }

    #[test]
    fn missing_error_yields_null_fields() {
        let info = ExceptionInfo::capture(None);
        assert_eq!(info, ExceptionInfo::default());
        let json = serde_json::to_value(&info).unwrap();
        assert!(json["exception_type"].is_null());
        assert!(json["traceback"].is_null());
    }
}
