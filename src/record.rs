use crate::env::Environment;
use crate::exception::ExceptionInfo;
use crate::level::Level;
use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::io;

/// Structured call context attached to a log call.
pub type Fields = BTreeMap<String, serde_json::Value>;

/// One structured log event, built right before it is written and
/// discarded afterwards.
///
/// Field order is the key order of the emitted JSON line.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub environment: Environment,
    pub trace_id: Option<String>,
    #[serde(rename = "logger")]
    pub logger_name: String,
    pub message: String,
    pub module: Option<String>,
    pub function: Option<String>,
    pub line: Option<u32>,
    #[serde(flatten)]
    pub exception: Option<ExceptionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Fields>,
}

impl LogRecord {
    /// Serialize as a single-line JSON document.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        to_json_line(self)
    }
}

/// ISO-8601 with an explicit `+00:00` offset; the fractional part is
/// omitted when the timestamp falls on a whole second.
fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    let format = if ts.nanosecond() / 1_000 == 0 {
        SecondsFormat::Secs
    } else {
        SecondsFormat::Micros
    };
    s.serialize_str(&ts.to_rfc3339_opts(format, false))
}

/// Compact JSON with `", "` and `": "` separators, the layout downstream
/// log processors already parse. Non-ASCII text is written literally.
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

/// Serialize any value on one line using the log line layout.
pub fn to_json_line<T: ?Sized + Serialize>(value: &T) -> serde_json::Result<String> {
    let mut buf = Vec::with_capacity(256);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8(buf).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
}
