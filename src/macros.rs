//! Logging macros that also capture the calling function's name.
//!
//! ```no_run
//! use lambda_trace_log::{get_logger, info, exception};
//!
//! let logger = get_logger("RMRForecast", "INFO").unwrap();
//! info!(logger, "retrieved credentials for user: {}", "svc-report");
//! info!(logger, { trace_id = "req-1", attempt = 2 }, "retrying");
//!
//! let err = std::io::Error::other("boom");
//! exception!(logger, Some(&err), "execution failed");
//! ```

/// Name of the enclosing function, without its module path.
#[doc(hidden)]
#[macro_export]
macro_rules! __function_name {
    () => {{
        fn __here() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = __type_name_of(__here);
        let name = name.strip_suffix("::__here").unwrap_or(name);
        let name = name.trim_end_matches("::{{closure}}");
        name.rsplit("::").next().unwrap_or(name)
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    ($logger:expr, $level:expr, { $($key:ident = $value:expr),* $(,)? }, $($arg:tt)+) => {
        $logger.log(
            $level,
            ::std::format_args!($($arg)+),
            $crate::LogArgs::new()
                .function($crate::__function_name!())
                $(.entry(::std::stringify!($key), $value))*,
        )
    };
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $crate::__log!($logger, $level, {}, $($arg)+)
    };
}

/// Log at `DEBUG`. An optional `{ key = value, .. }` block before the
/// message adds fields; the key `trace_id` overrides the trace id.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($rest:tt)+) => {
        $crate::__log!($logger, $crate::Level::Debug, $($rest)+)
    };
}

/// Log at `INFO`. See [`debug!`] for the field block.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($rest:tt)+) => {
        $crate::__log!($logger, $crate::Level::Info, $($rest)+)
    };
}

/// Log at `WARNING`.
#[macro_export]
macro_rules! warning {
    ($logger:expr, $($rest:tt)+) => {
        $crate::__log!($logger, $crate::Level::Warning, $($rest)+)
    };
}

/// Log at `ERROR`.
#[macro_export]
macro_rules! error {
    ($logger:expr, $($rest:tt)+) => {
        $crate::__log!($logger, $crate::Level::Error, $($rest)+)
    };
}

/// Log at `CRITICAL`.
#[macro_export]
macro_rules! critical {
    ($logger:expr, $($rest:tt)+) => {
        $crate::__log!($logger, $crate::Level::Critical, $($rest)+)
    };
}

/// Log at `ERROR` with exception enrichment. The second argument is an
/// `Option<&(dyn Error + 'static)>`.
#[macro_export]
macro_rules! exception {
    ($logger:expr, $err:expr, { $($key:ident = $value:expr),* $(,)? }, $($arg:tt)+) => {
        $logger.exception(
            ::std::format_args!($($arg)+),
            $err,
            $crate::LogArgs::new()
                .function($crate::__function_name!())
                $(.entry(::std::stringify!($key), $value))*,
        )
    };
    ($logger:expr, $err:expr, $($arg:tt)+) => {
        $crate::exception!($logger, $err, {}, $($arg)+)
    };
}
