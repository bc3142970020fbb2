#![deny(rust_2018_idioms, clippy::disallowed_methods, clippy::disallowed_types)]
#![forbid(unsafe_code)]

pub mod level;

use awsecssrv_core::Error;
use tracing::Dispatch;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{format, time::Uptime},
    prelude::*,
    registry::LookupSpan,
    reload, Layer,
};

pub use tracing::Subscriber;
pub use tracing_subscriber::{registry, EnvFilter};

const ENV_LOG_LEVEL: &str = "AWSECSSRV_LOG";
const ENV_LOG_FORMAT: &str = "AWSECSSRV_LOG_FORMAT";

const DEFAULT_LOG_LEVEL: &str = "warn,awsecssrv=info";

/// How events are rendered on stdout.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Plain,
    /// One JSON object per event, with the enclosing spans as a list.
    Json,
}

#[derive(Debug, Default)]
#[must_use]
pub struct Settings {
    filter: String,
    format: LogFormat,
    is_test: bool,
}

#[derive(Clone)]
pub struct Handle {
    level: Option<level::Handle>,
}

/// Keeps the `log` crate's max level in step with the active filter so that
/// bridged records are not built only to be discarded.
pub(crate) fn sync_log_max_level() {
    use tracing_log::{log, AsLog};
    log::set_max_level(LevelFilter::current().as_log());
}

/// Forwards `log` records from dependencies to the `tracing` subscriber.
pub fn init_log_compat() -> Result<(), Error> {
    tracing_log::LogTracer::init()?;
    sync_log_max_level();
    Ok(())
}

// === impl LogFormat ===

impl LogFormat {
    /// Unrecognized names fall back to plain output.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Plain
        }
    }
}

// === impl Settings ===

impl Settings {
    pub fn from_env() -> Self {
        let filter =
            std::env::var(ENV_LOG_LEVEL).unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
        let format = std::env::var(ENV_LOG_FORMAT)
            .map(|f| LogFormat::from_name(&f))
            .unwrap_or_default();
        Self::new(filter, format)
    }

    pub fn new(filter: impl Into<String>, format: LogFormat) -> Self {
        Self {
            filter: filter.into(),
            format,
            is_test: false,
        }
    }

    fn for_test(filter: String, format: LogFormat) -> Self {
        Self {
            is_test: true,
            ..Self::new(filter, format)
        }
    }

    fn stdout_layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync + 'static>
    where
        S: Subscriber + for<'span> LookupSpan<'span> + Send + Sync,
    {
        // Thread ids are noise under the test harness.
        let events = tracing_subscriber::fmt::format()
            .with_timer(Uptime::default())
            .with_thread_ids(!self.is_test);

        match self.format {
            LogFormat::Json => {
                let layer = tracing_subscriber::fmt::layer()
                    .event_format(events.json().with_span_list(true).with_current_span(false))
                    .fmt_fields(format::JsonFields::default());
                if self.is_test {
                    layer.with_test_writer().boxed()
                } else {
                    layer.boxed()
                }
            }
            LogFormat::Plain => {
                let layer = tracing_subscriber::fmt::layer().event_format(events);
                if self.is_test {
                    layer.with_test_writer().boxed()
                } else {
                    layer.boxed()
                }
            }
        }
    }

    /// Initializes the global subscriber and `log` compatibility.
    ///
    /// A filter of `off` disables logging entirely.
    pub fn init(self) -> Result<Handle, Error> {
        if self.filter.trim().eq_ignore_ascii_case("off") {
            return Ok(Handle::disabled());
        }

        let (dispatch, handle) = self.build();
        tracing::dispatcher::set_global_default(dispatch)?;
        init_log_compat()?;

        Ok(handle)
    }

    /// Builds a dispatcher that writes to stdout and a handle that can change
    /// the filter at runtime.
    pub fn build(self) -> (Dispatch, Handle) {
        // Invalid directives are reported on stderr and otherwise ignored.
        let filter = level::filter_builder().parse_lossy(&self.filter);
        let (filter, level) = reload::Layer::new(filter);
        let stdout = self.stdout_layer();
        let dispatch = tracing_subscriber::registry().with(filter).with(stdout).into();
        let handle = Handle {
            level: Some(level::Handle::new(level, self.filter)),
        };
        (dispatch, handle)
    }
}

// === impl Handle ===

impl Handle {
    /// A handle for a process that logs nothing.
    pub fn disabled() -> Self {
        Self { level: None }
    }

    pub fn level(&self) -> Option<&level::Handle> {
        self.level.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_can_be_changed_at_runtime() {
        let (dispatch, handle) = Settings::for_test("warn".into(), LogFormat::Json).build();
        let _guard = tracing::dispatcher::set_default(&dispatch);
        let level = handle.level().expect("logging must be enabled");

        assert!(level.current().unwrap().contains("warn"));
        level.set_level("awsecssrv=debug").unwrap();
        assert!(level.current().unwrap().contains("awsecssrv=debug"));

        let err = level.set_level("awsecssrv=loudest").unwrap_err();
        assert!(matches!(err, level::LevelError::Invalid { .. }));
        assert!(
            level.current().unwrap().contains("awsecssrv=debug"),
            "invalid filters must not be applied"
        );

        level.reset().unwrap();
        assert!(!level.current().unwrap().contains("awsecssrv=debug"));
    }

    #[test]
    fn off_disables_logging() {
        let handle = Settings::new("off", LogFormat::Plain).init().unwrap();
        assert!(handle.level().is_none());
    }

    #[test]
    fn log_format_names() {
        assert_eq!(LogFormat::from_name("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_name(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::from_name("plain"), LogFormat::Plain);
        assert_eq!(LogFormat::from_name("logfmt"), LogFormat::Plain);
    }
}
