use thiserror::Error;
use tracing::info;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter, ParseError},
    reload, Registry,
};

/// Changes the log filter of a running subscriber, e.g. to trace a single
/// service with `awsecssrv_resolve[resolve{svc="api02/hello"}]=trace`.
/// [`reset`](Handle::reset) restores the startup filter.
#[derive(Clone)]
pub struct Handle {
    reload: reload::Handle<EnvFilter, Registry>,
    initial: String,
}

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("invalid log filter {filter:?}: {source}")]
    Invalid {
        filter: String,
        #[source]
        source: ParseError,
    },
    #[error("the subscriber is gone: {0}")]
    Gone(#[from] reload::Error),
}

pub(crate) fn filter_builder() -> tracing_subscriber::filter::Builder {
    EnvFilter::builder().with_default_directive(LevelFilter::WARN.into())
}

// === impl Handle ===

impl Handle {
    pub(crate) fn new(reload: reload::Handle<EnvFilter, Registry>, initial: String) -> Self {
        Self { reload, initial }
    }

    /// Replaces the filter. Unlike startup, an invalid filter is rejected
    /// rather than partially applied.
    pub fn set_level(&self, filter: impl AsRef<str>) -> Result<(), LevelError> {
        let filter = filter.as_ref().trim();
        let parsed = filter_builder()
            .parse(filter)
            .map_err(|source| LevelError::Invalid {
                filter: filter.to_string(),
                source,
            })?;
        self.reload.reload(parsed)?;
        super::sync_log_max_level();
        info!(%filter, "Log filter changed");
        Ok(())
    }

    /// Restores the filter the subscriber was built with.
    pub fn reset(&self) -> Result<(), LevelError> {
        let filter = filter_builder().parse_lossy(&self.initial);
        self.reload.reload(filter)?;
        super::sync_log_max_level();
        info!(filter = %self.initial, "Log filter reset");
        Ok(())
    }

    pub fn current(&self) -> Result<String, LevelError> {
        Ok(self.reload.with_current(|f| f.to_string())?)
    }
}
