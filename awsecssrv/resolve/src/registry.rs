use crate::{
    resolver::{Config, EndpointResolver, Handle},
    target::Target,
};
use awsecssrv_core::{EndpointSource, Error, NotificationSink, SharedCache};
use std::{collections::HashMap, fmt, sync::Arc};
use thiserror::Error;
use tracing::debug;

/// The scheme served by [`ResolverBuilder`] unless overridden.
pub const SCHEME: &str = "awsecssrv";

/// Builds resolvers for targets of one URI scheme.
///
/// Implementations spawn onto the current tokio runtime, so `build` must be
/// called from within one.
pub trait Builder: Send + Sync {
    fn scheme(&self) -> &str;

    fn build(&self, target: &Target, sink: Arc<dyn NotificationSink>) -> Result<Handle, Error>;
}

/// Builds [`EndpointResolver`]s that share one source and one cache.
#[derive(Clone)]
pub struct ResolverBuilder {
    scheme: String,
    source: Arc<dyn EndpointSource>,
    cache: Arc<dyn SharedCache>,
    config: Config,
}

/// Maps URI schemes to the builders that serve them.
///
/// Registries are built once, before any resolution, and shared immutably.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    builders: HashMap<String, Arc<dyn Builder>>,
}

#[derive(Clone, Debug, Error)]
#[error("no resolver registered for scheme {0:?}")]
pub struct UnknownScheme(String);

// === impl ResolverBuilder ===

impl ResolverBuilder {
    pub fn new(
        source: Arc<dyn EndpointSource>,
        cache: Arc<dyn SharedCache>,
        config: Config,
    ) -> Self {
        Self {
            scheme: SCHEME.to_string(),
            source,
            cache,
            config,
        }
    }

    pub fn with_scheme(self, scheme: impl AsRef<str>) -> Self {
        Self {
            scheme: scheme.as_ref().to_ascii_lowercase(),
            ..self
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Builder for ResolverBuilder {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn build(&self, target: &Target, sink: Arc<dyn NotificationSink>) -> Result<Handle, Error> {
        let resolver = EndpointResolver::new(
            target.identity().clone(),
            self.source.clone(),
            self.cache.clone(),
            sink,
            &self.config,
        );
        Ok(resolver.start())
    }
}

impl fmt::Debug for ResolverBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverBuilder")
            .field("scheme", &self.scheme)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// === impl ResolverRegistry ===

impl ResolverRegistry {
    /// Registers `builder` for its scheme, replacing any previous builder for
    /// the same scheme.
    pub fn with_builder(mut self, builder: impl Builder + 'static) -> Self {
        self.register(Arc::new(builder));
        self
    }

    pub fn register(&mut self, builder: Arc<dyn Builder>) {
        let scheme = builder.scheme().to_ascii_lowercase();
        if self.builders.insert(scheme.clone(), builder).is_some() {
            debug!(%scheme, "Replaced resolver builder");
        }
    }

    pub fn get(&self, scheme: &str) -> Option<&Arc<dyn Builder>> {
        self.builders.get(&scheme.to_ascii_lowercase())
    }

    pub fn schemes(&self) -> impl Iterator<Item = &str> + '_ {
        self.builders.keys().map(String::as_str)
    }

    /// Parses `target` and starts a resolver for it with the builder
    /// registered for its scheme.
    pub fn build(
        &self,
        target: &str,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Handle, Error> {
        let target = target.parse::<Target>()?;
        let builder = self
            .get(target.scheme())
            .ok_or_else(|| UnknownScheme(target.scheme().to_string()))?;
        debug!(%target, "Resolving");
        builder.build(&target, sink)
    }
}

impl fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.builders.keys()).finish()
    }
}
