//! Configures ECS endpoint resolution

#![deny(rust_2018_idioms, clippy::disallowed_methods, clippy::disallowed_types)]
#![forbid(unsafe_code)]

pub mod env;

use awsecssrv_cache::{CacheWarmer, MemoryCache, TARGET_GROUP_ENTITY_KIND};
use awsecssrv_core::{EndpointSource, Error, ServiceIdentity, SharedCache};
use awsecssrv_ecs::{EcsApi, EcsSource, ElbApi, NewClient, Profile, Profiles, TargetGroupSource};
use awsecssrv_resolve::{ResolverBuilder, ResolverRegistry};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

pub use awsecssrv_resolve as resolve;
pub use awsecssrv_tracing as trace;

/// The scheme of targets resolved from a load balancer target group's healthy
/// targets: `awselbsrv://<load-balancer>/<target-group>`.
pub const TARGET_GROUP_SCHEME: &str = "awselbsrv";

/// Resolves `awsecssrv://<cluster>/<service>` targets against ECS and
/// `awselbsrv://<load-balancer>/<target-group>` targets against ELB target
/// health.
///
/// Every resolver shares one cache and one client per AWS profile. Resolvers
/// use the `DEFAULT` profile's client.
#[derive(Clone, Debug)]
pub struct Config {
    pub resolver: resolve::Config,

    /// How long a cache writer may hold a key's write mutex before another
    /// writer may take it over. Only applies to the in-process cache.
    pub lock_ttl: Duration,

    pub profiles: Vec<Profile>,

    /// Services whose cache entries are refreshed in the background, whether
    /// or not any resolver watches them.
    pub warm_services: Vec<ServiceIdentity>,
}

pub struct App<C> {
    registry: ResolverRegistry,
    profiles: Profiles<C>,
    cache: Arc<dyn SharedCache>,
    warmer: Option<CacheWarmer<Arc<dyn EndpointSource>, Arc<dyn SharedCache>>>,
    shutdown: CancellationToken,
}

// === impl Config ===

impl Config {
    /// Builds an app backed by an in-process [`MemoryCache`].
    pub fn build<N>(self, new_client: &N) -> Result<App<N::Client>, Error>
    where
        N: NewClient,
        N::Client: EcsApi + ElbApi + 'static,
    {
        let cache = Arc::new(MemoryCache::new(self.lock_ttl));
        self.build_with_cache(new_client, cache)
    }

    /// Builds an app backed by `cache`, e.g. a cache shared between processes.
    pub fn build_with_cache<N>(
        self,
        new_client: &N,
        cache: Arc<dyn SharedCache>,
    ) -> Result<App<N::Client>, Error>
    where
        N: NewClient,
        N::Client: EcsApi + ElbApi + 'static,
    {
        let Config {
            resolver,
            lock_ttl: _,
            profiles,
            warm_services,
        } = self;

        let profiles = Profiles::build(&profiles, new_client)?;
        let client = profiles
            .default_client()
            .ok_or(env::EnvError::NoDefaultProfile)?;
        let source: Arc<dyn EndpointSource> = Arc::new(EcsSource::new(client.clone()));
        let target_groups = resolve::Config {
            ttl: resolver.ttl,
            keys: resolver.keys.clone().with_entity_kind(TARGET_GROUP_ENTITY_KIND),
        };

        let registry = ResolverRegistry::default()
            .with_builder(ResolverBuilder::new(
                source.clone(),
                cache.clone(),
                resolver.clone(),
            ))
            .with_builder(
                ResolverBuilder::new(
                    Arc::new(TargetGroupSource::new(client)),
                    cache.clone(),
                    target_groups,
                )
                .with_scheme(TARGET_GROUP_SCHEME),
            );

        let warmer = if warm_services.is_empty() {
            None
        } else {
            Some(CacheWarmer::new(
                source,
                cache.clone(),
                resolver.keys.clone(),
                resolver.ttl,
                warm_services,
            ))
        };

        info!(
            ttl = resolver.ttl.as_secs(),
            namespace = %resolver.keys.namespace(),
            profiles = ?profiles,
            warm = warmer.as_ref().map_or(0, |w| w.services().len()),
            "Configured",
        );
        Ok(App {
            registry,
            profiles,
            cache,
            warmer,
            shutdown: CancellationToken::new(),
        })
    }
}

// === impl App ===

impl<C> App<C> {
    pub fn registry(&self) -> &ResolverRegistry {
        &self.registry
    }

    pub fn profiles(&self) -> &Profiles<C> {
        &self.profiles
    }

    pub fn cache(&self) -> &Arc<dyn SharedCache> {
        &self.cache
    }

    /// Spawns the cache warmer, if any services are configured to be warmed.
    ///
    /// The warmer runs until [`App::shutdown`] is called or the app is dropped.
    pub fn spawn_warmer(&mut self) -> Option<JoinHandle<()>> {
        let warmer = self.warmer.take()?;
        let shutdown = self.shutdown.clone();
        Some(tokio::spawn(
            warmer.run(shutdown).instrument(info_span!("warmer")),
        ))
    }

    pub fn shutdown(&self) {
        debug!("Shutting down");
        self.shutdown.cancel();
    }
}

impl<C> Drop for App<C> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
