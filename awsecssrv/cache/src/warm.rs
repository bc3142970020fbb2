use crate::KeyFormat;
use awsecssrv_core::{EndpointSource, ServiceIdentity, SharedCache, Ttl};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Keeps cache entries warm for a fixed list of services.
///
/// Every half TTL, each service is queried from the source and the result is
/// written through the cache's write mutex. Resolvers that share the cache
/// then observe hits instead of querying the source themselves. A failed
/// query never overwrites the cached value.
#[derive(Debug)]
pub struct CacheWarmer<S, C> {
    source: S,
    cache: C,
    keys: KeyFormat,
    ttl: Ttl,
    services: Vec<ServiceIdentity>,
}

impl<S, C> CacheWarmer<S, C>
where
    S: EndpointSource,
    C: SharedCache,
{
    pub fn new(
        source: S,
        cache: C,
        keys: KeyFormat,
        ttl: Ttl,
        services: impl IntoIterator<Item = ServiceIdentity>,
    ) -> Self {
        Self {
            source,
            cache,
            keys,
            ttl,
            services: services.into_iter().collect(),
        }
    }

    pub fn services(&self) -> &[ServiceIdentity] {
        &self.services
    }

    /// Warms every service until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(services = self.services.len(), period = ?self.ttl.half(), "Warming cache");
        let warms = self.services.iter().map(|id| {
            self.warm(id, &shutdown)
                .instrument(info_span!("warm", svc = %id))
        });
        futures::future::join_all(warms).await;
        debug!("Cache warmer stopped");
    }

    async fn warm(&self, id: &ServiceIdentity, shutdown: &CancellationToken) {
        let key = self.keys.key(id);
        let mut interval = time::interval(self.ttl.half());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return,
                _ = interval.tick() => {}
            }

            let addrs = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return,
                res = self.source.list(id) => match res {
                    Ok(addrs) => addrs,
                    Err(error) => {
                        warn!(%error, "Failed to query endpoints");
                        continue;
                    }
                },
            };

            match self.cache.set_with_mutex(&key, self.ttl, &addrs).await {
                Ok(()) => debug!(%key, %addrs, "Warmed"),
                Err(error) => warn!(%key, %error, "Failed to populate cache"),
            }
        }
    }
}
