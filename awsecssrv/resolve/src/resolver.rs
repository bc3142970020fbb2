use awsecssrv_cache::KeyFormat;
use awsecssrv_core::{
    AddressSet, EndpointSource, Error, NotificationSink, ServiceIdentity, SharedCache, SinkClosed,
    Ttl,
};
use thiserror::Error;
use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, trace, warn, Instrument};

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub ttl: Ttl,
    pub keys: KeyFormat,
}

/// Periodically resolves one service's endpoints and publishes changes.
///
/// Each cycle reads the shared cache, falls back to the source on a miss (or
/// an unreadable entry) and writes the fresh result back through the cache's
/// write mutex. The sink is notified only when the resolved set differs from
/// the last one published. Cycles run every half TTL so that a value is
/// observed at least twice before it expires.
pub struct EndpointResolver<S, C, K> {
    id: ServiceIdentity,
    key: String,
    ttl: Ttl,
    source: S,
    cache: C,
    sink: K,
    last_published: AddressSet,
}

/// Controls a running [`EndpointResolver`].
///
/// Dropping the handle stops the resolver.
#[derive(Debug)]
pub struct Handle {
    id: ServiceIdentity,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

#[derive(Debug, Error)]
#[error("failed to query endpoints for {svc}")]
pub struct SourceQueryFailure {
    svc: ServiceIdentity,
    #[source]
    source: Error,
}

#[derive(Debug, Error)]
#[error("failed to populate cache entry {key}")]
pub struct CachePopulateFailure {
    key: String,
    #[source]
    source: Error,
}

// === impl EndpointResolver ===

impl<S, C, K> EndpointResolver<S, C, K>
where
    S: EndpointSource + 'static,
    C: SharedCache + 'static,
    K: NotificationSink + 'static,
{
    pub fn new(id: ServiceIdentity, source: S, cache: C, sink: K, config: &Config) -> Self {
        Self {
            key: config.keys.key(&id),
            ttl: config.ttl,
            id,
            source,
            cache,
            sink,
            last_published: AddressSet::default(),
        }
    }

    /// Spawns the refresh loop onto the current runtime.
    pub fn start(self) -> Handle {
        let shutdown = CancellationToken::new();
        let id = self.id.clone();
        let span = info_span!("resolve", svc = %id);
        let task = tokio::spawn(self.run(shutdown.clone()).instrument(span));
        Handle {
            id,
            shutdown,
            task: Some(task),
        }
    }

    async fn run(mut self, shutdown: CancellationToken) {
        debug!(key = %self.key, period = ?self.ttl.half(), "Resolving");
        let mut interval = time::interval(self.ttl.half());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            let fetched = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                res = self.fetch() => res,
            };
            if shutdown.is_cancelled() {
                break;
            }

            match fetched {
                Ok(addrs) => {
                    if self.publish(addrs).is_err() {
                        debug!("Sink closed");
                        shutdown.cancel();
                        return;
                    }
                }
                Err(error) => warn!(%error, "Keeping previous endpoints"),
            }
        }
        debug!("Closed");
    }

    async fn fetch(&self) -> Result<AddressSet, Error> {
        match self.cache.get(&self.key).await {
            Ok(Some(addrs)) => {
                trace!(%addrs, "Cache hit");
                return Ok(addrs);
            }
            Ok(None) => trace!("Cache miss"),
            Err(error) => debug!(%error, "Unreadable cache entry; querying source"),
        }

        let addrs = self
            .source
            .list(&self.id)
            .await
            .map_err(|source| SourceQueryFailure {
                svc: self.id.clone(),
                source,
            })?;

        if let Err(source) = self.cache.set_with_mutex(&self.key, self.ttl, &addrs).await {
            let error = CachePopulateFailure {
                key: self.key.clone(),
                source,
            };
            warn!(%error, "Publishing uncached endpoints");
        }
        Ok(addrs)
    }

    fn publish(&mut self, addrs: AddressSet) -> Result<(), SinkClosed> {
        if addrs == self.last_published {
            trace!("Unchanged");
            return Ok(());
        }
        debug!(%addrs, "Publishing");
        self.last_published = addrs.clone();
        self.sink.update(addrs)
    }
}

// === impl Handle ===

impl Handle {
    pub fn id(&self) -> &ServiceIdentity {
        &self.id
    }

    /// A hint that the client wants fresh endpoints.
    ///
    /// Ignored: the resolver already refreshes every half TTL.
    pub fn resolve_now(&self) {
        trace!(svc = %self.id, "Ignoring resolve hint");
    }

    /// Stops the resolver. No update is published once the in-flight cycle
    /// observes the cancellation. Idempotent.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// True once the resolver was closed or stopped because its sink went
    /// away.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Waits for the refresh loop to exit.
    ///
    /// This does not stop the resolver on its own; see [`Handle::close`].
    pub async fn closed(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                warn!(svc = %self.id, %error, "Resolver task failed");
            }
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
