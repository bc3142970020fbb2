use crate::{AddressSet, Error};
use std::{num::NonZeroU64, time::Duration};
use thiserror::Error;

/// A cache shared by every resolver (potentially across processes).
///
/// Reads are lock-free. Writes for the same key are serialized by the backend
/// so that, when several resolvers race to repopulate an expired entry, only
/// one of them writes each round.
#[async_trait::async_trait]
pub trait SharedCache: Send + Sync {
    /// Returns the cached addresses for `key`, or `None` if the entry is
    /// missing or has expired.
    async fn get(&self, key: &str) -> Result<Option<AddressSet>, Error>;

    /// Stores `value` under `key` for `ttl`, holding the key's write mutex for
    /// the duration of the write.
    async fn set_with_mutex(&self, key: &str, ttl: Ttl, value: &AddressSet) -> Result<(), Error>;
}

/// How long a cache entry remains valid, in whole seconds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ttl(NonZeroU64);

#[derive(Debug, Error)]
#[error("cache read failed: {0}")]
pub struct CacheReadFailure(#[source] Error);

// === impl SharedCache ===

#[async_trait::async_trait]
impl<C: SharedCache + ?Sized> SharedCache for std::sync::Arc<C> {
    async fn get(&self, key: &str) -> Result<Option<AddressSet>, Error> {
        (**self).get(key).await
    }

    async fn set_with_mutex(&self, key: &str, ttl: Ttl, value: &AddressSet) -> Result<(), Error> {
        (**self).set_with_mutex(key, ttl, value).await
    }
}

// === impl Ttl ===

impl Ttl {
    pub const DEFAULT: Self = Self(match NonZeroU64::new(5) {
        Some(secs) => secs,
        None => unreachable!(),
    });

    /// The longest TTL an entry may be stored for: one week.
    pub const MAX_SECS: u64 = 7 * 24 * 60 * 60;

    /// Returns `None` for a zero TTL or one longer than [`Ttl::MAX_SECS`].
    pub fn from_secs(secs: u64) -> Option<Self> {
        if secs > Self::MAX_SECS {
            return None;
        }
        NonZeroU64::new(secs).map(Self)
    }

    pub fn as_secs(&self) -> u64 {
        self.0.get()
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0.get())
    }

    /// The refresh period that keeps an entry warm: exactly half of the TTL.
    pub fn half(&self) -> Duration {
        self.as_duration() / 2
    }
}

impl Default for Ttl {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// === impl CacheReadFailure ===

impl CacheReadFailure {
    pub fn new(error: impl Into<Error>) -> Self {
        Self(error.into())
    }
}
