use awsecssrv_core::Error;
use std::{collections::HashMap, fmt, sync::Arc};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_PROFILE: &str = "DEFAULT";

/// Credentials and region for one AWS account.
#[derive(Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Builds an API client bound to a profile.
pub trait NewClient {
    type Client;

    fn new_client(&self, profile: &Profile) -> Result<Self::Client, Error>;
}

/// One immutable, credentials-bound client per configured profile.
///
/// Built once at startup and handed to whatever needs a client; nothing
/// looks clients up from global state.
pub struct Profiles<C> {
    clients: HashMap<String, Arc<C>>,
}

#[derive(Debug, Error)]
#[error("failed to build a client for profile {profile}")]
pub struct ClientFailure {
    profile: String,
    #[source]
    source: Error,
}

// === impl Profile ===

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("name", &self.name)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

// === impl NewClient ===

impl<F, C> NewClient for F
where
    F: Fn(&Profile) -> Result<C, Error>,
{
    type Client = C;

    fn new_client(&self, profile: &Profile) -> Result<C, Error> {
        (self)(profile)
    }
}

// === impl Profiles ===

impl<C> Profiles<C> {
    pub fn build<'p, N>(
        profiles: impl IntoIterator<Item = &'p Profile>,
        new_client: &N,
    ) -> Result<Self, ClientFailure>
    where
        N: NewClient<Client = C>,
    {
        let mut clients = HashMap::new();
        for profile in profiles {
            let client = new_client
                .new_client(profile)
                .map_err(|source| ClientFailure {
                    profile: profile.name.clone(),
                    source,
                })?;
            debug!(profile = %profile.name, region = %profile.region, "Built client");
            clients.insert(profile.name.clone(), Arc::new(client));
        }
        Ok(Self { clients })
    }

    pub fn get(&self, name: &str) -> Option<Arc<C>> {
        self.clients.get(name).cloned()
    }

    pub fn default_client(&self) -> Option<Arc<C>> {
        self.get(DEFAULT_PROFILE)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.clients.keys().map(String::as_str)
    }
}

impl<C> fmt::Debug for Profiles<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.clients.keys()).finish()
    }
}
