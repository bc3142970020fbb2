use crate::{AddressSet, Error, ServiceIdentity};
use std::sync::Arc;

/// Queries the authoritative inventory for the endpoints of a service.
///
/// Implementations must return only endpoints that are currently healthy and
/// should fail, rather than return an empty set, when the service cannot be
/// found.
#[async_trait::async_trait]
pub trait EndpointSource: Send + Sync {
    async fn list(&self, id: &ServiceIdentity) -> Result<AddressSet, Error>;
}

#[async_trait::async_trait]
impl<S: EndpointSource + ?Sized> EndpointSource for Arc<S> {
    async fn list(&self, id: &ServiceIdentity) -> Result<AddressSet, Error> {
        (**self).list(id).await
    }
}
