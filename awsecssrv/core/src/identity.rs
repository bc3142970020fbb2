use std::fmt;

/// Identifies a logical service within a cluster.
///
/// The `authority` names the cluster (or namespace) that owns the service and
/// `service_name` names the service itself. Both are fixed for the lifetime of
/// the resolver that watches the service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceIdentity {
    authority: String,
    service_name: String,
}

impl ServiceIdentity {
    pub fn new(authority: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            service_name: service_name.into(),
        }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.authority, self.service_name)
    }
}
