use awsecssrv_core::ServiceIdentity;
use std::{fmt, str::FromStr};
use thiserror::Error;

/// A parsed `<scheme>://<authority>/<service-name>` resolution target.
///
/// The scheme is case-insensitive and stored lowercased.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Target {
    scheme: String,
    identity: ServiceIdentity,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("malformed target {target:?}: {reason}")]
pub struct MalformedTarget {
    target: String,
    reason: &'static str,
}

// === impl Target ===

impl Target {
    pub fn new(scheme: impl AsRef<str>, identity: ServiceIdentity) -> Self {
        Self {
            scheme: scheme.as_ref().to_ascii_lowercase(),
            identity,
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    pub fn into_identity(self) -> ServiceIdentity {
        self.identity
    }
}

impl FromStr for Target {
    type Err = MalformedTarget;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason| MalformedTarget {
            target: s.to_string(),
            reason,
        };

        let (scheme, rest) = s.split_once("://").ok_or_else(|| malformed("missing scheme"))?;
        if scheme.is_empty() {
            return Err(malformed("empty scheme"));
        }
        let (authority, service) = rest
            .split_once('/')
            .ok_or_else(|| malformed("missing service name"))?;
        if authority.is_empty() {
            return Err(malformed("empty authority"));
        }
        if service.is_empty() {
            return Err(malformed("empty service name"));
        }
        if service.contains('/') {
            return Err(malformed("service name must be a single path segment"));
        }

        Ok(Self::new(scheme, ServiceIdentity::new(authority, service)))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}/{}",
            self.scheme,
            self.identity.authority(),
            self.identity.service_name()
        )
    }
}
