use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, net::SocketAddr, str::FromStr};
use thiserror::Error;

/// A `host:port` string naming one healthy backend instance.
///
/// Two endpoints are equal iff their string forms are equal; no normalization
/// is applied.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(String);

/// An unordered collection of endpoints.
///
/// Equality ignores ordering and repeated entries: two sets are equal when
/// they have the same length and every endpoint of each appears in the other.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressSet(Vec<Endpoint>);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid endpoint {0:?}: expected host:port")]
pub struct InvalidEndpoint(String);

// === impl Endpoint ===

impl Endpoint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the endpoint as a socket address, if its host is an IP literal.
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        self.0.parse().ok()
    }
}

impl FromStr for Endpoint {
    type Err = InvalidEndpoint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(Self(s.to_string()))
            }
            _ => Err(InvalidEndpoint(s.to_string())),
        }
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self(addr.to_string())
    }
}

impl AsRef<str> for Endpoint {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// === impl AddressSet ===

impl AddressSet {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self(endpoints)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Endpoint> {
        self.0.iter()
    }

    pub fn contains(&self, endpoint: &Endpoint) -> bool {
        self.0.contains(endpoint)
    }

    pub fn into_vec(self) -> Vec<Endpoint> {
        self.0
    }
}

impl PartialEq for AddressSet {
    fn eq(&self, other: &Self) -> bool {
        match (self.0.as_slice(), other.0.as_slice()) {
            (a, b) if a.len() != b.len() => false,
            ([], []) => true,
            ([a], [b]) => a == b,
            (a, b) => {
                let ours = a.iter().collect::<HashSet<_>>();
                let theirs = b.iter().collect::<HashSet<_>>();
                theirs.iter().all(|ep| ours.contains(ep))
                    && ours.iter().all(|ep| theirs.contains(ep))
            }
        }
    }
}

impl Eq for AddressSet {}

impl From<Vec<Endpoint>> for AddressSet {
    fn from(endpoints: Vec<Endpoint>) -> Self {
        Self(endpoints)
    }
}

impl FromIterator<Endpoint> for AddressSet {
    fn from_iter<I: IntoIterator<Item = Endpoint>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for AddressSet {
    type Item = Endpoint;
    type IntoIter = std::vec::IntoIter<Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a AddressSet {
    type Item = &'a Endpoint;
    type IntoIter = std::slice::Iter<'a, Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for AddressSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter().map(Endpoint::as_str)).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::*;

    fn set(eps: &[&str]) -> AddressSet {
        eps.iter().map(|s| s.parse().unwrap()).collect()
    }

    fn mk(octets: &[u8]) -> AddressSet {
        octets
            .iter()
            .map(|o| format!("10.0.0.{o}:80").parse().unwrap())
            .collect()
    }

    #[test]
    fn ordering_is_ignored() {
        assert_eq!(set(&["a:1", "b:2"]), set(&["b:2", "a:1"]));
    }

    #[test]
    fn cardinality_differs() {
        assert_ne!(set(&["a:1"]), set(&["a:1", "b:2"]));
        assert_ne!(set(&["a:1", "b:2"]), set(&["a:1"]));
    }

    #[test]
    fn single_endpoints_compare_directly() {
        assert_eq!(set(&["10.0.0.1:80"]), set(&["10.0.0.1:80"]));
        assert_ne!(set(&["10.0.0.1:80"]), set(&["10.0.0.2:80"]));
    }

    #[test]
    fn empty_sets_are_equal() {
        assert_eq!(AddressSet::default(), set(&[]));
    }

    #[test]
    fn repeated_endpoints_are_not_distinguished() {
        assert_eq!(set(&["a:1", "a:1", "b:2"]), set(&["a:1", "b:2", "b:2"]));
        assert_ne!(set(&["a:1", "a:1"]), set(&["a:1", "b:2"]));
        assert_ne!(set(&["a:1", "b:2"]), set(&["a:1", "a:1"]));
    }

    #[test]
    fn endpoint_parsing() {
        assert!("10.0.0.1:8080".parse::<Endpoint>().is_ok());
        assert!("svc.local:80".parse::<Endpoint>().is_ok());
        assert!("[::1]:443".parse::<Endpoint>().is_ok());
        for invalid in &["10.0.0.1", ":80", "host:", "host:http", "host:70000"] {
            assert_eq!(
                invalid.parse::<Endpoint>(),
                Err(InvalidEndpoint(invalid.to_string())),
            );
        }
    }

    #[test]
    fn endpoint_socket_addr() {
        let ep = Endpoint::from(SocketAddr::from(([10, 0, 0, 1], 80)));
        assert_eq!(ep.as_str(), "10.0.0.1:80");
        assert_eq!(ep.to_socket_addr(), Some(([10, 0, 0, 1], 80).into()));
        assert_eq!("svc.local:80".parse::<Endpoint>().unwrap().to_socket_addr(), None);
    }

    #[test]
    fn serializes_as_string_list() {
        let addrs = set(&["10.0.0.1:80", "10.0.0.2:80"]);
        let json = serde_json::to_string(&addrs).unwrap();
        assert_eq!(json, r#"["10.0.0.1:80","10.0.0.2:80"]"#);
        let back = serde_json::from_str::<AddressSet>(&json).unwrap();
        assert_eq!(back.into_vec(), addrs.into_vec());
    }

    quickcheck! {
        fn equal_iff_same_len_and_mutual_containment(a: Vec<u8>, b: Vec<u8>) -> bool {
            let (sa, sb) = (mk(&a), mk(&b));
            let expected = a.len() == b.len()
                && a.iter().all(|x| b.contains(x))
                && b.iter().all(|x| a.contains(x));
            (sa == sb) == expected
        }

        fn equality_is_commutative(a: Vec<u8>, b: Vec<u8>) -> bool {
            let (sa, sb) = (mk(&a), mk(&b));
            (sa == sb) == (sb == sa)
        }

        fn permutations_are_equal(a: Vec<u8>) -> bool {
            let mut reversed = a.clone();
            reversed.reverse();
            mk(&a) == mk(&reversed) && mk(&a) == mk(&a)
        }
    }
}
