#![deny(rust_2018_idioms, clippy::disallowed_methods, clippy::disallowed_types)]
#![forbid(unsafe_code)]

//! Types shared by every part of ECS endpoint resolution: the address values a
//! resolver publishes and the collaborators it talks to.

pub mod addrs;
pub mod cache;
pub mod error;
pub mod identity;
pub mod sink;
pub mod source;

pub use self::{
    addrs::{AddressSet, Endpoint, InvalidEndpoint},
    cache::{CacheReadFailure, SharedCache, Ttl},
    error::{cause_ref, is_caused_by, Error, Result},
    identity::ServiceIdentity,
    sink::{NotificationSink, SinkClosed},
    source::EndpointSource,
};
