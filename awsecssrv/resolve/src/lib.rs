#![deny(rust_2018_idioms, clippy::disallowed_methods, clippy::disallowed_types)]
#![forbid(unsafe_code)]

pub mod discover;
pub mod registry;
pub mod resolver;
pub mod target;

pub use self::{
    discover::Discover,
    registry::{Builder, ResolverBuilder, ResolverRegistry, UnknownScheme, SCHEME},
    resolver::{CachePopulateFailure, Config, EndpointResolver, Handle, SourceQueryFailure},
    target::{MalformedTarget, Target},
};
