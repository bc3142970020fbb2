#![deny(rust_2018_idioms, clippy::disallowed_methods, clippy::disallowed_types)]
#![forbid(unsafe_code)]

pub mod key;
pub mod memory;
pub mod warm;

pub use self::{
    key::{KeyFormat, DEFAULT_NAMESPACE, ENTITY_KIND, TARGET_GROUP_ENTITY_KIND},
    memory::{KeyLock, MemoryCache},
    warm::CacheWarmer,
};
