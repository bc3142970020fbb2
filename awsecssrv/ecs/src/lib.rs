#![deny(rust_2018_idioms, clippy::disallowed_methods, clippy::disallowed_types)]
#![forbid(unsafe_code)]

pub mod api;
pub mod profiles;
mod source;
mod target_group;

pub use self::{
    api::{
        Container, ContainerInstance, EcsApi, ElbApi, NetworkBinding, Task, TargetHealth, HEALTHY,
        RUNNING,
    },
    profiles::{ClientFailure, NewClient, Profile, Profiles, DEFAULT_PROFILE},
    source::{ApiFailure, EcsSource, NoEndpoints},
    target_group::TargetGroupSource,
};
