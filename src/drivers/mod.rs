//! Platform drivers
//!
//! - [`DockerDriver`]: `docker container` lifecycle commands validated against
//!   a lifecycle graph
//! - [`OpenWhiskDriver`]: function invocations through the OpenWhisk wrapper
//!   script, with user and function provisioning

pub mod docker;
pub mod openwhisk;

pub use docker::DockerDriver;
pub use openwhisk::{OpenWhiskDriver, Provisioning};
