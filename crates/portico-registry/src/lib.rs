//! Client side of service discovery.
//!
//! Services announce themselves with [`ServiceRegistry::register`]; the edge
//! looks up healthy instances with [`ServiceRegistry::query`]. The registry
//! itself (Consul) is an external process.

use std::time::Duration;

use async_trait::async_trait;
use portico_core::ServiceInstance;

pub mod consul;
pub mod lifecycle;
pub mod memory;

pub use consul::ConsulRegistry;
pub use lifecycle::{RegistrationState, register_once, spawn_registration_retry};
pub use memory::InMemoryRegistry;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry client could not be created: {0}")]
    Init(String),

    #[error("registry unreachable: {0}")]
    Unreachable(String),

    #[error("registry answered with status {0}")]
    Rejected(u16),

    #[error("registry response could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Announce an instance. The registry starts polling its health check.
    async fn register(&self, registration: &Registration) -> Result<(), RegistryError>;

    async fn deregister(&self, instance_id: &str) -> Result<(), RegistryError>;

    /// Instances of `service` currently passing their health checks. An
    /// empty list is a successful answer, distinct from an unreachable
    /// registry.
    async fn query(&self, service: &str) -> Result<Vec<ServiceInstance>, RegistryError>;
}

/// HTTP health check the registry runs against a registered instance.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    pub url: String,
    pub interval: Duration,
    pub timeout: Duration,
    /// Instance is dropped after failing continuously for this long.
    pub deregister_after: Duration,
    /// Extra request headers, e.g. a system credential.
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub check: HealthCheck,
}

impl Registration {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16, check: HealthCheck) -> Self {
        let name = name.into();
        let address = address.into();
        Self {
            id: format!("{name}-{address}-{port}"),
            name,
            address,
            port,
            check,
        }
    }
}
