use serde::{Deserialize, Serialize};

/// One live endpoint of a named service, as reported by the registry.
///
/// Only valid for the request that fetched it: health may change at any
/// time, so instances are never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub healthy: bool,
}

impl ServiceInstance {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
            healthy: true,
        }
    }

    /// `http://host:port`, with IPv6 literals bracketed.
    pub fn base_url(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("http://[{}]:{}", self.address, self.port)
        } else {
            format!("http://{}:{}", self.address, self.port)
        }
    }
}
