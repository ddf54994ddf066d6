use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use portico_core::ServiceInstance;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::{Registration, RegistryError, ServiceRegistry};

/// Consul agent HTTP API client. `reqwest::Client` pools connections and is
/// safe to share, so one instance serves every request.
#[derive(Debug, Clone)]
pub struct ConsulRegistry {
    client: Client,
    base: Url,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AgentServiceRegistration<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    name: &'a str,
    address: &'a str,
    port: u16,
    check: AgentServiceCheck<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AgentServiceCheck<'a> {
    #[serde(rename = "HTTP")]
    http: &'a str,
    interval: String,
    timeout: String,
    deregister_critical_service_after: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    header: HashMap<&'a str, Vec<&'a str>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthEntry {
    node: NodeEntry,
    service: ServiceEntry,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NodeEntry {
    #[serde(default)]
    address: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceEntry {
    service: String,
    #[serde(default)]
    address: String,
    port: u16,
}

impl ConsulRegistry {
    /// `base` is the agent address, e.g. `http://consul:8500`. Every call is
    /// bounded by `timeout`.
    pub fn new(base: &str, timeout: Duration) -> Result<Self, RegistryError> {
        let base = Url::parse(base).map_err(|e| RegistryError::Init(e.to_string()))?;
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Init(e.to_string()))?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RegistryError> {
        self.base
            .join(path)
            .map_err(|e| RegistryError::Init(e.to_string()))
    }
}

fn go_duration(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

fn check_status(status: StatusCode) -> Result<(), RegistryError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(RegistryError::Rejected(status.as_u16()))
    }
}

#[async_trait]
impl ServiceRegistry for ConsulRegistry {
    async fn register(&self, registration: &Registration) -> Result<(), RegistryError> {
        let mut header: HashMap<&str, Vec<&str>> = HashMap::new();
        for (name, value) in &registration.check.headers {
            header.entry(name.as_str()).or_default().push(value.as_str());
        }

        let body = AgentServiceRegistration {
            id: &registration.id,
            name: &registration.name,
            address: &registration.address,
            port: registration.port,
            check: AgentServiceCheck {
                http: &registration.check.url,
                interval: go_duration(registration.check.interval),
                timeout: go_duration(registration.check.timeout),
                deregister_critical_service_after: go_duration(registration.check.deregister_after),
                header,
            },
        };

        let res = self
            .client
            .put(self.endpoint("/v1/agent/service/register")?)
            .json(&body)
            .send()
            .await
            .map_err(|e| RegistryError::Unreachable(e.to_string()))?;
        check_status(res.status())
    }

    async fn deregister(&self, instance_id: &str) -> Result<(), RegistryError> {
        let res = self
            .client
            .put(self.endpoint(&format!("/v1/agent/service/deregister/{instance_id}"))?)
            .send()
            .await
            .map_err(|e| RegistryError::Unreachable(e.to_string()))?;
        check_status(res.status())
    }

    async fn query(&self, service: &str) -> Result<Vec<ServiceInstance>, RegistryError> {
        let res = self
            .client
            .get(self.endpoint(&format!("/v1/health/service/{service}"))?)
            .query(&[("passing", "true")])
            .send()
            .await
            .map_err(|e| RegistryError::Unreachable(e.to_string()))?;
        check_status(res.status())?;

        let entries: Vec<HealthEntry> = res
            .json()
            .await
            .map_err(|e| RegistryError::Decode(e.to_string()))?;

        // An empty service address means "same as the node".
        Ok(entries
            .into_iter()
            .map(|entry| {
                let address = if entry.service.address.is_empty() {
                    entry.node.address
                } else {
                    entry.service.address
                };
                ServiceInstance::new(entry.service.service, address, entry.service.port)
            })
            .collect())
    }
}
