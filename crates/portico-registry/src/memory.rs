use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use portico_core::ServiceInstance;

use crate::{Registration, RegistryError, ServiceRegistry};

/// Registry held in process memory, for local runs and tests.
#[derive(Debug)]
pub struct InMemoryRegistry {
    instances: RwLock<HashMap<String, Vec<(String, ServiceInstance)>>>,
    reachable: AtomicBool,
    queries: AtomicUsize,
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
            reachable: AtomicBool::new(true),
            queries: AtomicUsize::new(0),
        }
    }

    /// Add a healthy instance directly.
    pub fn insert(&self, instance: ServiceInstance) {
        let id = format!("{}-{}-{}", instance.name, instance.address, instance.port);
        let mut map = self.instances.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(instance.name.clone()).or_default().push((id, instance));
    }

    pub fn set_health(&self, service: &str, address: &str, port: u16, healthy: bool) {
        let mut map = self.instances.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = map.get_mut(service) {
            for (_, instance) in list.iter_mut() {
                if instance.address == address && instance.port == port {
                    instance.healthy = healthy;
                }
            }
        }
    }

    /// Simulate the registry going away.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn ensure_reachable(&self) -> Result<(), RegistryError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RegistryError::Unreachable("in-memory registry offline".into()))
        }
    }
}

#[async_trait]
impl ServiceRegistry for InMemoryRegistry {
    async fn register(&self, registration: &Registration) -> Result<(), RegistryError> {
        self.ensure_reachable()?;
        let instance = ServiceInstance::new(&registration.name, &registration.address, registration.port);
        let mut map = self.instances.write().unwrap_or_else(PoisonError::into_inner);
        let list = map.entry(registration.name.clone()).or_default();
        list.retain(|(id, _)| id != &registration.id);
        list.push((registration.id.clone(), instance));
        Ok(())
    }

    async fn deregister(&self, instance_id: &str) -> Result<(), RegistryError> {
        self.ensure_reachable()?;
        let mut map = self.instances.write().unwrap_or_else(PoisonError::into_inner);
        for list in map.values_mut() {
            list.retain(|(id, _)| id != instance_id);
        }
        Ok(())
    }

    async fn query(&self, service: &str) -> Result<Vec<ServiceInstance>, RegistryError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.ensure_reachable()?;
        let map = self.instances.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map
            .get(service)
            .map(|list| {
                list.iter()
                    .filter(|(_, instance)| instance.healthy)
                    .map(|(_, instance)| instance.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}
