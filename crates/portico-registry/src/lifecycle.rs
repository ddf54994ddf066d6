use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::{Registration, ServiceRegistry};

/// Whether this process is currently registered. Registration failures are
/// not fatal, so dependents read this instead of assuming success.
#[derive(Debug, Clone, Default)]
pub struct RegistrationState(Arc<AtomicBool>);

impl RegistrationState {
    pub fn is_registered(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set_registered(&self, registered: bool) {
        self.0.store(registered, Ordering::Release);
    }
}

/// One registration attempt. Failure is logged and reported, never raised.
pub async fn register_once(
    registry: &dyn ServiceRegistry,
    registration: &Registration,
    state: &RegistrationState,
) -> bool {
    match registry.register(registration).await {
        Ok(()) => {
            state.set_registered(true);
            tracing::info!(service = %registration.name, id = %registration.id, "registered with service registry");
            true
        }
        Err(err) => {
            tracing::warn!(service = %registration.name, error = %err, "service registration failed");
            false
        }
    }
}

/// Floor for the retry period; `tokio::time::interval` refuses zero.
const MIN_RETRY_PERIOD: Duration = Duration::from_secs(1);

/// Keep retrying registration every `every` until it succeeds.
pub fn spawn_registration_retry(
    registry: Arc<dyn ServiceRegistry>,
    registration: Registration,
    state: RegistrationState,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every.max(MIN_RETRY_PERIOD));
        interval.tick().await;
        loop {
            interval.tick().await;
            if register_once(registry.as_ref(), &registration, &state).await {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HealthCheck, InMemoryRegistry};

    fn registration() -> Registration {
        Registration::new(
            "product",
            "127.0.0.1",
            8081,
            HealthCheck {
                url: "http://127.0.0.1:8081/health".into(),
                interval: Duration::from_secs(10),
                timeout: Duration::from_secs(5),
                deregister_after: Duration::from_secs(30),
                headers: Vec::new(),
            },
        )
    }

    #[tokio::test]
    async fn failed_registration_leaves_state_unregistered() {
        let registry = InMemoryRegistry::new();
        registry.set_reachable(false);
        let state = RegistrationState::default();

        assert!(!register_once(&registry, &registration(), &state).await);
        assert!(!state.is_registered());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_once_registry_returns() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.set_reachable(false);
        let state = RegistrationState::default();

        let handle = spawn_registration_retry(registry.clone(), registration(), state.clone(), Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(!state.is_registered());

        registry.set_reachable(true);
        tokio::time::sleep(Duration::from_secs(10)).await;
        handle.await.unwrap();
        assert!(state.is_registered());
        assert_eq!(registry.query("product").await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_still_retries() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.set_reachable(false);
        let state = RegistrationState::default();

        let handle = spawn_registration_retry(registry.clone(), registration(), state.clone(), Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!handle.is_finished());
        assert!(!state.is_registered());

        registry.set_reachable(true);
        tokio::time::sleep(Duration::from_secs(2)).await;
        handle.await.unwrap();
        assert!(state.is_registered());
    }
}
