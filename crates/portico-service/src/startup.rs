use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use portico_core::CredentialCodec;
use portico_core::claims::{Claims, HEALTH_CHECKER, SYSTEM_TTL_SECS};
use portico_registry::{
    HealthCheck, Registration, RegistrationState, ServiceRegistry, register_once, spawn_registration_retry,
};

use crate::config::AnnounceArgs;
use crate::error::StartupError;

/// A registration this process owns and withdraws on shutdown.
pub struct Announcement {
    registry: Arc<dyn ServiceRegistry>,
    registration: Registration,
    state: RegistrationState,
}

impl Announcement {
    pub fn state(&self) -> RegistrationState {
        self.state.clone()
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    pub async fn withdraw(self) {
        if !self.state.is_registered() {
            return;
        }
        match self.registry.deregister(&self.registration.id).await {
            Ok(()) => {
                self.state.set_registered(false);
                tracing::info!(id = %self.registration.id, "deregistered from service registry");
            }
            Err(err) => tracing::warn!(id = %self.registration.id, error = %err, "deregistration failed"),
        }
    }
}

/// Describe this instance to the registry, with the optional system
/// credential attached to its health check.
pub fn registration_for(
    service_name: &str,
    bind: SocketAddr,
    args: &AnnounceArgs,
    codec: &CredentialCodec,
) -> Result<Registration, StartupError> {
    let host = args.advertise_host.clone().unwrap_or_else(|| service_name.to_string());
    let port = args.advertise_port.unwrap_or(bind.port());

    let mut headers = Vec::new();
    if args.checker_credential {
        let claims = Claims::for_system(HEALTH_CHECKER, SYSTEM_TTL_SECS, codec.clock());
        headers.push(("Authorization".to_string(), format!("Bearer {}", codec.issue(&claims)?)));
        tracing::info!("health checks will carry a system credential");
    }

    let check = HealthCheck {
        url: format!("http://{host}:{port}/health"),
        interval: Duration::from_secs(args.check_interval_secs),
        timeout: Duration::from_secs(args.check_timeout_secs),
        deregister_after: Duration::from_secs(args.deregister_after_secs),
        headers,
    };
    Ok(Registration::new(service_name, host, port, check))
}

/// Register now; if that fails keep serving and retry in the background.
pub async fn announce(registry: Arc<dyn ServiceRegistry>, registration: Registration) -> Announcement {
    let state = RegistrationState::default();
    if !register_once(registry.as_ref(), &registration, &state).await {
        spawn_registration_retry(
            registry.clone(),
            registration.clone(),
            state.clone(),
            registration.check.interval,
        );
    }
    Announcement {
        registry,
        registration,
        state,
    }
}

pub async fn serve(bind: SocketAddr, app: Router) -> Result<(), StartupError> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("listening on {}", bind);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Which signal ended the serve loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Interrupt,
    Terminate,
}

/// Resolves on SIGINT or SIGTERM. A listener that cannot be installed is
/// logged and never fires; the other one still can.
pub async fn shutdown_signal() {
    let stop = first_stop(interrupt(), terminate()).await;
    tracing::info!(?stop, "draining connections and withdrawing registration");
}

async fn first_stop(
    interrupt: impl std::future::Future<Output = ()>,
    terminate: impl std::future::Future<Output = ()>,
) -> StopSignal {
    tokio::select! {
        () = interrupt => StopSignal::Interrupt,
        () = terminate => StopSignal::Terminate,
    }
}

async fn interrupt() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for SIGINT");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(err) => {
            tracing::error!(error = %err, "cannot listen for SIGTERM");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::Role;
    use portico_registry::InMemoryRegistry;

    fn codec() -> CredentialCodec {
        CredentialCodec::new(b"secret").unwrap()
    }

    #[test]
    fn registration_defaults_to_service_name_and_bind_port() {
        let reg = registration_for("product", "0.0.0.0:8081".parse().unwrap(), &AnnounceArgs::default(), &codec())
            .unwrap();
        assert_eq!(reg.address, "product");
        assert_eq!(reg.port, 8081);
        assert_eq!(reg.check.url, "http://product:8081/health");
        assert!(reg.check.headers.is_empty());
    }

    #[test]
    fn checker_credential_is_a_system_token() {
        let args = AnnounceArgs {
            checker_credential: true,
            ..AnnounceArgs::default()
        };
        let codec = codec();
        let reg = registration_for("product", "0.0.0.0:8081".parse().unwrap(), &args, &codec).unwrap();
        let (name, value) = &reg.check.headers[0];
        assert_eq!(name, "Authorization");
        let token = value.strip_prefix("Bearer ").unwrap();
        let claims = codec.verify(token).unwrap();
        assert_eq!(claims.role, Role::System);
    }

    #[tokio::test]
    async fn announce_then_withdraw() {
        let registry = Arc::new(InMemoryRegistry::new());
        let reg = registration_for("product", "0.0.0.0:8081".parse().unwrap(), &AnnounceArgs::default(), &codec())
            .unwrap();

        let announcement = announce(registry.clone(), reg).await;
        let state = announcement.state();
        assert!(state.is_registered());
        assert_eq!(registry.query("product").await.unwrap().len(), 1);

        announcement.withdraw().await;
        assert!(!state.is_registered());
        assert!(registry.query("product").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn whichever_signal_arrives_first_stops_the_server() {
        let never = std::future::pending::<()>;
        assert_eq!(first_stop(async {}, never()).await, StopSignal::Interrupt);
        assert_eq!(first_stop(never(), async {}).await, StopSignal::Terminate);
    }

    #[tokio::test]
    async fn announce_survives_unreachable_registry() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.set_reachable(false);
        let reg = registration_for("product", "0.0.0.0:8081".parse().unwrap(), &AnnounceArgs::default(), &codec())
            .unwrap();

        let announcement = announce(registry, reg).await;
        assert!(!announcement.state().is_registered());
    }
}
