use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use portico_core::CredentialCodec;
use portico_registry::ConsulRegistry;

use crate::error::StartupError;

#[derive(Debug, Clone, Args)]
pub struct SecretArgs {
    /// Shared HMAC secret. Every verifying service must use the same value.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,
}

impl SecretArgs {
    pub fn codec(&self) -> Result<Arc<CredentialCodec>, StartupError> {
        Ok(Arc::new(CredentialCodec::new(self.jwt_secret.as_bytes())?))
    }
}

#[derive(Debug, Clone, Args)]
pub struct RegistryArgs {
    #[arg(long, env = "CONSUL_HOST", default_value = "127.0.0.1")]
    pub consul_host: String,

    #[arg(long, env = "CONSUL_PORT", default_value_t = 8500)]
    pub consul_port: u16,

    /// Upper bound for every registry call.
    #[arg(long, env = "PORTICO_REGISTRY_TIMEOUT_SECS", default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub registry_timeout_secs: u64,
}

impl RegistryArgs {
    pub fn registry_url(&self) -> String {
        format!("http://{}:{}", self.consul_host, self.consul_port)
    }

    pub fn connect(&self) -> Result<ConsulRegistry, StartupError> {
        Ok(ConsulRegistry::new(
            &self.registry_url(),
            Duration::from_secs(self.registry_timeout_secs),
        )?)
    }
}

/// How a backend announces itself to the registry.
#[derive(Debug, Clone, Args)]
pub struct AnnounceArgs {
    /// Host the registry and the edge should use to reach this instance.
    /// Defaults to the service name.
    #[arg(long, env = "PORTICO_ADVERTISE_HOST")]
    pub advertise_host: Option<String>,

    /// Defaults to the bind port.
    #[arg(long, env = "PORTICO_ADVERTISE_PORT")]
    pub advertise_port: Option<u16>,

    #[arg(long, env = "PORTICO_CHECK_INTERVAL_SECS", default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub check_interval_secs: u64,

    #[arg(long, env = "PORTICO_CHECK_TIMEOUT_SECS", default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub check_timeout_secs: u64,

    #[arg(long, env = "PORTICO_DEREGISTER_AFTER_SECS", default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub deregister_after_secs: u64,

    /// Send a long-lived system credential with every health check.
    #[arg(long, env = "PORTICO_CHECKER_CREDENTIAL", default_value_t = false)]
    pub checker_credential: bool,
}

impl Default for AnnounceArgs {
    fn default() -> Self {
        Self {
            advertise_host: None,
            advertise_port: None,
            check_interval_secs: 10,
            check_timeout_secs: 5,
            deregister_after_secs: 30,
            checker_credential: false,
        }
    }
}
