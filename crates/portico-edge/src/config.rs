use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use portico_core::{RouteRule, RouteTable};
use portico_service::{RegistryArgs, StartupError};

use crate::Forwarder;

#[derive(Debug, Clone, Parser)]
#[command(name = "portico-edge", about = "Discovery-driven edge router")]
pub struct EdgeArgs {
    #[arg(long, env = "PORTICO_BIND", default_value = "0.0.0.0:7573")]
    pub bind: SocketAddr,

    /// `<prefix>=<service>` strips the prefix, `<prefix>=<service>:keep`
    /// forwards the full path.
    #[arg(
        long = "route",
        env = "PORTICO_ROUTES",
        value_delimiter = ',',
        default_values = ["/auth=identity", "/products=product"]
    )]
    pub routes: Vec<RouteRule>,

    /// Upper bound for a whole downstream exchange.
    #[arg(long, env = "PORTICO_FORWARD_TIMEOUT_SECS", default_value_t = 30)]
    pub forward_timeout_secs: u64,

    #[arg(long, env = "PORTICO_CONNECT_TIMEOUT_SECS", default_value_t = 5)]
    pub connect_timeout_secs: u64,

    #[arg(long, env = "PORTICO_MAX_BODY_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub max_body_bytes: usize,

    #[command(flatten)]
    pub registry: RegistryArgs,
}

impl EdgeArgs {
    pub fn route_table(&self) -> RouteTable {
        RouteTable::new(self.routes.clone())
    }

    pub fn forwarder(&self) -> Result<Forwarder, StartupError> {
        Forwarder::new(
            Duration::from_secs(self.forward_timeout_secs),
            Duration::from_secs(self.connect_timeout_secs),
            self.max_body_bytes,
        )
        .map_err(|e| StartupError::HttpClient(e.to_string()))
    }
}
