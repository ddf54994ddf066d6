use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use portico_db::SqliteStore;
use portico_identity::{IdentityState, app};
use portico_registry::ServiceRegistry;
use portico_service::{AnnounceArgs, RegistryArgs, SecretArgs, StartupError, announce, registration_for, serve, telemetry};

#[derive(Parser, Debug)]
#[command(name = "portico-identity", version, about = "Login, registration and credential issuance")]
struct Cli {
    #[arg(long, env = "PORTICO_BIND", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    #[arg(long, env = "PORTICO_SERVICE_NAME", default_value = "identity")]
    service_name: String,

    #[arg(long, env = "DATABASE_URL", default_value = "identity.db")]
    database_url: String,

    #[command(flatten)]
    secret: SecretArgs,

    #[command(flatten)]
    registry: RegistryArgs,

    #[command(flatten)]
    announce: AnnounceArgs,
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    telemetry::init();

    let codec = cli.secret.codec()?;
    let registry: Arc<dyn ServiceRegistry> = Arc::new(cli.registry.connect()?);
    let store = Arc::new(SqliteStore::open(&cli.database_url)?);
    tracing::info!(database = %cli.database_url, "user store ready");

    let registration = registration_for(&cli.service_name, cli.bind, &cli.announce, &codec)?;
    let announcement = announce(registry, registration).await;

    let state = IdentityState { store, codec };
    let served = serve(cli.bind, app(state, announcement.state())).await;
    announcement.withdraw().await;
    served
}
