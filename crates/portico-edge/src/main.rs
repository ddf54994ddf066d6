use std::sync::Arc;

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use portico_edge::config::EdgeArgs;
use portico_edge::{EdgeState, app};
use portico_registry::ServiceRegistry;
use portico_service::{StartupError, serve, telemetry};

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();
    let args = EdgeArgs::parse();
    telemetry::init();

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    metrics::set_global_recorder(recorder).ok();

    let registry: Arc<dyn ServiceRegistry> = Arc::new(args.registry.connect()?);
    let routes = args.route_table();
    for rule in routes.rules() {
        tracing::info!(prefix = %rule.path_prefix, service = %rule.target_service, strip = rule.strip_prefix, "route");
    }

    let state = EdgeState {
        routes: Arc::new(routes),
        registry,
        forwarder: args.forwarder()?,
    };

    serve(args.bind, app(state, Some(handle))).await
}
