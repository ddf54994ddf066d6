//! Edge router: resolves a path prefix to a service, finds a healthy
//! instance through the registry and forwards the request to it.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use portico_core::RouteTable;
use portico_registry::ServiceRegistry;
use portico_service::probes;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod forward;
pub mod proxy;

pub use forward::{ForwardError, Forwarder};
pub use proxy::{EdgeError, select_instance};

#[derive(Clone)]
pub struct EdgeState {
    pub routes: Arc<RouteTable>,
    pub registry: Arc<dyn ServiceRegistry>,
    pub forwarder: Forwarder,
}

pub fn app(state: EdgeState, metrics: Option<PrometheusHandle>) -> Router {
    let mut router = Router::new().route("/health", get(probes::health));
    if let Some(handle) = metrics {
        router = router.route("/metrics", get(move || std::future::ready(handle.render())));
    }
    router
        .fallback(proxy::route)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
