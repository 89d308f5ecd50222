//! Public HTTP listener.
//!
//! # Responsibilities
//! - Create the Axum router that fronts every registered route
//! - Wire up middleware (tracing, request ID)
//! - Resolve each request against the current route table
//! - Hand matched requests to the route's forwarding handler
//!
//! # Design Decisions
//! - The table snapshot is taken once per request and held until the
//!   response is produced; a concurrent reload never changes it mid-request
//! - No request timeout layer: watch requests stream for as long as the
//!   client keeps them open

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::http::response::not_found;
use crate::observability::metrics;
use crate::routing::RouteTableHolder;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTableHolder>,
}

/// Accepts public traffic and dispatches it through the current route table.
pub struct PublicListener {
    router: Router,
}

impl PublicListener {
    pub fn new(routes: Arc<RouteTableHolder>) -> Self {
        let state = AppState { routes };
        Self {
            router: Self::build_router(state),
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new().fallback(proxy_handler).with_state(state).layer(
            ServiceBuilder::new()
                .layer(set_request_id_layer())
                .layer(TraceLayer::new_for_http())
                .layer(propagate_request_id_layer()),
        )
    }

    /// The router, for serving on a custom listener or driving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until the shutdown signal fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Public listener serving");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Public listener stopped");
        Ok(())
    }
}

/// Looks up the route and forwards the request.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let table = state.routes.current();
    let path = request.uri().path().to_string();

    let Some(matched) = table.lookup(&path) else {
        tracing::debug!(request_id = %request_id(&request), path = %path, "No route matched");
        metrics::record_request("none", 404, start_time);
        return not_found(&path);
    };

    tracing::debug!(
        request_id = %request_id(&request),
        route = %matched.route,
        method = %request.method(),
        path = %path,
        "Proxying request"
    );

    let route = matched.route.to_string();
    let response = matched.handler.forward(request).await;
    metrics::record_request(&route, response.status().as_u16(), start_time);
    response
}
