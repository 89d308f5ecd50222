//! Control plane HTTP handler on the local socket.
//!
//! `POST /` reloads the route table: `200` with a summary on success, `500`
//! with the error text on failure. Anything else is `405`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    routing::post,
    Router,
};
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::control::reloader::Reloader;
use crate::http::response::text_response;

/// Serves reload requests on the control socket.
pub struct ControlPlane {
    router: Router,
}

impl ControlPlane {
    pub fn new(reloader: Arc<Reloader>) -> Self {
        let router = Router::new()
            .route("/", post(reload_handler).fallback(method_not_allowed))
            .fallback(method_not_allowed)
            .with_state(reloader)
            .layer(TraceLayer::new_for_http());
        Self { router }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn run(
        self,
        listener: UnixListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!("Control plane serving");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Control plane stopped");
        Ok(())
    }
}

async fn reload_handler(State(reloader): State<Arc<Reloader>>) -> Response {
    tracing::info!("Reload requested over control socket");
    match reloader.reload().await {
        Ok(count) => text_response(StatusCode::OK, format!("reloaded {} routes\n", count)),
        Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e)),
    }
}

async fn method_not_allowed() -> Response {
    text_response(StatusCode::METHOD_NOT_ALLOWED, "only POST / is supported\n")
}
