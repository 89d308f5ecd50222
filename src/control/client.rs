//! Client side of the control socket.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;

const MAX_REPLY_BYTES: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("cannot reach control socket {path}: {source} (is `kubeconfig-proxy server` running?)")]
    Unreachable { path: PathBuf, source: io::Error },

    #[error("control request failed: {0}")]
    Http(#[from] hyper::Error),

    #[error("invalid control request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("failed to read control reply: {0}")]
    Body(#[from] axum::Error),

    #[error("no reply from the server within {0:?}")]
    Timeout(Duration),

    #[error("server reported {status}: {message}")]
    Rejected { status: StatusCode, message: String },
}

/// Ask the running server to reload its routes. Returns the server's reply.
pub async fn request_reload(socket: &Path, timeout: Duration) -> Result<String, ControlError> {
    tokio::time::timeout(timeout, send_reload(socket))
        .await
        .map_err(|_| ControlError::Timeout(timeout))?
}

async fn send_reload(socket: &Path) -> Result<String, ControlError> {
    let stream = UnixStream::connect(socket)
        .await
        .map_err(|source| ControlError::Unreachable {
            path: socket.to_path_buf(),
            source,
        })?;

    let (mut sender, connection) =
        hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::debug!(error = %e, "Control connection closed with error");
        }
    });

    let request = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header(header::HOST, "localhost")
        .body(Body::empty())?;

    let response = sender.send_request(request).await?;
    let status = response.status();
    let body = axum::body::to_bytes(Body::new(response.into_body()), MAX_REPLY_BYTES).await?;
    let message = String::from_utf8_lossy(&body).trim().to_string();

    if status.is_success() {
        Ok(message)
    } else {
        Err(ControlError::Rejected { status, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Router};

    async fn serve(router: Router) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        let listener = tokio::net::UnixListener::bind(&path).unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (dir, path)
    }

    #[tokio::test]
    async fn test_success_reply() {
        let router = Router::new().route("/", post(|| async { "reloaded 2 routes\n" }));
        let (_dir, path) = serve(router).await;

        let reply = request_reload(&path, Duration::from_secs(5)).await.unwrap();
        assert_eq!(reply, "reloaded 2 routes");
    }

    #[tokio::test]
    async fn test_failure_reply() {
        let router = Router::new().route(
            "/",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "route 'dev': context 'dev' not found",
                )
            }),
        );
        let (_dir, path) = serve(router).await;

        match request_reload(&path, Duration::from_secs(5)).await {
            Err(ControlError::Rejected { status, message }) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert!(message.contains("context 'dev' not found"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let result = request_reload(&dir.path().join("missing.sock"), Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ControlError::Unreachable { .. })));
    }
}
