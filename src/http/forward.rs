//! Forwarding handlers: one per registered route.
//!
//! # Responsibilities
//! - Define the [`ForwardingHandler`] / [`HandlerFactory`] seam the route
//!   table is built from
//! - Provide the reqwest-backed factory that attaches the route's TLS
//!   material and credentials
//!
//! # Design Decisions
//! - One HTTP client per route, built once per table; reload rebuilds them
//! - No path filtering, no body limit, no total request timeout
//! - Only the connect timeout is bounded
//! - Redirects are passed back to the client, never followed
//! - Upgrades (`kubectl exec`, `attach`, `port-forward`) are tunnelled as raw
//!   bytes once the upstream answers `101`; the tunnel outlives the table
//!   it was opened from

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, HttpBody},
    http::{header, HeaderValue, Request, StatusCode, Uri},
    response::Response,
};
use base64::Engine;
use futures_util::future::BoxFuture;
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use url::Url;

use crate::http::response::{bad_gateway, set_upgrade_headers, strip_hop_by_hop, upgrade_protocol};
use crate::kubeconfig::{ClientConfig, Credentials};

/// Proxies requests under one prefix to one upstream.
pub trait ForwardingHandler: Send + Sync {
    fn forward(&self, request: Request<Body>) -> BoxFuture<'static, Response>;
}

/// Builds a forwarding handler for an upstream mounted at a path prefix.
pub trait HandlerFactory: Send + Sync {
    fn build(
        &self,
        prefix: &str,
        client: &ClientConfig,
    ) -> Result<Arc<dyn ForwardingHandler>, ForwardError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid TLS material: {0}")]
    Tls(#[source] reqwest::Error),

    #[error("certificate authority contains no certificates")]
    NoCertificates,

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("credentials are not a valid header value")]
    Header(#[from] header::InvalidHeaderValue),
}

/// Factory producing reqwest-backed forwarders.
#[derive(Debug, Clone)]
pub struct ReqwestHandlerFactory {
    connect_timeout: Duration,
}

impl ReqwestHandlerFactory {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl HandlerFactory for ReqwestHandlerFactory {
    fn build(
        &self,
        prefix: &str,
        config: &ClientConfig,
    ) -> Result<Arc<dyn ForwardingHandler>, ForwardError> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(self.connect_timeout);

        if let Some(ca) = &config.ca_pem {
            let certs = reqwest::Certificate::from_pem_bundle(ca).map_err(ForwardError::Tls)?;
            if certs.is_empty() {
                return Err(ForwardError::NoCertificates);
            }
            builder = builder.tls_built_in_root_certs(false);
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }
        if config.insecure_skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let authorization = match &config.credentials {
            Credentials::Anonymous => None,
            Credentials::Bearer(token) => {
                Some(HeaderValue::from_str(&format!("Bearer {}", token))?)
            }
            Credentials::Basic { username, password } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, password));
                Some(HeaderValue::from_str(&format!("Basic {}", encoded))?)
            }
            Credentials::ClientCertificate { cert_pem, key_pem } => {
                let pem = [cert_pem.as_slice(), b"\n", key_pem.as_slice()].concat();
                let identity = reqwest::Identity::from_pem(&pem).map_err(ForwardError::Tls)?;
                builder = builder.identity(identity);
                None
            }
        }
        .map(|mut value| {
            value.set_sensitive(true);
            value
        });

        let client = builder.build().map_err(ForwardError::Client)?;

        Ok(Arc::new(UpstreamForwarder {
            prefix: prefix.to_string(),
            upstream: config.server.clone(),
            client,
            authorization,
        }))
    }
}

/// Forwards requests under `prefix` to `upstream`.
#[derive(Debug, Clone)]
pub struct UpstreamForwarder {
    prefix: String,
    upstream: Url,
    client: reqwest::Client,
    authorization: Option<HeaderValue>,
}

impl ForwardingHandler for UpstreamForwarder {
    fn forward(&self, request: Request<Body>) -> BoxFuture<'static, Response> {
        let this = self.clone();
        Box::pin(async move {
            let method = request.method().clone();
            let path = request.uri().path().to_string();
            match this.send(request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(
                        method = %method,
                        path = %path,
                        upstream = %this.upstream,
                        error = %e,
                        "Upstream error"
                    );
                    bad_gateway(e)
                }
            }
        })
    }
}

impl UpstreamForwarder {
    async fn send(&self, request: Request<Body>) -> Result<Response, reqwest::Error> {
        let (mut parts, body) = request.into_parts();
        let url = target_url(&self.upstream, &self.prefix, &parts.uri);

        let protocol = upgrade_protocol(&parts.headers);
        let on_upgrade = protocol
            .as_ref()
            .and_then(|_| parts.extensions.remove::<OnUpgrade>());

        let mut headers = strip_hop_by_hop(&parts.headers);
        headers.remove(header::HOST);
        if let Some(authorization) = &self.authorization {
            headers.insert(header::AUTHORIZATION, authorization.clone());
        }
        if let Some(protocol) = protocol {
            set_upgrade_headers(&mut headers, protocol);
        }

        let mut upstream = self.client.request(parts.method, url).headers(headers);
        if body.size_hint().exact() != Some(0) {
            upstream = upstream.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }
        let upstream = upstream.send().await?;

        let status = upstream.status();
        let mut headers = strip_hop_by_hop(upstream.headers());

        if status == StatusCode::SWITCHING_PROTOCOLS {
            let upstream_protocol = upgrade_protocol(upstream.headers());
            let (Some(on_upgrade), Some(protocol)) = (on_upgrade, upstream_protocol) else {
                return Ok(bad_gateway("upstream switched protocols without an upgrade request"));
            };
            set_upgrade_headers(&mut headers, protocol);
            tokio::spawn(tunnel(on_upgrade, upstream, self.prefix.clone()));

            let mut response = Response::new(Body::empty());
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            return Ok(response);
        }

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Shuttle bytes between the upgraded client and upstream connections until
/// either side closes.
async fn tunnel(client: OnUpgrade, upstream: reqwest::Response, route: String) {
    let mut upstream = match upstream.upgrade().await {
        Ok(io) => io,
        Err(e) => {
            tracing::warn!(route = %route, error = %e, "Upstream upgrade failed");
            return;
        }
    };
    let mut client = match client.await {
        Ok(io) => TokioIo::new(io),
        Err(e) => {
            tracing::warn!(route = %route, error = %e, "Client upgrade failed");
            return;
        }
    };

    tracing::debug!(route = %route, "Upgraded connection open");
    match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
        Ok((sent, received)) => {
            tracing::debug!(route = %route, sent, received, "Upgraded connection closed")
        }
        Err(e) => tracing::debug!(route = %route, error = %e, "Upgraded connection aborted"),
    }
}

/// Strip `prefix` from the request path and graft the rest onto the
/// upstream's own path, keeping the query string.
fn target_url(upstream: &Url, prefix: &str, uri: &Uri) -> Url {
    let path = uri.path();
    let rest = path.strip_prefix(prefix).unwrap_or(path);

    let mut url = upstream.clone();
    let base = upstream.path().trim_end_matches('/');
    let joined = match (base.is_empty(), rest.is_empty()) {
        (true, true) => "/".to_string(),
        _ => format!("{}{}", base, rest),
    };
    url.set_path(&joined);
    url.set_query(uri.query());
    url
}
