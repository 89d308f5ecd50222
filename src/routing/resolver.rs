//! Route table construction from a kubeconfig snapshot.
//!
//! # Responsibilities
//! - Select registered routes from the document
//! - Resolve each route's original (non-suffixed) context into a client config
//! - Ask the handler factory for a forwarder mounted at `/<route>`
//!
//! # Design Decisions
//! - All or nothing: one failing route fails the whole build, so a broken
//!   entry can never silently drop routes that were working
//! - Performs no locking; the caller installs the finished table

use std::path::Path;
use std::sync::Arc;

use crate::http::forward::{ForwardError, HandlerFactory};
use crate::kubeconfig::{resolve_client_config, ConfigDocument, CredentialError};
use crate::routing::matcher::{registered_route, route_prefix};
use crate::routing::router::RouteTable;

#[derive(Debug, thiserror::Error)]
pub enum RouteBuildError {
    #[error("route '{route}': {source}")]
    Credentials {
        route: String,
        #[source]
        source: CredentialError,
    },

    #[error("route '{route}': {source}")]
    Handler {
        route: String,
        #[source]
        source: ForwardError,
    },
}

/// Builds route tables for the proxy listening at `base_address`.
#[derive(Clone)]
pub struct UpstreamResolver {
    base_address: String,
    factory: Arc<dyn HandlerFactory>,
}

impl UpstreamResolver {
    pub fn new(base_address: impl Into<String>, factory: Arc<dyn HandlerFactory>) -> Self {
        Self {
            base_address: base_address.into(),
            factory,
        }
    }

    pub fn base_address(&self) -> &str {
        &self.base_address
    }

    /// Build a complete table from `doc`, or fail without a table.
    ///
    /// `base_dir` is the kubeconfig's directory, for relative credential paths.
    pub async fn build(
        &self,
        doc: &ConfigDocument,
        base_dir: &Path,
    ) -> Result<RouteTable, RouteBuildError> {
        tracing::info!("Loading proxy clusters");
        let mut builder = RouteTable::builder();

        for cluster in &doc.clusters {
            let Some(route) = registered_route(cluster, &self.base_address) else {
                continue;
            };

            let client = resolve_client_config(doc, base_dir, route)
                .await
                .map_err(|source| RouteBuildError::Credentials {
                    route: route.to_string(),
                    source,
                })?;

            let prefix = route_prefix(route);
            let handler = self
                .factory
                .build(&prefix, &client)
                .map_err(|source| RouteBuildError::Handler {
                    route: route.to_string(),
                    source,
                })?;

            tracing::info!(
                route = %route,
                upstream = %client.server,
                "Proxying kubeconfig context"
            );
            builder = builder.route(route, handler);
        }

        Ok(builder.build())
    }
}
