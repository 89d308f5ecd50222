//! Route table reload.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::kubeconfig::{ConfigStore, StoreError};
use crate::observability::metrics;
use crate::routing::{RouteBuildError, RouteTableHolder, UpstreamResolver};

#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    #[error(transparent)]
    Load(#[from] StoreError),

    #[error(transparent)]
    Build(#[from] RouteBuildError),
}

/// Reloads the kubeconfig and swaps in a freshly built route table.
///
/// Reloads run one at a time so a slow build can never overwrite a table
/// built after it. The lock is private to reloads; request handling only
/// ever touches the holder.
pub struct Reloader {
    store: ConfigStore,
    resolver: UpstreamResolver,
    routes: Arc<RouteTableHolder>,
    lock: Mutex<()>,
}

impl Reloader {
    pub fn new(
        store: ConfigStore,
        resolver: UpstreamResolver,
        routes: Arc<RouteTableHolder>,
    ) -> Self {
        Self {
            store,
            resolver,
            routes,
            lock: Mutex::new(()),
        }
    }

    pub fn routes(&self) -> &Arc<RouteTableHolder> {
        &self.routes
    }

    /// Load, build and install. On failure the current table stays in place.
    ///
    /// Returns the number of routes now being served.
    pub async fn reload(&self) -> Result<usize, ReloadError> {
        let _guard = self.lock.lock().await;

        let result = self.rebuild().await;
        metrics::record_reload(result.is_ok());

        match result {
            Ok(count) => {
                tracing::info!(routes = count, "Route table reloaded");
                Ok(count)
            }
            Err(e) => {
                tracing::error!(error = %e, "Reload failed, keeping current routes");
                Err(e)
            }
        }
    }

    async fn rebuild(&self) -> Result<usize, ReloadError> {
        let doc = self.store.load()?;
        let table = self.resolver.build(&doc, self.store.base_dir()).await?;
        let count = table.len();
        let names: Vec<_> = table.route_names().collect();
        tracing::debug!(routes = ?names, "Installing route table");

        self.routes.replace(table);
        metrics::set_route_count(count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::forward::testing::EchoFactory;

    const BASE: &str = "http://127.0.0.1:64443";

    fn reloader(dir: &std::path::Path) -> Reloader {
        Reloader::new(
            ConfigStore::new(dir.join("config")),
            UpstreamResolver::new(BASE, Arc::new(EchoFactory)),
            Arc::new(RouteTableHolder::default()),
        )
    }

    const ONE_ROUTE: &str = r#"
clusters:
- name: dev
  cluster: {server: "https://dev.example"}
- name: dev-kubeconfig-proxy
  cluster: {server: "http://127.0.0.1:64443/dev"}
contexts:
- name: dev
  context: {cluster: dev}
"#;

    #[tokio::test]
    async fn test_reload_installs_table() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config"), ONE_ROUTE).unwrap();
        let reloader = reloader(dir.path());

        assert_eq!(reloader.reload().await.unwrap(), 1);
        assert!(reloader.routes().current().lookup("/dev/api").is_some());
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, ONE_ROUTE).unwrap();
        let reloader = reloader(dir.path());
        reloader.reload().await.unwrap();
        let before = reloader.routes().current();

        std::fs::write(&path, "clusters: [").unwrap();
        assert!(matches!(reloader.reload().await, Err(ReloadError::Load(_))));

        let broken = ONE_ROUTE.replace("- name: dev\n  context", "- name: gone\n  context");
        std::fs::write(&path, broken).unwrap();
        assert!(matches!(reloader.reload().await, Err(ReloadError::Build(_))));

        assert!(Arc::ptr_eq(&before, &reloader.routes().current()));
    }
}
