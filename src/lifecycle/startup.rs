//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the kubeconfig and build the initial route table
//! - Bind the public listener and the control socket
//! - Run both servers until shutdown, then drain
//!
//! # Design Decisions
//! - Fail fast: an unreadable kubeconfig or a route that cannot be built
//!   stops startup before anything is bound
//! - Listeners bind last, so traffic only arrives once routes exist
//! - Shutdown has a deadline; in-flight watches are cut off after it

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, UnixListener};

use crate::config::ProxyConfig;
use crate::control::{ControlPlane, Reloader};
use crate::http::{HandlerFactory, PublicListener, ReqwestHandlerFactory};
use crate::kubeconfig::{ConfigStore, StoreError};
use crate::lifecycle::Shutdown;
use crate::net::{bind_control, bind_public, ListenerError, SocketFileGuard};
use crate::observability::metrics;
use crate::routing::{RouteBuildError, RouteTableHolder, UpstreamResolver};

/// How long in-flight requests get to finish after shutdown is triggered.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("cannot determine the kubeconfig path (no home directory); pass --kubeconfig")]
    NoKubeconfigPath,

    #[error("cannot determine the control socket path (no home directory); set control.socket_path")]
    NoSocketPath,

    #[error("failed to load kubeconfig: {0}")]
    Load(#[from] StoreError),

    #[error("failed to build initial routes: {0}")]
    Build(#[from] RouteBuildError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// A fully initialized server, bound and ready to serve.
pub struct Server {
    reloader: Arc<Reloader>,
    public: TcpListener,
    control: UnixListener,
    socket_guard: SocketFileGuard,
}

impl Server {
    /// Initialize with the production forwarding capability.
    pub async fn bind(config: &ProxyConfig) -> Result<Self, StartupError> {
        let factory = ReqwestHandlerFactory::new(Duration::from_secs(config.timeouts.connect_secs));
        Self::bind_with(config, Arc::new(factory)).await
    }

    /// Initialize with a custom forwarding capability.
    pub async fn bind_with(
        config: &ProxyConfig,
        factory: Arc<dyn HandlerFactory>,
    ) -> Result<Self, StartupError> {
        let kubeconfig = config.kubeconfig_path().ok_or(StartupError::NoKubeconfigPath)?;
        let socket = config.control_socket_path().ok_or(StartupError::NoSocketPath)?;

        tracing::info!(
            kubeconfig = %kubeconfig.display(),
            base_address = %config.base_address(),
            "Starting kubeconfig-proxy"
        );

        let store = ConfigStore::new(kubeconfig);
        let resolver = UpstreamResolver::new(config.base_address(), factory);

        let doc = store.load()?;
        let table = resolver.build(&doc, store.base_dir()).await?;
        metrics::set_route_count(table.len());
        tracing::info!(routes = table.len(), "Initial routes built");

        let routes = Arc::new(RouteTableHolder::new(table));
        let reloader = Arc::new(Reloader::new(store, resolver, routes));

        let public = bind_public(&config.listener).await?;
        let (control, socket_guard) = bind_control(&socket).await?;

        Ok(Self {
            reloader,
            public,
            control,
            socket_guard,
        })
    }

    pub fn reloader(&self) -> &Arc<Reloader> {
        &self.reloader
    }

    pub fn routes(&self) -> &Arc<RouteTableHolder> {
        self.reloader.routes()
    }

    pub fn control_socket(&self) -> PathBuf {
        self.socket_guard.path().to_path_buf()
    }

    /// Serve until `shutdown` fires, then give in-flight requests
    /// [`DRAIN_TIMEOUT`] to finish.
    pub async fn run(self, shutdown: Arc<Shutdown>) -> std::io::Result<()> {
        let Self {
            reloader,
            public,
            control,
            socket_guard,
        } = self;

        let public_server = PublicListener::new(Arc::clone(reloader.routes()));
        let control_server = ControlPlane::new(reloader);

        let mut public_task = tokio::spawn(public_server.run(public, shutdown.subscribe()));
        let mut control_task = tokio::spawn(control_server.run(control, shutdown.subscribe()));

        let mut stop = shutdown.subscribe();
        tokio::select! {
            _ = stop.recv() => {}
            result = &mut public_task => {
                shutdown.trigger();
                report("public listener", result);
            }
            result = &mut control_task => {
                shutdown.trigger();
                report("control plane", result);
            }
        }

        let drain = async {
            if !public_task.is_finished() {
                report("public listener", (&mut public_task).await);
            }
            if !control_task.is_finished() {
                report("control plane", (&mut control_task).await);
            }
        };
        if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            tracing::warn!(
                timeout = ?DRAIN_TIMEOUT,
                "Drain deadline reached, dropping open connections"
            );
            public_task.abort();
            control_task.abort();
        }

        drop(socket_guard);
        tracing::info!("Shutdown complete");
        Ok(())
    }
}

fn report(name: &str, result: Result<std::io::Result<()>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(server = name, error = %e, "Server exited with error"),
        Err(e) => tracing::error!(server = name, error = %e, "Server task failed"),
    }
}
