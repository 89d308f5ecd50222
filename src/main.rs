//! kubeconfig-proxy
//!
//! A local reverse proxy that fronts Kubernetes API servers on a single
//! loopback port, one path prefix per registered kubeconfig context.
//!
//! # Architecture Overview
//!
//! ```text
//!   kubectl ──▶ 127.0.0.1:64443/<context>/api/...
//!                     │
//!                     ▼
//!   ┌──────────────────────────────────────────────────────────┐
//!   │  http::server (PublicListener)                           │
//!   │      → routing::RouteTableHolder (atomic snapshot)       │
//!   │      → http::forward (strip prefix, credentials, TLS)    │──▶ API server
//!   └──────────────────────────────────────────────────────────┘
//!                     ▲ swap
//!   ┌──────────────────────────────────────────────────────────┐
//!   │  control::server (POST / on a Unix socket, SIGHUP)       │
//!   │      → control::reloader → kubeconfig → routing::resolver│
//!   └──────────────────────────────────────────────────────────┘
//!                     ▲
//!   kubeconfig-proxy proxy [CONTEXT]  (control::register)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use kubeconfig_proxy::config::{loader, ProxyConfig};
use kubeconfig_proxy::control::Registrar;
use kubeconfig_proxy::kubeconfig::ConfigStore;
use kubeconfig_proxy::lifecycle::{spawn_signal_handler, Server, Shutdown};
use kubeconfig_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "kubeconfig-proxy", version)]
#[command(about = "Serve every kubeconfig context through one local port", long_about = None)]
struct Cli {
    /// Kubeconfig to read and update (default: ~/.kube/config)
    #[arg(short, long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Proxy settings file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy server
    Server,
    /// Register a context with the running server and switch to it
    #[command(alias = "register")]
    Proxy {
        /// Context to proxy (default: current-context)
        context: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match settings(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability);

    let result = match cli.command {
        Commands::Server => run_server(config).await,
        Commands::Proxy { context } => run_register(config, context.as_deref()).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn settings(cli: &Cli) -> Result<ProxyConfig, loader::ConfigError> {
    let mut config = loader::load_config(cli.config.as_deref())?;
    if let Some(path) = &cli.kubeconfig {
        config.kubeconfig.path = Some(path.clone());
    }
    loader::finalize(config)
}

async fn run_server(config: ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("kubeconfig-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let server = Server::bind(&config).await?;
    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_handler(Arc::clone(server.reloader()), Arc::clone(&shutdown))?;

    server.run(shutdown).await?;
    Ok(())
}

async fn run_register(
    config: ProxyConfig,
    context: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let kubeconfig = config
        .kubeconfig_path()
        .ok_or("cannot determine the kubeconfig path; pass --kubeconfig")?;
    let socket = config
        .control_socket_path()
        .ok_or("cannot determine the control socket path; set control.socket_path")?;

    let registrar = Registrar::new(ConfigStore::new(kubeconfig), config.base_address(), socket)
        .with_control_timeout(Duration::from_secs(config.timeouts.control_secs));
    let registration = registrar.register(context).await?;

    println!(
        "Switched to context \"{}\" (proxying \"{}\" via {})",
        registration.managed, registration.target, registration.server
    );
    Ok(())
}
