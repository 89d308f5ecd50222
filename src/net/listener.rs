//! Listener binding for the public port and the control socket.
//!
//! # Responsibilities
//! - Bind the fixed public TCP address (loopback only)
//! - Bind the control Unix socket, clearing a stale socket file left by a
//!   dead server and refusing to steal one from a live server
//! - Restrict the control socket to the owning user
//! - Remove the socket file on shutdown

use std::io;
use std::net::SocketAddr;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tokio::net::{TcpListener, UnixListener, UnixStream};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("invalid bind address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to bind {address}: {source}")]
    Bind { address: String, source: io::Error },

    #[error("control socket {0} is in use by a running server")]
    SocketInUse(PathBuf),

    #[error("{0} exists and is not a socket")]
    NotASocket(PathBuf),
}

/// Bind the public listener.
pub async fn bind_public(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let addr: SocketAddr = config
        .bind_address
        .parse()
        .map_err(|e: std::net::AddrParseError| ListenerError::InvalidAddress {
            address: config.bind_address.clone(),
            reason: e.to_string(),
        })?;

    if !addr.ip().is_loopback() {
        return Err(ListenerError::InvalidAddress {
            address: config.bind_address.clone(),
            reason: "not a loopback address".to_string(),
        });
    }

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Bind {
            address: addr.to_string(),
            source,
        })?;

    tracing::info!(address = %addr, "Public listener bound");
    Ok(listener)
}

/// Removes the control socket file when dropped.
#[derive(Debug)]
pub struct SocketFileGuard {
    path: PathBuf,
}

impl SocketFileGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SocketFileGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove control socket"
                );
            }
        }
    }
}

/// Bind the control socket at `path` with mode `0600`.
pub async fn bind_control(path: &Path) -> Result<(UnixListener, SocketFileGuard), ListenerError> {
    let bind_err = |source: io::Error| ListenerError::Bind {
        address: path.display().to_string(),
        source,
    };

    match std::fs::symlink_metadata(path) {
        Ok(meta) if !meta.file_type().is_socket() => {
            return Err(ListenerError::NotASocket(path.to_path_buf()));
        }
        Ok(_) => {
            if UnixStream::connect(path).await.is_ok() {
                return Err(ListenerError::SocketInUse(path.to_path_buf()));
            }
            tracing::info!(path = %path.display(), "Removing stale control socket");
            std::fs::remove_file(path).map_err(bind_err)?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(bind_err(e)),
    }

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(bind_err)?;
    }

    let listener = UnixListener::bind(path).map_err(bind_err)?;
    let guard = SocketFileGuard {
        path: path.to_path_buf(),
    };
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(bind_err)?;

    tracing::info!(path = %path.display(), "Control socket bound");
    Ok((listener, guard))
}
