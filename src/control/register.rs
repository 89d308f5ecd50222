//! Registering a context with the running proxy.
//!
//! # Responsibilities
//! - Write a proxy-managed cluster/user/context triple for the target context
//! - Point `current-context` at it
//! - Tell the running server to reload
//!
//! # Design Decisions
//! - Validation happens before any write; a rejected registration leaves the
//!   file untouched
//! - The write is not rolled back when the reload fails; the route becomes
//!   active on the next successful reload or restart

use std::path::PathBuf;
use std::time::Duration;

use serde_yaml::{Mapping, Value};

use crate::control::client::{request_reload, ControlError};
use crate::kubeconfig::{
    Cluster, ClusterEntry, ConfigDocument, ConfigStore, Context, ContextEntry, StoreError,
    UserEntry,
};
use crate::routing::matcher::{is_managed_name, managed_name, route_server};

/// Placeholder identity; the proxy supplies the real credentials.
pub const PROXY_USER: &str = "proxy";

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("no context given and the kubeconfig has no current-context")]
    NoContext,

    #[error("context '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("context '{0}' not found in the kubeconfig")]
    ContextNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The kubeconfig was written but the server could not be reached.
    #[error("registered '{context}' but the proxy was not notified: {source}")]
    ControlUnreachable {
        context: String,
        #[source]
        source: ControlError,
    },

    /// The kubeconfig was written but the server failed to reload.
    #[error("registered '{context}' but the proxy failed to reload: {source}")]
    ReloadRejected {
        context: String,
        #[source]
        source: ControlError,
    },
}

/// Outcome of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// The original context being proxied.
    pub target: String,
    /// Name of the new cluster and context.
    pub managed: String,
    /// Server address written into the new cluster.
    pub server: String,
    pub namespace: Option<String>,
}

/// Merge the proxy-managed entries for `target` (or the current context)
/// into `doc`. Nothing is modified when an error is returned.
pub fn merge_registration(
    doc: &mut ConfigDocument,
    target: Option<&str>,
    base_address: &str,
) -> Result<Registration, RegisterError> {
    let target = match target {
        Some(name) if !name.is_empty() => name.to_string(),
        _ if !doc.current_context.is_empty() => doc.current_context.clone(),
        _ => return Err(RegisterError::NoContext),
    };

    if is_managed_name(&target) {
        return Err(RegisterError::AlreadyRegistered(target));
    }

    let namespace = doc
        .context(&target)
        .ok_or_else(|| RegisterError::ContextNotFound(target.clone()))?
        .context
        .namespace()
        .map(str::to_string);

    let managed = managed_name(&target);
    let server = route_server(base_address, &target);

    doc.upsert_cluster(ClusterEntry {
        name: managed.clone(),
        cluster: Cluster {
            server: server.clone(),
            extra: Mapping::new(),
        },
        extra: Mapping::new(),
    });

    doc.upsert_user(UserEntry {
        name: PROXY_USER.to_string(),
        user: Value::Mapping(Mapping::new()),
        extra: Mapping::new(),
    });

    let mut context_extra = Mapping::new();
    if let Some(ns) = &namespace {
        context_extra.insert("namespace".into(), ns.as_str().into());
    }
    doc.upsert_context(ContextEntry {
        name: managed.clone(),
        context: Context {
            cluster: managed.clone(),
            user: PROXY_USER.to_string(),
            extra: context_extra,
        },
        extra: Mapping::new(),
    });

    doc.current_context = managed.clone();

    Ok(Registration {
        target,
        managed,
        server,
        namespace,
    })
}

/// Runs the registration protocol against a kubeconfig and a control socket.
pub struct Registrar {
    store: ConfigStore,
    base_address: String,
    control_socket: PathBuf,
    control_timeout: Duration,
}

impl Registrar {
    pub fn new(
        store: ConfigStore,
        base_address: impl Into<String>,
        control_socket: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            base_address: base_address.into(),
            control_socket: control_socket.into(),
            control_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_control_timeout(mut self, timeout: Duration) -> Self {
        self.control_timeout = timeout;
        self
    }

    /// Register `target` (default: the current context), persist, then reload.
    pub async fn register(&self, target: Option<&str>) -> Result<Registration, RegisterError> {
        let mut doc = self.store.load()?;
        let registration = merge_registration(&mut doc, target, &self.base_address)?;
        self.store.save(&doc)?;

        tracing::info!(
            context = %registration.target,
            managed = %registration.managed,
            server = %registration.server,
            "Kubeconfig updated"
        );

        match request_reload(&self.control_socket, self.control_timeout).await {
            Ok(reply) => {
                tracing::info!(reply = %reply, "Proxy reloaded");
                Ok(registration)
            }
            Err(source @ ControlError::Unreachable { .. }) => {
                Err(RegisterError::ControlUnreachable {
                    context: registration.managed,
                    source,
                })
            }
            Err(source) => Err(RegisterError::ReloadRejected {
                context: registration.managed,
                source,
            }),
        }
    }
}
