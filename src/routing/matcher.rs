//! Registered-route predicate.
//!
//! # Responsibilities
//! - Decide whether a cluster entry points back at this proxy
//! - Derive the route name and URL prefix from the cluster name
//!
//! # Design Decisions
//! - Both the marker suffix and the server address must match, so clusters
//!   managed by hand are never proxied by accident
//! - Address comparison is exact after trimming trailing slashes; a textual
//!   prefix match would also accept `:644430`

use crate::kubeconfig::ClusterEntry;

/// Suffix marking a cluster/context as managed by the proxy.
pub const MARKER_SUFFIX: &str = "-kubeconfig-proxy";

/// Name of the proxy-managed entry for `context`.
pub fn managed_name(context: &str) -> String {
    format!("{}{}", context, MARKER_SUFFIX)
}

/// Whether a context/cluster name already carries the marker suffix.
pub fn is_managed_name(name: &str) -> bool {
    name.ends_with(MARKER_SUFFIX)
}

/// URL path prefix for a route.
pub fn route_prefix(route_name: &str) -> String {
    format!("/{}", route_name)
}

/// Server address written for a registered route.
pub fn route_server(base_address: &str, route_name: &str) -> String {
    format!("{}{}", base_address.trim_end_matches('/'), route_prefix(route_name))
}

/// Return the route name if `cluster` is a registered route of the proxy
/// listening at `base_address`.
pub fn registered_route<'a>(cluster: &'a ClusterEntry, base_address: &str) -> Option<&'a str> {
    let route_name = cluster.name.strip_suffix(MARKER_SUFFIX)?;
    if route_name.is_empty() {
        tracing::warn!(cluster = %cluster.name, "Ignoring proxy cluster with empty route name");
        return None;
    }

    let server = cluster.cluster.server.trim_end_matches('/');
    let base = base_address.trim_end_matches('/');
    if server == base || server == route_server(base, route_name) {
        Some(route_name)
    } else {
        None
    }
}
