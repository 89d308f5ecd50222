//! Route lookup and the swappable current table.
//!
//! # Responsibilities
//! - Store compiled routes as an immutable [`RouteTable`]
//! - Look up the handler for a request path
//! - Publish the current table through [`RouteTableHolder`]
//!
//! # Design Decisions
//! - Immutable after construction; a reload builds a whole new table
//! - Exact key first, then the longest subtree key ending in `/`
//! - O(n) subtree scan (route counts are small)
//! - Readers load an `Arc` snapshot without locking; in-flight requests keep
//!   the table they started with

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::http::forward::ForwardingHandler;
use crate::routing::matcher::route_prefix;

#[derive(Clone)]
struct RouteEntry {
    route: Arc<str>,
    handler: Arc<dyn ForwardingHandler>,
}

/// A matched route.
pub struct RouteMatch<'a> {
    pub route: &'a str,
    pub handler: &'a Arc<dyn ForwardingHandler>,
}

/// Immutable mapping from path prefix to forwarding handler.
#[derive(Clone, Default)]
pub struct RouteTable {
    entries: BTreeMap<String, RouteEntry>,
    routes: Vec<Arc<str>>,
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.routes)
            .finish()
    }
}

impl RouteTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    /// Find the handler for `path`.
    pub fn lookup(&self, path: &str) -> Option<RouteMatch<'_>> {
        let entry = self.entries.get(path).or_else(|| {
            self.entries
                .iter()
                .filter(|(key, _)| key.ends_with('/') && path.starts_with(key.as_str()))
                .max_by_key(|(key, _)| key.len())
                .map(|(_, entry)| entry)
        })?;

        Some(RouteMatch {
            route: &entry.route,
            handler: &entry.handler,
        })
    }

    /// Route names in insertion order.
    pub fn route_names(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| &**r)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Accumulates routes before freezing them into a [`RouteTable`].
#[derive(Default)]
pub struct RouteTableBuilder {
    table: RouteTable,
}

impl RouteTableBuilder {
    /// Mount `handler` at `/<route_name>` and `/<route_name>/`.
    pub fn route(mut self, route_name: &str, handler: Arc<dyn ForwardingHandler>) -> Self {
        let prefix = route_prefix(route_name);
        let entry = RouteEntry {
            route: Arc::from(route_name),
            handler,
        };

        if !self.table.routes.iter().any(|r| &**r == route_name) {
            self.table.routes.push(entry.route.clone());
        }
        self.table.entries.insert(format!("{}/", prefix), entry.clone());
        self.table.entries.insert(prefix, entry);
        self
    }

    pub fn build(self) -> RouteTable {
        self.table
    }
}

/// Holds the current route table.
///
/// `current` never blocks; `replace` publishes a new table atomically. Two
/// concurrent replacements apply in some order and the last one wins.
pub struct RouteTableHolder {
    current: ArcSwap<RouteTable>,
}

impl RouteTableHolder {
    pub fn new(table: RouteTable) -> Self {
        Self {
            current: ArcSwap::from_pointee(table),
        }
    }

    /// Most recently installed table.
    pub fn current(&self) -> Arc<RouteTable> {
        self.current.load_full()
    }

    /// Install `table`, returning the table it superseded.
    pub fn replace(&self, table: RouteTable) -> Arc<RouteTable> {
        self.current.swap(Arc::new(table))
    }
}

impl Default for RouteTableHolder {
    fn default() -> Self {
        Self::new(RouteTable::empty())
    }
}
