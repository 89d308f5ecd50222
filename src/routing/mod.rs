//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → RouteTableHolder::current() (lock-free snapshot)
//!     → router.rs (exact prefix, then longest subtree prefix)
//!     → Return: matched handler or NoMatch
//!
//! Route Compilation (startup and every reload):
//!     ConfigDocument
//!     → matcher.rs (registered-route predicate)
//!     → resolver.rs (credentials + forwarding handler per route)
//!     → Freeze as immutable RouteTable
//!     → RouteTableHolder::replace (atomic swap)
//! ```
//!
//! # Design Decisions
//! - Tables are immutable; reload replaces the whole table
//! - A build either produces every route or nothing
//! - Deterministic: same path always matches same route

pub mod matcher;
pub mod resolver;
pub mod router;

pub use matcher::MARKER_SUFFIX;
pub use resolver::{RouteBuildError, UpstreamResolver};
pub use router::{RouteMatch, RouteTable, RouteTableHolder};
