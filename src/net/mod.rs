//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Public traffic:   127.0.0.1:64443 (TCP)  → http::server
//! Control traffic:  kubeconfig-proxy.sock  → control::server
//! ```
//!
//! # Design Decisions
//! - Neither endpoint is reachable from other hosts
//! - The control socket is unauthenticated; file mode 0600 is its only guard
//! - Binding failures are fatal at startup

pub mod listener;

pub use listener::{bind_control, bind_public, ListenerError, SocketFileGuard};
