//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load kubeconfig → Build routes → Bind public port → Bind control socket
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Remove socket → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Reload routes
//! ```
//!
//! # Design Decisions
//! - Ordered startup: routes first, then listeners
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: open connections are dropped after the deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::spawn_signal_handler;
pub use startup::{Server, StartupError, DRAIN_TIMEOUT};
