//! Control plane subsystem.
//!
//! # Data Flow
//! ```text
//! kubeconfig-proxy proxy [CONTEXT]
//!     → register.rs (merge managed entries, save kubeconfig)
//!     → client.rs (POST / over the control socket)
//!     → server.rs (local-only HTTP on a Unix socket)
//!     → reloader.rs (load → build → swap route table)
//! ```
//!
//! # Design Decisions
//! - The control socket is a filesystem Unix socket with owner-only
//!   permissions; it is never reachable over TCP
//! - Reloads are serialized; a failed reload leaves the serving table alone
//! - Registration writes first and reloads second, reporting both outcomes

pub mod client;
pub mod register;
pub mod reloader;
pub mod server;

pub use client::{request_reload, ControlError};
pub use register::{merge_registration, RegisterError, Registrar, Registration, PROXY_USER};
pub use reloader::{ReloadError, Reloader};
pub use server::ControlPlane;
