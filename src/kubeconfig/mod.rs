//! Kubeconfig document subsystem.
//!
//! # Data Flow
//! ```text
//! ~/.kube/config (YAML)
//!     → store.rs (load, missing file = empty document)
//!     → document.rs (typed clusters/users/contexts + opaque bags)
//!     → credentials.rs (context → effective ClientConfig)
//!
//! Registration:
//!     document.rs upsert_* (overwrite by name, otherwise append)
//!     → store.rs save (temp file + rename)
//! ```
//!
//! # Design Decisions
//! - Unknown fields ride along in flattened mappings and are written back
//!   untouched
//! - Entry order is preserved; upserts replace in place
//! - The store performs no locking; concurrent registrations are the
//!   operator's problem

pub mod credentials;
pub mod document;
pub mod store;

pub use credentials::{resolve_client_config, ClientConfig, CredentialError, Credentials};
pub use document::{Cluster, ClusterEntry, ConfigDocument, Context, ContextEntry, UserEntry};
pub use store::{ConfigStore, StoreError};
