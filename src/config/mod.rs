//! Proxy settings subsystem.
//!
//! # Data Flow
//! ```text
//! optional settings file (TOML)
//!     → loader.rs (parse & deserialize, defaults for missing fields)
//!     → CLI overrides (--kubeconfig)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded; only the route table reloads
//! - All fields have defaults, so no settings file is needed
//! - Validation separates syntactic (serde) from semantic checks
//! - Paths are explicit values here, never process-wide globals

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::ProxyConfig;
pub use schema::{
    ControlConfig, KubeconfigSettings, ListenerConfig, LogFormat, ObservabilityConfig,
    TimeoutConfig,
};
