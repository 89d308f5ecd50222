//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stderr (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, loopback only, opt-in)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through the public listener's spans
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
