//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → [routing table lookup]
//!     → forward.rs (strip prefix, attach credentials, stream to upstream;
//!                   on 101, tunnel raw bytes both ways)
//!     → response.rs (strip hop-by-hop headers, error mapping)
//!     → Send to client
//! ```

pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use forward::{ForwardError, ForwardingHandler, HandlerFactory, ReqwestHandlerFactory};
pub use request::X_REQUEST_ID;
pub use server::PublicListener;
