//! kubeconfig-proxy library
//!
//! Route table, forwarding, kubeconfig handling and the control plane behind
//! the `kubeconfig-proxy` binary.

pub mod config;
pub mod control;
pub mod http;
pub mod kubeconfig;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use control::{Registrar, Reloader};
pub use http::PublicListener;
pub use lifecycle::{Server, Shutdown};
pub use routing::{RouteTable, RouteTableHolder};
