//! Semantic validation of the proxy settings.
//!
//! # Responsibilities
//! - Keep every listener on loopback (the public port and the control socket
//!   carry no authentication of their own)
//! - Reject zero timeouts and empty paths

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with the settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: '{value}' is not a loopback address")]
    NotLoopback { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("{field} must not be empty")]
    EmptyPath { field: &'static str },
}

/// Validate settings, collecting every problem rather than stopping at the first.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_loopback("listener.bind_address", &config.listener.bind_address, &mut errors);

    if config.observability.metrics_enabled {
        check_loopback(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "timeouts.connect_secs" });
    }
    if config.timeouts.control_secs == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "timeouts.control_secs" });
    }

    if matches!(&config.control.socket_path, Some(p) if p.as_os_str().is_empty()) {
        errors.push(ValidationError::EmptyPath { field: "control.socket_path" });
    }
    if matches!(&config.kubeconfig.path, Some(p) if p.as_os_str().is_empty()) {
        errors.push(ValidationError::EmptyPath { field: "kubeconfig.path" });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_loopback(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    match value.parse::<SocketAddr>() {
        Ok(addr) if addr.ip().is_loopback() => {}
        Ok(_) => errors.push(ValidationError::NotLoopback {
            field,
            value: value.to_string(),
        }),
        Err(_) => errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        }),
    }
}
