//! Configuration schema definitions.
//!
//! This module defines the settings of the proxy process itself. The
//! kubeconfig document it serves routes from lives in [`crate::kubeconfig`].
//! All types derive Serde traits for deserialization from a TOML file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default public listener address.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:64443";

/// File name of the control socket.
pub const CONTROL_SOCKET_NAME: &str = "kubeconfig-proxy.sock";

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Public listener configuration.
    pub listener: ListenerConfig,

    /// Control socket configuration.
    pub control: ControlConfig,

    /// Location of the shared kubeconfig document.
    pub kubeconfig: KubeconfigSettings,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// Base URL that registered clusters point at, e.g. `http://127.0.0.1:64443`.
    pub fn base_address(&self) -> String {
        format!("http://{}", self.listener.bind_address)
    }

    /// Resolved kubeconfig path, falling back to `~/.kube/config`.
    pub fn kubeconfig_path(&self) -> Option<PathBuf> {
        self.kubeconfig
            .path
            .clone()
            .or_else(|| dirs_next::home_dir().map(|home| home.join(".kube").join("config")))
    }

    /// Resolved control socket path.
    ///
    /// Prefers `$XDG_RUNTIME_DIR`, then `~/.kube`.
    pub fn control_socket_path(&self) -> Option<PathBuf> {
        self.control.socket_path.clone().or_else(|| {
            dirs_next::runtime_dir()
                .or_else(|| dirs_next::home_dir().map(|home| home.join(".kube")))
                .map(|dir| dir.join(CONTROL_SOCKET_NAME))
        })
    }
}

/// Public listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address. Must be a loopback address.
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
        }
    }
}

/// Control socket configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ControlConfig {
    /// Unix socket path. `None` selects the per-user default.
    pub socket_path: Option<PathBuf>,
}

/// Kubeconfig document location.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct KubeconfigSettings {
    /// Path to the kubeconfig file. `None` selects `~/.kube/config`.
    pub path: Option<PathBuf>,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// How long `register` waits for the reload acknowledgement, in seconds.
    pub control_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            control_secs: 60,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.listener.bind_address, "127.0.0.1:64443");
        assert_eq!(config.base_address(), "http://127.0.0.1:64443");
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn test_partial_toml() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:7000"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.base_address(), "http://127.0.0.1:7000");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.timeouts.connect_secs, 10);
    }

    #[test]
    fn test_explicit_paths_win() {
        let mut config = ProxyConfig::default();
        config.kubeconfig.path = Some(PathBuf::from("/tmp/kc"));
        config.control.socket_path = Some(PathBuf::from("/tmp/kp.sock"));

        assert_eq!(config.kubeconfig_path(), Some(PathBuf::from("/tmp/kc")));
        assert_eq!(config.control_socket_path(), Some(PathBuf::from("/tmp/kp.sock")));
    }
}
