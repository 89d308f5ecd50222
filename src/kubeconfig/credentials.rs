//! Effective client configuration for a kubeconfig context.
//!
//! # Responsibilities
//! - Follow context → cluster / user references
//! - Read TLS material from inline `*-data` fields or files
//! - Produce request credentials (bearer token, basic auth, client certificate)
//! - Run `exec` credential plugins
//!
//! # Design Decisions
//! - Relative paths resolve against the kubeconfig's directory, as kubectl does
//! - `auth-provider` plugins are rejected rather than silently ignored
//! - Resolution happens once per route table build; a reload refreshes tokens

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64::Engine;
use serde::Deserialize;
use tokio::process::Command;
use url::Url;

use crate::kubeconfig::document::ConfigDocument;

/// Everything needed to talk to one API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub server: Url,
    /// PEM bundle. When set, it is the only trust root.
    pub ca_pem: Option<Vec<u8>>,
    pub insecure_skip_tls_verify: bool,
    pub credentials: Credentials,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Credentials {
    #[default]
    Anonymous,
    Bearer(String),
    Basic { username: String, password: String },
    /// PEM-encoded client certificate and key.
    ClientCertificate { cert_pem: Vec<u8>, key_pem: Vec<u8> },
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("context '{0}' not found")]
    ContextNotFound(String),

    #[error("cluster '{cluster}' referenced by context '{context}' not found")]
    ClusterNotFound { context: String, cluster: String },

    #[error("user '{user}' referenced by context '{context}' not found")]
    UserNotFound { context: String, user: String },

    #[error("invalid server address '{server}': {reason}")]
    InvalidServer { server: String, reason: String },

    #[error("invalid {field}: {reason}")]
    Malformed { field: &'static str, reason: String },

    #[error("failed to read {path}: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },

    #[error("exec plugin '{command}' failed: {reason}")]
    Exec { command: String, reason: String },

    #[error("auth-provider '{0}' is not supported, use an exec plugin")]
    UnsupportedAuthProvider(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct ClusterFields {
    certificate_authority: Option<PathBuf>,
    certificate_authority_data: Option<String>,
    insecure_skip_tls_verify: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct AuthInfo {
    token: Option<String>,
    #[serde(rename = "tokenFile")]
    token_file: Option<PathBuf>,
    username: Option<String>,
    password: Option<String>,
    client_certificate: Option<PathBuf>,
    client_certificate_data: Option<String>,
    client_key: Option<PathBuf>,
    client_key_data: Option<String>,
    exec: Option<ExecConfig>,
    auth_provider: Option<AuthProvider>,
}

#[derive(Debug, Deserialize)]
struct AuthProvider {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecConfig {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: Option<Vec<ExecEnv>>,
    #[serde(default = "default_exec_api_version")]
    api_version: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ExecEnv {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct ExecCredential {
    status: Option<ExecCredentialStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecCredentialStatus {
    token: Option<String>,
    client_certificate_data: Option<String>,
    client_key_data: Option<String>,
}

fn default_exec_api_version() -> String {
    "client.authentication.k8s.io/v1beta1".to_string()
}

/// Resolve the client configuration for `context_name`.
///
/// `base_dir` is the directory relative file references resolve against.
pub async fn resolve_client_config(
    doc: &ConfigDocument,
    base_dir: &Path,
    context_name: &str,
) -> Result<ClientConfig, CredentialError> {
    let context = doc
        .context(context_name)
        .ok_or_else(|| CredentialError::ContextNotFound(context_name.to_string()))?;

    let cluster = doc
        .cluster(&context.context.cluster)
        .ok_or_else(|| CredentialError::ClusterNotFound {
            context: context_name.to_string(),
            cluster: context.context.cluster.clone(),
        })?;

    let server = parse_server(&cluster.cluster.server)?;
    let fields: ClusterFields = from_mapping(&cluster.cluster.extra, "cluster")?;

    let ca_pem = read_material(
        base_dir,
        fields.certificate_authority_data.as_deref(),
        fields.certificate_authority.as_deref(),
        "certificate-authority-data",
    )
    .await?;

    let credentials = if context.context.user.is_empty() {
        Credentials::Anonymous
    } else {
        let user = doc
            .user(&context.context.user)
            .ok_or_else(|| CredentialError::UserNotFound {
                context: context_name.to_string(),
                user: context.context.user.clone(),
            })?;
        let auth: AuthInfo = match &user.user {
            serde_yaml::Value::Null => AuthInfo::default(),
            value => serde_yaml::from_value(value.clone()).map_err(|e| CredentialError::Malformed {
                field: "user",
                reason: e.to_string(),
            })?,
        };
        resolve_credentials(base_dir, auth).await?
    };

    Ok(ClientConfig {
        server,
        ca_pem,
        insecure_skip_tls_verify: fields.insecure_skip_tls_verify,
        credentials,
    })
}

fn parse_server(server: &str) -> Result<Url, CredentialError> {
    let invalid = |reason: String| CredentialError::InvalidServer {
        server: server.to_string(),
        reason,
    };
    let url = Url::parse(server).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}

fn from_mapping<T: for<'de> Deserialize<'de>>(
    mapping: &serde_yaml::Mapping,
    field: &'static str,
) -> Result<T, CredentialError> {
    serde_yaml::from_value(serde_yaml::Value::Mapping(mapping.clone())).map_err(|e| {
        CredentialError::Malformed {
            field,
            reason: e.to_string(),
        }
    })
}

async fn resolve_credentials(
    base_dir: &Path,
    auth: AuthInfo,
) -> Result<Credentials, CredentialError> {
    if let Some(provider) = auth.auth_provider {
        return Err(CredentialError::UnsupportedAuthProvider(provider.name));
    }

    let cert = read_material(
        base_dir,
        auth.client_certificate_data.as_deref(),
        auth.client_certificate.as_deref(),
        "client-certificate-data",
    )
    .await?;
    let key = read_material(
        base_dir,
        auth.client_key_data.as_deref(),
        auth.client_key.as_deref(),
        "client-key-data",
    )
    .await?;

    match (cert, key) {
        (Some(cert_pem), Some(key_pem)) => {
            return Ok(Credentials::ClientCertificate { cert_pem, key_pem });
        }
        (Some(_), None) => {
            return Err(CredentialError::Malformed {
                field: "client-key-data",
                reason: "client certificate given without a key".to_string(),
            });
        }
        (None, Some(_)) => {
            return Err(CredentialError::Malformed {
                field: "client-certificate-data",
                reason: "client key given without a certificate".to_string(),
            });
        }
        (None, None) => {}
    }

    if let Some(token) = auth.token.filter(|t| !t.is_empty()) {
        return Ok(Credentials::Bearer(token));
    }

    if let Some(path) = auth.token_file {
        let path = absolutize(base_dir, &path);
        let token = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| CredentialError::ReadFile { path, source })?;
        return Ok(Credentials::Bearer(token.trim().to_string()));
    }

    if let (Some(username), Some(password)) = (auth.username, auth.password) {
        return Ok(Credentials::Basic { username, password });
    }

    if let Some(exec) = auth.exec {
        return run_exec_plugin(&exec).await;
    }

    Ok(Credentials::Anonymous)
}

/// Prefer inline base64 data, then a file reference.
async fn read_material(
    base_dir: &Path,
    data: Option<&str>,
    file: Option<&Path>,
    field: &'static str,
) -> Result<Option<Vec<u8>>, CredentialError> {
    if let Some(data) = data.filter(|d| !d.is_empty()) {
        return decode_base64(data, field).map(Some);
    }

    match file.filter(|p| !p.as_os_str().is_empty()) {
        Some(path) => {
            let path = absolutize(base_dir, path);
            tokio::fs::read(&path)
                .await
                .map(Some)
                .map_err(|source| CredentialError::ReadFile { path, source })
        }
        None => Ok(None),
    }
}

fn decode_base64(data: &str, field: &'static str) -> Result<Vec<u8>, CredentialError> {
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| CredentialError::Malformed {
            field,
            reason: e.to_string(),
        })
}

fn absolutize(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

async fn run_exec_plugin(exec: &ExecConfig) -> Result<Credentials, CredentialError> {
    let failed = |reason: String| CredentialError::Exec {
        command: exec.command.clone(),
        reason,
    };

    let exec_info = serde_json::json!({
        "apiVersion": exec.api_version,
        "kind": "ExecCredential",
        "spec": { "interactive": false },
    });
    let env: BTreeMap<_, _> = exec
        .env
        .iter()
        .flatten()
        .map(|e| (e.name.clone(), e.value.clone()))
        .collect();

    tracing::debug!(command = %exec.command, "Running exec credential plugin");
    let output = Command::new(&exec.command)
        .args(&exec.args)
        .envs(env)
        .env("KUBERNETES_EXEC_INFO", exec_info.to_string())
        .stdin(std::process::Stdio::null())
        .output()
        .await
        .map_err(|e| failed(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(failed(format!("exited with {}: {}", output.status, stderr.trim())));
    }

    let credential: ExecCredential = serde_json::from_slice(&output.stdout)
        .map_err(|e| failed(format!("invalid output: {}", e)))?;
    let status = credential
        .status
        .ok_or_else(|| failed("output has no status".to_string()))?;

    match status {
        ExecCredentialStatus {
            client_certificate_data: Some(cert),
            client_key_data: Some(key),
            ..
        } => Ok(Credentials::ClientCertificate {
            cert_pem: cert.into_bytes(),
            key_pem: key.into_bytes(),
        }),
        ExecCredentialStatus { token: Some(token), .. } => Ok(Credentials::Bearer(token)),
        _ => Err(failed("output has neither token nor client certificate".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(yaml: &str) -> ConfigDocument {
        serde_yaml::from_str(yaml).unwrap()
    }

    const BASE: &str = r#"
clusters:
- name: dev
  cluster:
    server: https://10.0.0.1:6443/base
    certificate-authority-data: LS0tLS1CRUdJTg==
users:
- name: token-user
  user:
    token: s3cret
- name: basic-user
  user:
    username: admin
    password: hunter2
- name: file-user
  user:
    tokenFile: token.txt
- name: oidc
  user:
    auth-provider:
      name: oidc
- name: cert-only
  user:
    client-certificate-data: Y2VydA==
    token: fallback
- name: key-only
  user:
    client-key-data: a2V5
contexts:
- name: dev
  context: {cluster: dev, user: token-user}
- name: basic
  context: {cluster: dev, user: basic-user}
- name: file
  context: {cluster: dev, user: file-user}
- name: anon
  context: {cluster: dev}
- name: oidc
  context: {cluster: dev, user: oidc}
- name: dangling
  context: {cluster: missing, user: token-user}
- name: cert-only
  context: {cluster: dev, user: cert-only}
- name: key-only
  context: {cluster: dev, user: key-only}
"#;

    #[tokio::test]
    async fn test_bearer_token() {
        let cfg = resolve_client_config(&doc(BASE), Path::new("/"), "dev").await.unwrap();
        assert_eq!(cfg.server.as_str(), "https://10.0.0.1:6443/base");
        assert_eq!(cfg.ca_pem.as_deref(), Some(&b"-----BEGIN"[..]));
        assert_eq!(cfg.credentials, Credentials::Bearer("s3cret".into()));
    }

    #[tokio::test]
    async fn test_basic_and_anonymous() {
        let d = doc(BASE);
        let basic = resolve_client_config(&d, Path::new("/"), "basic").await.unwrap();
        assert_eq!(
            basic.credentials,
            Credentials::Basic {
                username: "admin".into(),
                password: "hunter2".into()
            }
        );

        let anon = resolve_client_config(&d, Path::new("/"), "anon").await.unwrap();
        assert_eq!(anon.credentials, Credentials::Anonymous);
    }

    #[tokio::test]
    async fn test_token_file_relative_to_kubeconfig() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("token.txt"), "from-file\n").unwrap();

        let cfg = resolve_client_config(&doc(BASE), dir.path(), "file").await.unwrap();
        assert_eq!(cfg.credentials, Credentials::Bearer("from-file".into()));
    }

    #[tokio::test]
    async fn test_missing_references() {
        let d = doc(BASE);
        assert!(matches!(
            resolve_client_config(&d, Path::new("/"), "nope").await,
            Err(CredentialError::ContextNotFound(_))
        ));
        assert!(matches!(
            resolve_client_config(&d, Path::new("/"), "dangling").await,
            Err(CredentialError::ClusterNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_auth_provider_rejected() {
        let result = resolve_client_config(&doc(BASE), Path::new("/"), "oidc").await;
        assert!(matches!(
            result,
            Err(CredentialError::UnsupportedAuthProvider(name)) if name == "oidc"
        ));
    }

    #[tokio::test]
    async fn test_half_client_certificate_rejected() {
        let d = doc(BASE);
        assert!(matches!(
            resolve_client_config(&d, Path::new("/"), "cert-only").await,
            Err(CredentialError::Malformed { field: "client-key-data", .. })
        ));
        assert!(matches!(
            resolve_client_config(&d, Path::new("/"), "key-only").await,
            Err(CredentialError::Malformed { field: "client-certificate-data", .. })
        ));
    }

    #[test]
    fn test_server_scheme() {
        assert!(parse_server("https://example.com").is_ok());
        assert!(parse_server("unix:///var/run/k8s.sock").is_err());
        assert!(parse_server("").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_plugin_token() {
        let exec = ExecConfig {
            command: "sh".into(),
            args: vec![
                "-c".into(),
                r#"echo '{"apiVersion":"client.authentication.k8s.io/v1beta1","kind":"ExecCredential","status":{"token":"'"$TOKEN"'"}}'"#.into(),
            ],
            env: Some(vec![ExecEnv {
                name: "TOKEN".into(),
                value: "plugin-token".into(),
            }]),
            api_version: default_exec_api_version(),
        };

        let creds = run_exec_plugin(&exec).await.unwrap();
        assert_eq!(creds, Credentials::Bearer("plugin-token".into()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_plugin_failure() {
        let exec = ExecConfig {
            command: "sh".into(),
            args: vec!["-c".into(), "echo denied >&2; exit 3".into()],
            env: None,
            api_version: default_exec_api_version(),
        };

        let err = run_exec_plugin(&exec).await.unwrap_err();
        assert!(err.to_string().contains("denied"));
    }
}
