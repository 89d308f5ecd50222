//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Read from `socket` until the end of the HTTP head. Returns the head and
/// any bytes that arrived after it.
pub async fn read_head(socket: &mut TcpStream) -> Option<(String, Vec<u8>)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let rest = buf.split_off(end + 4);
            return Some((String::from_utf8_lossy(&buf).into_owned(), rest));
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

/// Request target and `Authorization` value from an HTTP head.
fn target_and_auth(head: &str) -> (String, String) {
    let mut lines = head.lines();
    let target = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("")
        .to_string();
    let auth = header_value(head, "authorization").unwrap_or_default();
    (target, auth)
}

/// Value of the first header named `name` in an HTTP head.
pub fn header_value(head: &str, name: &str) -> Option<String> {
    head.lines()
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim().to_string())
}

/// Start a mock API server that answers every request with
/// `<path-and-query> auth=<authorization header>`.
pub async fn start_echo_backend(addr: SocketAddr) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let Some((head, _)) = read_head(&mut socket).await else {
                            return;
                        };
                        let (target, auth) = target_and_auth(&head);

                        let body = format!("{} auth={}", target, auth);
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Start a mock API server that accepts protocol upgrades. After the `101`
/// it sends one line, `<path-and-query> auth=<authorization>`, then echoes
/// every byte it receives.
pub async fn start_upgrade_backend(addr: SocketAddr) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let Some((head, _)) = read_head(&mut socket).await else {
                            return;
                        };
                        let Some(protocol) = header_value(&head, "upgrade") else {
                            let _ = socket
                                .write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                                .await;
                            return;
                        };
                        let (target, auth) = target_and_auth(&head);

                        let response = format!(
                            "HTTP/1.1 101 Switching Protocols\r\nConnection: Upgrade\r\nUpgrade: {}\r\n\r\n{} auth={}\n",
                            protocol, target, auth
                        );
                        if socket.write_all(response.as_bytes()).await.is_err() {
                            return;
                        }

                        let mut chunk = [0u8; 1024];
                        loop {
                            match socket.read(&mut chunk).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => {
                                    if socket.write_all(&chunk[..n]).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// HTTP client that never reuses connections or honors proxy env vars.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Write a kubeconfig with contexts `dev` (bearer token, namespace
/// `default`) and `prod`, both pointing at `upstream`.
pub fn write_kubeconfig(dir: &Path, upstream: SocketAddr) -> PathBuf {
    let path = dir.join("config");
    let contents = format!(
        r#"apiVersion: v1
kind: Config
preferences: {{}}
clusters:
- name: dev-cluster
  cluster:
    server: http://{upstream}/base
- name: prod-cluster
  cluster:
    server: http://{upstream}
users:
- name: dev-user
  user:
    token: dev-token
- name: prod-user
  user:
    username: admin
    password: secret
contexts:
- name: dev
  context:
    cluster: dev-cluster
    user: dev-user
    namespace: default
- name: prod
  context:
    cluster: prod-cluster
    user: prod-user
current-context: prod
"#
    );
    std::fs::write(&path, contents).unwrap();
    path
}
