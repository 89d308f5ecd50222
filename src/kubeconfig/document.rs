//! Typed view over a kubeconfig document.
//!
//! Only the fields the proxy reads or writes are typed. Everything else is
//! captured in a flattened [`Mapping`] on the root and on every entry, so a
//! load → mutate → save cycle reproduces fields this crate knows nothing
//! about (`apiVersion`, `preferences`, `extensions`, vendor keys, ...).

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// The shared configuration document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ConfigDocument {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub clusters: Vec<ClusterEntry>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub users: Vec<UserEntry>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub contexts: Vec<ContextEntry>,

    #[serde(rename = "current-context", default)]
    pub current_context: String,

    /// Unknown top-level fields.
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClusterEntry {
    pub name: String,
    pub cluster: Cluster,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Cluster {
    #[serde(default)]
    pub server: String,
    #[serde(flatten)]
    pub extra: Mapping,
}

/// A user entry. The credential body is opaque to the document model; only
/// [`crate::kubeconfig::credentials`] interprets it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UserEntry {
    pub name: String,
    #[serde(default = "empty_mapping")]
    pub user: Value,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ContextEntry {
    pub name: String,
    pub context: Context,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Context {
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub user: String,
    /// Namespace hint and any other context fields.
    #[serde(flatten)]
    pub extra: Mapping,
}

impl Context {
    pub fn namespace(&self) -> Option<&str> {
        self.extra
            .get("namespace")
            .and_then(Value::as_str)
            .filter(|ns| !ns.is_empty())
    }
}

/// Entries keyed by a unique `name`.
pub trait Named {
    fn name(&self) -> &str;
}

impl Named for ClusterEntry {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for UserEntry {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for ContextEntry {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Replace the entry with the same name in place, or append it.
fn upsert<T: Named>(entries: &mut Vec<T>, entry: T) {
    match entries.iter_mut().find(|e| e.name() == entry.name()) {
        Some(slot) => *slot = entry,
        None => entries.push(entry),
    }
}

impl ConfigDocument {
    pub fn cluster(&self, name: &str) -> Option<&ClusterEntry> {
        self.clusters.iter().find(|c| c.name == name)
    }

    pub fn user(&self, name: &str) -> Option<&UserEntry> {
        self.users.iter().find(|u| u.name == name)
    }

    pub fn context(&self, name: &str) -> Option<&ContextEntry> {
        self.contexts.iter().find(|c| c.name == name)
    }

    pub fn upsert_cluster(&mut self, entry: ClusterEntry) {
        upsert(&mut self.clusters, entry);
    }

    pub fn upsert_user(&mut self, entry: UserEntry) {
        upsert(&mut self.users, entry);
    }

    pub fn upsert_context(&mut self, entry: ContextEntry) {
        upsert(&mut self.contexts, entry);
    }
}

fn empty_mapping() -> Value {
    Value::Mapping(Mapping::new())
}

/// `clusters: null` is what many tools write for an empty list.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
apiVersion: v1
kind: Config
preferences: {}
clusters:
- name: kind-dev
  cluster:
    server: https://127.0.0.1:6443
    certificate-authority-data: Zm9v
    extensions:
    - name: vendor
      extension: {tier: gold}
users:
- name: kind-dev
  user:
    token: abc
contexts:
- name: kind-dev
  context:
    cluster: kind-dev
    user: kind-dev
    namespace: apps
current-context: kind-dev
x-tooling: 1
"#;

    #[test]
    fn test_unknown_fields_round_trip() {
        let doc: ConfigDocument = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(doc.extra.get("apiVersion"), Some(&Value::from("v1")));
        assert_eq!(doc.extra.get("x-tooling"), Some(&Value::from(1)));

        let rendered = serde_yaml::to_string(&doc).unwrap();
        let reparsed: ConfigDocument = serde_yaml::from_str(&rendered).unwrap();
        assert_eq!(doc, reparsed);

        let original: Value = serde_yaml::from_str(SAMPLE).unwrap();
        let round_tripped: Value = serde_yaml::from_str(&rendered).unwrap();
        assert_eq!(original, round_tripped);
    }

    #[test]
    fn test_typed_views() {
        let doc: ConfigDocument = serde_yaml::from_str(SAMPLE).unwrap();
        let cluster = doc.cluster("kind-dev").unwrap();
        assert_eq!(cluster.cluster.server, "https://127.0.0.1:6443");
        assert!(cluster.cluster.extra.contains_key("certificate-authority-data"));

        let context = doc.context("kind-dev").unwrap();
        assert_eq!(context.context.namespace(), Some("apps"));
        assert_eq!(doc.current_context, "kind-dev");
    }

    #[test]
    fn test_null_lists() {
        let doc: ConfigDocument =
            serde_yaml::from_str("clusters: null\nusers: null\ncontexts: null\ncurrent-context: \"\"\n")
                .unwrap();
        assert!(doc.clusters.is_empty());
        assert!(doc.users.is_empty());
        assert!(doc.contexts.is_empty());
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut doc: ConfigDocument = serde_yaml::from_str(SAMPLE).unwrap();
        doc.upsert_user(UserEntry {
            name: "other".into(),
            user: empty_mapping(),
            extra: Mapping::new(),
        });
        doc.upsert_user(UserEntry {
            name: "kind-dev".into(),
            user: empty_mapping(),
            extra: Mapping::new(),
        });

        let names: Vec<_> = doc.users.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["kind-dev", "other"]);
        assert_eq!(doc.users[0].user, empty_mapping());
    }
}
