//! Loading and persisting the kubeconfig document.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::kubeconfig::document::ConfigDocument;

/// Failure to read or write the kubeconfig document.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse {path}: {source}")]
    Parse { path: PathBuf, source: serde_yaml::Error },

    #[error("failed to serialize kubeconfig: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Owns the path of the shared kubeconfig file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory that relative credential paths resolve against.
    pub fn base_dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// Load the document. A missing or empty file is an empty document.
    pub fn load(&self) -> Result<ConfigDocument, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(
                    path = %self.path.display(),
                    "Kubeconfig not found, starting empty"
                );
                return Ok(ConfigDocument::default());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(ConfigDocument::default());
        }

        serde_yaml::from_str(&content).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Persist the document atomically: write a sibling temp file, then rename
    /// it over the target so readers never see a half-written file.
    ///
    /// A symlinked kubeconfig is written through: the rename lands on the
    /// link's target and the link itself is left in place.
    pub fn save(&self, doc: &ConfigDocument) -> Result<(), StoreError> {
        let rendered = serde_yaml::to_string(doc)?;
        let write_err = |source: io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        let target = self.write_target().map_err(write_err)?;
        let dir = match target.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(write_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(rendered.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&target).map_err(|e| write_err(e.error))?;

        tracing::debug!(
            path = %self.path.display(),
            target = %target.display(),
            "Kubeconfig written"
        );
        Ok(())
    }

    /// The file a save should replace: the resolved path when it exists.
    fn write_target(&self) -> io::Result<PathBuf> {
        match fs::canonicalize(&self.path) {
            Ok(resolved) => Ok(resolved),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(self.path.clone()),
            Err(e) => Err(e),
        }
    }
}
