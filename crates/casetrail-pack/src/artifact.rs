//! Artifact stores for rendered defense pack documents.

use std::{
    collections::HashMap,
    fs,
    path::{Component, Path, PathBuf},
    sync::Mutex,
};

use tracing::info;

use casetrail_contracts::error::{CaseError, CaseResult};
use casetrail_core::traits::ArtifactStore;

/// Keeps documents in memory under `mem://<name>` references.
#[derive(Default)]
pub struct InMemoryArtifactStore {
    items: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    const SCHEME: &'static str = "mem://";
}

impl ArtifactStore for InMemoryArtifactStore {
    fn put(&self, name: &str, bytes: &[u8]) -> CaseResult<String> {
        let mut items = self.items.lock().map_err(|e| CaseError::ArtifactStore {
            reason: format!("artifact lock poisoned: {}", e),
        })?;
        items.insert(name.to_string(), bytes.to_vec());
        Ok(format!("{}{}", Self::SCHEME, name))
    }

    fn get(&self, reference: &str) -> CaseResult<Vec<u8>> {
        let items = self.items.lock().map_err(|e| CaseError::ArtifactStore {
            reason: format!("artifact lock poisoned: {}", e),
        })?;
        reference
            .strip_prefix(Self::SCHEME)
            .and_then(|name| items.get(name))
            .cloned()
            .ok_or_else(|| CaseError::ArtifactStore {
                reason: format!("no artifact at '{}'", reference),
            })
    }
}

/// Writes documents as files under a root directory.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Use `root`, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> CaseResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| CaseError::ArtifactStore {
            reason: format!("cannot create artifact directory '{}': {}", root.display(), e),
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put(&self, name: &str, bytes: &[u8]) -> CaseResult<String> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(CaseError::ArtifactStore {
                reason: format!("artifact name '{}' is not a plain file name", name),
            });
        }
        let path = self.root.join(name);
        fs::write(&path, bytes).map_err(|e| CaseError::ArtifactStore {
            reason: format!("failed to write '{}': {}", path.display(), e),
        })?;
        info!(path = %path.display(), bytes = bytes.len(), "artifact written");
        Ok(path.display().to_string())
    }

    /// Reads only files under the root. `starts_with` compares components
    /// without resolving `..`, so parent segments are refused outright.
    fn get(&self, reference: &str) -> CaseResult<Vec<u8>> {
        let path = Path::new(reference);
        let escapes = path.components().any(|c| matches!(c, Component::ParentDir));
        if escapes || !path.starts_with(&self.root) {
            return Err(CaseError::ArtifactStore {
                reason: format!("'{}' is outside the artifact directory", reference),
            });
        }
        fs::read(path).map_err(|e| CaseError::ArtifactStore {
            reason: format!("failed to read '{}': {}", reference, e),
        })
    }
}
