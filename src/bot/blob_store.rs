//! Filesystem image store.
//!
//! Each image is written to its own file under a root directory. File names
//! combine the current time in nanoseconds with a random suffix; the file name
//! is the reference stored in the ledger.

use crate::{
    bot::gateway::BlobStore,
    errors::{Error, Result},
};
use async_trait::async_trait;
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stores images as files below `root`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Creates the store, creating `root` if it does not exist.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, reference: &str) -> Result<PathBuf> {
        let valid = !reference.is_empty()
            && reference
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
            && !reference.starts_with('.');
        if !valid {
            return Err(Error::Blob {
                message: format!("invalid blob reference {reference:?}"),
            });
        }
        Ok(self.root.join(reference))
    }
}

fn unique_name() -> String {
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default();
    let suffix: u32 = rand::thread_rng().r#gen();
    format!("{nanos}_{suffix:08x}.img")
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn store(&self, bytes: &[u8]) -> Result<String> {
        let reference = unique_name();
        let path = self.path_for(&reference)?;
        tokio::fs::write(&path, bytes).await?;
        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(reference)
    }

    async fn load(&self, reference: &str) -> Result<Vec<u8>> {
        let path = self.path_for(reference)?;
        Ok(tokio::fs::read(path).await?)
    }
}
