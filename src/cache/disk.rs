use std::{io, path::PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use super::{CacheKey, Tier};
use crate::error::Result;

/// Persistent tier of the thumbnail cache.
///
/// Entries are opaque encoded images keyed by [`CacheKey`]. Implementations
/// must make writes atomic: a concurrent or later `load` sees either the
/// previous entry or the complete new one.
#[async_trait]
pub trait DiskStore: Send + Sync {
    /// Reads the entry for `key`, or `None` if there is none.
    async fn load(&self, key: &CacheKey) -> Result<Option<Bytes>>;

    /// Writes the entry for `key`, replacing any existing one.
    async fn store(&self, key: &CacheKey, bytes: &[u8]) -> Result<()>;

    /// Removes every entry.
    async fn clear(&self) -> Result<()>;
}

/// Disk tier backed by a directory per tier: `<root>/<tier>/<fingerprint>.jpg`.
#[derive(Clone, Debug)]
pub struct FsDiskStore {
    root: PathBuf,
}

impl FsDiskStore {
    const EXTENSION: &'static str = "jpg";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn tier_dir(&self, tier: Tier) -> PathBuf {
        self.root.join(tier.name())
    }

    fn path(&self, key: &CacheKey) -> PathBuf {
        self.tier_dir(key.tier)
            .join(format!("{}.{}", key.fingerprint, Self::EXTENSION))
    }
}

#[async_trait]
impl DiskStore for FsDiskStore {
    async fn load(&self, key: &CacheKey) -> Result<Option<Bytes>> {
        match fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, key: &CacheKey, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        fs::create_dir_all(self.tier_dir(key.tier)).await?;

        // Write beside the final path and rename, so readers never see a
        // partial file.
        let temporary = path.with_extension("tmp");
        fs::write(&temporary, bytes).await?;
        if let Err(e) = fs::rename(&temporary, &path).await {
            let _ = fs::remove_file(&temporary).await;
            return Err(e.into());
        }

        trace!("stored {key} at {}", path.display());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        for tier in Tier::ALL {
            match fs::remove_dir_all(self.tier_dir(tier)).await {
                Ok(()) => debug!("cleared {tier} thumbnails"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
