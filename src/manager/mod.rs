//! User-facing operations on the media center.
//!
//! A manager turns each operation into one task on its subsystem's worker
//! loop and hands back an [`AsyncResult`]. Composite operations, like
//! queueing songs and then starting playback, run as a single task, so they
//! cannot interleave with other operations on the same subsystem. There is no
//! rollback: if a later step fails, earlier steps stay in effect.
//!
//! [`Backend`] is the composition root. It owns the worker loops, the
//! clients and the thumbnail cache, and hands out the managers.

mod control;
mod music;

use std::{future::Future, sync::Arc};

use tokio_util::sync::CancellationToken;

pub use control::ControlManager;
pub use music::{Enqueued, MusicManager};

use crate::{
    cache::{DiskStore, FsDiskStore, TieredCache},
    config::{Config, MemoryCapacity},
    error::Result,
    executor::{Executors, Subsystem},
    remote::{ControlClient, HttpApiClient, MusicClient, ThumbnailSource},
    response::AsyncResult,
};

/// Submits tasks to one subsystem, optionally under a cancellation scope.
#[derive(Clone, Debug)]
struct Dispatcher {
    executors: Arc<Executors>,
    subsystem: Subsystem,
    scope: Option<CancellationToken>,
}

impl Dispatcher {
    fn new(executors: Arc<Executors>, subsystem: Subsystem) -> Self {
        Self {
            executors,
            subsystem,
            scope: None,
        }
    }

    fn scoped(&self, token: &CancellationToken) -> Self {
        Self {
            scope: Some(token.clone()),
            ..self.clone()
        }
    }

    fn submit<F, Fut, T>(&self, task: F) -> AsyncResult<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        match (self.executors.acquire(self.subsystem), &self.scope) {
            (Ok(executor), Some(token)) => executor.submit_scoped(token, task),
            (Ok(executor), None) => executor.submit(task),
            (Err(e), _) => AsyncResult::ready(Err(e)),
        }
    }
}

/// Owns everything that talks to one media center.
pub struct Backend {
    executors: Arc<Executors>,
    control: ControlManager,
    music: MusicManager,
    covers: TieredCache,
}

impl Backend {
    /// Creates a backend for the media center and cache directory in
    /// `config`.
    ///
    /// No worker loop is started until an operation needs it.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Arc::new(HttpApiClient::new(config)?);
        let disk = Arc::new(FsDiskStore::new(&config.cache_dir));
        debug!("thumbnail cache in {}", config.cache_dir.display());

        Ok(Self::with_clients(
            Arc::clone(&client) as Arc<dyn ControlClient>,
            Arc::clone(&client) as Arc<dyn MusicClient>,
            client,
            disk,
            &config.memory,
        ))
    }

    /// Creates a backend on top of the given clients and disk store.
    #[must_use]
    pub fn with_clients(
        control: Arc<dyn ControlClient>,
        music: Arc<dyn MusicClient>,
        thumbnails: Arc<dyn ThumbnailSource>,
        disk: Arc<dyn DiskStore>,
        capacity: &MemoryCapacity,
    ) -> Self {
        let executors = Arc::new(Executors::new());

        Self {
            control: ControlManager::new(Arc::clone(&executors), Arc::clone(&control)),
            music: MusicManager::new(Arc::clone(&executors), music, control),
            covers: TieredCache::new(Arc::clone(&executors), thumbnails, disk, capacity),
            executors,
        }
    }

    #[must_use]
    pub fn control(&self) -> &ControlManager {
        &self.control
    }

    #[must_use]
    pub fn music(&self) -> &MusicManager {
        &self.music
    }

    #[must_use]
    pub fn covers(&self) -> &TieredCache {
        &self.covers
    }

    #[must_use]
    pub fn executors(&self) -> &Executors {
        &self.executors
    }

    /// Stops every worker loop. Pending operations resolve to `Cancelled`.
    pub fn shutdown(&self) {
        info!("shutting down");
        self.executors.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::{Cover, Source, Tier},
        error::ErrorKind,
        testing::{self, MockRemote, MockThumbnailSource},
    };

    fn backend(remote: &Arc<MockRemote>, dir: &tempfile::TempDir) -> Backend {
        let source = MockThumbnailSource::new();
        source.insert("special://thumbs/1.tbn", testing::png(300, 300));

        Backend::with_clients(
            Arc::clone(remote) as Arc<dyn ControlClient>,
            Arc::clone(remote) as Arc<dyn MusicClient>,
            Arc::new(source),
            Arc::new(FsDiskStore::new(dir.path())),
            &MemoryCapacity::default(),
        )
    }

    #[tokio::test]
    async fn loops_start_on_first_use() {
        let remote = Arc::new(MockRemote::new());
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&remote, &dir);

        for subsystem in Subsystem::ALL {
            assert!(!backend.executors().is_started(subsystem));
        }

        backend.control().pause().await.unwrap();
        assert!(backend.executors().is_started(Subsystem::Control));
        assert!(!backend.executors().is_started(Subsystem::Music));
    }

    #[tokio::test]
    async fn album_cover_resolves_through_backend() {
        let remote = Arc::new(MockRemote::new());
        let (album, songs) = testing::album(1, 100, 3);
        remote.add_album(album, songs);
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&remote, &dir);

        let albums = backend.music().albums().await.unwrap();
        let cover: Cover = albums[0].cover().unwrap();
        let resolution = backend.covers().resolve(&cover, Tier::Medium).await.unwrap();

        assert_eq!(resolution.source, Source::Network);
        assert_eq!(resolution.thumbnail.width(), 256);
    }

    #[tokio::test]
    async fn shutdown_cancels_later_operations() {
        let remote = Arc::new(MockRemote::new());
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&remote, &dir);

        backend.music().playlist().await.unwrap();
        backend.shutdown();

        let error = backend.music().playlist().await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Cancelled);
    }
}
