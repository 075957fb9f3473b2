use std::{
    collections::{hash_map::Entry, HashMap},
    fmt,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use futures_util::FutureExt;

use super::{CacheKey, Cover, DiskStore, MemoryTier, Resolution, Source, Thumbnail, Tier};
use crate::{
    config::MemoryCapacity,
    error::{Error, Result},
    executor::{self, Executors, Subsystem},
    remote::ThumbnailSource,
    response::{AsyncResult, Responder},
};

/// Snapshot of cache activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub network_hits: u64,
    pub placeholder_hits: u64,
    /// Downloads issued to the media center.
    pub network_fetches: u64,
    /// Requests that joined a download already in flight.
    pub joined: u64,
    /// Thumbnails resident in memory.
    pub resident: usize,
    /// Keys known to be unavailable.
    pub unavailable: usize,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits: {} memory, {} disk, {} network, {} placeholder; \
             {} fetches, {} joined; {} resident, {} unavailable",
            self.memory_hits,
            self.disk_hits,
            self.network_hits,
            self.placeholder_hits,
            self.network_fetches,
            self.joined,
            self.resident,
            self.unavailable,
        )
    }
}

#[derive(Debug, Default)]
struct Counters {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    network_hits: AtomicU64,
    placeholder_hits: AtomicU64,
    network_fetches: AtomicU64,
    joined: AtomicU64,
}

impl Counters {
    fn hit(&self, source: Source) {
        let counter = match source {
            Source::Memory => &self.memory_hits,
            Source::Disk => &self.disk_hits,
            Source::Network => &self.network_hits,
            Source::Placeholder => &self.placeholder_hits,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// State touched by more than one loop.
struct State {
    memory: MemoryTier,
    /// Waiters of every download in flight. A key is present from the moment
    /// its download is issued until its outcome is published.
    pending: HashMap<CacheKey, Vec<Responder<Resolution>>>,
}

struct Shared {
    executors: Arc<Executors>,
    source: Arc<dyn ThumbnailSource>,
    disk: Arc<dyn DiskStore>,
    state: Mutex<State>,
    counters: Counters,
}

/// A download registered in `State::pending` whose outcome is not yet
/// published.
///
/// Dropping it unpublished cancels every waiter and forgets the download, so
/// that a later request issues it afresh. That happens when the download loop
/// stops with the fetch still queued.
struct PendingDownload {
    shared: Arc<Shared>,
    key: CacheKey,
    published: bool,
}

/// Outcome of admitting a request after the disk tier missed.
enum Admission {
    Resolved(Resolution, Responder<Resolution>),
    Joined,
    Fetch,
}

/// Resolves thumbnails through the memory, disk and network tiers.
///
/// Cloning is cheap; clones share one cache.
#[derive(Clone)]
pub struct TieredCache {
    inner: Arc<Shared>,
}

impl TieredCache {
    #[must_use]
    pub fn new(
        executors: Arc<Executors>,
        source: Arc<dyn ThumbnailSource>,
        disk: Arc<dyn DiskStore>,
        capacity: &MemoryCapacity,
    ) -> Self {
        Self {
            inner: Arc::new(Shared {
                executors,
                source,
                disk,
                state: Mutex::new(State {
                    memory: MemoryTier::new(capacity),
                    pending: HashMap::new(),
                }),
                counters: Counters::default(),
            }),
        }
    }

    /// Resolves `cover` at `tier`.
    ///
    /// Thumbnails that cannot be downloaded resolve to a placeholder, not an
    /// error. The result is an error only if a cache loop cannot be started.
    pub fn resolve(&self, cover: &Cover, tier: Tier) -> AsyncResult<Resolution> {
        let (responder, result) = AsyncResult::pair();
        Shared::check_memory_on_loop(&self.inner, cover.clone(), tier, responder);
        result
    }

    /// Like [`resolve`](Self::resolve), delivering through `callback`.
    pub fn resolve_with<C>(&self, cover: &Cover, tier: Tier, callback: C)
    where
        C: FnOnce(Result<Resolution>) + Send + 'static,
    {
        let responder = Responder::from_callback(callback);
        Shared::check_memory_on_loop(&self.inner, cover.clone(), tier, responder);
    }

    /// Removes every thumbnail from the disk tier.
    ///
    /// Memory and the set of unavailable keys are left alone.
    pub fn clear_disk(&self) -> AsyncResult<()> {
        let disk = Arc::clone(&self.inner.disk);
        self.inner
            .executors
            .submit(Subsystem::DiskCache, move || async move {
                disk.clear().await?;
                info!("cleared thumbnail disk cache");
                Ok(())
            })
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let counters = &self.inner.counters;
        let state = self.inner.lock();
        CacheStats {
            memory_hits: counters.memory_hits.load(Ordering::Relaxed),
            disk_hits: counters.disk_hits.load(Ordering::Relaxed),
            network_hits: counters.network_hits.load(Ordering::Relaxed),
            placeholder_hits: counters.placeholder_hits.load(Ordering::Relaxed),
            network_fetches: counters.network_fetches.load(Ordering::Relaxed),
            joined: counters.joined.load(Ordering::Relaxed),
            resident: state.memory.len(),
            unavailable: state.memory.unavailable_len(),
        }
    }

    /// Whether the thumbnail is in the memory tier.
    #[must_use]
    pub fn is_resident(&self, key: &CacheKey) -> bool {
        self.inner.lock().memory.contains(key)
    }

    /// Whether a download of the thumbnail is in flight.
    #[must_use]
    pub fn is_downloading(&self, key: &CacheKey) -> bool {
        self.inner.lock().pending.contains_key(key)
    }

    /// Whether the thumbnail is known to be unavailable.
    #[must_use]
    pub fn is_unavailable(&self, key: &CacheKey) -> bool {
        self.inner.lock().memory.is_unavailable(key)
    }
}

impl fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // State is consistent after every statement, so a panic elsewhere
        // cannot leave it half updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, responder: Responder<Resolution>, resolution: Resolution) {
        self.counters.hit(resolution.source);
        responder.done(Ok(resolution));
    }

    fn check_memory_on_loop(
        this: &Arc<Self>,
        cover: Cover,
        tier: Tier,
        responder: Responder<Resolution>,
    ) {
        match this.executors.acquire(Subsystem::MemoryCache) {
            Ok(executor) => {
                let shared = Arc::clone(this);
                executor.post(async move { shared.check_memory(cover, tier, responder) });
            }
            Err(e) => responder.done(Err(e)),
        }
    }

    fn check_memory(self: Arc<Self>, cover: Cover, tier: Tier, responder: Responder<Resolution>) {
        let key = cover.key(tier);
        let hit = self.lock().memory.get(&key);
        if let Some(thumbnail) = hit {
            trace!("{key}: memory hit");
            self.deliver(responder, Resolution::new(thumbnail, Source::Memory));
            return;
        }

        match self.executors.acquire(Subsystem::DiskCache) {
            Ok(executor) => {
                let shared = Arc::clone(&self);
                executor.post(async move { shared.check_disk(cover, tier, responder).await });
            }
            Err(e) => responder.done(Err(e)),
        }
    }

    async fn check_disk(
        self: Arc<Self>,
        cover: Cover,
        tier: Tier,
        responder: Responder<Resolution>,
    ) {
        let key = cover.key(tier);
        match self.disk.load(&key).await {
            Ok(Some(bytes)) => match Thumbnail::decode(&bytes) {
                Ok(thumbnail) => {
                    trace!("{key}: disk hit");
                    self.lock().memory.insert(key, thumbnail.clone());
                    self.deliver(responder, Resolution::new(thumbnail, Source::Disk));
                    return;
                }
                Err(e) => warn!("ignoring corrupt disk entry for {key}: {e}"),
            },
            Ok(None) => {}
            Err(e) => warn!("cannot read {key} from disk: {e}"),
        }

        self.join_or_fetch(cover, tier, responder);
    }

    fn join_or_fetch(self: Arc<Self>, cover: Cover, tier: Tier, responder: Responder<Resolution>) {
        let key = cover.key(tier);

        // Re-check memory and the unavailable set, then join or register the
        // download, all under one lock: a download that completed since the
        // memory loop looked has already published its outcome.
        let admission = {
            let mut state = self.lock();
            if let Some(thumbnail) = state.memory.get(&key) {
                Admission::Resolved(Resolution::new(thumbnail, Source::Memory), responder)
            } else if state.memory.is_unavailable(&key) {
                Admission::Resolved(Resolution::placeholder(tier), responder)
            } else {
                match state.pending.entry(key) {
                    Entry::Occupied(mut waiters) => {
                        waiters.get_mut().push(responder);
                        Admission::Joined
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(vec![responder]);
                        Admission::Fetch
                    }
                }
            }
        };

        match admission {
            Admission::Resolved(resolution, responder) => self.deliver(responder, resolution),
            Admission::Joined => {
                self.counters.joined.fetch_add(1, Ordering::Relaxed);
                debug!("{key}: joined download in flight");
            }
            Admission::Fetch => {
                let pending = PendingDownload {
                    shared: Arc::clone(&self),
                    key,
                    published: false,
                };
                match self.executors.acquire(Subsystem::Download) {
                    Ok(executor) => executor.post(pending.fetch(cover, tier)),
                    Err(e) => pending.fail(&e),
                }
            }
        }
    }

    /// Downloads and decodes a thumbnail, fitted to `tier`. `Ok(None)` means
    /// the media center has nothing usable for it.
    async fn download(&self, cover: &Cover, tier: Tier) -> Result<Option<Thumbnail>> {
        let bytes = self.source.fetch_thumbnail(&cover.reference).await?;
        if bytes.is_empty() {
            return Ok(None);
        }

        match Thumbnail::decode(&bytes) {
            Ok(thumbnail) => Ok(Some(thumbnail.fitted(tier))),
            Err(e) => {
                warn!("cannot decode {}: {e}", cover.reference);
                Ok(None)
            }
        }
    }

    fn take_waiters(&self, key: &CacheKey) -> Vec<Responder<Resolution>> {
        self.lock().pending.remove(key).unwrap_or_default()
    }
}

impl PendingDownload {
    async fn fetch(mut self, cover: Cover, tier: Tier) {
        let shared = Arc::clone(&self.shared);
        let key = self.key;
        shared.counters.network_fetches.fetch_add(1, Ordering::Relaxed);
        debug!("{key}: downloading {}", cover.reference);

        // A panicking source or codec counts as a failed download.
        let downloaded = AssertUnwindSafe(shared.download(&cover, tier))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(Error::internal(format!(
                    "download panicked: {}",
                    executor::panic_message(panic.as_ref())
                )))
            });

        let thumbnail = match downloaded {
            Ok(thumbnail) => thumbnail,
            Err(e) => {
                warn!("{key}: download failed: {e}");
                None
            }
        };

        if let Some(ref thumbnail) = thumbnail {
            match thumbnail.encode() {
                Ok(encoded) => {
                    if let Err(e) = shared.disk.store(&key, &encoded).await {
                        warn!("{key}: cannot write to disk: {e}");
                    }
                }
                Err(e) => warn!("{key}: cannot encode for disk: {e}"),
            }
        }

        // Publish the outcome and take the waiters in one step, so a request
        // that arrives afterwards sees the outcome instead of a pending entry.
        let (resolution, waiters) = {
            let mut state = shared.lock();
            let resolution = match thumbnail {
                Some(thumbnail) => {
                    state.memory.insert(key, thumbnail.clone());
                    Resolution::new(thumbnail, Source::Network)
                }
                None => {
                    state.memory.mark_unavailable(key);
                    info!("{key}: marked unavailable");
                    Resolution::placeholder(tier)
                }
            };
            self.published = true;
            (resolution, state.pending.remove(&key).unwrap_or_default())
        };

        trace!("{key}: delivering to {} waiters", waiters.len());
        for waiter in waiters {
            shared.deliver(waiter, resolution.clone());
        }
    }

    /// Fails every waiter with `error` without touching the memory tier.
    fn fail(mut self, error: &Error) {
        self.published = true;
        for waiter in self.shared.take_waiters(&self.key) {
            waiter.done(Err(error.detached()));
        }
    }
}

impl Drop for PendingDownload {
    fn drop(&mut self) {
        if self.published {
            return;
        }

        let waiters = self.shared.take_waiters(&self.key);
        debug!("{}: download abandoned, cancelling {} waiters", self.key, waiters.len());
        for waiter in waiters {
            waiter.done(Err(Error::cancelled(format!(
                "download of {} abandoned",
                self.key
            ))));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroUsize, time::Duration};

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::{
        cache::{Fingerprint, FsDiskStore},
        error::ErrorKind,
        testing::{self, MockThumbnailSource},
    };

    struct Fixture {
        executors: Arc<Executors>,
        cache: TieredCache,
        source: Arc<MockThumbnailSource>,
        disk: Arc<FsDiskStore>,
        _dir: tempfile::TempDir,
    }

    fn fixture(source: MockThumbnailSource, capacity: MemoryCapacity) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(source);
        let disk = Arc::new(FsDiskStore::new(dir.path()));
        let executors = Arc::new(Executors::new());
        let cache = TieredCache::new(
            Arc::clone(&executors),
            Arc::clone(&source) as Arc<dyn ThumbnailSource>,
            Arc::clone(&disk) as Arc<dyn DiskStore>,
            &capacity,
        );
        Fixture {
            executors,
            cache,
            source,
            disk,
            _dir: dir,
        }
    }

    fn cover(checksum: u32) -> Cover {
        Cover::with_fingerprint(Fingerprint::new(checksum), format!("thumbs/{checksum:x}.tbn"))
    }

    #[tokio::test]
    async fn downloads_once_then_serves_from_memory() {
        let source = MockThumbnailSource::new();
        source.insert("thumbs/a1b2.tbn", testing::png(120, 120));
        let f = fixture(source, MemoryCapacity::default());
        let cover = cover(0xa1b2);
        let key = cover.key(Tier::Small);

        let first = f.cache.resolve(&cover, Tier::Small).await.unwrap();
        assert_eq!(first.source, Source::Network);
        assert_eq!((first.thumbnail.width(), first.thumbnail.height()), (96, 96));
        assert_eq!(f.source.calls(), 1);
        assert!(f.cache.is_resident(&key));
        assert!(f.disk.load(&key).await.unwrap().is_some());

        let second = f.cache.resolve(&cover, Tier::Small).await.unwrap();
        assert_eq!(second.source, Source::Memory);
        assert!(second.thumbnail.ptr_eq(&first.thumbnail));
        assert_eq!(f.source.calls(), 1);
    }

    #[tokio::test]
    async fn empty_payload_is_remembered_as_unavailable() {
        let source = MockThumbnailSource::new();
        source.insert("thumbs/a1b2.tbn", Vec::new());
        let f = fixture(source, MemoryCapacity::default());
        let cover = cover(0xa1b2);

        let first = f.cache.resolve(&cover, Tier::Small).await.unwrap();
        assert!(first.is_placeholder());
        assert!(f.cache.is_unavailable(&cover.key(Tier::Small)));

        let second = f.cache.resolve(&cover, Tier::Small).await.unwrap();
        assert!(second.is_placeholder());
        assert_eq!(f.source.calls(), 1);
        assert!(f.disk.load(&cover.key(Tier::Small)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_download_resolves_to_placeholder() {
        // Unknown references fail with a transport error.
        let f = fixture(MockThumbnailSource::new(), MemoryCapacity::default());
        let resolution = f.cache.resolve(&cover(7), Tier::Medium).await.unwrap();

        assert!(resolution.is_placeholder());
        assert_eq!(resolution.thumbnail.width(), 256);
        assert_eq!(f.cache.stats().unavailable, 1);
    }

    #[tokio::test]
    async fn undecodable_payload_resolves_to_placeholder() {
        let source = MockThumbnailSource::new();
        source.insert("thumbs/7.tbn", b"definitely not an image".to_vec());
        let f = fixture(source, MemoryCapacity::default());

        assert!(f.cache.resolve(&cover(7), Tier::Small).await.unwrap().is_placeholder());
        assert!(f.cache.is_unavailable(&cover(7).key(Tier::Small)));
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_download() {
        let source = MockThumbnailSource::gated();
        source.insert("thumbs/a1b2.tbn", testing::png(64, 64));
        let f = fixture(source, MemoryCapacity::default());
        let cover = cover(0xa1b2);

        let requests: Vec<_> = (0..4)
            .map(|_| f.cache.resolve(&cover, Tier::Small))
            .collect();

        // Hold the download until every other request has joined it.
        while f.cache.stats().joined < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        f.source.release();

        let mut resolutions = Vec::new();
        for request in requests {
            resolutions.push(request.await.unwrap());
        }

        assert_eq!(f.source.calls(), 1);
        assert!(resolutions.iter().all(|r| r.source == Source::Network));
        assert!(resolutions
            .iter()
            .all(|r| r.thumbnail.ptr_eq(&resolutions[0].thumbnail)));
        assert_eq!(f.cache.stats().network_hits, 4);
    }

    #[tokio::test]
    async fn queued_download_is_cancelled_when_loop_stops() {
        let source = MockThumbnailSource::gated();
        source.insert("thumbs/a.tbn", testing::png(16, 16));
        source.insert("thumbs/b.tbn", testing::png(16, 16));
        let f = fixture(source, MemoryCapacity::default());
        let queued = cover(0xb).key(Tier::Small);

        let running = f.cache.resolve(&cover(0xa), Tier::Small);
        while f.source.calls() < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let waiting = f.cache.resolve(&cover(0xb), Tier::Small);
        while !f.cache.is_downloading(&queued) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        f.executors.shutdown();
        f.source.release();

        assert_eq!(running.await.unwrap().source, Source::Network);
        let error = tokio::time::timeout(Duration::from_secs(5), waiting)
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::Cancelled);
        assert!(!f.cache.is_downloading(&queued));
        assert!(!f.cache.is_unavailable(&queued));
        assert_eq!(f.source.calls(), 1);
    }

    struct PanickingSource;

    #[async_trait]
    impl ThumbnailSource for PanickingSource {
        async fn fetch_thumbnail(&self, reference: &str) -> Result<Bytes> {
            panic!("malformed reply for {reference}");
        }
    }

    #[tokio::test]
    async fn panicking_download_resolves_to_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TieredCache::new(
            Arc::new(Executors::new()),
            Arc::new(PanickingSource),
            Arc::new(FsDiskStore::new(dir.path())),
            &MemoryCapacity::default(),
        );
        let key = cover(3).key(Tier::Small);
        let wait = Duration::from_secs(5);

        let first = tokio::time::timeout(wait, cache.resolve(&cover(3), Tier::Small))
            .await
            .unwrap()
            .unwrap();
        assert!(first.is_placeholder());
        assert!(cache.is_unavailable(&key));
        assert!(!cache.is_downloading(&key));

        let second = tokio::time::timeout(wait, cache.resolve(&cover(3), Tier::Small))
            .await
            .unwrap()
            .unwrap();
        assert!(second.is_placeholder());

        let stats = cache.stats();
        assert_eq!(stats.network_fetches, 1);
        assert_eq!(stats.joined, 0);
    }

    #[tokio::test]
    async fn disk_hit_repopulates_memory() {
        let f = fixture(MockThumbnailSource::new(), MemoryCapacity::default());
        let cover = cover(0xbeef);
        let key = cover.key(Tier::Medium);
        f.disk.store(&key, &testing::png(50, 40)).await.unwrap();

        let first = f.cache.resolve(&cover, Tier::Medium).await.unwrap();
        assert_eq!(first.source, Source::Disk);
        assert!(f.cache.is_resident(&key));

        let second = f.cache.resolve(&cover, Tier::Medium).await.unwrap();
        assert_eq!(second.source, Source::Memory);
        assert_eq!(f.source.calls(), 0);
    }

    #[tokio::test]
    async fn evicted_thumbnails_fall_back_to_disk() {
        let source = MockThumbnailSource::new();
        for checksum in 1..=3_u32 {
            source.insert(&format!("thumbs/{checksum:x}.tbn"), testing::png(10, 10));
        }
        let capacity = MemoryCapacity {
            small: NonZeroUsize::new(2).unwrap(),
            ..MemoryCapacity::default()
        };
        let f = fixture(source, capacity);

        for checksum in 1..=3 {
            let resolution = f.cache.resolve(&cover(checksum), Tier::Small).await.unwrap();
            assert_eq!(resolution.source, Source::Network);
        }
        assert!(!f.cache.is_resident(&cover(1).key(Tier::Small)));
        assert_eq!(f.cache.stats().resident, 2);

        let evicted = f.cache.resolve(&cover(1), Tier::Small).await.unwrap();
        assert_eq!(evicted.source, Source::Disk);
        assert_eq!(f.source.calls(), 3);
    }

    #[tokio::test]
    async fn corrupt_disk_entry_is_a_miss() {
        let source = MockThumbnailSource::new();
        source.insert("thumbs/5.tbn", testing::png(32, 32));
        let f = fixture(source, MemoryCapacity::default());
        let key = cover(5).key(Tier::Small);
        f.disk.store(&key, b"truncated").await.unwrap();

        let resolution = f.cache.resolve(&cover(5), Tier::Small).await.unwrap();
        assert_eq!(resolution.source, Source::Network);
        assert_eq!(f.source.calls(), 1);

        // The download replaced the corrupt entry.
        let stored = f.disk.load(&key).await.unwrap().unwrap();
        assert!(Thumbnail::decode(&stored).is_ok());
    }

    #[tokio::test]
    async fn resizes_to_tier_bound() {
        let source = MockThumbnailSource::new();
        source.insert("thumbs/9.tbn", testing::png(400, 200));
        let f = fixture(source, MemoryCapacity::default());

        let small = f.cache.resolve(&cover(9), Tier::Small).await.unwrap();
        assert_eq!((small.thumbnail.width(), small.thumbnail.height()), (96, 48));

        let big = f.cache.resolve(&cover(9), Tier::Big).await.unwrap();
        assert_eq!((big.thumbnail.width(), big.thumbnail.height()), (400, 200));
        assert_eq!(f.source.calls(), 2);
    }

    #[tokio::test]
    async fn unavailable_key_survives_other_successes() {
        let source = MockThumbnailSource::new();
        source.insert("thumbs/a.tbn", Vec::new());
        source.insert("thumbs/b.tbn", testing::png(16, 16));
        let f = fixture(source, MemoryCapacity::default());

        assert!(f.cache.resolve(&cover(0xa), Tier::Small).await.unwrap().is_placeholder());
        let b = f.cache.resolve(&cover(0xb), Tier::Small).await.unwrap();
        assert_eq!(b.source, Source::Network);

        assert!(f.cache.resolve(&cover(0xa), Tier::Small).await.unwrap().is_placeholder());
        assert_eq!(f.source.calls(), 2);
    }

    #[tokio::test]
    async fn callback_receives_resolution() {
        let source = MockThumbnailSource::new();
        source.insert("thumbs/c.tbn", testing::png(8, 8));
        let f = fixture(source, MemoryCapacity::default());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        f.cache.resolve_with(&cover(0xc), Tier::Small, move |result| {
            let _ = tx.send(result.map(|resolution| resolution.source).map_err(|e| e.kind));
        });

        assert_eq!(rx.recv().await, Some(Ok(Source::Network)));
    }

    #[tokio::test]
    async fn clear_disk_keeps_memory() {
        let source = MockThumbnailSource::new();
        source.insert("thumbs/d.tbn", testing::png(8, 8));
        let f = fixture(source, MemoryCapacity::default());
        let key = cover(0xd).key(Tier::Small);

        f.cache.resolve(&cover(0xd), Tier::Small).await.unwrap();
        f.cache.clear_disk().await.unwrap();

        assert!(f.disk.load(&key).await.unwrap().is_none());
        assert!(f.cache.is_resident(&key));
        assert_eq!(
            f.cache.resolve(&cover(0xd), Tier::Small).await.unwrap().source,
            Source::Memory
        );
    }

    #[tokio::test]
    async fn stats_count_each_source() {
        let source = MockThumbnailSource::new();
        source.insert("thumbs/e.tbn", testing::png(8, 8));
        let f = fixture(source, MemoryCapacity::default());

        f.cache.resolve(&cover(0xe), Tier::Small).await.unwrap();
        f.cache.resolve(&cover(0xe), Tier::Small).await.unwrap();
        f.cache.resolve(&cover(0xf), Tier::Small).await.unwrap();

        let stats = f.cache.stats();
        assert_eq!(stats.network_hits, 1);
        assert_eq!(stats.memory_hits, 1);
        assert_eq!(stats.placeholder_hits, 1);
        assert_eq!(stats.network_fetches, 2);
        assert_eq!(stats.resident, 1);
        assert_eq!(stats.unavailable, 1);
    }
}
