//! Paginated log cache bound to a backend and a parent entity.
//!
//! `request_page` returns immediately; the fetch runs as a tokio task and
//! writes its result back under the lock, tagged with the epoch it was issued
//! in. `reset` and `set_parent` replace the whole cache with a new epoch, so a
//! fetch that was in flight across the reset is dropped on arrival.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::audit_log::cache::{LogPageCache, PageEntry, PageFetch, PageRequest};
use crate::backend::{ConsoleBackend, LogParent};
use crate::error::LogCacheError;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

struct FeedState {
    parent: Option<LogParent>,
    cache: LogPageCache,
}

struct Shared {
    state: Mutex<FeedState>,
    revision: watch::Sender<u64>,
}

impl Shared {
    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

pub struct PaginatedLogCache<B: ConsoleBackend + ?Sized> {
    backend: Arc<B>,
    page_size: u32,
    shared: Arc<Shared>,
}

impl<B: ConsoleBackend + ?Sized> Clone for PaginatedLogCache<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            page_size: self.page_size,
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: ConsoleBackend + ?Sized + 'static> PaginatedLogCache<B> {
    pub fn new(backend: Arc<B>, parent: Option<LogParent>, page_size: u32) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            backend,
            page_size,
            shared: Arc::new(Shared {
                state: Mutex::new(FeedState {
                    parent,
                    cache: LogPageCache::new(1),
                }),
                revision,
            }),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn parent(&self) -> Option<LogParent> {
        self.shared.state.lock().parent.clone()
    }

    pub fn epoch(&self) -> u64 {
        self.shared.state.lock().cache.epoch()
    }

    pub fn known_total_pages(&self) -> Option<u32> {
        self.shared.state.lock().cache.known_total_pages()
    }

    /// Revision counter bumped on every cache change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    /// Request page `n`. Issues at most one fetch per page; returns immediately.
    pub fn request_page(&self, n: u32) -> Result<PageRequest, LogCacheError> {
        let (parent, request) = {
            let mut state = self.shared.state.lock();
            let parent = state.parent.clone().ok_or(LogCacheError::NoParent)?;
            let request = state.cache.request(n)?;
            (parent, request)
        };

        if let PageRequest::Issued(fetch) = request {
            self.shared.bump();
            self.spawn_fetch(parent, fetch);
        }
        Ok(request)
    }

    pub fn page_at(&self, n: u32) -> Result<PageEntry, LogCacheError> {
        self.shared.state.lock().cache.page_at(n)
    }

    /// Snapshot of every known entry in page order.
    pub fn entries(&self) -> Vec<(u32, PageEntry)> {
        self.shared
            .state
            .lock()
            .cache
            .entries()
            .map(|(n, entry)| (n, entry.clone()))
            .collect()
    }

    /// Discard the whole cache, including the learned page count.
    pub fn reset(&self) {
        let mut state = self.shared.state.lock();
        Self::replace_cache(&mut state);
        drop(state);
        self.shared.bump();
    }

    /// Point the cache at another parent. A different parent discards the cache.
    pub fn set_parent(&self, parent: Option<LogParent>) {
        let mut state = self.shared.state.lock();
        if state.parent == parent {
            return;
        }
        info!(
            parent = parent.as_ref().map(ToString::to_string).as_deref(),
            "Log parent changed"
        );
        state.parent = parent;
        Self::replace_cache(&mut state);
        drop(state);
        self.shared.bump();
    }

    /// Request page `n` and wait until it is no longer loading.
    ///
    /// A failed fetch comes back as `Unloaded`.
    pub async fn load_page(&self, n: u32) -> Result<PageEntry, LogCacheError> {
        let mut changes = self.changes();
        self.request_page(n)?;
        loop {
            let entry = self.page_at(n)?;
            if entry != PageEntry::Loading {
                return Ok(entry);
            }
            if changes.changed().await.is_err() {
                return Ok(entry);
            }
        }
    }

    fn replace_cache(state: &mut FeedState) {
        let epoch = state.cache.epoch() + 1;
        debug!(epoch, "Log cache reset");
        state.cache = LogPageCache::new(epoch);
    }

    fn spawn_fetch(&self, parent: LogParent, fetch: PageFetch) {
        let backend = Arc::clone(&self.backend);
        let shared = Arc::clone(&self.shared);
        let page_size = self.page_size;
        tokio::spawn(async move {
            let result = backend
                .fetch_log_page(&parent, fetch.page, page_size)
                .await;
            let changed = {
                let mut state = shared.state.lock();
                match state.cache.complete(fetch, result) {
                    Ok(changed) => changed,
                    Err(violation) => {
                        error!(parent = %parent, error = %violation, "Audit log cache poisoned");
                        true
                    }
                }
            };
            if changed {
                shared.bump();
            }
        });
    }
}
