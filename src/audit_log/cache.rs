//! Page cache state for one audit-log feed instance.
//!
//! Pure state: the caller performs the fetches that [`LogPageCache::request`]
//! asks for and reports them back through [`LogPageCache::complete`]. Each
//! instance belongs to a single epoch; outcomes tagged with another epoch are
//! discarded.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::{BackendError, InvariantViolation, LogCacheError};
use crate::types::LogPage;

/// Cache entry for one page index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEntry {
    Unloaded,
    /// Requested, awaiting the response
    Loading,
    Loaded(Arc<LogPage>),
}

impl PageEntry {
    pub fn page(&self) -> Option<&LogPage> {
        match self {
            PageEntry::Loaded(page) => Some(page),
            _ => None,
        }
    }
}

/// Fetch the cache asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFetch {
    pub epoch: u64,
    pub page: u32,
}

/// Result of requesting a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    /// The entry is now `Loading`; the fetch must be performed.
    Issued(PageFetch),
    AlreadyLoading,
    AlreadyLoaded,
}

#[derive(Debug, Clone)]
pub struct LogPageCache {
    epoch: u64,
    pages: BTreeMap<u32, PageEntry>,
    known_total_pages: Option<u32>,
    fault: Option<InvariantViolation>,
}

impl LogPageCache {
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch,
            pages: BTreeMap::new(),
            known_total_pages: None,
            fault: None,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn known_total_pages(&self) -> Option<u32> {
        self.known_total_pages
    }

    pub fn fault(&self) -> Option<&InvariantViolation> {
        self.fault.as_ref()
    }

    fn check(&self) -> Result<(), LogCacheError> {
        match &self.fault {
            Some(violation) => Err(LogCacheError::Inconsistent(violation.clone())),
            None => Ok(()),
        }
    }

    /// Current entry for page `n`; `Unloaded` if it was never requested.
    pub fn page_at(&self, n: u32) -> Result<PageEntry, LogCacheError> {
        self.check()?;
        Ok(self.pages.get(&n).cloned().unwrap_or(PageEntry::Unloaded))
    }

    /// Entries in page order. Once the total is known this covers `1..=total`.
    pub fn entries(&self) -> impl Iterator<Item = (u32, &PageEntry)> {
        self.pages.iter().map(|(n, entry)| (*n, entry))
    }

    /// Mark page `n` as loading unless it is already loading or loaded.
    pub fn request(&mut self, n: u32) -> Result<PageRequest, LogCacheError> {
        self.check()?;
        if n == 0 {
            return Err(LogCacheError::InvalidPage(n));
        }
        if let Some(total) = self.known_total_pages {
            if n > total {
                return Err(LogCacheError::OutOfRange {
                    requested: n,
                    total,
                });
            }
        }

        let entry = self.pages.entry(n).or_insert(PageEntry::Unloaded);
        match entry {
            PageEntry::Loading => Ok(PageRequest::AlreadyLoading),
            PageEntry::Loaded(_) => Ok(PageRequest::AlreadyLoaded),
            PageEntry::Unloaded => {
                *entry = PageEntry::Loading;
                debug!(epoch = self.epoch, page = n, "Page fetch issued");
                Ok(PageRequest::Issued(PageFetch {
                    epoch: self.epoch,
                    page: n,
                }))
            }
        }
    }

    /// Apply a fetch outcome. Returns whether the cache changed.
    ///
    /// A page reporting a total that differs from the recorded one poisons the
    /// cache and is returned as an error.
    pub fn complete(
        &mut self,
        fetch: PageFetch,
        result: Result<LogPage, BackendError>,
    ) -> Result<bool, InvariantViolation> {
        if fetch.epoch != self.epoch {
            debug!(
                epoch = self.epoch,
                stale_epoch = fetch.epoch,
                page = fetch.page,
                "Discarding page from a previous epoch"
            );
            return Ok(false);
        }
        if self.fault.is_some() || self.pages.get(&fetch.page) != Some(&PageEntry::Loading) {
            return Ok(false);
        }

        let page = match result {
            Ok(page) => page,
            Err(error) => {
                warn!(page = fetch.page, error = %error, "Page fetch failed; page can be retried");
                self.pages.insert(fetch.page, PageEntry::Unloaded);
                return Ok(true);
            }
        };

        // The first page always exists, even for an empty feed.
        let total = page.total_pages.max(1);
        match self.known_total_pages {
            None => {
                debug!(epoch = self.epoch, total, "Learned total page count");
                self.known_total_pages = Some(total);
                for n in 1..=total {
                    self.pages.entry(n).or_insert(PageEntry::Unloaded);
                }
            }
            Some(known) if known != total => {
                let violation = InvariantViolation::TotalPagesChanged {
                    expected: known,
                    reported: total,
                };
                error!(page = fetch.page, error = %violation, "Log feed is inconsistent");
                self.fault = Some(violation.clone());
                return Err(violation);
            }
            Some(_) => {}
        }

        if fetch.page > total {
            warn!(page = fetch.page, total, "Dropping page beyond the feed's page count");
            self.pages.remove(&fetch.page);
            return Ok(true);
        }

        self.pages
            .insert(fetch.page, PageEntry::Loaded(Arc::new(page)));
        Ok(true)
    }
}
