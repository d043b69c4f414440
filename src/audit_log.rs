//! Audit Log
//!
//! Lazily populated, page-indexed cache over an entity's audit-log feed.

pub mod cache;
pub mod feed;

pub use cache::{LogPageCache, PageEntry, PageFetch, PageRequest};
pub use feed::{PaginatedLogCache, DEFAULT_PAGE_SIZE};
