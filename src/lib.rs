//! orgdex crawls a hierarchical organizational directory over HTTP, enriches
//! the employee records it finds, downloads avatars, and persists everything
//! to SQLite with per-field change history.
//!
//! The engine is a fixed pool of OS threads: fetch workers walk the section
//! tree, avatar workers mirror photos, and per-worker dispatchers decouple
//! discovery from the bounded task channels so workers never block while
//! publishing new keys. A watchdog ends the crawl once the queues stay empty.

pub mod engine;
pub mod error;
pub mod scrape;
pub mod store;
pub mod types;
pub mod utils;

pub use error::{CancelReason, CrawlError};
pub use types::{
    AvatarInfo, CrawlCounts, Department, Employee, HistoryEntry, RawEntry, Record, Task,
};
pub use utils::config::CrawlConfig;
