//! Crawl configuration and engine tuning constants in one place.

use std::path::PathBuf;
use std::time::Duration;

/// Retry ceiling for the empty-response resubmission path. A task whose
/// attempt count exceeds this is dropped with a warning.
pub const RETRY_LIMIT: u32 = 3;

/// Capacity of the shared section/avatar task channels.
pub const TASK_CHANNEL_CAP: usize = 10;

/// Capacity of the per-frontier notify channel. Far above any expected burst;
/// sends are best-effort drops under backpressure, and coalesced signals are
/// compensated by the dispatcher's post-wake length check.
pub const NOTIFY_CHANNEL_CAP: usize = 1500;

/// Poll interval for cancel-aware `recv_timeout`/`send_timeout` loops.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Immutable crawl configuration. Built once in the CLI (file config under
/// flags) and passed by reference to every component constructor.
#[derive(Clone, Debug)]
pub struct CrawlConfig {
    /// Base URL of the directory site; endpoint paths are joined onto it.
    pub base_url: String,
    /// Path template for section listings: `GET <base><section_path><key>`.
    pub section_path: String,
    /// Path template for the full-name lookup (path-escaped short name).
    pub fio_path: String,
    /// Path template for the mobile lookup (tabnum).
    pub mobile_path: String,
    /// Directory for downloaded avatar images.
    pub avatar_dir: PathBuf,
    /// Worker pairs; each runs a fetch worker, an avatar worker and two
    /// dispatchers.
    pub workers: usize,
    /// Item cap across branches + leaves. 0 = unlimited.
    pub limit: u32,
    /// Root section key seeding the traversal.
    pub root_key: String,
    /// Global crawl deadline.
    pub op_timeout: Duration,
    /// Per-request HTTP timeout.
    pub req_timeout: Duration,
    /// Watchdog window: both shared channels empty this long ends the crawl.
    pub idle_timeout: Duration,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        CrawlConfig {
            base_url: String::new(),
            section_path: String::new(),
            fio_path: String::new(),
            mobile_path: String::new(),
            avatar_dir: PathBuf::from("avatars"),
            workers: 5,
            limit: 0,
            root_key: String::new(),
            op_timeout: Duration::from_secs(1600),
            req_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(20),
        }
    }
}
