//! Public and internal types for the orgdex API and crawl pipeline.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One unit of traversal work: a section key or an avatar URL path.
/// `attempt` counts re-submissions after empty-but-successful responses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    pub key: String,
    pub attempt: u32,
}

impl Task {
    pub fn new(key: impl Into<String>) -> Self {
        Task {
            key: key.into(),
            attempt: 0,
        }
    }

    /// Same key, attempt bumped. Used for the empty-response retry path.
    pub fn retry(&self) -> Self {
        Task {
            key: self.key.clone(),
            attempt: self.attempt + 1,
        }
    }
}

/// Raw directory entry as the remote endpoint serves it: one JSON object per
/// node. `children` is the sole branch/leaf discriminator (true = section,
/// false = employee). The field's name is misleading on leaves, but the
/// source uses it this way and consumers depend on it.
#[derive(Clone, Debug, Deserialize)]
pub struct RawEntry {
    #[serde(rename = "id")]
    pub idr: String,
    #[serde(default)]
    pub parent: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub children: bool,
}

/// A department (section) node. `(idr, parent, text)` is the dedup key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    #[serde(rename = "id")]
    pub idr: String,
    #[serde(default)]
    pub parent: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub children: bool,
}

/// An employee (leaf) node. `tabnum` is the natural key; re-observations with
/// the same tabnum are diffed against the stored row, never inserted twice.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    #[serde(rename = "id", default)]
    pub idr: String,
    pub tabnum: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mid_name: String,
    #[serde(default)]
    pub phone: Vec<String>,
    #[serde(default)]
    pub mobile: Vec<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub grade: String,
    /// Always false for employees; kept so round-trips preserve the wire shape.
    #[serde(default)]
    pub children: bool,
    #[serde(default)]
    pub parent_idr: String,
    /// Seconds since epoch, set at save time.
    #[serde(default)]
    pub created_at: i64,
}

/// Classified directory record. Built exhaustively at the decode boundary so
/// branch/leaf routing is a match, not a runtime type test.
#[derive(Clone, Debug)]
pub enum Record {
    Branch(Department),
    Leaf(Employee),
}

impl Record {
    pub fn idr(&self) -> &str {
        match self {
            Record::Branch(d) => &d.idr,
            Record::Leaf(e) => &e.idr,
        }
    }
}

/// One history row: a field of an employee changed between observations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Seconds since epoch.
    pub date: i64,
    pub field: String,
    pub old_value: String,
    pub employee_id: i64,
}

/// Metadata for one existing avatar file, built once per run by scanning the
/// avatar directory. `num` starts at 1 and grows with each `"key (N).ext"`
/// disambiguation; the highest N per key wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AvatarInfo {
    pub actual_name: String,
    pub num: u32,
    pub size: u64,
    pub hash: String,
}

/// Final branch/leaf totals reported by a crawl.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CrawlCounts {
    pub branches: u32,
    pub leaves: u32,
}

/// Current unix time in seconds. Save-time clock for `created_at` and
/// history dates.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
