//! End-to-end pool runs against a scripted fetcher and an in-memory store.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use orgdex::engine::{Fetch, Pool, build_inventory, resolve_avatar_target};
use orgdex::error::{CancelReason, CrawlError};
use orgdex::store::Store;
use orgdex::types::{AvatarInfo, RawEntry, Record};
use orgdex::utils::CrawlConfig;

const ROW: &str = concat!(
    r#"<tr class="sotr" data-tabnum="100500">"#,
    r#"<td><img src="/photos/100500.jpg?v=42"></td>"#,
    r#"<td width="300" class="s_1">Иванов Иван <span class="s_3">вн</span> <b>1234</b></td>"#,
    r#"<td><a href="mailto:ivanov@corp.example">x</a></td>"#,
    "</tr>",
);

fn branch(idr: &str, parent: &str) -> RawEntry {
    RawEntry {
        idr: idr.to_string(),
        parent: parent.to_string(),
        text: "Отдел".to_string(),
        children: true,
    }
}

fn leaf(idr: &str, parent: &str) -> RawEntry {
    RawEntry {
        idr: idr.to_string(),
        parent: parent.to_string(),
        text: ROW.to_string(),
        children: false,
    }
}

/// Scripted directory: a section map plus canned enrichment responses.
#[derive(Default)]
struct FakeFetcher {
    sections: HashMap<String, Vec<RawEntry>>,
    fetched: Mutex<Vec<String>>,
    avatar_len: Option<u64>,
    mobile_body: String,
}

impl Fetch for FakeFetcher {
    fn fetch_section(&self, key: &str) -> Result<Vec<RawEntry>> {
        self.fetched
            .lock()
            .unwrap()
            .push(key.to_string());
        match self.sections.get(key) {
            Some(entries) => Ok(entries.clone()),
            None => bail!("no such section {key}"),
        }
    }

    fn fetch_full_name(&self, _name: &str) -> Result<String> {
        Ok(String::new())
    }

    fn fetch_mobile(&self, _tabnum: &str) -> Result<String> {
        Ok(self.mobile_body.clone())
    }

    fn avatar_size(&self, _url_path: &str) -> Result<Option<u64>> {
        Ok(self.avatar_len)
    }

    fn download_avatar(&self, _url_path: &str, dest: &Path) -> Result<u64> {
        fs::write(dest, b"img")?;
        Ok(3)
    }
}

/// Store that records every saved record.
#[derive(Default)]
struct RecordingStore {
    records: Mutex<Vec<Record>>,
}

impl RecordingStore {
    fn leaves(&self) -> Vec<orgdex::types::Employee> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| match r {
                Record::Leaf(e) => Some(e.clone()),
                Record::Branch(_) => None,
            })
            .collect()
    }

    fn branch_count(&self) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| matches!(r, Record::Branch(_)))
            .count()
    }
}

impl Store for RecordingStore {
    fn save(&self, record: &Record) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

fn test_config(avatar_dir: PathBuf) -> CrawlConfig {
    CrawlConfig {
        root_key: "100".to_string(),
        workers: 1,
        avatar_dir,
        idle_timeout: Duration::from_millis(600),
        op_timeout: Duration::from_secs(30),
        ..CrawlConfig::default()
    }
}

fn run_pool(
    cfg: CrawlConfig,
    fetcher: Arc<FakeFetcher>,
    store: Arc<RecordingStore>,
) -> Result<orgdex::types::CrawlCounts> {
    let pool = Pool::with_fetcher_factory(
        cfg,
        store,
        Box::new(move |_| Ok(fetcher.clone() as Arc<dyn Fetch>)),
    );
    pool.run()
}

#[test]
fn crawl_walks_tree_and_drains_idle() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(FakeFetcher {
        sections: HashMap::from([
            ("100".to_string(), vec![branch("200", "100"), leaf("e1", "100")]),
            ("200".to_string(), vec![leaf("e2", "200")]),
        ]),
        avatar_len: Some(10),
        mobile_body: r#"{"data":"+79001112233,+79001112234","success":true}"#.to_string(),
        ..FakeFetcher::default()
    });
    let store = Arc::new(RecordingStore::default());

    let counts = run_pool(test_config(tmp.path().to_path_buf()), fetcher.clone(), store.clone())
        .unwrap();

    assert_eq!(counts.branches, 1);
    assert_eq!(counts.leaves, 2);
    assert_eq!(store.branch_count(), 1);

    let leaves = store.leaves();
    assert_eq!(leaves.len(), 2);
    let e1 = leaves.iter().find(|e| e.idr == "e1").unwrap();
    assert_eq!(e1.tabnum, "100500");
    assert_eq!(e1.parent_idr, "100");
    assert_eq!(e1.avatar, "/photos/100500.jpg");
    // Row had no mobile cell, so the lookup endpoint filled it in.
    assert_eq!(e1.mobile, vec!["+79001112233", "+79001112234"]);

    // Both sections were fetched exactly once.
    let mut fetched = fetcher.fetched.lock().unwrap().clone();
    fetched.sort();
    assert_eq!(fetched, vec!["100", "200"]);

    // The avatar landed under its URL path, no temp file left behind.
    let avatar = tmp.path().join("photos/100500.jpg");
    assert!(avatar.exists());
    assert!(!tmp.path().join("photos/100500.jpg.tmp").exists());
}

#[test]
fn empty_sections_are_retried_then_dropped() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(FakeFetcher {
        sections: HashMap::from([("100".to_string(), Vec::new())]),
        ..FakeFetcher::default()
    });
    let store = Arc::new(RecordingStore::default());

    let counts = run_pool(test_config(tmp.path().to_path_buf()), fetcher.clone(), store).unwrap();

    assert_eq!(counts.branches + counts.leaves, 0);
    // Initial attempt plus three retries; the fourth resubmission is dropped
    // before fetching.
    assert_eq!(fetcher.fetched.lock().unwrap().len(), 4);
}

#[test]
fn item_limit_cancels_the_crawl() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(FakeFetcher {
        sections: HashMap::from([
            ("100".to_string(), vec![branch("200", "100"), leaf("e1", "100")]),
            ("200".to_string(), vec![leaf("e2", "200")]),
        ]),
        mobile_body: r#"{"data":"","success":true}"#.to_string(),
        ..FakeFetcher::default()
    });
    let store = Arc::new(RecordingStore::default());
    let mut cfg = test_config(tmp.path().to_path_buf());
    cfg.limit = 1;

    let err = run_pool(cfg, fetcher, store).unwrap_err();
    // Whichever worker notices first reports the limit; the rest observe the
    // cancellation.
    match err.downcast_ref::<CrawlError>() {
        Some(CrawlError::LimitExceeded { count: 2 }) => {}
        Some(CrawlError::Cancelled {
            reason: CancelReason::Limit,
        }) => {}
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn cancellation_does_not_wait_out_the_idle_window() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(FakeFetcher {
        sections: HashMap::from([
            ("100".to_string(), vec![branch("200", "100"), leaf("e1", "100")]),
            ("200".to_string(), vec![leaf("e2", "200")]),
        ]),
        mobile_body: r#"{"data":"","success":true}"#.to_string(),
        ..FakeFetcher::default()
    });
    let store = Arc::new(RecordingStore::default());
    let mut cfg = test_config(tmp.path().to_path_buf());
    cfg.limit = 1;
    cfg.idle_timeout = Duration::from_secs(30);
    cfg.op_timeout = Duration::from_secs(120);

    let started = std::time::Instant::now();
    run_pool(cfg, fetcher, store).unwrap_err();
    // Shutdown must ride the poll interval, not the 30s idle window.
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn avatar_target_resolution() {
    let dir = Path::new("/avatars");
    let empty = HashMap::new();
    assert_eq!(
        resolve_avatar_target(&empty, dir, "/photos/42.jpg", Some(10)),
        Some(PathBuf::from("/avatars/photos/42.jpg"))
    );

    let inventory = HashMap::from([(
        "42".to_string(),
        AvatarInfo {
            actual_name: "42.jpg".to_string(),
            num: 1,
            size: 100,
            hash: "deadbeef".to_string(),
        },
    )]);

    // Same size: already mirrored, skip.
    assert_eq!(
        resolve_avatar_target(&inventory, dir, "/photos/42.jpg", Some(100)),
        None
    );
    // Different size: keep the old file, write the next numbered slot.
    assert_eq!(
        resolve_avatar_target(&inventory, dir, "/photos/42.jpg", Some(50)),
        Some(PathBuf::from("/avatars/photos/42 (2).jpg"))
    );
    // Unknown size counts as different.
    assert_eq!(
        resolve_avatar_target(&inventory, dir, "/photos/42.jpg", None),
        Some(PathBuf::from("/avatars/photos/42 (2).jpg"))
    );
}

#[test]
fn inventory_prefers_highest_numbered_file() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("7.jpg"), b"abc").unwrap();
    fs::write(tmp.path().join("7 (2).jpg"), b"abcde").unwrap();
    fs::write(tmp.path().join("9.png"), b"x").unwrap();

    let inventory = build_inventory(tmp.path()).unwrap();
    assert_eq!(inventory.len(), 2);

    let seven = &inventory["7"];
    assert_eq!(seven.actual_name, "7 (2).jpg");
    assert_eq!(seven.num, 2);
    assert_eq!(seven.size, 5);
    assert!(!seven.hash.is_empty());

    assert_eq!(inventory["9"].num, 1);
}
