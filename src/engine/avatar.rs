//! Avatar worker: downloads employee photos, skipping ones already on disk.
//!
//! Before the pool starts, the avatar directory is scanned once into an
//! inventory keyed by file stem. A download is skipped when the remote
//! reported size matches the inventoried file; a re-download under the same
//! key lands beside the old file as `"key (N+1).ext"` rather than clobbering
//! it. Writes go through a `.tmp` sibling renamed into place, so a killed run
//! never leaves a half-written image under the final name.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, error, info, warn};
use walkdir::WalkDir;

use super::cancel::CancelToken;
use super::fetch::Fetch;
use super::pool::Counters;
use crate::error::{CancelReason, CrawlError};
use crate::scrape::find_between;
use crate::types::{AvatarInfo, Task};
use crate::utils::config::{CrawlConfig, POLL_INTERVAL};

pub struct AvatarWorker {
    pub name: String,
    pub cfg: Arc<CrawlConfig>,
    pub fetch: Arc<dyn Fetch>,
    pub counters: Arc<Counters>,
    pub cancel: Arc<CancelToken>,
    pub inventory: Arc<HashMap<String, AvatarInfo>>,
}

impl AvatarWorker {
    pub fn run(self, input: Receiver<Task>) -> Result<()> {
        info!("{}: start downloading", self.name);
        loop {
            let task = match input.recv_timeout(POLL_INTERVAL) {
                Ok(task) => task,
                Err(RecvTimeoutError::Timeout) => {
                    if self.cancel.is_cancelled() {
                        let reason = self.cancel.reason().unwrap_or(CancelReason::Interrupt);
                        info!("{}: stopping: {reason}", self.name);
                        return Err(CrawlError::Cancelled { reason }.into());
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            };

            let total = self.counters.total();
            if self.cfg.limit > 0 && total > self.cfg.limit {
                info!("{}: item limit reached, count {total}", self.name);
                self.cancel.cancel(CancelReason::Limit);
                return Err(CrawlError::LimitExceeded { count: total }.into());
            }

            self.process(&task.key);
        }
    }

    fn process(&self, url_path: &str) {
        let remote_len = match self.fetch.avatar_size(url_path) {
            Ok(len) => len,
            Err(e) => {
                // Size stays unknown; an inventoried key then falls through
                // to a disambiguated re-download.
                warn!("{}: avatar size {url_path}: {e:#}", self.name);
                None
            }
        };

        let Some(target) =
            resolve_avatar_target(&self.inventory, &self.cfg.avatar_dir, url_path, remote_len)
        else {
            debug!("{}: avatar unchanged, skipping {url_path}", self.name);
            return;
        };

        if let Some(parent) = target.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("{}: create {}: {e}", self.name, parent.display());
                return;
            }
        }

        let tmp = tmp_path(&target);
        match self.fetch.download_avatar(url_path, &tmp) {
            Ok(size) => {
                if let Err(e) = fs::rename(&tmp, &target) {
                    error!("{}: rename into {}: {e}", self.name, target.display());
                    return;
                }
                info!(
                    "{}: downloaded {} ({size} bytes)",
                    self.name,
                    target.display()
                );
            }
            Err(e) => {
                error!("{}: download {url_path}: {e:#}", self.name);
                if let Err(e) = fs::remove_file(&tmp) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!("{}: remove {}: {e}", self.name, tmp.display());
                    }
                }
            }
        }
    }
}

fn tmp_path(target: &Path) -> PathBuf {
    let mut s = target.as_os_str().to_os_string();
    s.push(".tmp");
    PathBuf::from(s)
}

/// Decide where (and whether) to store the avatar at `url_path`.
///
/// Returns `None` when the inventoried file for this key matches the remote
/// size, i.e. the download should be skipped. A known key with a different
/// size maps to the next `"key (N).ext"` slot; an unknown key keeps the URL's
/// own file name under `dir`.
pub fn resolve_avatar_target(
    inventory: &HashMap<String, AvatarInfo>,
    dir: &Path,
    url_path: &str,
    remote_len: Option<u64>,
) -> Option<PathBuf> {
    let rel = url_path.trim_start_matches('/');
    let default = dir.join(rel);
    let file_name = Path::new(rel)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let key = file_name.split('.').next().unwrap_or_default();

    let Some(info) = inventory.get(key) else {
        return Some(default);
    };
    if remote_len == Some(info.size) {
        return None;
    }

    let ext = Path::new(&info.actual_name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let parent = default.parent().unwrap_or(dir).to_path_buf();
    Some(parent.join(format!("{} ({}){}", key, info.num + 1, ext)))
}

/// Scan `dir` into the per-key inventory. For every key the entry with the
/// highest disambiguation number wins; plain `key.ext` counts as number 1.
pub fn build_inventory(dir: &Path) -> Result<HashMap<String, AvatarInfo>> {
    let mut inventory: HashMap<String, AvatarInfo> = HashMap::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.with_context(|| format!("scan avatar dir {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let actual_name = entry.file_name().to_string_lossy().into_owned();
        let stem = actual_name.split('.').next().unwrap_or_default();
        let mut parts = stem.split(' ');
        let key = parts.next().unwrap_or_default().to_string();
        if key.is_empty() {
            continue;
        }

        let mut num = 1u32;
        if let Some(suffix) = parts.next() {
            let n = find_between(suffix, "(", ")");
            if !n.is_empty() {
                match n.parse() {
                    Ok(v) => num = v,
                    Err(e) => warn!("bad avatar suffix in {actual_name}: {e}"),
                }
            }
        }

        if inventory.get(&key).is_none_or(|prev| prev.num < num) {
            let meta = entry
                .metadata()
                .with_context(|| format!("stat {}", entry.path().display()))?;
            let hash = hash_file(entry.path())
                .with_context(|| format!("hash {}", entry.path().display()))?;
            inventory.insert(
                key,
                AvatarInfo {
                    actual_name,
                    num,
                    size: meta.len(),
                    hash,
                },
            );
        }
    }
    Ok(inventory)
}

fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}
