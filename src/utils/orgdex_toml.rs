//! Load `orgdex.toml` from the working directory (CLI only). Library callers
//! build a [`CrawlConfig`](crate::utils::CrawlConfig) themselves.

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub(crate) struct OrgdexToml {
    #[serde(default)]
    scrape: ScrapeSection,
}

#[derive(Debug, Default, Deserialize)]
struct ScrapeSection {
    base_url: Option<String>,
    section_path: Option<String>,
    fio_path: Option<String>,
    mobile_path: Option<String>,
    avatar_dir: Option<String>,
    db_path: Option<String>,
    workers: Option<usize>,
    limit: Option<u32>,
    root: Option<String>,
    op_timeout_secs: Option<u64>,
    req_timeout_secs: Option<u64>,
    idle_timeout_secs: Option<u64>,
    verbose: Option<bool>,
}

/// Read `orgdex.toml` from `dir` if present. None when missing or unreadable.
pub(crate) fn load_orgdex_toml(dir: &Path) -> Option<OrgdexToml> {
    let path = dir.join("orgdex.toml");
    let s = std::fs::read_to_string(&path).ok()?;
    toml::from_str(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

/// Fill unset CLI fields from the file. CLI flags win; the file only supplies
/// values the user did not pass.
pub(crate) fn apply_file_to_cli(file: &OrgdexToml, cli: &mut crate::engine::Cli) {
    let s = &file.scrape;
    macro_rules! fill {
        ($file_field:ident => $cli_field:ident) => {
            if cli.$cli_field.is_none() {
                cli.$cli_field = s.$file_field.clone();
            }
        };
    }
    fill!(base_url => base_url);
    fill!(section_path => section_path);
    fill!(fio_path => fio_path);
    fill!(mobile_path => mobile_path);
    fill!(root => root);
    fill!(workers => workers);
    fill!(limit => limit);
    fill!(op_timeout_secs => op_timeout);
    fill!(req_timeout_secs => req_timeout);
    fill!(idle_timeout_secs => idle_timeout);
    if cli.avatar_dir.is_none() {
        cli.avatar_dir = s.avatar_dir.as_ref().map(PathBuf::from);
    }
    if cli.db.is_none() {
        cli.db = s.db_path.as_ref().map(PathBuf::from);
    }
    if !cli.verbose {
        cli.verbose = s.verbose.unwrap_or(false);
    }
}
