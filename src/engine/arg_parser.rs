//! Command-line surface. Unset flags are filled from `orgdex.toml` before the
//! crawl configuration is built, so every field that the file can supply is
//! an `Option` here.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;

use crate::utils::config::CrawlConfig;

#[derive(Clone, Debug, Parser)]
#[command(
    name = "orgdex",
    about = "Crawl an organizational directory into SQLite",
    version
)]
pub struct Cli {
    /// Base URL of the directory site
    #[arg(long, env = "ORGDEX_BASE_URL")]
    pub base_url: Option<String>,

    /// Section-listing path, the key is appended
    #[arg(long, env = "ORGDEX_SECTION_PATH")]
    pub section_path: Option<String>,

    /// Full-name search path, the escaped short name is appended
    #[arg(long, env = "ORGDEX_FIO_PATH")]
    pub fio_path: Option<String>,

    /// Mobile-lookup path, the personnel number is appended
    #[arg(long, env = "ORGDEX_MOBILE_PATH")]
    pub mobile_path: Option<String>,

    /// Root section key to start from
    #[arg(long, env = "ORGDEX_ROOT")]
    pub root: Option<String>,

    /// Directory for downloaded avatars [default: avatars]
    #[arg(long, env = "ORGDEX_AVATAR_DIR")]
    pub avatar_dir: Option<PathBuf>,

    /// SQLite database path [default: orgdex.db]
    #[arg(short, long)]
    pub db: Option<PathBuf>,

    /// Fetch/avatar worker pairs [default: 5]
    #[arg(short, long, env = "ORGDEX_WORKERS")]
    pub workers: Option<usize>,

    /// Stop after this many items, 0 = unlimited
    #[arg(short, long, env = "ORGDEX_LIMIT")]
    pub limit: Option<u32>,

    /// Overall crawl deadline in seconds [default: 1600]
    #[arg(long)]
    pub op_timeout: Option<u64>,

    /// Per-request HTTP timeout in seconds [default: 10]
    #[arg(long)]
    pub req_timeout: Option<u64>,

    /// Stop once both task queues are empty this long, seconds [default: 20]
    #[arg(long)]
    pub idle_timeout: Option<u64>,

    /// Import NDJSON records from this directory instead of crawling
    #[arg(long, value_name = "DIR")]
    pub from_file: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn db_path(&self) -> PathBuf {
        self.db.clone().unwrap_or_else(|| PathBuf::from("orgdex.db"))
    }

    /// Validate and assemble the crawl configuration. The three fields with
    /// no sensible default must come from a flag, the environment, or the
    /// config file.
    pub fn to_config(&self) -> Result<CrawlConfig> {
        let defaults = CrawlConfig::default();
        let mut missing = Vec::new();
        if self.base_url.as_deref().unwrap_or("").is_empty() {
            missing.push("--base-url");
        }
        if self.section_path.as_deref().unwrap_or("").is_empty() {
            missing.push("--section-path");
        }
        if self.root.as_deref().unwrap_or("").is_empty() {
            missing.push("--root");
        }
        if !missing.is_empty() {
            bail!("missing required options: {}", missing.join(", "));
        }

        Ok(CrawlConfig {
            base_url: self.base_url.clone().unwrap_or_default(),
            section_path: self.section_path.clone().unwrap_or_default(),
            fio_path: self.fio_path.clone().unwrap_or_default(),
            mobile_path: self.mobile_path.clone().unwrap_or_default(),
            avatar_dir: self.avatar_dir.clone().unwrap_or(defaults.avatar_dir),
            workers: self.workers.unwrap_or(defaults.workers),
            limit: self.limit.unwrap_or(defaults.limit),
            root_key: self.root.clone().unwrap_or_default(),
            op_timeout: self
                .op_timeout
                .map_or(defaults.op_timeout, Duration::from_secs),
            req_timeout: self
                .req_timeout
                .map_or(defaults.req_timeout, Duration::from_secs),
            idle_timeout: self
                .idle_timeout
                .map_or(defaults.idle_timeout, Duration::from_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_requires_base_url_and_root() {
        let cli = Cli::parse_from(["orgdex"]);
        let err = cli.to_config().unwrap_err();
        assert!(err.to_string().contains("--base-url"));
        assert!(err.to_string().contains("--root"));
    }

    #[test]
    fn flags_map_to_config() {
        let cli = Cli::parse_from([
            "orgdex",
            "--base-url",
            "http://phones.example",
            "--section-path",
            "/getSotrs?id=",
            "--root",
            "100500",
            "--workers",
            "2",
            "--idle-timeout",
            "1",
        ]);
        let cfg = cli.to_config().unwrap();
        assert_eq!(cfg.base_url, "http://phones.example");
        assert_eq!(cfg.root_key, "100500");
        assert_eq!(cfg.workers, 2);
        assert_eq!(cfg.idle_timeout, Duration::from_secs(1));
        assert_eq!(cfg.op_timeout, Duration::from_secs(1600));
    }
}
