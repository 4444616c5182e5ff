//! HTTP access behind a trait so the engine can run against a fake in tests.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, bail};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::blocking::{Client, Response};

use crate::types::RawEntry;
use crate::utils::config::CrawlConfig;

/// Every network operation the crawl performs. Implementations make plain
/// blocking calls; concurrency comes from the pool's threads, not from here.
pub trait Fetch: Send + Sync {
    /// Lists the direct children of a section key.
    fn fetch_section(&self, key: &str) -> Result<Vec<RawEntry>>;

    /// Search page body for an employee's short name, used to recover the
    /// middle name.
    fn fetch_full_name(&self, name: &str) -> Result<String>;

    /// Mobile lookup body for a personnel number.
    fn fetch_mobile(&self, tabnum: &str) -> Result<String>;

    /// Remote avatar size from a HEAD request, `None` when the server does
    /// not report a length.
    fn avatar_size(&self, url_path: &str) -> Result<Option<u64>>;

    /// Streams the avatar at `url_path` into `dest`, returning bytes written.
    fn download_avatar(&self, url_path: &str, dest: &Path) -> Result<u64>;
}

pub struct HttpFetcher {
    client: Client,
    base_url: String,
    section_path: String,
    fio_path: String,
    mobile_path: String,
}

impl HttpFetcher {
    pub fn new(cfg: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.req_timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            client,
            base_url: cfg.base_url.clone(),
            section_path: cfg.section_path.clone(),
            fio_path: cfg.fio_path.clone(),
            mobile_path: cfg.mobile_path.clone(),
        })
    }

    fn get(&self, url: &str) -> Result<Response> {
        let resp = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("GET {url}"))?;
        check_status(resp, url)
    }
}

fn check_status(resp: Response, url: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    // Error bodies carry a one-line JSON message worth surfacing.
    let message = resp
        .json::<serde_json::Value>()
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str().map(String::from)))
        .unwrap_or_default();
    bail!("GET {url}: status {status}: {message}");
}

impl Fetch for HttpFetcher {
    fn fetch_section(&self, key: &str) -> Result<Vec<RawEntry>> {
        let url = format!("{}{}{}", self.base_url, self.section_path, key);
        let resp = self.get(&url)?;
        resp.json()
            .with_context(|| format!("decode section listing {key}"))
    }

    fn fetch_full_name(&self, name: &str) -> Result<String> {
        let escaped = utf8_percent_encode(name, NON_ALPHANUMERIC);
        let url = format!("{}{}{}", self.base_url, self.fio_path, escaped);
        let resp = self.get(&url)?;
        resp.text().context("read full name response")
    }

    fn fetch_mobile(&self, tabnum: &str) -> Result<String> {
        let url = format!("{}{}{}", self.base_url, self.mobile_path, tabnum);
        let resp = self.get(&url)?;
        resp.text().context("read mobile response")
    }

    fn avatar_size(&self, url_path: &str) -> Result<Option<u64>> {
        let url = format!("{}{}", self.base_url, url_path);
        let resp = self
            .client
            .head(&url)
            .send()
            .with_context(|| format!("HEAD {url}"))?;
        let resp = check_status(resp, &url)?;
        Ok(resp.content_length())
    }

    fn download_avatar(&self, url_path: &str, dest: &Path) -> Result<u64> {
        let url = format!("{}{}", self.base_url, url_path);
        let mut resp = self.get(&url)?;
        let mut file = File::create(dest)
            .with_context(|| format!("create avatar file {}", dest.display()))?;
        resp.copy_to(&mut file)
            .with_context(|| format!("write avatar {}", dest.display()))
    }
}
