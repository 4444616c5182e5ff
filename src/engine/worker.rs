//! Fetch worker: consumes section tasks, classifies entries, enriches
//! employees and hands everything downstream.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use log::{debug, error, info, warn};

use super::cancel::CancelToken;
use super::fetch::Fetch;
use super::frontier::FrontierPusher;
use super::pool::Counters;
use crate::error::{CancelReason, CrawlError};
use crate::scrape;
use crate::store::Store;
use crate::types::{Department, Employee, RawEntry, Record, Task};
use crate::utils::config::{CrawlConfig, POLL_INTERVAL, RETRY_LIMIT};

pub struct FetchWorker {
    pub name: String,
    pub cfg: Arc<CrawlConfig>,
    pub fetch: Arc<dyn Fetch>,
    pub store: Arc<dyn Store>,
    pub counters: Arc<Counters>,
    pub cancel: Arc<CancelToken>,
    /// Newly discovered section keys, drained by this worker's dispatcher.
    pub sections: FrontierPusher,
    /// Avatar URL paths for the avatar workers.
    pub avatars: FrontierPusher,
}

impl FetchWorker {
    /// Main loop. `resubmit` feeds empty-response retries back into the
    /// shared section channel. Returns `Ok` on channel disconnect and a
    /// `CrawlError` on cancellation or a tripped item limit; per-item fetch
    /// and save failures are logged and skipped.
    pub fn run(self, input: Receiver<Task>, resubmit: Sender<Task>) -> Result<()> {
        info!("{}: start fetching", self.name);
        loop {
            let task = match input.recv_timeout(POLL_INTERVAL) {
                Ok(task) => task,
                Err(RecvTimeoutError::Timeout) => {
                    if self.cancel.is_cancelled() {
                        return self.cancelled();
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

            if task.attempt > RETRY_LIMIT {
                warn!(
                    "{}: dropping section after {} empty responses: key={}",
                    self.name, task.attempt, task.key
                );
                continue;
            }

            debug!("{}: fetching section {}", self.name, task.key);
            let entries = match self.fetch.fetch_section(&task.key) {
                Ok(entries) => entries,
                Err(e) => {
                    error!("{}: section {}: {e:#}", self.name, task.key);
                    continue;
                }
            };
            if entries.is_empty() {
                warn!(
                    "{}: empty response, retrying: key={} attempt={}",
                    self.name, task.key, task.attempt
                );
                self.resubmit(&resubmit, task.retry())?;
                continue;
            }

            for raw in entries {
                self.handle_entry(raw);
            }
        }
    }

    fn handle_entry(&self, raw: RawEntry) {
        let text = scrape::unescape(&raw.text);
        if raw.children {
            self.sections.push(raw.idr.clone());
            self.counters.branches.fetch_add(1, Ordering::Relaxed);
            let record = Record::Branch(Department {
                idr: raw.idr,
                parent: raw.parent,
                text,
                children: true,
            });
            if let Err(e) = self.store.save(&record) {
                error!("{}: save department {}: {e:#}", self.name, record.idr());
            }
        } else {
            self.counters.leaves.fetch_add(1, Ordering::Relaxed);
            let employee = self.prepare_employee(&raw, &text);
            let record = Record::Leaf(employee);
            if let Err(e) = self.store.save(&record) {
                error!("{}: save employee {}: {e:#}", self.name, record.idr());
            }
        }
    }

    /// Builds the full employee record from the row markup, then runs the two
    /// enrichment lookups. Enrichment failures degrade to a log line; the
    /// record is saved regardless.
    fn prepare_employee(&self, raw: &RawEntry, text: &str) -> Employee {
        let mut employee = scrape::parse_employee(text);
        employee.idr = raw.idr.clone();
        employee.parent_idr = raw.parent.clone();
        employee.children = raw.children;

        if !employee.avatar.is_empty() {
            self.avatars.push(employee.avatar.clone());
        }

        match self.fetch.fetch_full_name(&employee.name) {
            Ok(body) => {
                employee.mid_name = scrape::parse_mid_name(&employee, &scrape::unescape(&body));
            }
            Err(e) => error!("{}: full name lookup: {e:#}", self.name),
        }
        if employee.mid_name.is_empty() {
            warn!(
                "{}: middle name not found: name={} tabnum={}",
                self.name, employee.name, employee.tabnum
            );
        }

        // The row itself sometimes carries the mobile numbers; the lookup
        // endpoint is only consulted when it does not.
        if employee.mobile.is_empty() && !employee.tabnum.is_empty() {
            match self.fetch.fetch_mobile(&employee.tabnum) {
                Ok(body) => match scrape::parse_mobile(&body) {
                    Ok(lookup) => {
                        if !lookup.success {
                            warn!(
                                "{}: mobile lookup unsuccessful: tabnum={}",
                                self.name, employee.tabnum
                            );
                        }
                        if !lookup.data.is_empty() {
                            employee.mobile =
                                lookup.data.split(',').map(|v| v.to_string()).collect();
                        }
                    }
                    Err(e) => error!(
                        "{}: mobile response for {}: {e}",
                        self.name, employee.tabnum
                    ),
                },
                Err(e) => error!("{}: mobile lookup {}: {e:#}", self.name, employee.tabnum),
            }
        }

        employee
    }

    /// Cancel-aware blocking send back into the section channel.
    fn resubmit(&self, resubmit: &Sender<Task>, mut task: Task) -> Result<()> {
        loop {
            match resubmit.send_timeout(task, POLL_INTERVAL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(t)) => {
                    if self.cancel.is_cancelled() {
                        return self.cancelled();
                    }
                    task = t;
                }
                Err(SendTimeoutError::Disconnected(_)) => return Ok(()),
            }
        }
    }

    fn cancelled(&self) -> Result<()> {
        let reason = self.cancel.reason().unwrap_or(CancelReason::Interrupt);
        info!("{}: stopping: {reason}", self.name);
        Err(CrawlError::Cancelled { reason }.into())
    }
}
