//! Pool coordinator: wires workers, dispatchers and the watchdog together.

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Sender, bounded, tick};
use log::{error, info};

use super::avatar::{AvatarWorker, build_inventory};
use super::cancel::CancelToken;
use super::dispatcher::run_dispatcher;
use super::fetch::{Fetch, HttpFetcher};
use super::frontier::frontier_pair;
use super::worker::FetchWorker;
use crate::error::{CancelReason, CrawlError};
use crate::store::Store;
use crate::types::{CrawlCounts, Task};
use crate::utils::config::{CrawlConfig, POLL_INTERVAL, TASK_CHANNEL_CAP};

/// Shared branch/leaf tallies, bumped by fetch workers as entries are
/// classified and checked against the item limit.
#[derive(Debug, Default)]
pub struct Counters {
    pub branches: AtomicU32,
    pub leaves: AtomicU32,
}

impl Counters {
    pub fn total(&self) -> u32 {
        self.branches.load(Ordering::Relaxed) + self.leaves.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CrawlCounts {
        CrawlCounts {
            branches: self.branches.load(Ordering::Relaxed),
            leaves: self.leaves.load(Ordering::Relaxed),
        }
    }
}

type FetcherFactory = Box<dyn Fn(&CrawlConfig) -> Result<Arc<dyn Fetch>>>;

pub struct Pool {
    cfg: Arc<CrawlConfig>,
    store: Arc<dyn Store>,
    make_fetcher: FetcherFactory,
    cancel: Arc<CancelToken>,
}

impl Pool {
    /// Production pool: each fetch/avatar worker pair gets its own HTTP
    /// client.
    pub fn new(cfg: CrawlConfig, store: Arc<dyn Store>) -> Self {
        Self::with_fetcher_factory(
            cfg,
            store,
            Box::new(|cfg| Ok(Arc::new(HttpFetcher::new(cfg)?) as Arc<dyn Fetch>)),
        )
    }

    pub fn with_fetcher_factory(
        cfg: CrawlConfig,
        store: Arc<dyn Store>,
        make_fetcher: FetcherFactory,
    ) -> Self {
        Pool {
            cfg: Arc::new(cfg),
            store,
            make_fetcher,
            cancel: Arc::new(CancelToken::new()),
        }
    }

    /// Handle for external cancellation, e.g. a Ctrl+C hook.
    pub fn cancel_token(&self) -> Arc<CancelToken> {
        self.cancel.clone()
    }

    /// Runs the crawl to completion and returns the final tallies.
    ///
    /// Spawns `cfg.workers` fetch/avatar worker pairs, each with two
    /// dispatchers, seeds the root section, then waits. Idle-watchdog
    /// shutdown counts as success; any other cancellation or a tripped item
    /// limit surfaces as the error the first failing worker reported.
    pub fn run(self) -> Result<CrawlCounts> {
        fs::create_dir_all(&self.cfg.avatar_dir)
            .with_context(|| format!("create avatar dir {}", self.cfg.avatar_dir.display()))?;
        let inventory = Arc::new(build_inventory(&self.cfg.avatar_dir)?);
        info!("avatar inventory: {} files", inventory.len());

        let counters = Arc::new(Counters::default());
        let (section_tx, section_rx) = bounded::<Task>(TASK_CHANNEL_CAP);
        let (avatar_tx, avatar_rx) = bounded::<Task>(TASK_CHANNEL_CAP);

        let mut workers: Vec<JoinHandle<Result<()>>> = Vec::new();
        let mut dispatchers: Vec<JoinHandle<()>> = Vec::new();

        for i in 0..self.cfg.workers.max(1) {
            let fetch = (self.make_fetcher)(&self.cfg)?;
            let (section_frontier, section_pusher, section_notify) = frontier_pair();
            let (avatar_frontier, avatar_pusher, avatar_notify) = frontier_pair();

            let fetch_worker = FetchWorker {
                name: format!("fetch-{i}"),
                cfg: self.cfg.clone(),
                fetch: fetch.clone(),
                store: self.store.clone(),
                counters: counters.clone(),
                cancel: self.cancel.clone(),
                sections: section_pusher,
                avatars: avatar_pusher,
            };
            let input = section_rx.clone();
            let resubmit = section_tx.clone();
            workers.push(
                thread::Builder::new()
                    .name(format!("fetch-{i}"))
                    .spawn(move || fetch_worker.run(input, resubmit))
                    .context("spawn fetch worker")?,
            );

            let avatar_worker = AvatarWorker {
                name: format!("avatar-{i}"),
                cfg: self.cfg.clone(),
                fetch,
                counters: counters.clone(),
                cancel: self.cancel.clone(),
                inventory: inventory.clone(),
            };
            let input = avatar_rx.clone();
            workers.push(
                thread::Builder::new()
                    .name(format!("avatar-{i}"))
                    .spawn(move || avatar_worker.run(input))
                    .context("spawn avatar worker")?,
            );

            for (label, frontier, out, notify) in [
                (
                    format!("sections-{i}"),
                    section_frontier,
                    section_tx.clone(),
                    section_notify,
                ),
                (
                    format!("avatars-{i}"),
                    avatar_frontier,
                    avatar_tx.clone(),
                    avatar_notify,
                ),
            ] {
                let cancel = self.cancel.clone();
                dispatchers.push(
                    thread::Builder::new()
                        .name(label.clone())
                        .spawn(move || run_dispatcher(label, frontier, out, notify, cancel))
                        .context("spawn dispatcher")?,
                );
            }
        }

        let watchdog = self.spawn_watchdog(section_tx.clone(), avatar_tx.clone())?;

        section_tx
            .send(Task::new(self.cfg.root_key.clone()))
            .context("seed root section")?;
        // The coordinator's own handles must go away so channel disconnects
        // can propagate once every worker and dispatcher has exited.
        drop(section_tx);
        drop(avatar_tx);

        let mut first_err: Option<anyhow::Error> = None;
        for handle in workers {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
                Err(_) => {
                    if first_err.is_none() {
                        first_err = Some(anyhow!("worker thread panicked"));
                    }
                }
            }
        }
        for handle in dispatchers {
            if handle.join().is_err() {
                error!("dispatcher thread panicked");
            }
        }
        if watchdog.join().is_err() {
            error!("watchdog thread panicked");
        }

        let counts = counters.snapshot();
        match first_err {
            None => Ok(counts),
            Some(e) if self.idle_shutdown(&e) => {
                info!("crawl drained, frontier idle");
                Ok(counts)
            }
            Some(e) => Err(e),
        }
    }

    /// An idle-watchdog cancellation is the normal end of a finished crawl,
    /// not a failure.
    fn idle_shutdown(&self, e: &anyhow::Error) -> bool {
        self.cancel.reason() == Some(CancelReason::Idle)
            && matches!(
                e.downcast_ref::<CrawlError>(),
                Some(CrawlError::Cancelled { .. })
            )
    }

    /// Watchdog: ends the crawl once both shared channels stay empty for a
    /// full idle window, or when the overall deadline passes. Emptiness of
    /// the bounded channels is a heuristic for a drained frontier; a long
    /// single fetch can in principle trip it early, which the idle window is
    /// sized to make unlikely.
    ///
    /// The loop ticks at the poll interval so an external cancellation is
    /// noticed quickly; idle and deadline are tracked as instants, not tick
    /// periods.
    fn spawn_watchdog(
        &self,
        sections: Sender<Task>,
        avatars: Sender<Task>,
    ) -> Result<JoinHandle<()>> {
        let cancel = self.cancel.clone();
        let idle = self.cfg.idle_timeout;
        let op_deadline = Instant::now() + self.cfg.op_timeout;
        thread::Builder::new()
            .name("watchdog".into())
            .spawn(move || {
                let ticker = tick(POLL_INTERVAL);
                let mut idle_deadline = Instant::now() + idle;
                while ticker.recv().is_ok() {
                    if cancel.is_cancelled() {
                        return;
                    }
                    let now = Instant::now();
                    if now >= op_deadline {
                        info!("operation deadline reached, stopping");
                        cancel.cancel(CancelReason::Deadline);
                        return;
                    }
                    if sections.is_empty() && avatars.is_empty() {
                        if now >= idle_deadline {
                            info!("no tasks for {}s, stopping", idle.as_secs_f32());
                            cancel.cancel(CancelReason::Idle);
                            return;
                        }
                    } else {
                        idle_deadline = now + idle;
                    }
                }
            })
            .context("spawn watchdog")
    }
}
