//! Dispatcher loop draining one worker's frontier into a shared task channel.

use std::sync::Arc;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use log::{debug, info};

use super::cancel::CancelToken;
use super::frontier::Frontier;
use crate::types::Task;
use crate::utils::config::POLL_INTERVAL;

/// Moves keys from `frontier` into `out` until the paired worker drops its
/// pusher (notify disconnects), the consumers all exit, or the crawl is
/// cancelled. One wake-up on `notify` corresponds to at most one queued key,
/// but spurious wake-ups after a racing drain are tolerated.
pub fn run_dispatcher(
    name: String,
    frontier: Arc<Frontier>,
    out: Sender<Task>,
    notify: Receiver<()>,
    cancel: Arc<CancelToken>,
) {
    let mut dispatched = 0u64;
    loop {
        match notify.recv_timeout(POLL_INTERVAL) {
            Ok(()) => {
                let Some(key) = frontier.pop() else {
                    debug!("{name}: stale wake-up, frontier already drained");
                    continue;
                };
                let mut task = Task::new(key);
                loop {
                    match out.send_timeout(task, POLL_INTERVAL) {
                        Ok(()) => {
                            dispatched += 1;
                            break;
                        }
                        Err(SendTimeoutError::Timeout(t)) => {
                            if cancel.is_cancelled() {
                                info!("{name}: cancelled, dispatched {dispatched}");
                                return;
                            }
                            task = t;
                        }
                        Err(SendTimeoutError::Disconnected(_)) => {
                            debug!("{name}: task channel closed, dispatched {dispatched}");
                            return;
                        }
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if cancel.is_cancelled() {
                    info!("{name}: cancelled, dispatched {dispatched}");
                    return;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!("{name}: worker exited, dispatched {dispatched}");
                return;
            }
        }
    }
}
