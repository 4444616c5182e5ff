//! Per-worker overflow queues between workers and dispatchers.
//!
//! Workers never block while publishing newly discovered keys: they append to
//! an unbounded, mutex-guarded deque and nudge the paired dispatcher through a
//! wide notify channel. The dispatcher drains the deque into the shared
//! bounded task channel at whatever pace the consumers allow.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::debug;

use crate::utils::config::NOTIFY_CHANNEL_CAP;

#[derive(Debug, Default)]
pub struct Frontier {
    items: Mutex<VecDeque<String>>,
}

impl Frontier {
    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        match self.items.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn pop(&self) -> Option<String> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Producer half handed to a worker. Dropping it closes the notify channel,
/// which is how the paired dispatcher learns its worker has exited.
pub struct FrontierPusher {
    frontier: Arc<Frontier>,
    notify: Sender<()>,
}

impl FrontierPusher {
    /// Appends a key and wakes the dispatcher. The notify send is
    /// edge-triggered: a full notify channel already guarantees the
    /// dispatcher has pending wake-ups, so losing this one is harmless.
    pub fn push(&self, key: String) {
        self.frontier.lock().push_back(key);
        match self.notify.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                debug!("frontier notify channel closed, dispatcher gone");
            }
        }
    }
}

/// Builds one worker/dispatcher link: the shared deque, the worker-side
/// pusher, and the dispatcher-side wake-up receiver.
pub fn frontier_pair() -> (Arc<Frontier>, FrontierPusher, Receiver<()>) {
    let frontier = Arc::new(Frontier::default());
    let (notify_tx, notify_rx) = bounded(NOTIFY_CHANNEL_CAP);
    let pusher = FrontierPusher {
        frontier: frontier.clone(),
        notify: notify_tx,
    };
    (frontier, pusher, notify_rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_queues_key_and_notifies() {
        let (frontier, pusher, notify) = frontier_pair();
        pusher.push("100500".to_string());
        assert_eq!(notify.try_recv(), Ok(()));
        assert_eq!(frontier.pop(), Some("100500".to_string()));
        assert_eq!(frontier.pop(), None);
    }

    #[test]
    fn notify_overflow_is_not_an_error() {
        let (frontier, pusher, _notify) = frontier_pair();
        for i in 0..NOTIFY_CHANNEL_CAP + 10 {
            pusher.push(i.to_string());
        }
        assert_eq!(frontier.len(), NOTIFY_CHANNEL_CAP + 10);
    }
}
