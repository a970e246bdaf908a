//! Feedback Lifecycle Manager
//!
//! Holds the set of live feedback messages. Each admitted message gets its
//! own expiry timer and leaves the set after its `duration_ms`, regardless
//! of what happens to any other message.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::types::{FeedbackMessage, MessageId};

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("feedback manager requires a running tokio runtime")]
    NoRuntime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    Admitted,
    /// A message with this id is already live; its timer is untouched
    AlreadyLive,
}

/// Counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedbackStats {
    pub admitted: u64,
    pub already_live: u64,
    pub expired: u64,
    pub cleared: u64,
}

struct ExpiryTimer {
    ticket: u64,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct LiveSet {
    /// Insertion order
    messages: Vec<FeedbackMessage>,
    timers: HashMap<MessageId, ExpiryTimer>,
    next_ticket: u64,
    stats: FeedbackStats,
}

struct Shared {
    live: Mutex<LiveSet>,
    published: watch::Sender<Vec<FeedbackMessage>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, LiveSet> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push the current live set to subscribers. Called with the lock held
    /// so published snapshots follow mutation order.
    fn publish(&self, live: &LiveSet) {
        self.published.send_replace(live.messages.clone());
    }
}

/// Timed store of live feedback messages.
///
/// Dropping the manager clears it: no expiry fires afterwards.
pub struct FeedbackLifecycleManager {
    shared: Arc<Shared>,
}

impl Default for FeedbackLifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackLifecycleManager {
    pub fn new() -> Self {
        let (published, _) = watch::channel(Vec::new());
        Self {
            shared: Arc::new(Shared {
                live: Mutex::new(LiveSet::default()),
                published,
            }),
        }
    }

    /// Admit `message` and schedule its removal after `message.duration_ms`.
    ///
    /// Posting an id that is already live is a no-op and does not restart
    /// its timer.
    pub fn post(&self, message: FeedbackMessage) -> Result<PostOutcome, FeedbackError> {
        let mut live = self.shared.lock();

        if live.timers.contains_key(&message.id) {
            live.stats.already_live += 1;
            debug!(message = %message.id, "Message already live, ignoring");
            return Ok(PostOutcome::AlreadyLive);
        }

        let runtime = Handle::try_current().map_err(|_| FeedbackError::NoRuntime)?;

        let id = message.id;
        let ticket = live.next_ticket;
        live.next_ticket += 1;
        let lifetime = message.duration();
        let owner = Arc::downgrade(&self.shared);

        let task = runtime.spawn(async move {
            tokio::time::sleep(lifetime).await;
            expire(&owner, id, ticket);
        });

        info!(
            message = %id,
            severity = %message.severity,
            duration_ms = message.duration_ms,
            "{}",
            message.text
        );
        live.messages.push(message);
        live.timers.insert(id, ExpiryTimer { ticket, task });
        live.stats.admitted += 1;
        self.shared.publish(&live);

        Ok(PostOutcome::Admitted)
    }

    /// Live messages in insertion order.
    pub fn snapshot(&self) -> Vec<FeedbackMessage> {
        self.shared.lock().messages.clone()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_live(&self, id: MessageId) -> bool {
        self.shared.lock().timers.contains_key(&id)
    }

    /// Cancel every pending expiry and empty the set.
    pub fn clear(&self) {
        let mut live = self.shared.lock();
        if live.messages.is_empty() && live.timers.is_empty() {
            return;
        }
        for (_, timer) in live.timers.drain() {
            timer.task.abort();
        }
        let dropped = live.messages.len();
        live.messages.clear();
        live.stats.cleared += dropped as u64;
        self.shared.publish(&live);
        info!(dropped, "Live feedback cleared");
    }

    /// Receiver that observes the live set after every admission, expiry
    /// and clear.
    pub fn subscribe(&self) -> watch::Receiver<Vec<FeedbackMessage>> {
        self.shared.published.subscribe()
    }

    pub fn stats(&self) -> FeedbackStats {
        self.shared.lock().stats
    }
}

impl Drop for FeedbackLifecycleManager {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Timer side: remove exactly the message this timer was armed for.
fn expire(owner: &Weak<Shared>, id: MessageId, ticket: u64) {
    let Some(shared) = owner.upgrade() else {
        return;
    };
    let mut live = shared.lock();

    match live.timers.get(&id) {
        Some(timer) if timer.ticket == ticket => {}
        // Cleared, and possibly re-posted with a fresh timer
        _ => return,
    }
    live.timers.remove(&id);
    live.messages.retain(|m| m.id != id);
    live.stats.expired += 1;
    shared.publish(&live);
    debug!(message = %id, "Message expired");
}
