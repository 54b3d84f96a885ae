//! Acknowledgment deadlines for provider subscriptions.
//!
//! Each SUBSCRIBE and UNSUBSCRIBE the broker sends must be acknowledged
//! within the configured subscription timeout. The registry tracks one
//! deadline per `(name, action)`; the matching ACK clears it, otherwise it
//! fires once and reports a [`ClientEventKind::AckTimeout`] event.
//!
//! Outbound request timeouts are not tracked here; every call owns its own
//! timers (see `client::call`).
//!
//! # Timers
//!
//! Every deadline is a spawned task sleeping for the timeout. Clearing aborts
//! the task. An entry also carries a generation number, so a task that woke
//! up just before its entry was cleared or replaced finds a different (or no)
//! generation and does nothing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::events::{ClientEvent, ClientEventKind, EventEmitter};
use crate::sync::lock_ignore_poison;
use crate::{Action, Topic};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TimeoutKey {
    name: String,
    action: Action,
}

struct Deadline {
    generation: u64,
    task: JoinHandle<()>,
}

/// Tracks pending subscribe/unsubscribe acknowledgments.
pub(crate) struct AckTimeoutRegistry {
    shared: Arc<Shared>,
}

struct Shared {
    topic: Topic,
    timeout: Duration,
    deadlines: Mutex<HashMap<TimeoutKey, Deadline>>,
    next_generation: AtomicU64,
    events: EventEmitter,
}

impl AckTimeoutRegistry {
    pub(crate) fn new(topic: Topic, timeout: Duration, events: EventEmitter) -> Self {
        // ---
        Self {
            shared: Arc::new(Shared {
                topic,
                timeout,
                deadlines: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                events,
            }),
        }
    }

    /// Start the deadline for `(name, action)`, restarting it if one is
    /// already pending.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn add(&self, name: &str, action: Action) {
        // ---
        let key = TimeoutKey {
            name: name.to_string(),
            action,
        };
        let generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed);
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let timeout = self.shared.timeout;

        // The lock is held across the spawn so the task cannot look up its
        // entry before it has been inserted.
        let mut deadlines = lock_ignore_poison(&self.shared.deadlines);

        let task = tokio::spawn({
            let key = key.clone();
            async move {
                tokio::time::sleep(timeout).await;
                if let Some(shared) = weak.upgrade() {
                    shared.expire(&key, generation);
                }
            }
        });

        if let Some(previous) = deadlines.insert(key, Deadline { generation, task }) {
            previous.task.abort();
        }
    }

    /// Clear the deadline for `(name, action)`.
    ///
    /// Returns `false` when nothing was pending, which callers treat as an
    /// unsolicited acknowledgment rather than an error.
    pub(crate) fn clear(&self, name: &str, action: Action) -> bool {
        // ---
        let key = TimeoutKey {
            name: name.to_string(),
            action,
        };

        let removed = lock_ignore_poison(&self.shared.deadlines).remove(&key);
        match removed {
            Some(deadline) => {
                deadline.task.abort();
                true
            }
            None => false,
        }
    }

    /// Number of deadlines still running.
    pub(crate) fn pending(&self) -> usize {
        lock_ignore_poison(&self.shared.deadlines).len()
    }
}

impl Shared {
    fn expire(&self, key: &TimeoutKey, generation: u64) {
        // ---
        {
            let mut deadlines = lock_ignore_poison(&self.deadlines);
            match deadlines.get(key) {
                Some(deadline) if deadline.generation == generation => {
                    deadlines.remove(key);
                }
                // cleared or restarted after this timer woke up
                _ => return,
            }
        }

        self.events.emit(ClientEvent::new(
            self.topic,
            ClientEventKind::AckTimeout,
            format!(
                "No ACK message received in time for {} {}",
                key.action.code(),
                key.name
            ),
        ));
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let deadlines = self
            .deadlines
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for (_, deadline) in deadlines.drain() {
            deadline.task.abort();
        }
    }
}
