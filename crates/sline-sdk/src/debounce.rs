//! # Debouncer
//!
//! Coalesces bursts of triggers into one deferred action per key.
//!
//! `schedule(key, action)` cancels the not-yet-fired task registered under
//! `key`, starts a fresh quiet-period timer and registers `action` as the one
//! to run. Every caller coalesced into a firing receives a clone of the same
//! outcome. Once the timer has fired the action is detached from the key: a
//! later `schedule` starts a new window and never aborts work in progress.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::trace;

/// Quiet period before a price refresh is sent
pub const PRICE_REFRESH_DELAY: Duration = Duration::from_millis(200);

struct Slot<T> {
    generation: u64,
    handle: JoinHandle<()>,
    waiters: Vec<oneshot::Sender<T>>,
}

struct Slots<K, T> {
    pending: HashMap<K, Slot<T>>,
    next_generation: u64,
}

/// Keyed debounce timer
pub struct Debouncer<K, T> {
    delay: Duration,
    slots: Arc<Mutex<Slots<K, T>>>,
}

fn lock<K, T>(slots: &Mutex<Slots<K, T>>) -> MutexGuard<'_, Slots<K, T>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<K, T> Debouncer<K, T>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + 'static,
    T: Clone + Send + 'static,
{
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slots: Arc::new(Mutex::new(Slots {
                pending: HashMap::new(),
                next_generation: 0,
            })),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `action` under `key`, replacing any pending action.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule<F, Fut>(
        &self,
        key: K,
        action: F,
    ) -> Result<oneshot::Receiver<T>, TryCurrentError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let runtime = Handle::try_current()?;
        let (tx, rx) = oneshot::channel();

        let mut slots = lock(&self.slots);
        slots.next_generation += 1;
        let generation = slots.next_generation;

        let mut waiters = match slots.pending.remove(&key) {
            Some(previous) => {
                trace!(key = ?key, "rescheduling pending action");
                previous.handle.abort();
                previous.waiters
            }
            None => Vec::new(),
        };
        waiters.push(tx);

        let shared = Arc::clone(&self.slots);
        let task_key = key.clone();
        let delay = self.delay;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            let waiters = {
                let mut slots = lock(&shared);
                let current = slots.pending.get(&task_key).map(|slot| slot.generation);
                if current != Some(generation) {
                    return;
                }
                slots
                    .pending
                    .remove(&task_key)
                    .map(|slot| slot.waiters)
                    .unwrap_or_default()
            };

            trace!(key = ?task_key, waiters = waiters.len(), "debounce window elapsed");
            let outcome = action().await;
            for waiter in waiters {
                // A dropped receiver only means the caller stopped waiting.
                let _ = waiter.send(outcome.clone());
            }
        });

        slots.pending.insert(
            key,
            Slot {
                generation,
                handle,
                waiters,
            },
        );
        Ok(rx)
    }

    /// Whether an action is waiting for its quiet period under `key`
    pub fn is_pending(&self, key: &K) -> bool {
        lock(&self.slots).pending.contains_key(key)
    }

    /// Abort every pending action; their waiters observe a closed channel
    pub fn cancel_all(&self) -> usize {
        let mut slots = lock(&self.slots);
        let cancelled = slots.pending.len();
        for (_, slot) in slots.pending.drain() {
            slot.handle.abort();
        }
        cancelled
    }
}

impl<K, T> Drop for Debouncer<K, T> {
    fn drop(&mut self) {
        for (_, slot) in lock(&self.slots).pending.drain() {
            slot.handle.abort();
        }
    }
}
