//! FIFO queue of idle resources with per-entry TTL eviction
//!
//! Every linked entry owns a timer task that sleeps for the queue's TTL and
//! then tries to evict it. [`IdleQueue::pop`] and the timer race for the
//! entry through an atomic claim: whichever side claims first removes the
//! entry, the other leaves it alone. All linking and unlinking happens under
//! one structural lock, never across the TTL sleep.

use crate::entry::{Chain, EntryKey, EntryState};
use crate::errors::{PoolError, PoolResult};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{Instant, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

struct Idle<T> {
    chain: Chain<T>,
    closed: bool,
}

struct Shared<T> {
    idle: Mutex<Idle<T>>,
    max_idle_time: Duration,
    shutdown: CancellationToken,
    evicted: AtomicUsize,
}

impl<T> Shared<T> {
    /// Remove an entry whose timer fired and won the claim.
    fn evict(&self, key: EntryKey) -> bool {
        let mut idle = self.idle.lock();
        // Gone already if the queue was drained while the timer waited on the lock.
        let Some(index) = idle.chain.resolve(key) else {
            return false;
        };
        let entry = idle.chain.unlink(index);
        let remaining = idle.chain.len();
        drop(idle);

        if entry.is_none() {
            return false;
        }
        self.evicted.fetch_add(1, Ordering::Relaxed);
        trace!(remaining, "evicted expired idle entry");
        true
    }
}

/// Timer side of the removal race, run once the TTL has elapsed.
///
/// Returns whether the entry was evicted. A pop that claimed first owns the
/// entry even if its cancellation lost the race with the sleep.
fn expire<T>(shared: &Weak<Shared<T>>, key: EntryKey, state: &EntryState) -> bool {
    if !state.try_claim() {
        return false;
    }
    match shared.upgrade() {
        Some(shared) => shared.evict(key),
        None => false,
    }
}

/// Thread-safe idle queue whose entries expire after `max_idle_time`
///
/// # Examples
///
/// ```
/// use idle_pool::IdleQueue;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let queue = IdleQueue::new(Duration::from_secs(60)).unwrap();
/// queue.push_back("a");
/// queue.push_back("b");
///
/// assert_eq!(queue.len(), 2);
/// assert_eq!(queue.pop(), Ok("a"));
/// # }
/// ```
pub struct IdleQueue<T> {
    shared: Arc<Shared<T>>,
    runtime: Handle,
}

impl<T: Send + 'static> IdleQueue<T> {
    /// Create a queue that schedules eviction on the current Tokio runtime.
    ///
    /// The runtime must have its time driver enabled (`enable_time` or
    /// `enable_all`); pushing onto a queue without one panics.
    pub fn new(max_idle_time: Duration) -> PoolResult<Self> {
        let runtime = Handle::try_current().map_err(|_| PoolError::NoRuntime)?;
        Ok(Self::with_handle(max_idle_time, runtime))
    }

    /// Create a queue that schedules eviction on the given runtime.
    ///
    /// Same time driver requirement as [`IdleQueue::new`].
    pub fn with_handle(max_idle_time: Duration, runtime: Handle) -> Self {
        Self {
            shared: Arc::new(Shared {
                idle: Mutex::new(Idle {
                    chain: Chain::new(),
                    closed: false,
                }),
                max_idle_time,
                shutdown: CancellationToken::new(),
                evicted: AtomicUsize::new(0),
            }),
            runtime,
        }
    }

    /// Append a value with a fresh TTL. Dropped if the queue was shut down.
    pub fn push_back(&self, value: T) {
        let _ = self.try_push_back(value, usize::MAX);
    }

    /// Append a value only while fewer than `limit` entries are idle.
    ///
    /// The length check and the link happen under the same lock, so
    /// concurrent callers can never push the queue past `limit`. The value
    /// is handed back if it was not accepted.
    ///
    /// # Panics
    ///
    /// Panics if the queue's runtime was built without a time driver.
    pub fn try_push_back(&self, value: T, limit: usize) -> Result<(), T> {
        let deadline = Instant::now() + self.shared.max_idle_time;
        // Built here so a runtime without timers fails at the caller, not in a detached task.
        let ttl = {
            let _runtime = self.runtime.enter();
            tokio::time::sleep_until(deadline)
        };
        let state = Arc::new(EntryState::new(self.shared.shutdown.child_token()));

        let key = {
            let mut idle = self.shared.idle.lock();
            if idle.closed || idle.chain.len() >= limit {
                return Err(value);
            }
            idle.chain.push_back(value, Arc::clone(&state))
        };

        trace!(?deadline, "linked idle entry");
        self.schedule_eviction(key, state, ttl);
        Ok(())
    }

    /// Remove and return the oldest idle value.
    ///
    /// Entries whose timer has already claimed them are skipped; they are
    /// unlinked by their own eviction task. Popping an empty queue is
    /// reported as [`PoolError::EmptyQueue`].
    pub fn pop(&self) -> PoolResult<T> {
        let mut idle = self.shared.idle.lock();

        let mut cursor = idle.chain.head();
        while let Some(index) = cursor {
            cursor = idle.chain.next_of(index);

            let won = match idle.chain.get(index) {
                Some(entry) => entry.state.try_claim(),
                None => false,
            };
            if !won {
                continue;
            }

            if let Some(entry) = idle.chain.unlink(index) {
                entry.state.cancel_eviction();
                trace!(remaining = idle.chain.len(), "popped idle entry");
                return Ok(entry.value);
            }
        }

        Err(PoolError::EmptyQueue)
    }

    /// Number of linked entries
    pub fn len(&self) -> usize {
        self.shared.idle.lock().chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_idle_time(&self) -> Duration {
        self.shared.max_idle_time
    }

    /// Entries removed by their own timer so far
    pub fn evicted_count(&self) -> usize {
        self.shared.evicted.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.idle.lock().closed
    }

    /// Stop every eviction task and hand back all idle values, oldest first.
    ///
    /// Later pushes are discarded. Calling this again returns nothing.
    pub fn shutdown(&self) -> Vec<T> {
        let drained = {
            let mut idle = self.shared.idle.lock();
            idle.closed = true;
            idle.chain.drain()
        };
        self.shared.shutdown.cancel();

        let values: Vec<T> = drained
            .into_iter()
            .map(|entry| {
                entry.state.try_claim();
                entry.value
            })
            .collect();

        if !values.is_empty() {
            debug!(drained = values.len(), "idle queue shut down");
        }
        values
    }

    fn schedule_eviction(&self, key: EntryKey, state: Arc<EntryState>, ttl: Sleep) {
        let shared: Weak<Shared<T>> = Arc::downgrade(&self.shared);

        self.runtime.spawn(async move {
            tokio::select! {
                () = ttl => {}
                () = state.cancellation().cancelled() => return,
            }
            expire(&shared, key, &state);
        });
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        self.shared.idle.lock().chain.assert_consistent();
    }

    /// Key and removal state of the current head entry.
    #[cfg(test)]
    fn head_entry(&self) -> Option<(EntryKey, Arc<EntryState>)> {
        let idle = self.shared.idle.lock();
        let index = idle.chain.head()?;
        let key = idle.chain.key_of(index)?;
        let state = Arc::clone(&idle.chain.get(index)?.state);
        Some((key, state))
    }
}

impl<T> Drop for IdleQueue<T> {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}
