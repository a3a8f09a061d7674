//! Creation context handed to resource factories

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation and deadline a caller threads through [`Pool::acquire`](crate::Pool::acquire)
/// into the factory.
///
/// The pool never enforces the context itself; it is only passed along on an
/// idle miss so the factory can bound its own work.
///
/// # Examples
///
/// ```
/// use idle_pool::AcquireContext;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ctx = AcquireContext::new().with_timeout(Duration::from_secs(5));
/// assert!(!ctx.is_done());
///
/// ctx.cancel();
/// assert!(ctx.is_done());
/// assert_eq!(ctx.run(async { 1 }).await, None);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AcquireContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for AcquireContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AcquireContext {
    /// A context with no deadline that is never cancelled unless asked to
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Tie the context to an existing cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Expire the context `timeout` from now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Expire the context at `deadline`, keeping an earlier deadline if one is set
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the context was cancelled or its deadline has passed
    pub fn is_done(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once the context is cancelled or expires
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.cancel.cancelled() => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.cancel.cancelled().await,
        }
    }

    /// Drive `fut` until it completes or the context is done.
    ///
    /// Returns `None` when the context finished first.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        if self.is_done() {
            return None;
        }
        tokio::select! {
            output = fut => Some(output),
            () = self.done() => None,
        }
    }
}
