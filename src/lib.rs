//! # idle_pool
//!
//! Generic, in-process resource pool that reuses released resources, caps
//! how many stay idle, and evicts each idle resource once it has sat unused
//! for longer than a configured time-to-live.
//!
//! ## Features
//!
//! - `acquire` never blocks on capacity: idle resource or a fresh one from the factory
//! - FIFO reuse, oldest released resource first
//! - Per-entry TTL timers on Tokio, cancelled when the entry is reused
//! - Exactly one of reuse or eviction removes each idle entry
//! - Explicit shutdown that stops all timers and hands back idle resources
//! - Metrics with Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use idle_pool::{AcquireContext, Pool, PoolConfiguration};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = PoolConfiguration::new()
//!     .with_max_idle_size(3)
//!     .with_max_idle_time(Duration::from_secs(1));
//! let pool = Pool::from_fn(
//!     |_ctx: AcquireContext| async { Ok::<_, std::io::Error>(String::from("conn")) },
//!     config,
//! )
//! .unwrap();
//!
//! let conn = pool.acquire(&AcquireContext::new()).await.unwrap();
//! pool.release(conn);
//! assert_eq!(pool.num_idle(), 1);
//! # }
//! ```

mod config;
mod context;
mod entry;
mod errors;
mod factory;
mod metrics;
mod pool;
mod queue;

pub use config::PoolConfiguration;
pub use context::AcquireContext;
pub use errors::{PoolError, PoolResult};
pub use factory::{FnFactory, ResourceFactory};
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use metrics::PoolMetrics;
pub use pool::Pool;
pub use queue::IdleQueue;
