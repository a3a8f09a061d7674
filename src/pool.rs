//! Pool front door: acquire, release and idle accounting

use crate::config::PoolConfiguration;
use crate::context::AcquireContext;
use crate::errors::{PoolError, PoolResult};
use crate::factory::{FnFactory, ResourceFactory};
#[cfg(feature = "metrics")]
use crate::metrics::MetricsExporter;
use crate::metrics::{MetricsTracker, PoolMetrics};
use crate::queue::IdleQueue;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use tokio::runtime::Handle;
use tracing::{debug, trace};

/// Resource pool that reuses released resources and expires idle ones
///
/// `acquire` never waits for capacity: it returns the oldest idle resource
/// or asks the factory for a new one. `release` keeps the resource idle for
/// at most `max_idle_time`, as long as fewer than `max_idle_size` are idle.
///
/// # Examples
///
/// ```
/// use idle_pool::{AcquireContext, Pool, PoolConfiguration};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let config = PoolConfiguration::new()
///     .with_max_idle_size(2)
///     .with_max_idle_time(Duration::from_secs(30));
/// let pool = Pool::from_fn(
///     |_ctx: AcquireContext| async { Ok::<_, std::io::Error>(Vec::<u8>::new()) },
///     config,
/// )
/// .unwrap();
///
/// let mut buf = pool.acquire(&AcquireContext::new()).await.unwrap();
/// buf.push(1);
/// pool.release(buf);
/// assert_eq!(pool.num_idle(), 1);
///
/// let buf = pool.acquire(&AcquireContext::new()).await.unwrap();
/// assert_eq!(buf, vec![1]);
/// # }
/// ```
pub struct Pool<F: ResourceFactory> {
    factory: F,
    idle: IdleQueue<F::Resource>,
    config: PoolConfiguration,
    metrics: MetricsTracker,
}

impl<F: ResourceFactory> Pool<F> {
    /// Create a pool whose eviction timers run on the current Tokio runtime.
    ///
    /// The runtime needs its time driver (`enable_time` or `enable_all`);
    /// without it `release` panics instead of keeping an entry that never expires.
    pub fn new(factory: F, config: PoolConfiguration) -> PoolResult<Self> {
        let runtime = Handle::try_current().map_err(|_| PoolError::NoRuntime)?;
        Ok(Self::with_handle(factory, config, runtime))
    }

    /// Create a pool whose eviction timers run on `runtime`.
    ///
    /// Same time driver requirement as [`Pool::new`].
    pub fn with_handle(factory: F, config: PoolConfiguration, runtime: Handle) -> Self {
        Self {
            idle: IdleQueue::with_handle(config.max_idle_time, runtime),
            factory,
            config,
            metrics: MetricsTracker::new(),
        }
    }

    /// Get an idle resource, or create one if none is idle.
    ///
    /// `ctx` is only used on an idle miss, where it is passed to the factory.
    /// Factory errors are returned unchanged and never retried.
    pub async fn acquire(&self, ctx: &AcquireContext) -> Result<F::Resource, F::Error> {
        if let Ok(resource) = self.idle.pop() {
            MetricsTracker::record(&self.metrics.idle_hits);
            trace!("acquired idle resource");
            return Ok(resource);
        }

        debug!("no idle resource, invoking factory");
        match self.factory.create(ctx).await {
            Ok(resource) => {
                MetricsTracker::record(&self.metrics.factory_creations);
                Ok(resource)
            }
            Err(err) => {
                MetricsTracker::record(&self.metrics.factory_failures);
                debug!("factory failed to create resource");
                Err(err)
            }
        }
    }

    /// Return a resource to the pool.
    ///
    /// The resource is dropped when the pool is at capacity, shut down, or
    /// configured with a zero idle time.
    pub fn release(&self, resource: F::Resource) {
        MetricsTracker::record(&self.metrics.total_released);

        if !self.config.retains_idle() {
            MetricsTracker::record(&self.metrics.released_discarded);
            trace!("pool keeps no idle resources, dropping release");
            return;
        }

        if let Err(resource) = self.idle.try_push_back(resource, self.config.max_idle_size) {
            MetricsTracker::record(&self.metrics.released_discarded);
            debug!(
                max_idle_size = self.config.max_idle_size,
                "idle queue full or closed, dropping released resource"
            );
            drop(resource);
        }
    }

    /// Number of idle resources right now
    pub fn num_idle(&self) -> usize {
        self.idle.len()
    }

    pub fn config(&self) -> &PoolConfiguration {
        &self.config
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Stop all eviction timers and hand back every idle resource.
    ///
    /// Later releases are dropped and every acquire goes to the factory.
    pub fn shutdown(&self) -> Vec<F::Resource> {
        let drained = self.idle.shutdown();
        self.metrics.drained.fetch_add(drained.len(), Ordering::Relaxed);
        debug!(drained = drained.len(), "pool shut down");
        drained
    }

    pub fn is_shut_down(&self) -> bool {
        self.idle.is_closed()
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        self.metrics.get_metrics(
            self.idle.evicted_count(),
            self.idle.len(),
            self.config.max_idle_size,
        )
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }
}

impl<Func> Pool<FnFactory<Func>>
where
    FnFactory<Func>: ResourceFactory,
{
    /// Create a pool around an async closure
    pub fn from_fn<Fut>(create: Func, config: PoolConfiguration) -> PoolResult<Self>
    where
        Func: Fn(AcquireContext) -> Fut,
    {
        Self::new(FnFactory::new(create), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting_pool(
        max_idle_size: usize,
        max_idle_time: Duration,
    ) -> (
        Pool<impl ResourceFactory<Resource = usize, Error = Infallible>>,
        Arc<AtomicUsize>,
    ) {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let config = PoolConfiguration::new()
            .with_max_idle_size(max_idle_size)
            .with_max_idle_time(max_idle_time);

        let pool = Pool::from_fn(
            move |_ctx: AcquireContext| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, Infallible>(n) }
            },
            config,
        )
        .unwrap();

        (pool, created)
    }

    #[tokio::test]
    async fn test_basic_pool_function() {
        let (pool, created) = counting_pool(2, Duration::from_secs(1));
        let ctx = AcquireContext::new();

        let item1 = pool.acquire(&ctx).await.unwrap();
        let item2 = pool.acquire(&ctx).await.unwrap();
        assert_eq!((item1, item2), (0, 1));

        pool.release(item1);
        pool.release(item2);
        assert_eq!(pool.num_idle(), 2);

        assert_eq!(pool.acquire(&ctx).await.unwrap(), item1);
        assert_eq!(pool.num_idle(), 1);
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_release_beyond_capacity_is_dropped() {
        let (pool, _) = counting_pool(40, Duration::from_secs(1));
        let ctx = AcquireContext::new();

        let mut items = Vec::new();
        for _ in 0..50 {
            items.push(pool.acquire(&ctx).await.unwrap());
        }
        for item in items {
            pool.release(item);
        }

        assert_eq!(pool.num_idle(), 40);
        assert_eq!(pool.get_metrics().released_discarded, 10);
    }

    #[tokio::test]
    async fn test_released_items_come_back_in_order() {
        let (pool, _) = counting_pool(5, Duration::from_secs(60));
        let ctx = AcquireContext::new();

        for value in [10, 20, 30, 40, 50] {
            pool.release(value);
        }
        for expected in [10, 20, 30, 40, 50] {
            assert_eq!(pool.acquire(&ctx).await.unwrap(), expected);
        }
        assert_eq!(pool.get_metrics().idle_hits, 5);
    }

    #[tokio::test]
    async fn test_factory_error_passes_through() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let pool = Pool::from_fn(
            move |_ctx: AcquireContext| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<u8, _>(std::io::Error::other("refused")) }
            },
            PoolConfiguration::default(),
        )
        .unwrap();

        let err = pool.acquire(&AcquireContext::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "refused");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(pool.get_metrics().factory_failures, 1);
    }

    #[tokio::test]
    async fn test_zero_idle_time_keeps_nothing() {
        let (pool, _) = counting_pool(3, Duration::ZERO);
        pool.release(1);
        assert_eq!(pool.num_idle(), 0);

        let (pool, _) = counting_pool(0, Duration::from_secs(1));
        pool.release(1);
        assert_eq!(pool.num_idle(), 0);
        assert_eq!(pool.get_metrics().released_discarded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_resource_is_evicted() {
        let (pool, created) = counting_pool(3, Duration::from_secs(1));
        pool.release(7);
        assert_eq!(pool.num_idle(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(pool.num_idle(), 0);
        assert_eq!(pool.get_metrics().evicted, 1);

        assert_eq!(pool.acquire(&AcquireContext::new()).await.unwrap(), 0);
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_returns_idle_and_stops_retaining() {
        let (pool, _) = counting_pool(3, Duration::from_secs(60));
        pool.release(1);
        pool.release(2);

        assert_eq!(pool.shutdown(), vec![1, 2]);
        assert!(pool.is_shut_down());

        pool.release(3);
        assert_eq!(pool.num_idle(), 0);
        assert_eq!(pool.acquire(&AcquireContext::new()).await.unwrap(), 0);

        let metrics = pool.get_metrics();
        assert_eq!(metrics.drained, 2);
        assert_eq!(metrics.released_discarded, 1);
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let result = Pool::from_fn(
            |_ctx: AcquireContext| async { Ok::<_, Infallible>(0) },
            PoolConfiguration::default(),
        );
        assert!(matches!(result, Err(PoolError::NoRuntime)));
    }

    #[test]
    fn test_with_handle_outside_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let pool = Pool::with_handle(
            FnFactory::new(|_ctx: AcquireContext| async { Ok::<_, Infallible>(1) }),
            PoolConfiguration::default(),
            runtime.handle().clone(),
        );

        pool.release(5);
        assert_eq!(pool.num_idle(), 1);
        assert_eq!(runtime.block_on(pool.acquire(&AcquireContext::new())), Ok(5));
    }

    #[test]
    #[should_panic(expected = "timers are disabled")]
    fn test_release_on_runtime_without_timers_panics() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let config = PoolConfiguration::new()
            .with_max_idle_size(3)
            .with_max_idle_time(Duration::from_millis(5));
        let pool = runtime.block_on(async {
            Pool::from_fn(
                |_ctx: AcquireContext| async { Ok::<_, Infallible>(0) },
                config,
            )
            .unwrap()
        });

        pool.release(1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_release_is_accounted_once() {
        let (pool, _) = counting_pool(16, Duration::from_millis(2));
        let pool = Arc::new(pool);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            tasks.push(tokio::spawn(async move {
                let ctx = AcquireContext::new();
                for i in 0..300 {
                    let item = pool.acquire(&ctx).await.unwrap();
                    if i % 7 == 0 {
                        tokio::time::sleep(Duration::from_millis(1)).await;
                    }
                    pool.release(item);
                    assert!(pool.num_idle() <= 16);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        let metrics = pool.get_metrics();
        assert_eq!(metrics.idle_objects, 0);
        assert_eq!(
            metrics.total_released - metrics.released_discarded,
            metrics.idle_hits + metrics.evicted + metrics.drained + metrics.idle_objects
        );
    }
}
