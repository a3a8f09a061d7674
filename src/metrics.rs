//! Metrics collection and export for resource pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "metrics")]
use crate::errors::{PoolError, PoolResult};
#[cfg(feature = "serde")]
use serde::Serialize;

/// Metrics snapshot for a pool
///
/// `total_released - released_discarded` always equals
/// `idle_hits + evicted + drained + idle_objects` once the pool is quiescent.
///
/// # Examples
///
/// ```
/// use idle_pool::{AcquireContext, Pool, PoolConfiguration};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pool = Pool::from_fn(
///     |_ctx: AcquireContext| async { Ok::<_, std::io::Error>(String::new()) },
///     PoolConfiguration::default(),
/// )
/// .unwrap();
///
/// let item = pool.acquire(&AcquireContext::new()).await.unwrap();
/// pool.release(item);
///
/// let metrics = pool.get_metrics();
/// assert_eq!(metrics.factory_creations, 1);
/// assert_eq!(metrics.idle_objects, 1);
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PoolMetrics {
    /// Acquires served from the idle queue
    pub idle_hits: usize,

    /// Resources successfully created by the factory
    pub factory_creations: usize,

    /// Factory calls that returned an error
    pub factory_failures: usize,

    /// Resources handed to `release`
    pub total_released: usize,

    /// Released resources dropped because the pool was full, closed, or keeps nothing
    pub released_discarded: usize,

    /// Idle entries removed by their TTL
    pub evicted: usize,

    /// Idle entries handed back by `shutdown`
    pub drained: usize,

    /// Current idle entries
    pub idle_objects: usize,

    /// Idle capacity
    pub max_idle_size: usize,

    /// Share of acquires served from the idle queue (0.0 to 1.0)
    pub hit_ratio: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("idle_hits".to_string(), self.idle_hits.to_string());
        metrics.insert("factory_creations".to_string(), self.factory_creations.to_string());
        metrics.insert("factory_failures".to_string(), self.factory_failures.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("released_discarded".to_string(), self.released_discarded.to_string());
        metrics.insert("evicted".to_string(), self.evicted.to_string());
        metrics.insert("drained".to_string(), self.drained.to_string());
        metrics.insert("idle_objects".to_string(), self.idle_objects.to_string());
        metrics.insert("max_idle_size".to_string(), self.max_idle_size.to_string());
        metrics.insert("hit_ratio".to_string(), format!("{:.2}", self.hit_ratio));
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus text exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use idle_pool::{AcquireContext, Pool, PoolConfiguration};
    /// use std::collections::HashMap;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let pool = Pool::from_fn(
    ///     |_ctx: AcquireContext| async { Ok::<_, std::io::Error>(0u32) },
    ///     PoolConfiguration::default(),
    /// )
    /// .unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("my_pool", Some(&tags)).unwrap();
    /// assert!(output.contains("idle_pool_objects_idle"));
    /// assert!(output.contains("service=\"api\""));
    /// # }
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let registry = Registry::new_custom(None, Some(Self::labels(pool_name, tags)))
            .map_err(export_error)?;

        let gauges = [
            ("idle_pool_objects_idle", "Current idle objects", metrics.idle_objects),
            ("idle_pool_objects_max_idle", "Idle capacity", metrics.max_idle_size),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(Opts::new(name, help)).map_err(export_error)?;
            gauge.set(i64::try_from(value).unwrap_or(i64::MAX));
            registry.register(Box::new(gauge)).map_err(export_error)?;
        }

        let counters = [
            (
                "idle_pool_idle_hits_total",
                "Acquires served from idle",
                metrics.idle_hits,
            ),
            (
                "idle_pool_factory_creations_total",
                "Resources created by the factory",
                metrics.factory_creations,
            ),
            (
                "idle_pool_factory_failures_total",
                "Factory errors",
                metrics.factory_failures,
            ),
            (
                "idle_pool_released_total",
                "Resources released",
                metrics.total_released,
            ),
            (
                "idle_pool_released_discarded_total",
                "Released resources discarded",
                metrics.released_discarded,
            ),
            (
                "idle_pool_evicted_total",
                "Idle entries evicted by TTL",
                metrics.evicted,
            ),
            (
                "idle_pool_drained_total",
                "Idle entries drained at shutdown",
                metrics.drained,
            ),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(Opts::new(name, help)).map_err(export_error)?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter)).map_err(export_error)?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(export_error)?;
        String::from_utf8(buffer).map_err(export_error)
    }

    fn labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());

        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.insert(key.clone(), value.clone());
            }
        }

        labels
    }
}

#[cfg(feature = "metrics")]
fn export_error(err: impl std::fmt::Display) -> PoolError {
    PoolError::MetricsExport(err.to_string())
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub idle_hits: AtomicUsize,
    pub factory_creations: AtomicUsize,
    pub factory_failures: AtomicUsize,
    pub total_released: AtomicUsize,
    pub released_discarded: AtomicUsize,
    pub drained: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, evicted: usize, idle: usize, max_idle_size: usize) -> PoolMetrics {
        let idle_hits = self.idle_hits.load(Ordering::Relaxed);
        let factory_creations = self.factory_creations.load(Ordering::Relaxed);
        let factory_failures = self.factory_failures.load(Ordering::Relaxed);

        let acquires = idle_hits + factory_creations + factory_failures;
        let hit_ratio = if acquires > 0 {
            idle_hits as f64 / acquires as f64
        } else {
            0.0
        };

        PoolMetrics {
            idle_hits,
            factory_creations,
            factory_failures,
            total_released: self.total_released.load(Ordering::Relaxed),
            released_discarded: self.released_discarded.load(Ordering::Relaxed),
            evicted,
            drained: self.drained.load(Ordering::Relaxed),
            idle_objects: idle,
            max_idle_size,
            hit_ratio,
        }
    }
}
