// idle_pool walk-through
// Shows reuse, the idle cap and TTL eviction on a small pool.
// Run with: RUST_LOG=idle_pool=trace cargo run

use std::time::Duration;

use idle_pool::{AcquireContext, Pool, PoolConfiguration};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Default)]
struct Company {
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "idle_pool=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Step 1: pool with max_idle_size=3, max_idle_time=1s");
    let config = PoolConfiguration::new()
        .with_max_idle_size(3)
        .with_max_idle_time(Duration::from_secs(1));
    let pool = Pool::from_fn(
        |_ctx: AcquireContext| async { Ok::<_, std::io::Error>(Company::default()) },
        config,
    )?;
    let ctx = AcquireContext::new().with_timeout(Duration::from_secs(5));

    info!("Step 2: acquire four companies and name them");
    let mut items = Vec::new();
    for name in ["Dcard", "Otto", "Facebook", "Twitter"] {
        let mut item = pool.acquire(&ctx).await?;
        item.name = name.to_string();
        info!(?item, "acquired");
        items.push(item);
    }

    info!("Step 3: release all four, only three stay idle");
    for item in items {
        pool.release(item);
    }
    info!(idle = pool.num_idle(), "after release");

    info!("Step 4: acquire again, the oldest release comes back first");
    let item = pool.acquire(&ctx).await?;
    info!(?item, idle = pool.num_idle(), "acquired");

    info!("Step 5: wait for the remaining idle companies to expire");
    tokio::time::sleep(Duration::from_secs(2)).await;
    info!(idle = pool.num_idle(), "after waiting");

    let item = pool.acquire(&ctx).await?;
    info!(?item, idle = pool.num_idle(), "acquired fresh");

    let metrics = pool.get_metrics();
    info!(
        hits = metrics.idle_hits,
        created = metrics.factory_creations,
        evicted = metrics.evicted,
        discarded = metrics.released_discarded,
        "done"
    );

    pool.shutdown();
    Ok(())
}
