//! Pool backed by a hand-written, fallible factory

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use idle_pool::{AcquireContext, Pool, PoolConfiguration, ResourceFactory};

#[derive(Debug)]
struct Connection {
    id: u32,
}

#[derive(Debug)]
enum ConnectError {
    Refused(u32),
    TimedOut,
}

/// Refuses every third connection attempt and gives up when the caller's
/// context runs out.
struct Connector {
    attempts: AtomicU32,
    latency: Duration,
}

#[async_trait]
impl ResourceFactory for Connector {
    type Resource = Connection;
    type Error = ConnectError;

    async fn create(&self, ctx: &AcquireContext) -> Result<Connection, ConnectError> {
        let id = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        ctx.run(tokio::time::sleep(self.latency))
            .await
            .ok_or(ConnectError::TimedOut)?;

        if id % 3 == 0 {
            return Err(ConnectError::Refused(id));
        }
        Ok(Connection { id })
    }
}

#[tokio::main]
async fn main() {
    println!("=== idle_pool - custom factory ===\n");

    let connector = Connector {
        attempts: AtomicU32::new(0),
        latency: Duration::from_millis(20),
    };
    let config = PoolConfiguration::new()
        .with_max_idle_size(2)
        .with_max_idle_time(Duration::from_millis(200));
    let pool = Pool::new(connector, config).expect("inside a Tokio runtime");

    let ctx = AcquireContext::new().with_timeout(Duration::from_secs(1));
    for _ in 0..3 {
        match pool.acquire(&ctx).await {
            Ok(conn) => {
                println!("   Got connection {}", conn.id);
                pool.release(conn);
            }
            Err(err) => println!("   Factory error: {err:?}"),
        }
    }

    // Hold the idle connection so the next acquire has to go to the factory.
    let held = match pool.acquire(&AcquireContext::new()).await {
        Ok(conn) => {
            println!("   Holding connection {}", conn.id);
            Some(conn)
        }
        Err(err) => {
            println!("   Factory error: {err:?}");
            None
        }
    };

    let impatient = AcquireContext::new().with_timeout(Duration::from_millis(1));
    match pool.acquire(&impatient).await {
        Ok(conn) => println!("   Got connection {}", conn.id),
        Err(err) => println!("   Impatient acquire failed: {err:?}"),
    }

    if let Some(conn) = held {
        pool.release(conn);
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    println!("\n   Idle after TTL: {}", pool.num_idle());

    for (key, value) in pool.export_metrics() {
        println!("     {key}: {value}");
    }
}
