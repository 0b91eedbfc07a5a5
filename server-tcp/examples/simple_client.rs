//! Starts several "workers" that all ask for the same expensive value
//! through a running `server-tcp` instance. The first worker raises the
//! updating flag and the later ones wait for its result instead of
//! computing. Workers that start at the exact same moment can still race
//! past the flag, so the demo staggers them slightly.
//!
//! Run the server first: `cargo run -p server-tcp`

use dogpile::{CacheCoordinator, CacheKey};
use server_tcp::RemoteKvStore;
use shared::config::Config;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(Config::from_env());
    let addr = config.bind_addr();
    let computed = Arc::new(AtomicUsize::new(0));
    let key = CacheKey::new("demo", "expensive-report");

    println!("Connecting workers to {}", addr);

    let mut handles = Vec::new();
    for worker in 0..5 {
        // One connection per worker, as if each ran in its own process
        let store = RemoteKvStore::connect(&addr).await?;
        let coordinator = CacheCoordinator::builder(Arc::new(store), config.clone())
            .poll_interval(config.poll_interval)
            .build();
        let computed = computed.clone();
        let key = key.clone();

        handles.push(tokio::spawn(async move {
            if worker > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            let started = Instant::now();
            let result = coordinator
                .proxy(
                    &key,
                    move || async move {
                        computed.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        format!("report built by worker {}", worker)
                    },
                    None,
                    Duration::from_secs(5),
                )
                .await;
            (worker, started.elapsed(), result)
        }));
    }

    for handle in handles {
        let (worker, elapsed, result) = handle.await?;
        match result {
            Ok(item) => println!(
                "worker {} got {:?} after {:?} (valid: {}, timeout: {})",
                worker, item.data, elapsed, item.is_valid, item.is_timeout
            ),
            Err(e) => println!("worker {} failed: {}", worker, e),
        }
    }

    println!("Value computed {} time(s)", computed.load(Ordering::SeqCst));
    Ok(())
}
