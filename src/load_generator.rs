use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::handlers::load::LoadConfig;
use crate::metrics::AppMetrics;

// ─── Public entry point ──────────────────────────────────────────

/// Spawns `concurrency` Tokio tasks that feed the synthetic summary until
/// the deadline or the `running` flag is set to false.
pub async fn run(running: Arc<AtomicBool>, metrics: Arc<AppMetrics>, config: LoadConfig) {
    let deadline = Instant::now() + Duration::from_secs(config.duration_secs);
    let mean_us = config.mean_us;

    let mut handles = Vec::with_capacity(config.concurrency as usize);

    for worker_id in 0..config.concurrency {
        let running = running.clone();
        let metrics = metrics.clone();

        handles.push(tokio::spawn(async move {
            worker(worker_id, running, metrics, deadline, mean_us).await;
        }));
    }

    // Wait for all workers to finish
    for h in handles {
        let _ = h.await;
    }

    // Mark the run as finished
    running.store(false, Ordering::SeqCst);
}

// ─── Worker loop ─────────────────────────────────────────────────

async fn worker(
    id: u32,
    running: Arc<AtomicBool>,
    metrics: Arc<AppMetrics>,
    deadline: Instant,
    mean_us: f64,
) {
    // Each worker gets its own deterministic RNG seeded uniquely.
    let mut rng = StdRng::seed_from_u64(1000 + id as u64);

    while running.load(Ordering::Relaxed) && Instant::now() < deadline {
        let latency_us = exponential(&mut rng, mean_us);
        metrics.synthetic.observe(latency_us);

        // Pretend the "request" took that long
        tokio::time::sleep(Duration::from_micros(latency_us as u64)).await;
    }
}

/// Inverse-CDF sample from an exponential distribution with the given mean.
fn exponential(rng: &mut StdRng, mean: f64) -> f64 {
    let u: f64 = rng.gen();
    -mean * (1.0 - u).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_samples_have_the_requested_mean() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 20_000;
        let total: f64 = (0..n).map(|_| exponential(&mut rng, 500.0)).sum();
        let mean = total / n as f64;
        assert!((mean - 500.0).abs() < 25.0, "mean = {mean}");
    }
}
