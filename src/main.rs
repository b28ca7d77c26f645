use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use fast_summary::{Dispatcher, DispatcherConfig};
use tracing_subscriber::EnvFilter;

mod handlers;
mod load_generator;
mod metrics;
mod middleware;
mod server;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Owns the worker thread behind every summary below.
    pub dispatcher: Dispatcher,

    /// Summaries fed by the timing middleware and the load generator.
    pub metrics: Arc<metrics::AppMetrics>,

    /// Flag checked by every load-generator worker on each iteration.
    pub load_running: Arc<AtomicBool>,

    /// Handle to the spawned load-generator task so we can await clean shutdown.
    pub load_handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// Reads `key` from the environment, falling back to `default` when unset
/// or unparsable.
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!();
    println!("╔══════════════════════════════════════════════════╗");
    println!("║   📈  FAST SUMMARY OBSERVATORY                   ║");
    println!("╚══════════════════════════════════════════════════╝");
    println!();

    // ── 1. Start the dispatcher ──────────────────────────────────
    let dispatcher = Dispatcher::start(DispatcherConfig::default())?;

    // ── 2. Register summaries ────────────────────────────────────
    let max_age = Duration::from_secs(env_or("SUMMARY_MAX_AGE_SECS", 60u64));
    let metrics = Arc::new(metrics::AppMetrics::register(&dispatcher, max_age)?);
    tracing::info!(max_age_secs = max_age.as_secs(), "summaries registered");

    // ── 3. Build shared state ────────────────────────────────────
    let state = Arc::new(AppState {
        dispatcher,
        metrics,
        load_running: Arc::new(AtomicBool::new(false)),
        load_handle: tokio::sync::Mutex::new(None),
    });

    // ── 4. Build Axum router ─────────────────────────────────────
    let app = server::create_router(state);

    // ── 5. Bind & serve ──────────────────────────────────────────
    let addr: String = env_or("SUMMARY_ADDR", "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!();
    println!("Server listening on http://{addr}");
    println!("Metrics SSE     → http://{addr}/api/metrics/stream");
    println!("Metrics JSON    → http://{addr}/api/metrics");
    println!("Load generator  → POST http://{addr}/api/load/start");
    println!();

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("server stopped");
    Ok(())
}
