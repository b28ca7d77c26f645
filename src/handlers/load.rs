use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::AppState;

use super::AppError;

// ─── Request / response types ────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct LoadConfig {
    /// Number of concurrent Tokio tasks producing samples
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// How long the generator runs (seconds)
    #[serde(default = "default_duration")]
    pub duration_secs: u64,

    /// Mean of the exponential latency distribution (μs)
    #[serde(default = "default_mean_us")]
    pub mean_us: f64,
}

fn default_concurrency() -> u32 {
    10
}
fn default_duration() -> u64 {
    30
}
fn default_mean_us() -> f64 {
    2_000.0
}

#[derive(Debug, Serialize)]
pub struct LoadStatus {
    pub running: bool,
    pub message: String,
}

impl LoadConfig {
    fn validate(&self) -> Result<(), AppError> {
        if self.concurrency == 0 || self.concurrency > 500 {
            return Err(AppError::BadRequest(
                "concurrency must be between 1 and 500".into(),
            ));
        }
        if self.duration_secs == 0 || self.duration_secs > 300 {
            return Err(AppError::BadRequest(
                "duration_secs must be between 1 and 300".into(),
            ));
        }
        if !(self.mean_us.is_finite() && self.mean_us > 0.0) {
            return Err(AppError::BadRequest(
                "mean_us must be a positive number".into(),
            ));
        }
        Ok(())
    }
}

// ─── POST /api/load/start ────────────────────────────────────────

pub async fn start_load(
    State(state): State<Arc<AppState>>,
    Json(config): Json<LoadConfig>,
) -> Result<Json<LoadStatus>, AppError> {
    // Guard: only one generator at a time
    if state.load_running.load(Ordering::SeqCst) {
        return Err(AppError::AlreadyRunning);
    }
    config.validate()?;

    // Flip the flag BEFORE spawning so workers see it immediately
    state.load_running.store(true, Ordering::SeqCst);

    let msg = format!(
        "Started: {} workers × {}s, mean {}μs",
        config.concurrency, config.duration_secs, config.mean_us,
    );
    tracing::info!(
        concurrency = config.concurrency,
        duration_secs = config.duration_secs,
        mean_us = config.mean_us,
        "load generator started"
    );

    let running = state.load_running.clone();
    let metrics = state.metrics.clone();

    let handle = tokio::spawn(async move {
        crate::load_generator::run(running, metrics, config).await;
    });

    // Stash the handle so `stop` can await clean shutdown
    let mut guard = state.load_handle.lock().await;
    *guard = Some(handle);

    Ok(Json(LoadStatus {
        running: true,
        message: msg,
    }))
}

// ─── POST /api/load/stop ─────────────────────────────────────────

pub async fn stop_load(State(state): State<Arc<AppState>>) -> Json<LoadStatus> {
    if !state.load_running.load(Ordering::SeqCst) {
        return Json(LoadStatus {
            running: false,
            message: "Load generator is not running".into(),
        });
    }

    // Signal all workers to stop
    state.load_running.store(false, Ordering::SeqCst);

    let mut guard = state.load_handle.lock().await;
    if let Some(handle) = guard.take() {
        // The task may already have finished on its own
        let _ = handle.await;
    }
    tracing::info!("load generator stopped");

    Json(LoadStatus {
        running: false,
        message: "Load generator stopped".into(),
    })
}

// ─── GET /api/load/status ────────────────────────────────────────

pub async fn load_status(State(state): State<Arc<AppState>>) -> Json<LoadStatus> {
    let running = state.load_running.load(Ordering::SeqCst);
    Json(LoadStatus {
        running,
        message: if running {
            "Load generation in progress".into()
        } else {
            "Idle".into()
        },
    })
}
