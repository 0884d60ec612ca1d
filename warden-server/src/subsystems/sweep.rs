//! Periodic inference sweep.
//!
//! Iterates every endpoint eligible for path inference and mines its sampled
//! paths for new templates. One endpoint's failure is isolated: logged,
//! counted, and the sweep moves on. The sweep runs on its own schedule,
//! independent of trace ingestion, and tolerates concurrent sample appends —
//! a slightly stale snapshot self-corrects on the next cycle.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use warden_core::config::InferenceConfig;
use warden_core::{BoundedSampleStore, SettingsCache, WardenStore};

use crate::subsystems::infer;

/// Report from one sweep cycle.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub scanned: usize,
    pub skipped: usize,
    pub updated: usize,
    pub failures: usize,
    pub elapsed_ms: u64,
}

impl SweepReport {
    /// The sweep succeeded only if no endpoint raised an error.
    pub fn ok(&self) -> bool {
        self.failures == 0
    }
}

/// Run one sweep over all eligible endpoints.
pub async fn run_inference_sweep(
    store: &dyn WardenStore,
    samples: &BoundedSampleStore,
    settings: &SettingsCache,
    tenant: &str,
) -> Result<SweepReport> {
    let start = std::time::Instant::now();
    let mut report = SweepReport::default();

    let settings = settings.fetch(tenant).await?;
    let endpoints = store.inference_candidates().await?;

    for endpoint in endpoints {
        // The store query already filters these; re-check in case a flag
        // flipped between the query and this iteration.
        if endpoint.user_set || endpoint.is_graphql {
            continue;
        }
        report.scanned += 1;
        match infer::run_endpoint_inference(
            &endpoint,
            store,
            samples,
            settings.min_analyze_traces,
        )
        .await
        {
            Ok(None) => report.skipped += 1,
            Ok(Some(0)) => {}
            Ok(Some(_)) => report.updated += 1,
            Err(e) => {
                tracing::error!(
                    "Inference failed for endpoint {} ({} {}{}): {:#}",
                    endpoint.id,
                    endpoint.method,
                    endpoint.host,
                    endpoint.path,
                    e
                );
                report.failures += 1;
            }
        }
    }

    report.elapsed_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        "Inference sweep complete: {} scanned, {} skipped, {} updated, {} failed in {}ms",
        report.scanned,
        report.skipped,
        report.updated,
        report.failures,
        report.elapsed_ms
    );
    Ok(report)
}

/// Background loop driving sweeps on the configured interval.
pub async fn run_inference_loop(
    store: Arc<dyn WardenStore>,
    samples: BoundedSampleStore,
    settings: Arc<SettingsCache>,
    tenant: String,
    config: InferenceConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let interval = tokio::time::Duration::from_secs(config.interval_minutes * 60);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!(
        "Inference loop started (interval: {}min)",
        config.interval_minutes
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match run_inference_sweep(store.as_ref(), &samples, &settings, &tenant).await {
                    Ok(report) if report.ok() => {}
                    Ok(report) => tracing::warn!(
                        "Inference sweep finished with {} endpoint failure(s)",
                        report.failures
                    ),
                    Err(e) => tracing::error!("Inference sweep error: {:#}", e),
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Inference loop shutting down");
                break;
            }
        }
    }
}
