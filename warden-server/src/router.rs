use crate::subsystems::{analyze, sweep};
use sqlx::PgPool;
use std::sync::Arc;
use warden_core::ipc::{WardenRequest, WardenResponse};
use warden_core::models::ApiTrace;
use warden_core::{
    AlertDispatcher, BoundedSampleStore, SettingsCache, SpecDiffer, WardenConfig, WardenStore,
};

/// Collaborator wiring shared by every connection.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub store: Arc<dyn WardenStore>,
    pub samples: BoundedSampleStore,
    pub settings: Arc<SettingsCache>,
    pub differ: Arc<dyn SpecDiffer>,
    pub dispatcher: Arc<dyn AlertDispatcher>,
    pub config: WardenConfig,
}

pub async fn handle_request(request: WardenRequest, state: &AppState) -> WardenResponse {
    match request {
        WardenRequest::Ping => WardenResponse::pong(),
        WardenRequest::Health => match warden_core::db::health_check(&state.pool).await {
            Ok(version) => WardenResponse::ok(serde_json::json!({
                "postgresql": version,
                "status": "healthy"
            })),
            Err(e) => WardenResponse::err(format!("DB health check failed: {}", e)),
        },
        WardenRequest::Analyze {
            trace,
            skip_data_fields,
        } => match handle_analyze(*trace, skip_data_fields, state).await {
            Ok(report) => WardenResponse::ok(serde_json::json!({
                "endpoint_id": report.endpoint_id,
                "endpoint_created": report.endpoint_created,
                "redacted": report.redacted,
                "new_data_fields": report.new_data_fields,
                "alerts_generated": report.alerts_generated,
                "alerts_inserted": report.alerts_inserted,
            })),
            Err(e) => WardenResponse::err(e.to_string()),
        },
        WardenRequest::Sweep => {
            match sweep::run_inference_sweep(
                state.store.as_ref(),
                &state.samples,
                &state.settings,
                &state.config.service.tenant,
            )
            .await
            {
                Ok(report) => WardenResponse::ok(serde_json::json!({
                    "ok": report.ok(),
                    "scanned": report.scanned,
                    "skipped": report.skipped,
                    "updated": report.updated,
                    "failures": report.failures,
                })),
                Err(e) => WardenResponse::err(e.to_string()),
            }
        }
    }
}

/// One pipeline run inside one unit of work. The transaction covers the
/// persistence writes only; a failure rolls back this trace alone.
async fn handle_analyze(
    trace: ApiTrace,
    skip_data_fields: bool,
    state: &AppState,
) -> anyhow::Result<analyze::AnalysisReport> {
    let opts = analyze::AnalyzeOptions {
        tenant: state.config.service.tenant.clone(),
        skip_data_fields,
    };
    let mut txn = state.store.begin().await?;
    let result = {
        let mut deps = analyze::AnalysisDeps {
            store: state.store.as_ref(),
            txn: txn.as_mut(),
            samples: &state.samples,
            settings: &state.settings,
            differ: state.differ.as_ref(),
            dispatcher: state.dispatcher.clone(),
            analysis: &state.config.analysis,
        };
        analyze::analyze_trace(trace, &opts, &mut deps).await
    };
    match result {
        Ok(report) => {
            txn.commit().await?;
            Ok(report)
        }
        Err(e) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::warn!("Rollback failed after pipeline error: {}", rollback_err);
            }
            Err(e)
        }
    }
}
