//! Trace analysis pipeline.
//!
//! Runs every inbound trace through a fixed stage sequence: normalize,
//! classify sensitive data, decide redaction, diff against any registered
//! spec, raise alerts, update the sample store, and persist endpoint
//! activity / data fields / alerts through the caller's unit of work.
//!
//! Failure semantics: the transactional writes (activity, fields, alerts)
//! surface errors to the caller, who rolls back that trace's unit of work
//! only. Sample-store pushes are disposable derived state and never fail the
//! pipeline. Webhook dispatch runs detached from pipeline completion.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use warden_core::config::AnalysisConfig;
use warden_core::models::{Alert, AlertKind, ApiTrace, DataClass};
use warden_core::store::EndpointActivity;
use warden_core::{
    AlertDispatcher, BoundedSampleStore, SettingsCache, SpecDiffer, StoreTxn, WardenStore,
};

use crate::subsystems::sensitive;

/// Per-call options.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub tenant: String,
    /// Skip data-field extraction (the sensitive-data map is still built).
    pub skip_data_fields: bool,
}

/// Collaborators for one pipeline run. `txn` is the caller's unit of work
/// for this trace; the caller commits or rolls it back.
pub struct AnalysisDeps<'a> {
    pub store: &'a dyn WardenStore,
    pub txn: &'a mut dyn StoreTxn,
    pub samples: &'a BoundedSampleStore,
    pub settings: &'a SettingsCache,
    pub differ: &'a dyn SpecDiffer,
    pub dispatcher: Arc<dyn AlertDispatcher>,
    pub analysis: &'a AnalysisConfig,
}

/// Report from one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    pub endpoint_id: Uuid,
    pub endpoint_created: bool,
    pub redacted: bool,
    pub new_data_fields: usize,
    pub alerts_generated: usize,
    pub alerts_inserted: usize,
    pub elapsed_ms: u64,
}

/// The trace as retained in the sample store: possibly redacted content plus
/// the sensitive-data map computed before redaction.
#[derive(Serialize)]
struct StoredTrace<'a> {
    trace: &'a ApiTrace,
    sensitive_data: &'a BTreeMap<String, BTreeSet<String>>,
}

pub async fn analyze_trace(
    mut trace: ApiTrace,
    opts: &AnalyzeOptions,
    deps: &mut AnalysisDeps<'_>,
) -> Result<AnalysisReport> {
    let start = std::time::Instant::now();

    // 1. Normalize parameter names and stringify structured bodies.
    normalize_trace(&mut trace);

    // 2. Data-class definitions and capture flags, via the read-through cache.
    let settings = deps.settings.fetch(&opts.tenant).await?;

    // Endpoint identity: created on first observed trace. Not part of the
    // per-trace unit of work.
    let raw_path = trace.request.url.path.clone();
    let (endpoint, created) = deps
        .store
        .resolve_endpoint(&trace.request.url.host, &trace.request.method, &raw_path)
        .await?;
    let snapshot = EndpointActivity::from(&endpoint);

    // 3. Sensitive-data classification against known fields. Runs on
    // pre-redaction content; the location map is kept even when field
    // extraction is skipped (step 7).
    let known = deps.store.known_fields(endpoint.id).await?;
    let outcome = sensitive::scan_trace(&trace, &settings.data_classes, &known, endpoint.id);
    let data_map = outcome.data_map;
    let new_fields = if opts.skip_data_fields {
        Vec::new()
    } else {
        outcome.new_fields
    };

    // 4. Redaction decision.
    let redact =
        !(settings.global_full_trace_capture || endpoint.full_trace_capture_enabled);

    // 5. Spec diff. A differ failure is a transient collaborator failure:
    // logged, yields no spec alerts, does not abort the trace.
    let mut alerts = match deps.differ.diff(&trace, &endpoint, redact).await {
        Ok(spec_alerts) => spec_alerts,
        Err(e) => {
            tracing::warn!("Spec diff failed for endpoint {}: {:#}", endpoint.id, e);
            Vec::new()
        }
    };

    // 6. Sensitivity and new-endpoint alerts.
    if created {
        alerts.push(Alert::new(
            AlertKind::NewEndpoint,
            endpoint.id,
            format!(
                "New endpoint detected: {} {}{}",
                endpoint.method, endpoint.host, endpoint.path
            ),
            serde_json::json!({
                "host": endpoint.host,
                "method": endpoint.method,
                "path": endpoint.path,
            }),
        ));
    }
    for field in new_fields.iter().filter(|f| !f.data_classes.is_empty()) {
        let classes: Vec<&str> = field.data_classes.iter().map(String::as_str).collect();
        alerts.push(Alert::new(
            AlertKind::SensitiveData,
            endpoint.id,
            format!(
                "Sensitive data ({}) detected at {}",
                classes.join(", "),
                field.location()
            ),
            serde_json::json!({
                "section": field.data_section.as_str(),
                "path": field.data_path,
                "classes": field.data_classes,
            }),
        ));
    }

    // 7–8. The map above was computed from pre-redaction content; now strip
    // the stored copy if capture is not enabled.
    if redact {
        redact_trace(&mut trace);
    }

    // 9. Best-effort sample-store pushes; never fatal.
    match serde_json::to_string(&StoredTrace {
        trace: &trace,
        sensitive_data: &data_map,
    }) {
        Ok(encoded) => deps.samples.push_with_cap(
            &endpoint.traces_key(),
            vec![encoded],
            deps.analysis.trace_retention_count,
            Duration::from_secs(deps.analysis.trace_ttl_seconds),
        ),
        Err(e) => tracing::warn!("Failed to encode trace for sample store: {}", e),
    }
    if !endpoint.user_set {
        deps.samples.push_with_cap(
            &endpoint.paths_key(),
            vec![raw_path],
            deps.analysis.path_sample_count,
            Duration::from_secs(deps.analysis.path_sample_ttl_seconds),
        );
    }

    // 10. Endpoint activity, written only when something changed.
    let updated = next_activity(&snapshot, &data_map, &settings.data_classes, Utc::now());
    if updated != snapshot {
        deps.txn.update_endpoint_activity(endpoint.id, &updated).await?;
    }

    // 11. Data fields.
    if !new_fields.is_empty() {
        deps.txn.upsert_data_fields(&new_fields).await?;
    }

    // 12. Alerts, duplicate-key tolerant.
    let alerts_inserted = if alerts.is_empty() {
        0
    } else {
        deps.txn.insert_alerts(&alerts).await?
    };

    // 13. Fire-and-forget webhook dispatch.
    if !alerts.is_empty() {
        let dispatcher = deps.dispatcher.clone();
        let batch = alerts.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatcher.dispatch(&batch).await {
                tracing::warn!("Alert dispatch failed: {}", e);
            }
        });
    }

    let report = AnalysisReport {
        endpoint_id: endpoint.id,
        endpoint_created: created,
        redacted: redact,
        new_data_fields: new_fields.len(),
        alerts_generated: alerts.len(),
        alerts_inserted,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };
    tracing::debug!(
        "Analyzed trace for endpoint {}: {} new field(s), {} alert(s), redacted={} in {}ms",
        report.endpoint_id,
        report.new_data_fields,
        report.alerts_generated,
        report.redacted,
        report.elapsed_ms
    );
    Ok(report)
}

/// Strip any bracketed-array suffix from repeated-key parameter names and
/// serialize structured bodies to their string encoding.
fn normalize_trace(trace: &mut ApiTrace) {
    for p in &mut trace.request.url.parameters {
        p.name = strip_array_suffix(&p.name);
    }
    stringify_body(&mut trace.request.body);
    stringify_body(&mut trace.response.body);
}

fn strip_array_suffix(name: &str) -> String {
    match name.find('[') {
        Some(i) if name.ends_with(']') => name[..i].to_string(),
        _ => name.to_string(),
    }
}

fn stringify_body(body: &mut serde_json::Value) {
    use serde_json::Value;
    // Only structured bodies are serialized; scalars pass through untouched.
    if matches!(body, Value::Object(_) | Value::Array(_)) {
        *body = Value::String(body.to_string());
    }
}

/// Clear parameters, headers, and bodies; keep only the fact of the exchange.
fn redact_trace(trace: &mut ApiTrace) {
    trace.request.url.parameters.clear();
    trace.request.headers.clear();
    trace.response.headers.clear();
    trace.request.body = serde_json::Value::Null;
    trace.response.body = serde_json::Value::Null;
    trace.redacted = true;
}

/// Post-analysis endpoint activity. Risk is monotonic: the maximum of the
/// current score and the severity scores of every class detected this trace.
fn next_activity(
    snapshot: &EndpointActivity,
    data_map: &BTreeMap<String, BTreeSet<String>>,
    classes: &[DataClass],
    now: DateTime<Utc>,
) -> EndpointActivity {
    let scores: HashMap<&str, f64> = classes
        .iter()
        .map(|c| (c.name.as_str(), c.severity.risk_score()))
        .collect();
    let risk_score = data_map
        .values()
        .flatten()
        .filter_map(|name| scores.get(name.as_str()))
        .fold(snapshot.risk_score, |acc, s| acc.max(*s));
    EndpointActivity {
        risk_score,
        first_detected: snapshot.first_detected,
        last_active: now.max(snapshot.last_active),
    }
}
