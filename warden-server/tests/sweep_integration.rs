mod common;

use common::MockStore;
use std::sync::Arc;
use std::time::Duration;
use warden_core::models::Endpoint;
use warden_core::{
    AnalysisSettings, BoundedSampleStore, SettingsCache, StaticSettingsSource,
};
use warden_server::subsystems::sweep::run_inference_sweep;

fn settings_cache(min_analyze_traces: usize) -> SettingsCache {
    SettingsCache::new(
        Arc::new(StaticSettingsSource::with_settings(AnalysisSettings {
            min_analyze_traces,
            ..AnalysisSettings::default()
        })),
        Duration::from_secs(60),
    )
}

/// Push `create` paths plus unique suffixes so "create" clears the 0.3 ratio.
fn seed_paths(samples: &BoundedSampleStore, endpoint: &Endpoint, total: usize) {
    let mut paths = Vec::with_capacity(total);
    for i in 0..total {
        if i % 2 == 0 {
            paths.push("users/create".to_string());
        } else {
            paths.push(format!("users/u{i}"));
        }
    }
    samples.push_with_cap(&endpoint.paths_key(), paths, total, Duration::from_secs(600));
}

#[tokio::test]
async fn sweep_registers_discovered_templates() {
    let store = MockStore::new();
    let endpoint = common::new_endpoint("api.example.com", "GET", "users/{param1}");
    store.add_endpoint(endpoint.clone());
    let samples = BoundedSampleStore::new();
    seed_paths(&samples, &endpoint, 50);

    let report = run_inference_sweep(&store, &samples, &settings_cache(10), "default")
        .await
        .unwrap();
    assert!(report.ok());
    assert_eq!(report.scanned, 1);
    assert_eq!(report.updated, 1);

    let state = store.state.lock().unwrap();
    assert_eq!(state.registered.len(), 1);
    let (id, paths) = &state.registered[0];
    assert_eq!(*id, endpoint.id);
    // The current template never re-registers; only the new branch does.
    assert_eq!(paths, &vec!["users/create".to_string()]);
}

#[tokio::test]
async fn one_failing_endpoint_does_not_abort_the_sweep() {
    let store = MockStore::new();
    let healthy = common::new_endpoint("api.example.com", "GET", "users/{param1}");
    let broken = common::new_endpoint("api.example.com", "POST", "users/{param1}");
    store.add_endpoint(healthy.clone());
    store.add_endpoint(broken.clone());
    store.fail_register(broken.id);

    let samples = BoundedSampleStore::new();
    seed_paths(&samples, &healthy, 50);
    seed_paths(&samples, &broken, 50);

    let report = run_inference_sweep(&store, &samples, &settings_cache(10), "default")
        .await
        .unwrap();
    assert!(!report.ok());
    assert_eq!(report.scanned, 2);
    assert_eq!(report.failures, 1);
    assert_eq!(report.updated, 1);

    let state = store.state.lock().unwrap();
    assert_eq!(state.registered.len(), 1);
    assert_eq!(state.registered[0].0, healthy.id);
}

#[tokio::test]
async fn below_threshold_endpoints_are_skipped() {
    let store = MockStore::new();
    let endpoint = common::new_endpoint("api.example.com", "GET", "users/{param1}");
    store.add_endpoint(endpoint.clone());
    let samples = BoundedSampleStore::new();
    seed_paths(&samples, &endpoint, 8);

    let report = run_inference_sweep(&store, &samples, &settings_cache(10), "default")
        .await
        .unwrap();
    assert!(report.ok());
    assert_eq!(report.skipped, 1);
    assert_eq!(report.updated, 0);
    assert!(store.state.lock().unwrap().registered.is_empty());
}

#[tokio::test]
async fn user_set_and_graphql_endpoints_are_never_examined() {
    let store = MockStore::new();
    let mut confirmed = common::new_endpoint("api.example.com", "GET", "users/{param1}");
    confirmed.user_set = true;
    let mut graphql = common::new_endpoint("api.example.com", "POST", "graphql");
    graphql.is_graphql = true;
    store.add_endpoint(confirmed.clone());
    store.add_endpoint(graphql.clone());

    let samples = BoundedSampleStore::new();
    seed_paths(&samples, &confirmed, 50);
    seed_paths(&samples, &graphql, 50);

    let report = run_inference_sweep(&store, &samples, &settings_cache(10), "default")
        .await
        .unwrap();
    assert_eq!(report.scanned, 0);
    assert!(store.state.lock().unwrap().registered.is_empty());
}

#[tokio::test]
async fn endpoint_with_no_new_evidence_registers_nothing() {
    let store = MockStore::new();
    let endpoint = common::new_endpoint("api.example.com", "GET", "users/{param1}");
    store.add_endpoint(endpoint.clone());
    let samples = BoundedSampleStore::new();
    // All-numeric identifiers: nothing can be promoted to a constant.
    let paths: Vec<String> = (0..50).map(|i| format!("users/{i}")).collect();
    samples.push_with_cap(&endpoint.paths_key(), paths, 50, Duration::from_secs(600));

    let report = run_inference_sweep(&store, &samples, &settings_cache(10), "default")
        .await
        .unwrap();
    assert!(report.ok());
    assert_eq!(report.scanned, 1);
    assert_eq!(report.updated, 0);
    assert!(store.state.lock().unwrap().registered.is_empty());
}
