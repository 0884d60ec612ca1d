//! In-memory collaborators for driving the pipeline and sweep in tests.
#![allow(dead_code)] // each integration harness uses a different subset

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use warden_core::models::{template_matches, Alert, ApiTrace, DataField, DataSection, Endpoint};
use warden_core::store::{EndpointActivity, StoreTxn, WardenStore};
use warden_core::SpecDiffer;

#[derive(Default)]
pub struct MockState {
    pub endpoints: Vec<Endpoint>,
    pub activity_writes: Vec<(Uuid, EndpointActivity)>,
    pub fields: HashMap<(Uuid, DataSection, String), DataField>,
    pub alerts: HashMap<String, Alert>,
    pub registered: Vec<(Uuid, Vec<String>)>,
    pub commits: usize,
    pub rollbacks: usize,
}

/// Mock persistence store. Transactional writes are staged and only applied
/// on commit, mirroring the adapter's unit-of-work semantics.
#[derive(Clone, Default)]
pub struct MockStore {
    pub state: Arc<Mutex<MockState>>,
    fail_register_for: Arc<Mutex<HashSet<Uuid>>>,
    fail_alert_insert: Arc<Mutex<bool>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_endpoint(&self, endpoint: Endpoint) {
        self.state.lock().unwrap().endpoints.push(endpoint);
    }

    pub fn fail_register(&self, endpoint_id: Uuid) {
        self.fail_register_for.lock().unwrap().insert(endpoint_id);
    }

    pub fn fail_alert_insert(&self) {
        *self.fail_alert_insert.lock().unwrap() = true;
    }
}

pub fn new_endpoint(host: &str, method: &str, path: &str) -> Endpoint {
    let now = Utc::now();
    Endpoint {
        id: Uuid::new_v4(),
        host: host.to_string(),
        method: method.to_string(),
        path: path.to_string(),
        risk_score: 0.0,
        first_detected: now,
        last_active: now,
        user_set: false,
        is_graphql: false,
        full_trace_capture_enabled: false,
    }
}

#[async_trait]
impl WardenStore for MockStore {
    async fn resolve_endpoint(
        &self,
        host: &str,
        method: &str,
        path: &str,
    ) -> anyhow::Result<(Endpoint, bool)> {
        let mut state = self.state.lock().unwrap();
        if let Some(endpoint) = state.endpoints.iter().find(|e| {
            e.host == host && e.method == method && (e.path == path || e.matches_path(path))
        }) {
            return Ok((endpoint.clone(), false));
        }
        let discovered_owner = state.registered.iter().find_map(|(id, templates)| {
            templates
                .iter()
                .any(|t| template_matches(t, path))
                .then_some(*id)
        });
        if let Some(id) = discovered_owner {
            if let Some(endpoint) = state
                .endpoints
                .iter()
                .find(|e| e.id == id && e.host == host && e.method == method)
            {
                return Ok((endpoint.clone(), false));
            }
        }
        let endpoint = new_endpoint(host, method, path);
        state.endpoints.push(endpoint.clone());
        Ok((endpoint, true))
    }

    async fn known_fields(&self, endpoint_id: Uuid) -> anyhow::Result<Vec<DataField>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .fields
            .values()
            .filter(|f| f.endpoint_id == endpoint_id)
            .cloned()
            .collect())
    }

    async fn inference_candidates(&self) -> anyhow::Result<Vec<Endpoint>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .endpoints
            .iter()
            .filter(|e| !e.user_set && !e.is_graphql)
            .cloned()
            .collect())
    }

    async fn register_discovered_paths(
        &self,
        endpoint: &Endpoint,
        paths: &[String],
    ) -> anyhow::Result<()> {
        if self.fail_register_for.lock().unwrap().contains(&endpoint.id) {
            anyhow::bail!("simulated store failure");
        }
        self.state
            .lock()
            .unwrap()
            .registered
            .push((endpoint.id, paths.to_vec()));
        Ok(())
    }

    async fn begin(&self) -> anyhow::Result<Box<dyn StoreTxn>> {
        Ok(Box::new(MockTxn {
            state: self.state.clone(),
            fail_alert_insert: *self.fail_alert_insert.lock().unwrap(),
            staged_activity: Vec::new(),
            staged_fields: Vec::new(),
            staged_alerts: Vec::new(),
        }))
    }
}

pub struct MockTxn {
    state: Arc<Mutex<MockState>>,
    fail_alert_insert: bool,
    staged_activity: Vec<(Uuid, EndpointActivity)>,
    staged_fields: Vec<DataField>,
    staged_alerts: Vec<Alert>,
}

#[async_trait]
impl StoreTxn for MockTxn {
    async fn update_endpoint_activity(
        &mut self,
        endpoint_id: Uuid,
        activity: &EndpointActivity,
    ) -> anyhow::Result<()> {
        self.staged_activity.push((endpoint_id, *activity));
        Ok(())
    }

    async fn upsert_data_fields(&mut self, fields: &[DataField]) -> anyhow::Result<()> {
        self.staged_fields.extend_from_slice(fields);
        Ok(())
    }

    async fn insert_alerts(&mut self, alerts: &[Alert]) -> anyhow::Result<usize> {
        if self.fail_alert_insert {
            anyhow::bail!("simulated alert insert failure");
        }
        let state = self.state.lock().unwrap();
        let mut inserted = 0;
        for alert in alerts {
            let pending = self
                .staged_alerts
                .iter()
                .any(|a| a.dedup_key == alert.dedup_key);
            if !state.alerts.contains_key(&alert.dedup_key) && !pending {
                inserted += 1;
            }
            self.staged_alerts.push(alert.clone());
        }
        Ok(inserted)
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        for (endpoint_id, activity) in self.staged_activity {
            if let Some(endpoint) = state.endpoints.iter_mut().find(|e| e.id == endpoint_id) {
                endpoint.risk_score = activity.risk_score;
                endpoint.first_detected = activity.first_detected;
                endpoint.last_active = activity.last_active;
            }
            state.activity_writes.push((endpoint_id, activity));
        }
        for field in self.staged_fields {
            state.fields.insert(
                (field.endpoint_id, field.data_section, field.data_path.clone()),
                field,
            );
        }
        for alert in self.staged_alerts {
            state.alerts.entry(alert.dedup_key.clone()).or_insert(alert);
        }
        state.commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        self.state.lock().unwrap().rollbacks += 1;
        Ok(())
    }
}

/// Spec differ that always fails, for collaborator-failure tests.
pub struct FailingDiffer;

#[async_trait]
impl SpecDiffer for FailingDiffer {
    async fn diff(
        &self,
        _trace: &ApiTrace,
        _endpoint: &Endpoint,
        _use_redacted: bool,
    ) -> anyhow::Result<Vec<Alert>> {
        anyhow::bail!("spec service unavailable")
    }
}
