//! Persistence collaborator surface.
//!
//! The durable store and its query layer are external to the analysis core;
//! this module defines the trait boundary the subsystems write through, plus
//! the Postgres adapter. Transactional writes (endpoint activity, data
//! fields, alerts) go through a `StoreTxn` unit of work that the caller
//! begins, commits, or rolls back — never the pipeline itself.

use crate::models::{template_matches, Alert, DataField, DataSection, Endpoint};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Snapshot of the endpoint fields the pipeline may update. Compared against
/// the pre-analysis snapshot to skip no-op writes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndpointActivity {
    pub risk_score: f64,
    pub first_detected: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl From<&Endpoint> for EndpointActivity {
    fn from(endpoint: &Endpoint) -> Self {
        Self {
            risk_score: endpoint.risk_score,
            first_detected: endpoint.first_detected,
            last_active: endpoint.last_active,
        }
    }
}

#[async_trait]
pub trait WardenStore: Send + Sync {
    /// Endpoint for (host, method, path), created on first observation.
    /// Returns the endpoint and whether it was created by this call.
    async fn resolve_endpoint(
        &self,
        host: &str,
        method: &str,
        path: &str,
    ) -> anyhow::Result<(Endpoint, bool)>;

    /// All data fields previously recorded for an endpoint.
    async fn known_fields(&self, endpoint_id: Uuid) -> anyhow::Result<Vec<DataField>>;

    /// Endpoints eligible for path inference (not user-set, not GraphQL).
    async fn inference_candidates(&self) -> anyhow::Result<Vec<Endpoint>>;

    /// Record candidate path templates for an endpoint, `discovered = true`,
    /// non-destructively (the original template is kept).
    async fn register_discovered_paths(
        &self,
        endpoint: &Endpoint,
        paths: &[String],
    ) -> anyhow::Result<()>;

    /// Begin a unit of work for one trace's persistence writes.
    async fn begin(&self) -> anyhow::Result<Box<dyn StoreTxn>>;
}

/// Transactional writes for a single trace. Committing or rolling back
/// consumes the unit of work.
#[async_trait]
pub trait StoreTxn: Send {
    async fn update_endpoint_activity(
        &mut self,
        endpoint_id: Uuid,
        activity: &EndpointActivity,
    ) -> anyhow::Result<()>;

    async fn upsert_data_fields(&mut self, fields: &[DataField]) -> anyhow::Result<()>;

    /// Bulk insert with duplicate-key tolerance: a conflicting natural key is
    /// silently ignored. Returns the number of rows actually inserted.
    async fn insert_alerts(&mut self, alerts: &[Alert]) -> anyhow::Result<usize>;

    async fn commit(self: Box<Self>) -> anyhow::Result<()>;
    async fn rollback(self: Box<Self>) -> anyhow::Result<()>;
}

// ============================================================================
// Postgres adapter
// ============================================================================

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ENDPOINT_COLUMNS: &str = "id, host, method, path, risk_score, first_detected, \
     last_active, user_set, is_graphql, full_trace_capture_enabled";

#[async_trait]
impl WardenStore for PgStore {
    async fn resolve_endpoint(
        &self,
        host: &str,
        method: &str,
        path: &str,
    ) -> anyhow::Result<(Endpoint, bool)> {
        if let Some(exact) = sqlx::query_as::<_, Endpoint>(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM endpoints \
             WHERE host = $1 AND method = $2 AND path = $3"
        ))
        .bind(host)
        .bind(method)
        .bind(path)
        .fetch_optional(&self.pool)
        .await?
        {
            return Ok((exact, false));
        }

        // The observed concrete path may be an instance of an existing
        // endpoint's template; those endpoints own the traffic.
        let templates = sqlx::query_as::<_, Endpoint>(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM endpoints \
             WHERE host = $1 AND method = $2 ORDER BY first_detected"
        ))
        .bind(host)
        .bind(method)
        .fetch_all(&self.pool)
        .await?;
        if let Some(owner) = templates.iter().find(|e| e.matches_path(path)) {
            return Ok((owner.clone(), false));
        }

        // Templates discovered by inference but not yet promoted to an
        // endpoint row of their own also capture matching traffic.
        let discovered = sqlx::query(
            "SELECT endpoint_id, path FROM endpoint_paths \
             WHERE host = $1 AND method = $2 ORDER BY path",
        )
        .bind(host)
        .bind(method)
        .fetch_all(&self.pool)
        .await?;
        for row in discovered {
            let template: String = row.try_get("path")?;
            if template_matches(&template, path) {
                let owner_id: Uuid = row.try_get("endpoint_id")?;
                let owner = sqlx::query_as::<_, Endpoint>(&format!(
                    "SELECT {ENDPOINT_COLUMNS} FROM endpoints WHERE id = $1"
                ))
                .bind(owner_id)
                .fetch_one(&self.pool)
                .await?;
                return Ok((owner, false));
            }
        }

        let now = Utc::now();
        let inserted = sqlx::query_as::<_, Endpoint>(&format!(
            "INSERT INTO endpoints \
             (id, host, method, path, risk_score, first_detected, last_active, \
              user_set, is_graphql, full_trace_capture_enabled) \
             VALUES ($1, $2, $3, $4, 0, $5, $5, false, false, false) \
             ON CONFLICT (host, method, path) DO NOTHING \
             RETURNING {ENDPOINT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(host)
        .bind(method)
        .bind(path)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(endpoint) = inserted {
            return Ok((endpoint, true));
        }

        // Lost an insert race; the exact row exists now.
        let existing = sqlx::query_as::<_, Endpoint>(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM endpoints \
             WHERE host = $1 AND method = $2 AND path = $3"
        ))
        .bind(host)
        .bind(method)
        .bind(path)
        .fetch_one(&self.pool)
        .await?;
        Ok((existing, false))
    }

    async fn known_fields(&self, endpoint_id: Uuid) -> anyhow::Result<Vec<DataField>> {
        let rows = sqlx::query(
            "SELECT endpoint_id, data_section, data_path, data_type, data_classes, entity \
             FROM data_fields WHERE endpoint_id = $1",
        )
        .bind(endpoint_id)
        .fetch_all(&self.pool)
        .await?;

        let mut fields = Vec::with_capacity(rows.len());
        for row in rows {
            let section: String = row.try_get("data_section")?;
            let Some(data_section) = DataSection::parse(&section) else {
                tracing::warn!("Unknown data section '{}' for endpoint {}", section, endpoint_id);
                continue;
            };
            let classes: serde_json::Value = row.try_get("data_classes")?;
            let data_classes: BTreeSet<String> = serde_json::from_value(classes)?;
            fields.push(DataField {
                endpoint_id: row.try_get("endpoint_id")?,
                data_section,
                data_path: row.try_get("data_path")?,
                data_type: row.try_get("data_type")?,
                data_classes,
                entity: row.try_get("entity")?,
            });
        }
        Ok(fields)
    }

    async fn inference_candidates(&self) -> anyhow::Result<Vec<Endpoint>> {
        let endpoints = sqlx::query_as::<_, Endpoint>(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM endpoints \
             WHERE user_set = false AND is_graphql = false"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(endpoints)
    }

    async fn register_discovered_paths(
        &self,
        endpoint: &Endpoint,
        paths: &[String],
    ) -> anyhow::Result<()> {
        for path in paths {
            sqlx::query(
                "INSERT INTO endpoint_paths (endpoint_id, host, method, path, discovered) \
                 VALUES ($1, $2, $3, $4, true) \
                 ON CONFLICT (endpoint_id, path) DO NOTHING",
            )
            .bind(endpoint.id)
            .bind(&endpoint.host)
            .bind(&endpoint.method)
            .bind(path)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn begin(&self) -> anyhow::Result<Box<dyn StoreTxn>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTxn { tx }))
    }
}

pub struct PgTxn {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTxn for PgTxn {
    async fn update_endpoint_activity(
        &mut self,
        endpoint_id: Uuid,
        activity: &EndpointActivity,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE endpoints SET risk_score = $2, first_detected = $3, last_active = $4 \
             WHERE id = $1",
        )
        .bind(endpoint_id)
        .bind(activity.risk_score)
        .bind(activity.first_detected)
        .bind(activity.last_active)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn upsert_data_fields(&mut self, fields: &[DataField]) -> anyhow::Result<()> {
        for field in fields {
            // Class sets accumulate: the upsert unions old and new classes.
            sqlx::query(
                "INSERT INTO data_fields \
                 (endpoint_id, data_section, data_path, data_type, data_classes, entity) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (endpoint_id, data_section, data_path) DO UPDATE SET \
                   data_type = EXCLUDED.data_type, \
                   data_classes = ( \
                     SELECT COALESCE(jsonb_agg(DISTINCT c), '[]'::jsonb) \
                     FROM jsonb_array_elements(data_fields.data_classes || EXCLUDED.data_classes) c \
                   )",
            )
            .bind(field.endpoint_id)
            .bind(field.data_section.as_str())
            .bind(&field.data_path)
            .bind(&field.data_type)
            .bind(serde_json::to_value(&field.data_classes)?)
            .bind(&field.entity)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn insert_alerts(&mut self, alerts: &[Alert]) -> anyhow::Result<usize> {
        let mut inserted = 0;
        for alert in alerts {
            let result = sqlx::query(
                "INSERT INTO alerts \
                 (id, kind, endpoint_id, description, context, created_at, dedup_key) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (dedup_key) DO NOTHING",
            )
            .bind(alert.id)
            .bind(alert.kind.as_str())
            .bind(alert.endpoint_id)
            .bind(&alert.description)
            .bind(&alert.context)
            .bind(alert.created_at)
            .bind(&alert.dedup_key)
            .execute(&mut *self.tx)
            .await?;
            inserted += result.rows_affected() as usize;
        }
        Ok(inserted)
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
