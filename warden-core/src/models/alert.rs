use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    NewEndpoint,
    SensitiveData,
    SpecDiff,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::NewEndpoint => "new_endpoint",
            AlertKind::SensitiveData => "sensitive_data",
            AlertKind::SpecDiff => "spec_diff",
        }
    }
}

/// An alert raised by the analysis pipeline. Insertion is idempotent under
/// the natural `dedup_key`: a conflicting key is ignored, never overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub kind: AlertKind,
    pub endpoint_id: Uuid,
    pub description: String,
    pub context: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub dedup_key: String,
}

impl Alert {
    pub fn new(
        kind: AlertKind,
        endpoint_id: Uuid,
        description: impl Into<String>,
        context: serde_json::Value,
    ) -> Self {
        // serde_json maps are ordered, so the rendered context is stable
        // across runs and safe to use as a natural key component.
        let dedup_key = format!("{}:{}:{}", kind.as_str(), endpoint_id, context);
        Self {
            id: Uuid::new_v4(),
            kind,
            endpoint_id,
            description: description.into(),
            context,
            created_at: Utc::now(),
            dedup_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_is_stable_across_instances() {
        let endpoint_id = Uuid::new_v4();
        let ctx = serde_json::json!({"b": 2, "a": 1});
        let first = Alert::new(AlertKind::SensitiveData, endpoint_id, "x", ctx.clone());
        let second = Alert::new(AlertKind::SensitiveData, endpoint_id, "x", ctx);
        assert_eq!(first.dedup_key, second.dedup_key);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn dedup_key_distinguishes_kinds() {
        let endpoint_id = Uuid::new_v4();
        let ctx = serde_json::json!({"path": "/users"});
        let a = Alert::new(AlertKind::NewEndpoint, endpoint_id, "x", ctx.clone());
        let b = Alert::new(AlertKind::SpecDiff, endpoint_id, "x", ctx);
        assert_ne!(a.dedup_key, b.dedup_key);
    }
}
