//! Spec-diff collaborator surface.
//!
//! The OpenAPI diff algorithm itself lives outside this core; the pipeline
//! only needs a boundary to hand the trace to, along with whether the stored
//! copy will be redacted.

use crate::models::{Alert, ApiTrace, Endpoint};
use async_trait::async_trait;

#[async_trait]
pub trait SpecDiffer: Send + Sync {
    /// Diff the trace against any registered spec for the endpoint and
    /// return spec-violation/change alerts. `use_redacted` tells the differ
    /// which copy of the content it is operating on.
    async fn diff(
        &self,
        trace: &ApiTrace,
        endpoint: &Endpoint,
        use_redacted: bool,
    ) -> anyhow::Result<Vec<Alert>>;
}

/// Used when no spec has been registered: every trace diffs clean.
pub struct NoopSpecDiffer;

#[async_trait]
impl SpecDiffer for NoopSpecDiffer {
    async fn diff(
        &self,
        _trace: &ApiTrace,
        _endpoint: &Endpoint,
        _use_redacted: bool,
    ) -> anyhow::Result<Vec<Alert>> {
        Ok(Vec::new())
    }
}
