//! Analysis settings — read-through cache over the configuration collaborator.
//!
//! Settings are fetched per explicit tenant identifier with an explicit TTL
//! and invalidation contract; nothing here is a hidden global.

use crate::config::AnalysisConfig;
use crate::models::DataClass;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// The subset of configuration the analysis pipeline and sweep consume.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub min_analyze_traces: usize,
    pub global_full_trace_capture: bool,
    pub data_classes: Vec<DataClass>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            min_analyze_traces: 100,
            global_full_trace_capture: false,
            data_classes: DataClass::defaults(),
        }
    }
}

/// Abstraction over the external configuration store.
#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn fetch(&self, tenant: &str) -> anyhow::Result<AnalysisSettings>;
}

/// Serves fixed settings derived from the local config file. Used when no
/// external configuration service is wired in.
pub struct StaticSettingsSource {
    settings: AnalysisSettings,
}

impl StaticSettingsSource {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            settings: AnalysisSettings {
                min_analyze_traces: config.min_analyze_traces,
                global_full_trace_capture: config.global_full_trace_capture,
                data_classes: DataClass::defaults(),
            },
        }
    }

    pub fn with_settings(settings: AnalysisSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SettingsSource for StaticSettingsSource {
    async fn fetch(&self, _tenant: &str) -> anyhow::Result<AnalysisSettings> {
        Ok(self.settings.clone())
    }
}

/// Read-through cache keyed by tenant.
pub struct SettingsCache {
    source: Arc<dyn SettingsSource>,
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Arc<AnalysisSettings>)>>,
}

impl SettingsCache {
    pub fn new(source: Arc<dyn SettingsSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cached settings for `tenant`, fetching from the source on a miss or
    /// an expired entry.
    pub async fn fetch(&self, tenant: &str) -> anyhow::Result<Arc<AnalysisSettings>> {
        let now = Instant::now();
        {
            let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            if let Some((fetched_at, settings)) = entries.get(tenant) {
                if now.duration_since(*fetched_at) < self.ttl {
                    return Ok(settings.clone());
                }
            }
        }
        let fresh = Arc::new(self.source.fetch(tenant).await?);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(tenant.to_string(), (now, fresh.clone()));
        Ok(fresh)
    }

    /// Drop the cached entry for `tenant`; the next fetch goes to the source.
    pub fn invalidate(&self, tenant: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(tenant);
    }
}
