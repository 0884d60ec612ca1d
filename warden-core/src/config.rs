use crate::error::WardenError;
use config::{Config, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct WardenConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub socket_path: String,
    pub log_level: String,
    #[serde(default = "default_tenant")]
    pub tenant: String,
}

fn default_tenant() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// Minimum sampled paths before inference examines an endpoint.
    pub min_analyze_traces: usize,
    /// When true, traces are retained unredacted for every endpoint.
    pub global_full_trace_capture: bool,
    /// Cap and TTL for the per-endpoint analyzed-trace sample list.
    pub trace_retention_count: usize,
    pub trace_ttl_seconds: u64,
    /// Cap and TTL for the per-endpoint raw-path sample list.
    pub path_sample_count: usize,
    pub path_sample_ttl_seconds: u64,
    /// TTL of the per-tenant settings read-through cache.
    pub settings_ttl_seconds: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_analyze_traces: 100,
            global_full_trace_capture: false,
            trace_retention_count: 100,
            trace_ttl_seconds: 1800,
            path_sample_count: 1000,
            path_sample_ttl_seconds: 3600,
            settings_ttl_seconds: 300,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InferenceConfig {
    pub interval_minutes: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    pub urls: Vec<String>,
    pub timeout_seconds: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            timeout_seconds: 10,
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

impl WardenConfig {
    pub fn load(path: &str) -> Result<Self, WardenError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        Ok(s.try_deserialize()?)
    }
}
