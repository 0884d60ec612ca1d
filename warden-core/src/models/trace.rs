use serde::{Deserialize, Serialize};

/// A single name/value pair as observed on the wire (query parameter or header).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceUrl {
    pub host: String,
    pub path: String,
    #[serde(default)]
    pub parameters: Vec<NamedValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRequest {
    pub method: String,
    pub url: TraceUrl,
    #[serde(default)]
    pub headers: Vec<NamedValue>,
    #[serde(default)]
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<NamedValue>,
    #[serde(default)]
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceMeta {
    pub environment: String,
    pub incoming: bool,
    pub source: String,
    pub source_port: u16,
    pub destination: String,
    pub destination_port: u16,
}

/// One observed request/response exchange. Ephemeral: traces only exist
/// while flowing through the analysis pipeline and the bounded sample store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiTrace {
    pub request: TraceRequest,
    pub response: TraceResponse,
    pub meta: TraceMeta,
    #[serde(default)]
    pub redacted: bool,
}
