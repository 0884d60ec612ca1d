use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Endpoint risk contribution of a detected class of this severity.
    pub fn risk_score(&self) -> f64 {
        match self {
            Severity::Low => 10.0,
            Severity::Medium => 30.0,
            Severity::High => 60.0,
            Severity::Critical => 90.0,
        }
    }
}

/// A sensitive-data class definition: a value pattern, an optional field-name
/// pattern, and a severity used for endpoint risk scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataClass {
    pub name: String,
    pub pattern: String,
    pub key_pattern: Option<String>,
    pub severity: Severity,
}

impl DataClass {
    /// Built-in class definitions served by the static settings source.
    /// Tenant-specific definitions come from the configuration collaborator.
    pub fn defaults() -> Vec<DataClass> {
        vec![
            DataClass {
                name: "EMAIL".to_string(),
                pattern: r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}".to_string(),
                key_pattern: Some(r"(?i)\bemail\b".to_string()),
                severity: Severity::Medium,
            },
            DataClass {
                name: "PHONE_NUMBER".to_string(),
                pattern: r"\+?\d{1,2}[ \-.]?\(?\d{3}\)?[ \-.]?\d{3}[ \-.]?\d{4}\b".to_string(),
                key_pattern: Some(r"(?i)\bphone\b".to_string()),
                severity: Severity::Medium,
            },
            DataClass {
                name: "SSN".to_string(),
                pattern: r"\b\d{3}-\d{2}-\d{4}\b".to_string(),
                key_pattern: Some(r"(?i)\bssn\b".to_string()),
                severity: Severity::Critical,
            },
            DataClass {
                name: "CREDIT_CARD".to_string(),
                pattern: r"\b\d{4}[ \-]?\d{4}[ \-]?\d{4}[ \-]?\d{4}\b".to_string(),
                key_pattern: None,
                severity: Severity::Critical,
            },
            DataClass {
                name: "IP_ADDRESS".to_string(),
                pattern: r"\b(?:\d{1,3}\.){3}\d{1,3}\b".to_string(),
                key_pattern: None,
                severity: Severity::Low,
            },
        ]
    }
}
