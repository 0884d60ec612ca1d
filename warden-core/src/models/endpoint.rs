use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tracked (host, method, path template) identity.
///
/// `user_set` templates are human-confirmed and immutable to inference;
/// `is_graphql` endpoints are excluded from path inference entirely.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Endpoint {
    pub id: Uuid,
    pub host: String,
    pub method: String,
    pub path: String,
    pub risk_score: f64,
    pub first_detected: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub user_set: bool,
    pub is_graphql: bool,
    pub full_trace_capture_enabled: bool,
}

/// One `/`-separated token of a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    Constant(String),
    Param(String),
}

impl Endpoint {
    pub fn template_tokens(&self) -> Vec<PathToken> {
        tokenize_template(&self.path)
    }

    /// Sample-store key for analyzed traces of this endpoint.
    pub fn traces_key(&self) -> String {
        format!("endpoint_traces:{}", self.id)
    }

    /// Sample-store key for raw observed paths of this endpoint.
    pub fn paths_key(&self) -> String {
        format!("endpoint_paths:{}", self.id)
    }

    /// True when `path` is a concrete instance of this endpoint's template.
    pub fn matches_path(&self, path: &str) -> bool {
        tokens_match(&self.template_tokens(), path)
    }
}

/// Strip leading/trailing slashes. Tokenization happens on the normalized form.
pub fn normalize_path(path: &str) -> &str {
    path.trim_matches('/')
}

/// Split a template into tokens, tagging `{paramN}` placeholders.
/// An empty segment is a literal empty constant, not an error.
pub fn tokenize_template(path: &str) -> Vec<PathToken> {
    normalize_path(path)
        .split('/')
        .map(|t| {
            if is_param_token(t) {
                PathToken::Param(t.to_string())
            } else {
                PathToken::Constant(t.to_string())
            }
        })
        .collect()
}

/// True when `path` is a concrete instance of `template`: equal token count,
/// constant tokens equal, `{paramN}` positions matching any segment.
pub fn template_matches(template: &str, path: &str) -> bool {
    tokens_match(&tokenize_template(template), path)
}

fn tokens_match(tokens: &[PathToken], path: &str) -> bool {
    let segments: Vec<&str> = normalize_path(path).split('/').collect();
    if segments.len() != tokens.len() {
        return false;
    }
    tokens.iter().zip(segments).all(|(token, segment)| match token {
        PathToken::Constant(c) => c.as_str() == segment,
        PathToken::Param(_) => true,
    })
}

/// True for tokens of the form `{paramN}` with N a decimal number.
pub fn is_param_token(token: &str) -> bool {
    token
        .strip_prefix("{param")
        .and_then(|t| t.strip_suffix('}'))
        .map(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}
