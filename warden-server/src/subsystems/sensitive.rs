//! Sensitive data mapping — pure classification of trace content.
//!
//! Walks query parameters, headers, and JSON body leaves of a trace and
//! matches each value against the tenant's data-class definitions. A class
//! matches when its value pattern matches the observed value, or its key
//! pattern matches the field name. Produces both the candidate data fields
//! for persistence and the location → classes map stored with the trace.
//!
//! Always run on pre-redaction content: what was detected is recorded even
//! when the stored copy of the trace is subsequently stripped.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;
use warden_core::models::{
    location_key, normalize_path, ApiTrace, DataClass, DataField, DataSection,
};

#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Fields not yet known for the endpoint (or known fields with newly
    /// detected classes), ready for persistence.
    pub new_fields: Vec<DataField>,
    /// Location key → detected classes, for locations with at least one match.
    pub data_map: BTreeMap<String, BTreeSet<String>>,
}

struct CompiledClass<'a> {
    class: &'a DataClass,
    value_pattern: Regex,
    key_pattern: Option<Regex>,
}

fn compile(classes: &[DataClass]) -> Vec<CompiledClass<'_>> {
    classes
        .iter()
        .filter_map(|class| {
            let value_pattern = match Regex::new(&class.pattern) {
                Ok(re) => re,
                Err(e) => {
                    tracing::warn!("Skipping data class '{}': bad pattern: {}", class.name, e);
                    return None;
                }
            };
            let key_pattern = class.key_pattern.as_deref().and_then(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!("Ignoring key pattern of '{}': {}", class.name, e);
                    None
                }
            });
            Some(CompiledClass {
                class,
                value_pattern,
                key_pattern,
            })
        })
        .collect()
}

/// Scan one trace. Pure with respect to its inputs; no shared state.
pub fn scan_trace(
    trace: &ApiTrace,
    classes: &[DataClass],
    known: &[DataField],
    endpoint_id: Uuid,
) -> ScanOutcome {
    let compiled = compile(classes);
    let mut hits: BTreeMap<(DataSection, String), (String, BTreeSet<String>)> = BTreeMap::new();

    // Path segments are keyed by 1-based position.
    for (i, segment) in normalize_path(&trace.request.url.path).split('/').enumerate() {
        if segment.is_empty() {
            continue;
        }
        record(
            &compiled,
            DataSection::ReqPath,
            &(i + 1).to_string(),
            segment,
            "string",
            &mut hits,
        );
    }
    for p in &trace.request.url.parameters {
        record(&compiled, DataSection::ReqQuery, &p.name, &p.value, "string", &mut hits);
    }
    for h in &trace.request.headers {
        record(&compiled, DataSection::ReqHeader, &h.name, &h.value, "string", &mut hits);
    }
    for h in &trace.response.headers {
        record(&compiled, DataSection::ResHeader, &h.name, &h.value, "string", &mut hits);
    }
    walk_body(&compiled, DataSection::ReqBody, &trace.request.body, String::new(), &mut hits);
    walk_body(&compiled, DataSection::ResBody, &trace.response.body, String::new(), &mut hits);

    let known_classes: BTreeMap<(DataSection, &str), &BTreeSet<String>> = known
        .iter()
        .map(|f| ((f.data_section, f.data_path.as_str()), &f.data_classes))
        .collect();

    let mut outcome = ScanOutcome::default();
    for ((section, path), (data_type, matched)) in hits {
        if !matched.is_empty() {
            outcome
                .data_map
                .insert(location_key(section, &path), matched.clone());
        }
        // Positional path fields are only worth tracking when classified.
        if section == DataSection::ReqPath && matched.is_empty() {
            continue;
        }
        let already_known = known_classes
            .get(&(section, path.as_str()))
            .map(|existing| matched.is_subset(existing))
            .unwrap_or(false);
        if already_known {
            continue;
        }
        let entity = match section {
            DataSection::ReqBody | DataSection::ResBody => path
                .split('.')
                .next()
                .filter(|s| !s.is_empty())
                .map(|s| s.trim_end_matches("[]").to_string()),
            _ => None,
        };
        outcome.new_fields.push(DataField {
            endpoint_id,
            data_section: section,
            data_path: path,
            data_type,
            data_classes: matched,
            entity,
        });
    }
    outcome
}

fn record(
    compiled: &[CompiledClass<'_>],
    section: DataSection,
    name: &str,
    value: &str,
    data_type: &str,
    hits: &mut BTreeMap<(DataSection, String), (String, BTreeSet<String>)>,
) {
    let entry = hits
        .entry((section, name.to_string()))
        .or_insert_with(|| (data_type.to_string(), BTreeSet::new()));
    for c in compiled {
        let key_match = c.key_pattern.as_ref().is_some_and(|re| re.is_match(name));
        if key_match || c.value_pattern.is_match(value) {
            entry.1.insert(c.class.name.clone());
        }
    }
}

/// Walk JSON body leaves with dotted paths; array elements share an `[]`
/// element path. String bodies are parsed as JSON when possible; an
/// unparseable body is classified as a single opaque leaf.
fn walk_body(
    compiled: &[CompiledClass<'_>],
    section: DataSection,
    body: &serde_json::Value,
    path: String,
    hits: &mut BTreeMap<(DataSection, String), (String, BTreeSet<String>)>,
) {
    use serde_json::Value;
    match body {
        Value::Null => {}
        Value::Object(map) => {
            for (key, value) in map {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                walk_body(compiled, section, value, child, hits);
            }
        }
        Value::Array(items) => {
            let child = format!("{path}[]");
            for value in items {
                walk_body(compiled, section, value, child.clone(), hits);
            }
        }
        Value::String(s) => {
            if path.is_empty() {
                if let Ok(parsed) = serde_json::from_str::<Value>(s) {
                    if parsed.is_object() || parsed.is_array() {
                        walk_body(compiled, section, &parsed, path, hits);
                        return;
                    }
                }
            }
            record(compiled, section, &path, s, "string", hits);
        }
        Value::Number(n) => record(compiled, section, &path, &n.to_string(), "number", hits),
        Value::Bool(b) => record(compiled, section, &path, &b.to_string(), "boolean", hits),
    }
}
