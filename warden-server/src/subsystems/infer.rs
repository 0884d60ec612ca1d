//! Path template inference — recursive constant discovery over sampled paths.
//!
//! Given an endpoint's current template and a bounded sample of concrete
//! paths, propose templates that better explain the sample. Constant tokens
//! in the template are frozen and never re-derived; only parameter positions
//! are re-examined. A literal value observed at a parameter position is
//! promoted to a constant branch iff:
//!
//!   count > 0.3 × subset_size
//!   OR (count > 500 AND count > 0.1 × subset_size)
//!
//! AND the value matches `^[A-Za-z\-_\.]+$` (digit-free, so numeric IDs and
//! UUIDs never qualify). The non-qualifying remainder stays a parameter and
//! recurses further, so `/users/create` and `/users/{param1}` can survive as
//! sibling branches. Freezing constants prevents ping-pong between runs.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use warden_core::models::{normalize_path, tokenize_template, Endpoint, PathToken};
use warden_core::{BoundedSampleStore, WardenStore};

/// Ratio of the subset a value must exceed to become a constant branch.
const PROMOTE_RATIO: f64 = 0.3;
/// High-volume fallback: absolute count floor with a lower ratio bar.
const PROMOTE_ABSOLUTE_COUNT: usize = 500;
const PROMOTE_ABSOLUTE_RATIO: f64 = 0.1;

fn literal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z\-_\.]+$").expect("static pattern"))
}

fn qualifies(count: usize, subset_size: usize, value: &str) -> bool {
    let ratio_ok = count as f64 > PROMOTE_RATIO * subset_size as f64;
    let absolute_ok = count > PROMOTE_ABSOLUTE_COUNT
        && count as f64 > PROMOTE_ABSOLUTE_RATIO * subset_size as f64;
    (ratio_ok || absolute_ok) && literal_pattern().is_match(value)
}

/// Candidate templates for `template` over `samples`. Pure function: an
/// unchanged sample and template always yield an identical candidate set.
/// Returns empty below `min_samples` (insufficient evidence, not an error).
/// Candidates equal to the current template are included here; the
/// registration wrapper filters them.
pub fn generate_candidates(template: &str, samples: &[String], min_samples: usize) -> Vec<String> {
    let tokens = tokenize_template(template);
    // Only equal-length paths participate in a run.
    let rows: Vec<Vec<String>> = samples
        .iter()
        .map(|s| {
            normalize_path(s)
                .split('/')
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|r| r.len() == tokens.len())
        .collect();
    if rows.len() < min_samples {
        return Vec::new();
    }
    let subset: Vec<&[String]> = rows.iter().map(|r| r.as_slice()).collect();
    branch(&tokens, &subset, 0, 0, min_samples)
}

/// One recursion step: decide position `pos` over `subset`, then descend.
/// `params_used` numbers the placeholders emitted along this branch.
fn branch(
    tokens: &[PathToken],
    subset: &[&[String]],
    pos: usize,
    params_used: usize,
    min_samples: usize,
) -> Vec<String> {
    if subset.is_empty() {
        // Dead branch: contributes nothing.
        return Vec::new();
    }
    if pos == tokens.len() {
        // Success: a single path is assembled on the way back up.
        return vec![String::new()];
    }
    match &tokens[pos] {
        PathToken::Constant(value) => prefix(
            value,
            branch(tokens, subset, pos + 1, params_used, min_samples),
        ),
        PathToken::Param(_) => {
            if subset.len() >= min_samples {
                let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
                for row in subset {
                    *counts.entry(row[pos].as_str()).or_default() += 1;
                }
                let promoted: Vec<&str> = counts
                    .iter()
                    .filter(|(value, count)| qualifies(**count, subset.len(), value))
                    .map(|(value, _)| *value)
                    .collect();
                if !promoted.is_empty() {
                    let mut out = Vec::new();
                    for value in &promoted {
                        let narrowed: Vec<&[String]> = subset
                            .iter()
                            .filter(|row| row[pos] == *value)
                            .copied()
                            .collect();
                        out.extend(prefix(
                            value,
                            branch(tokens, &narrowed, pos + 1, params_used, min_samples),
                        ));
                    }
                    // Everything that matched no promoted literal remains a
                    // parameter and keeps being mined deeper in the path.
                    let remainder: Vec<&[String]> = subset
                        .iter()
                        .filter(|row| !promoted.contains(&row[pos].as_str()))
                        .copied()
                        .collect();
                    let placeholder = format!("{{param{}}}", params_used + 1);
                    out.extend(prefix(
                        &placeholder,
                        branch(tokens, &remainder, pos + 1, params_used + 1, min_samples),
                    ));
                    return out;
                }
            }
            let placeholder = format!("{{param{}}}", params_used + 1);
            prefix(
                &placeholder,
                branch(tokens, subset, pos + 1, params_used + 1, min_samples),
            )
        }
    }
}

fn prefix(head: &str, tails: Vec<String>) -> Vec<String> {
    tails
        .into_iter()
        .map(|tail| {
            if tail.is_empty() {
                head.to_string()
            } else {
                format!("{head}/{tail}")
            }
        })
        .collect()
}

/// Run inference for one endpoint against its current path sample and
/// register any new templates. Returns `None` when the sample is below the
/// evidence threshold, otherwise the number of templates registered.
pub async fn run_endpoint_inference(
    endpoint: &Endpoint,
    store: &dyn WardenStore,
    samples: &BoundedSampleStore,
    min_samples: usize,
) -> anyhow::Result<Option<usize>> {
    let sample = samples.range_read(&endpoint.paths_key(), 0, -1);
    if sample.len() < min_samples {
        tracing::debug!(
            "Endpoint {} skipped: {} sampled paths < {} required",
            endpoint.id,
            sample.len(),
            min_samples
        );
        return Ok(None);
    }

    let current = normalize_path(&endpoint.path).to_string();
    let mut candidates = generate_candidates(&endpoint.path, &sample, min_samples);
    candidates.sort();
    candidates.dedup();
    candidates.retain(|c| normalize_path(c) != current);
    if candidates.is_empty() {
        return Ok(Some(0));
    }

    store.register_discovered_paths(endpoint, &candidates).await?;
    tracing::info!(
        "Endpoint {} ({} {}{}): registered {} discovered path template(s)",
        endpoint.id,
        endpoint.method,
        endpoint.host,
        endpoint.path,
        candidates.len()
    );
    Ok(Some(candidates.len()))
}
