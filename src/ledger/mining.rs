//! Context mining: recurring free-text feedback patterns → candidate rules.
//!
//! Reviewers often reject for the same unstated reason ("wrong entity, this
//! is the hotel operator not the owner"). When the same pattern shows up
//! across enough events and matches no existing rule, a `CandidateRule` is
//! proposed for the operator — never silently enacted.

use std::collections::BTreeSet;

use log::info;

use crate::db::{AuditDb, DbFeedbackEvent};
use crate::error::EngineError;
use crate::helpers::{fingerprint, name_tokens};

/// Events sharing a pattern before it counts as recurring.
const MIN_SUPPORT: usize = 3;
/// Token overlap for two contexts to land in the same cluster.
const MIN_CLUSTER_SIMILARITY: f64 = 0.5;
/// Above this overlap with an existing rule description, the pattern is
/// already covered.
const MAX_RULE_SIMILARITY: f64 = 0.3;

struct Cluster {
    /// Tokens common to every member.
    shared: BTreeSet<String>,
    event_ids: Vec<String>,
    sample_context: String,
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

fn token_set(text: &str) -> BTreeSet<String> {
    name_tokens(text).into_iter().collect()
}

/// Greedy single-pass clustering over context token sets. Order is the log
/// order, so the result is deterministic.
fn cluster_events(events: &[DbFeedbackEvent]) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();
    for event in events {
        let Some(context) = event.context.as_deref() else { continue };
        let tokens = token_set(context);
        if tokens.is_empty() {
            continue;
        }

        let home = clusters
            .iter_mut()
            .find(|c| jaccard(&c.shared, &tokens) >= MIN_CLUSTER_SIMILARITY);
        match home {
            Some(cluster) => {
                cluster.shared = cluster.shared.intersection(&tokens).cloned().collect();
                cluster.event_ids.push(event.id.clone());
            }
            None => clusters.push(Cluster {
                shared: tokens,
                event_ids: vec![event.id.clone()],
                sample_context: context.to_string(),
            }),
        }
    }
    // Intersections can collapse to nothing; those clusters carry no pattern.
    clusters.retain(|c| !c.shared.is_empty());
    clusters
}

/// Scan the full feedback log for novel recurring context patterns and
/// record each as a `CandidateRule`. Returns how many candidates were
/// written or refreshed.
pub fn mine_candidate_rules(db: &AuditDb) -> Result<usize, EngineError> {
    let events = db.get_feedback_events_with_context()?;
    let rules = db.get_all_rules()?;
    let rule_tokens: Vec<BTreeSet<String>> = rules
        .iter()
        .map(|r| token_set(&format!("{} {}", r.label, r.description)))
        .collect();

    let mut proposed = 0;
    for cluster in cluster_events(&events) {
        if cluster.event_ids.len() < MIN_SUPPORT {
            continue;
        }
        let covered = rule_tokens
            .iter()
            .any(|desc| jaccard(&cluster.shared, desc) > MAX_RULE_SIMILARITY);
        if covered {
            continue;
        }

        let pattern: Vec<String> = cluster.shared.iter().cloned().collect();
        let suggested_name = format!("context.{}", pattern.join("-"));
        let print = fingerprint(
            &pattern.iter().map(String::as_str).collect::<Vec<_>>(),
        );
        db.upsert_candidate_rule(
            &print,
            &suggested_name,
            &format!(
                "Recurring feedback pattern \"{}\" across {} decisions, e.g. \"{}\"",
                pattern.join(" "),
                cluster.event_ids.len(),
                cluster.sample_context
            ),
            cluster.event_ids.len() as i64,
            &cluster.event_ids,
        )?;
        info!(
            "candidate rule {} proposed from {} feedback events",
            suggested_name,
            cluster.event_ids.len()
        );
        proposed += 1;
    }
    Ok(proposed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
