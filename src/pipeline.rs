//! Batch passes: the periodic sweep that keeps the queues current.
//!
//! Every per-item write runs inside its own transaction, and a failure on
//! one item is logged and never stops the pass. Idempotence downstream
//! (resolver and auditor upserts) makes re-running a sweep safe.

use chrono::Utc;
use log::warn;
use serde::Serialize;

use crate::auditor::audit_project;
use crate::config::EngineConfig;
use crate::db::AuditDb;
use crate::error::EngineError;
use crate::ledger::mining::mine_candidate_rules;
use crate::resolver::{resolve_evidence, ResolutionOutcome};

/// What one pass over the data accomplished.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub evidence_processed: usize,
    pub auto_linked: usize,
    pub queued_for_review: usize,
    pub unmatched: usize,
    pub projects_audited: usize,
    pub suggestions_open: usize,
    pub auto_applied: usize,
    pub suggestions_pruned: usize,
    pub woken: usize,
    pub candidate_rules_proposed: usize,
    pub failures: usize,
}

/// Retry resolution for every evidence record without a confirmed link,
/// oldest first, up to `budget` items.
pub fn resolve_unlinked_evidence(
    db: &AuditDb,
    config: &EngineConfig,
    budget: Option<usize>,
) -> Result<PassReport, EngineError> {
    let mut report = PassReport::default();
    let mut rows = db.get_unconfirmed_evidence()?;
    if let Some(budget) = budget {
        rows.truncate(budget);
    }

    for row in rows {
        let outcome = db.with_transaction(|db| resolve_evidence(db, config, &row));
        report.evidence_processed += 1;
        match outcome {
            Ok(ResolutionOutcome::AutoLinked { .. }) => report.auto_linked += 1,
            Ok(ResolutionOutcome::QueuedForReview { .. }) => report.queued_for_review += 1,
            Ok(ResolutionOutcome::NoMatch) => report.unmatched += 1,
            Ok(ResolutionOutcome::AlreadyResolved) => {}
            Err(err) => {
                warn!("resolve failed for evidence {}: {}", row.id, err);
                report.failures += 1;
            }
        }
    }
    Ok(report)
}

/// Audit every project, up to `budget` items.
pub fn audit_all_projects(
    db: &AuditDb,
    config: &EngineConfig,
    budget: Option<usize>,
) -> Result<PassReport, EngineError> {
    let mut report = PassReport::default();
    let today = Utc::now().date_naive();
    let mut projects = db.get_all_projects()?;
    if let Some(budget) = budget {
        projects.truncate(budget);
    }

    for project in projects {
        let id = project.id.clone();
        match db.with_transaction(|db| audit_project(db, config, &id, today)) {
            Ok(outcome) => {
                report.projects_audited += 1;
                report.suggestions_open += outcome.suggestion_ids.len();
                report.auto_applied += outcome.auto_applied;
                report.suggestions_pruned += outcome.pruned;
            }
            Err(err) => {
                warn!("audit failed for project {}: {}", id, err);
                report.failures += 1;
            }
        }
    }
    Ok(report)
}

/// Return snoozed suggestions whose cool-down has elapsed to the queue.
pub fn wake_snoozed_suggestions(db: &AuditDb) -> Result<usize, EngineError> {
    Ok(db.wake_snoozed_suggestions(&Utc::now().to_rfc3339())?)
}

/// The full maintenance pass: wake, resolve, audit, mine.
pub fn run_sweep(
    db: &AuditDb,
    config: &EngineConfig,
    budget: Option<usize>,
) -> Result<PassReport, EngineError> {
    let woken = wake_snoozed_suggestions(db)?;
    let resolve = resolve_unlinked_evidence(db, config, budget)?;
    let audit = audit_all_projects(db, config, budget)?;
    let proposed = mine_candidate_rules(db)?;

    Ok(PassReport {
        evidence_processed: resolve.evidence_processed,
        auto_linked: resolve.auto_linked,
        queued_for_review: resolve.queued_for_review,
        unmatched: resolve.unmatched,
        projects_audited: audit.projects_audited,
        suggestions_open: audit.suggestions_open,
        auto_applied: audit.auto_applied,
        suggestions_pruned: audit.suggestions_pruned,
        woken,
        candidate_rules_proposed: proposed,
        failures: resolve.failures + audit.failures,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
