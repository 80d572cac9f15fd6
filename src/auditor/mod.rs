//! Integrity audit: run every check against one project and persist the
//! findings under the idempotence rules.
//!
//! Re-running against unchanged data updates open rows in place and never
//! duplicates; a check that stops firing takes its stale open rows with it.

pub mod checks;

use chrono::NaiveDate;
use log::{debug, info};

use crate::config::EngineConfig;
use crate::db::AuditDb;
use crate::error::EngineError;
use crate::model::SuggestionKind;
use checks::{ProjectSnapshot, CHECKS};

/// What one audit pass did for one project.
#[derive(Debug, Clone, Default)]
pub struct AuditOutcome {
    /// Ids of open or newly inserted suggestion rows, one per fired check.
    pub suggestion_ids: Vec<String>,
    /// Of those, how many were created straight into `auto_applied`.
    pub auto_applied: usize,
    /// Stale open rows removed because their check no longer fires.
    pub pruned: usize,
}

/// Audit one project: load the snapshot, run the check registry, persist.
pub fn audit_project(
    db: &AuditDb,
    config: &EngineConfig,
    project_id: &str,
    today: NaiveDate,
) -> Result<AuditOutcome, EngineError> {
    let project = db
        .get_project(project_id)?
        .ok_or_else(|| EngineError::not_found("project", project_id))?;
    let snapshot = ProjectSnapshot::load(db, project)?;

    let mut outcome = AuditOutcome::default();
    let mut fired_kinds: Vec<SuggestionKind> = Vec::new();

    for entry in CHECKS {
        let Some(finding) = (entry.run)(&snapshot, config, today) else {
            continue;
        };
        fired_kinds.push(finding.kind);

        let auto = finding.confidence >= config.auto_apply_threshold
            && db.rule_allows_auto_apply(&finding.kind.rule_id())?;
        if let Some(id) = db.upsert_suggestion(&finding, auto)? {
            // Auto-apply only happens at insert; an updated open row keeps
            // its pending/snoozed status.
            let applied = auto
                && db
                    .get_suggestion(&id)?
                    .map(|row| row.status == "auto_applied")
                    .unwrap_or(false);
            if applied {
                info!(
                    "auto-applied {} on {} ({:.2})",
                    finding.kind.as_str(),
                    project_id,
                    finding.confidence
                );
                outcome.auto_applied += 1;
            }
            outcome.suggestion_ids.push(id);
        }
    }

    outcome.pruned = db.prune_open_suggestions(project_id, &fired_kinds)?;
    debug!(
        "audit {}: {} finding(s), {} pruned",
        project_id,
        outcome.suggestion_ids.len(),
        outcome.pruned
    );
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
