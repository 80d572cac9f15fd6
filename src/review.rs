//! Review surface: the queues a human works through, plus snoozing.
//!
//! Reads join enough context for a reviewer to decide without a second
//! lookup; decisions themselves go through `ledger::decide_link` /
//! `ledger::decide_suggestion`.

use chrono::{Duration, Utc};
use log::info;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::db::{AuditDb, DbEvidence, DbLink, DbProject, DbSuggestion};
use crate::error::EngineError;
use crate::model::SuggestionStatus;

/// One pending link with the context a reviewer needs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLink {
    pub link: DbLink,
    pub evidence: DbEvidence,
    pub project: DbProject,
}

/// One pending suggestion with its project attached (absent only for
/// `unknown_project_code`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSuggestion {
    pub suggestion: DbSuggestion,
    pub project: Option<DbProject>,
}

/// The pending-link queue, strongest candidate first. A link whose evidence
/// or project row has vanished is silently skipped rather than failing the
/// whole queue.
pub fn pending_links(db: &AuditDb) -> Result<Vec<ReviewLink>, EngineError> {
    let mut queue = Vec::new();
    for link in db.get_pending_links()? {
        let Some(evidence) = db.get_evidence(&link.evidence_id)? else {
            continue;
        };
        let Some(project) = db.get_project(&link.project_id)? else {
            continue;
        };
        queue.push(ReviewLink {
            link,
            evidence,
            project,
        });
    }
    Ok(queue)
}

/// The pending-suggestion queue, most confident first.
pub fn pending_suggestions(db: &AuditDb) -> Result<Vec<ReviewSuggestion>, EngineError> {
    let mut queue = Vec::new();
    for suggestion in db.get_pending_suggestions()? {
        let project = match suggestion.project_id.as_deref() {
            Some(id) => db.get_project(id)?,
            None => None,
        };
        queue.push(ReviewSuggestion {
            suggestion,
            project,
        });
    }
    Ok(queue)
}

/// Park a pending suggestion until the cool-down elapses. A queue action,
/// not feedback: no event is written and no rule is touched.
pub fn snooze_suggestion(
    db: &AuditDb,
    config: &EngineConfig,
    suggestion_id: &str,
) -> Result<String, EngineError> {
    let suggestion = db
        .get_suggestion(suggestion_id)?
        .ok_or_else(|| EngineError::not_found("suggestion", suggestion_id))?;
    if SuggestionStatus::parse(&suggestion.status) != Some(SuggestionStatus::Pending) {
        return Err(EngineError::already_resolved(
            "suggestion",
            suggestion_id,
            &suggestion.status,
        ));
    }

    let until = (Utc::now() + Duration::days(config.snooze_days)).to_rfc3339();
    db.set_suggestion_status(suggestion_id, SuggestionStatus::Snoozed, Some(&until))?;
    info!("snoozed suggestion {} until {}", suggestion_id, until);
    Ok(until)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
