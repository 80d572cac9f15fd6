//! Reporting: rule transparency and queue depths for the dashboard.

use serde::Serialize;

use crate::db::{AuditDb, DbCandidateRule, DbRule};
use crate::error::EngineError;

/// The headline numbers: "12 active rules, 3 auto-apply-enabled, 87% avg
/// accuracy", plus queue depths and totals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSummary {
    pub rules_total: usize,
    pub rules_auto_apply: usize,
    /// Mean accuracy over rules with at least one feedback event.
    pub avg_accuracy: f64,
    pub pending_links: i64,
    pub pending_suggestions: i64,
    pub snoozed_suggestions: i64,
    pub confirmed_links: i64,
    pub auto_linked: i64,
    pub evidence_total: i64,
    pub projects_total: i64,
    pub candidate_rules: i64,
}

fn count(db: &AuditDb, sql: &str) -> Result<i64, EngineError> {
    let n: i64 = db
        .conn_ref()
        .query_row(sql, [], |row| row.get(0))
        .map_err(crate::db::DbError::Sqlite)?;
    Ok(n)
}

pub fn engine_summary(db: &AuditDb) -> Result<EngineSummary, EngineError> {
    let rules = db.get_all_rules()?;
    let with_feedback: Vec<&DbRule> = rules
        .iter()
        .filter(|r| r.times_confirmed + r.times_rejected > 0)
        .collect();
    let avg_accuracy = if with_feedback.is_empty() {
        0.0
    } else {
        with_feedback.iter().map(|r| r.accuracy).sum::<f64>() / with_feedback.len() as f64
    };

    Ok(EngineSummary {
        rules_total: rules.len(),
        rules_auto_apply: rules.iter().filter(|r| r.auto_apply_enabled).count(),
        avg_accuracy,
        pending_links: count(db, "SELECT COUNT(*) FROM links WHERE status = 'pending_review'")?,
        pending_suggestions: count(
            db,
            "SELECT COUNT(*) FROM suggestions WHERE status = 'pending'",
        )?,
        snoozed_suggestions: count(
            db,
            "SELECT COUNT(*) FROM suggestions WHERE status = 'snoozed'",
        )?,
        confirmed_links: count(db, "SELECT COUNT(*) FROM links WHERE status = 'confirmed'")?,
        auto_linked: count(db, "SELECT COUNT(*) FROM links WHERE status = 'auto_linked'")?,
        evidence_total: count(db, "SELECT COUNT(*) FROM evidence")?,
        projects_total: count(db, "SELECT COUNT(*) FROM projects")?,
        candidate_rules: count(db, "SELECT COUNT(*) FROM candidate_rules")?,
    })
}

/// Per-rule stats for the transparency view, auto-apply rules first, then by
/// accuracy.
pub fn rule_stats(db: &AuditDb) -> Result<Vec<DbRule>, EngineError> {
    let mut rules = db.get_all_rules()?;
    rules.sort_by(|a, b| {
        b.auto_apply_enabled
            .cmp(&a.auto_apply_enabled)
            .then(b.accuracy.partial_cmp(&a.accuracy).unwrap_or(std::cmp::Ordering::Equal))
            .then(a.id.cmp(&b.id))
    });
    Ok(rules)
}

/// Mining proposals awaiting an operator.
pub fn candidate_rules(db: &AuditDb) -> Result<Vec<DbCandidateRule>, EngineError> {
    Ok(db.get_candidate_rules()?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;
    use crate::model::LinkStatus;

    #[test]
    fn test_summary_counts_seeded_state() {
        let db = test_db();
        let summary = engine_summary(&db).unwrap();
        assert_eq!(summary.rules_total, 12);
        assert_eq!(summary.rules_auto_apply, 0);
        assert_eq!(summary.avg_accuracy, 0.0);
        assert_eq!(summary.pending_links, 0);
    }

    #[test]
    fn test_summary_reflects_activity() {
        let db = test_db();
        db.upsert_candidate_link("ev-1", "proj-a", 0.7, "match.name_overlap", LinkStatus::PendingReview)
            .unwrap();
        db.upsert_candidate_link("ev-2", "proj-a", 0.95, "match.project_code", LinkStatus::AutoLinked)
            .unwrap();
        db.update_rule_stats("match.project_code", 18, 2, 0.9, false).unwrap();
        db.update_rule_stats("match.name_overlap", 4, 4, 0.5, false).unwrap();

        let summary = engine_summary(&db).unwrap();
        assert_eq!(summary.pending_links, 1);
        assert_eq!(summary.auto_linked, 1);
        // Rules without feedback stay out of the average.
        assert!((summary.avg_accuracy - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_rule_stats_order_auto_apply_first() {
        let db = test_db();
        db.update_rule_stats("match.name_overlap", 30, 1, 0.97, true).unwrap();
        db.update_rule_stats("match.project_code", 50, 1, 0.98, false).unwrap();

        let rules = rule_stats(&db).unwrap();
        assert_eq!(rules[0].id, "match.name_overlap");
        assert_eq!(rules[1].id, "match.project_code");
    }
}
