//! Feedback ledger and rule adapter.
//!
//! Human decisions land here as append-only `FeedbackEvent`s, mutate their
//! target's status, and trigger a recompute of the governing rule. The
//! recompute is a pure fold over the rule's event log, so replaying the log
//! always reproduces the same rule state.

pub mod mining;

use log::{info, warn};

use crate::config::EngineConfig;
use crate::db::{AuditDb, DbError, DbFeedbackEvent};
use crate::error::EngineError;
use crate::model::{Decision, LinkStatus, SuggestionStatus, TargetKind};

// ---------------------------------------------------------------------------
// Pure recompute
// ---------------------------------------------------------------------------

/// Rule state derived from an event log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleStats {
    pub times_confirmed: i64,
    pub times_rejected: i64,
    pub accuracy: f64,
    pub auto_apply_enabled: bool,
}

/// Fold a rule's decisions in log order into its derived state.
///
/// `modified` counts as a rejection: the proposal was not right as written.
/// Promotion needs both accuracy and sample count; a trailing streak of
/// rejections demotes regardless of cumulative accuracy. Slow to earn
/// trust, fast to lose it.
pub fn fold_decisions<I>(decisions: I, config: &EngineConfig) -> RuleStats
where
    I: IntoIterator<Item = Decision>,
{
    let mut confirmed = 0i64;
    let mut rejected = 0i64;
    let mut trailing_rejections = 0i64;

    for decision in decisions {
        if decision.counts_as_rejection() {
            rejected += 1;
            trailing_rejections += 1;
        } else {
            confirmed += 1;
            trailing_rejections = 0;
        }
    }

    let total = confirmed + rejected;
    let accuracy = if total == 0 {
        0.0
    } else {
        confirmed as f64 / total as f64
    };

    let promoted =
        accuracy >= config.promotion_accuracy && total >= config.promotion_min_samples;
    let demoted = trailing_rejections >= config.demotion_streak;

    RuleStats {
        times_confirmed: confirmed,
        times_rejected: rejected,
        accuracy,
        auto_apply_enabled: promoted && !demoted,
    }
}

/// Recompute one rule from its full event log and write the result back.
pub fn recompute_rule(
    db: &AuditDb,
    config: &EngineConfig,
    rule_id: &str,
) -> Result<RuleStats, EngineError> {
    let decisions = db
        .get_feedback_events_for_rule(rule_id)?
        .iter()
        .filter_map(|e| Decision::parse(&e.decision))
        .collect::<Vec<_>>();
    let stats = fold_decisions(decisions, config);

    let was_enabled = db.rule_allows_auto_apply(rule_id)?;
    db.update_rule_stats(
        rule_id,
        stats.times_confirmed,
        stats.times_rejected,
        stats.accuracy,
        stats.auto_apply_enabled,
    )?;
    if stats.auto_apply_enabled && !was_enabled {
        info!(
            "rule {} promoted to auto-apply ({:.0}% over {} samples)",
            rule_id,
            stats.accuracy * 100.0,
            stats.times_confirmed + stats.times_rejected
        );
    } else if !stats.auto_apply_enabled && was_enabled {
        warn!("rule {} demoted from auto-apply", rule_id);
    }
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Apply a human decision to a pending or auto-linked link. Terminal links
/// reject the decision with no state change.
pub fn decide_link(
    db: &AuditDb,
    config: &EngineConfig,
    link_id: &str,
    decision: Decision,
    context: Option<&str>,
) -> Result<DbFeedbackEvent, EngineError> {
    let link = db
        .get_link(link_id)?
        .ok_or_else(|| EngineError::not_found("link", link_id))?;
    let status = LinkStatus::parse(&link.status);
    if status.map(|s| s.is_terminal()).unwrap_or(true) {
        return Err(EngineError::already_resolved("link", link_id, &link.status));
    }

    // A modified link is a rejected proposal: the human links elsewhere.
    let next = match decision {
        Decision::Accepted => LinkStatus::Confirmed,
        Decision::Rejected | Decision::Modified => LinkStatus::Rejected,
    };
    db.set_link_status(link_id, next)?;
    if next == LinkStatus::Confirmed {
        // One home per evidence: open rivals vanish.
        db.prune_open_links(&link.evidence_id, std::slice::from_ref(&link.project_id))?;
    }

    record_feedback(
        db,
        config,
        TargetKind::Link,
        link_id,
        &link.rule_id,
        decision,
        context,
        link.confidence,
    )
}

/// Apply a human decision to an open or auto-applied suggestion.
///
/// A rejection of an `auto_applied` suggestion is allowed — overturning the
/// machine is exactly the feedback that demotes a drifting rule.
pub fn decide_suggestion(
    db: &AuditDb,
    config: &EngineConfig,
    suggestion_id: &str,
    decision: Decision,
    context: Option<&str>,
) -> Result<DbFeedbackEvent, EngineError> {
    let suggestion = db
        .get_suggestion(suggestion_id)?
        .ok_or_else(|| EngineError::not_found("suggestion", suggestion_id))?;
    let terminal = SuggestionStatus::parse(&suggestion.status)
        .map(|s| s.is_terminal())
        .unwrap_or(true);
    if terminal {
        return Err(EngineError::already_resolved(
            "suggestion",
            suggestion_id,
            &suggestion.status,
        ));
    }

    // A modified suggestion was applied, just not as written.
    let next = match decision {
        Decision::Accepted | Decision::Modified => SuggestionStatus::Accepted,
        Decision::Rejected => SuggestionStatus::Rejected,
    };
    db.set_suggestion_status(suggestion_id, next, None)?;

    record_feedback(
        db,
        config,
        TargetKind::Suggestion,
        suggestion_id,
        &suggestion.rule_id,
        decision,
        context,
        suggestion.confidence,
    )
}

/// Append the event and recompute the governing rule. The event records the
/// rule's accuracy before and after, so the log doubles as a promotion
/// history.
#[allow(clippy::too_many_arguments)]
fn record_feedback(
    db: &AuditDb,
    config: &EngineConfig,
    target_kind: TargetKind,
    target_id: &str,
    rule_id: &str,
    decision: Decision,
    context: Option<&str>,
    target_confidence: f64,
) -> Result<DbFeedbackEvent, EngineError> {
    let before = db.get_rule(rule_id)?.map(|r| r.accuracy);
    let event = db.insert_feedback_event(
        target_kind,
        target_id,
        rule_id,
        decision,
        context,
        Some(target_confidence),
        before,
    )?;
    let stats = recompute_rule(db, config, rule_id)?;

    // Patch in the post-recompute accuracy; the insert could not know it.
    db.conn_ref().execute(
        "UPDATE feedback_events SET confidence_after = ?1 WHERE id = ?2",
        rusqlite::params![stats.accuracy, event.id],
    )
    .map_err(DbError::from)?;
    info!(
        "feedback {} on {} {} (rule {}, accuracy {:.2})",
        decision.as_str(),
        target_kind.as_str(),
        target_id,
        rule_id,
        stats.accuracy
    );
    Ok(DbFeedbackEvent {
        confidence_after: Some(stats.accuracy),
        ..event
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;
    use crate::model::LinkStatus;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn test_fold_zero_events_is_zero_safe() {
        let stats = fold_decisions([], &config());
        assert_eq!(stats.accuracy, 0.0);
        assert!(!stats.auto_apply_enabled);
    }

    #[test]
    fn test_fold_promotion_needs_samples_and_accuracy() {
        // 19 confirms: perfect accuracy, not enough samples.
        let stats = fold_decisions(vec![Decision::Accepted; 19], &config());
        assert!(!stats.auto_apply_enabled);

        // 20 confirms: promoted.
        let stats = fold_decisions(vec![Decision::Accepted; 20], &config());
        assert!(stats.auto_apply_enabled);

        // 18 confirms, 7 rejects: 72%, enough samples, not promoted.
        let mut decisions = vec![Decision::Accepted; 18];
        decisions.extend(vec![Decision::Rejected; 7]);
        let stats = fold_decisions(decisions, &config());
        assert!(!stats.auto_apply_enabled);
        assert!((stats.accuracy - 0.72).abs() < 1e-9);

        // 25 confirms, 2 rejects: 92.6% over 27 clears both bars.
        let mut decisions = vec![Decision::Accepted; 25];
        decisions.extend(vec![Decision::Rejected; 2]);
        let stats = fold_decisions(decisions, &config());
        assert!(stats.auto_apply_enabled);
    }

    #[test]
    fn test_fold_demotion_streak_beats_cumulative_accuracy() {
        // 50 confirms, 2 rejects: 96% over 52 → promoted.
        let mut decisions = vec![Decision::Accepted; 50];
        decisions.extend(vec![Decision::Rejected; 2]);
        let stats = fold_decisions(decisions.clone(), &config());
        assert!(stats.auto_apply_enabled);

        // Three consecutive fresh rejections: demoted even though the
        // cumulative accuracy is still above the promotion floor.
        decisions.extend(vec![Decision::Rejected; 3]);
        let stats = fold_decisions(decisions.clone(), &config());
        assert!(!stats.auto_apply_enabled);
        assert!(stats.accuracy >= 0.90);

        // A confirm breaks the streak and restores promotion.
        decisions.push(Decision::Accepted);
        let stats = fold_decisions(decisions, &config());
        assert!(stats.auto_apply_enabled);
    }

    #[test]
    fn test_fold_modified_counts_as_rejection() {
        let stats = fold_decisions(
            vec![Decision::Accepted, Decision::Modified, Decision::Modified],
            &config(),
        );
        assert_eq!(stats.times_confirmed, 1);
        assert_eq!(stats.times_rejected, 2);
    }

    #[test]
    fn test_fold_accuracy_stays_in_bounds() {
        for decisions in [
            vec![Decision::Rejected; 5],
            vec![Decision::Accepted; 5],
            vec![Decision::Accepted, Decision::Rejected],
        ] {
            let stats = fold_decisions(decisions, &config());
            assert!((0.0..=1.0).contains(&stats.accuracy));
        }
    }

    #[test]
    fn test_decide_link_confirm_prunes_rivals_and_records_event() {
        let db = test_db();
        let id = db
            .upsert_candidate_link("ev-1", "proj-a", 0.8, "match.name_overlap", LinkStatus::PendingReview)
            .unwrap()
            .unwrap();
        db.upsert_candidate_link("ev-1", "proj-b", 0.6, "match.name_overlap", LinkStatus::PendingReview)
            .unwrap();

        let event = decide_link(&db, &config(), &id, Decision::Accepted, None).unwrap();
        assert_eq!(event.decision, "accepted");
        assert_eq!(event.rule_id, "match.name_overlap");

        let links = db.get_links_for_evidence("ev-1").unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].status, "confirmed");

        let rule = db.get_rule("match.name_overlap").unwrap().unwrap();
        assert_eq!(rule.times_confirmed, 1);
        assert_eq!(rule.accuracy, 1.0);
    }

    #[test]
    fn test_decide_on_terminal_target_is_rejected_without_mutation() {
        let db = test_db();
        let id = db
            .upsert_candidate_link("ev-1", "proj-a", 0.8, "match.name_overlap", LinkStatus::PendingReview)
            .unwrap()
            .unwrap();
        decide_link(&db, &config(), &id, Decision::Rejected, None).unwrap();

        let err = decide_link(&db, &config(), &id, Decision::Accepted, None).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyResolved { .. }));
        // Still rejected, and still exactly one feedback event.
        assert_eq!(db.get_link(&id).unwrap().unwrap().status, "rejected");
        let events: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM feedback_events", [], |r| r.get(0))
            .unwrap();
        assert_eq!(events, 1);
    }

    #[test]
    fn test_decide_missing_target_is_not_found() {
        let db = test_db();
        let err = decide_link(&db, &config(), "lnk-gone", Decision::Accepted, None).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn test_overturning_auto_applied_suggestion_feeds_the_rule() {
        let db = test_db();
        use crate::db::suggestions::NewSuggestion;
        use crate::model::SuggestionKind;

        db.conn_ref()
            .execute(
                "UPDATE rules SET auto_apply_enabled = 1 WHERE id = 'suggest.missing_contract'",
                [],
            )
            .unwrap();
        let id = db
            .upsert_suggestion(
                &NewSuggestion {
                    project_id: Some("proj-1".to_string()),
                    kind: SuggestionKind::MissingContract,
                    detail: "contract not on file".to_string(),
                    proposed_fix: serde_json::json!({}),
                    confidence: 0.95,
                    fingerprint: "fp-1".to_string(),
                },
                true,
            )
            .unwrap()
            .unwrap();
        assert_eq!(db.get_suggestion(&id).unwrap().unwrap().status, "auto_applied");

        let event =
            decide_suggestion(&db, &config(), &id, Decision::Rejected, Some("not our contract"))
                .unwrap();
        assert_eq!(event.decision, "rejected");
        assert_eq!(db.get_suggestion(&id).unwrap().unwrap().status, "rejected");

        let rule = db.get_rule("suggest.missing_contract").unwrap().unwrap();
        assert_eq!(rule.times_rejected, 1);
    }

    #[test]
    fn test_replay_reproduces_rule_state() {
        let db = test_db();
        let cfg = config();
        for i in 0..5 {
            let id = db
                .upsert_candidate_link(
                    &format!("ev-{i}"),
                    "proj-a",
                    0.8,
                    "match.project_code",
                    LinkStatus::PendingReview,
                )
                .unwrap()
                .unwrap();
            let decision = if i == 2 { Decision::Rejected } else { Decision::Accepted };
            decide_link(&db, &cfg, &id, decision, None).unwrap();
        }
        let live = db.get_rule("match.project_code").unwrap().unwrap();

        // Wipe derived state and recompute from the log alone.
        db.update_rule_stats("match.project_code", 0, 0, 0.0, false).unwrap();
        recompute_rule(&db, &cfg, "match.project_code").unwrap();
        let replayed = db.get_rule("match.project_code").unwrap().unwrap();
        assert_eq!(live.times_confirmed, replayed.times_confirmed);
        assert_eq!(live.times_rejected, replayed.times_rejected);
        assert_eq!(live.accuracy, replayed.accuracy);
        assert_eq!(live.auto_apply_enabled, replayed.auto_apply_enabled);
    }
}
