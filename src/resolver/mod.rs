//! Entity resolution: match normalized evidence against the project store.
//!
//! Scoring is pure (`rank` over pre-joined `ProjectFacts`); persistence and
//! the auto-link/review decision live in `resolve_evidence`. The split keeps
//! the ranking testable without a database and keeps all link writes on one
//! code path.

pub mod signals;

use log::{debug, info};
use serde_json::json;

use crate::config::EngineConfig;
use crate::db::suggestions::NewSuggestion;
use crate::db::{AuditDb, DbEvidence};
use crate::error::EngineError;
use crate::evidence::Evidence;
use crate::helpers::fingerprint;
use crate::model::{LinkStatus, SuggestionKind};
use signals::{ProjectFacts, SIGNALS};

// ---------------------------------------------------------------------------
// Pure ranking
// ---------------------------------------------------------------------------

/// One candidate with its combined score and the signal that carried it.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub project_id: String,
    pub score: f64,
    /// Rule id of the signal with the largest weighted contribution.
    pub dominant_rule: String,
}

/// Score one evidence record against one candidate: weighted sum of the
/// present signals, re-normalized over the weights of the signals that
/// fired. Returns None when no signal had an opinion.
pub fn score_pair(
    evidence: &Evidence,
    facts: &ProjectFacts,
    config: &EngineConfig,
) -> Option<(f64, String)> {
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    let mut dominant: Option<(&'static str, f64)> = None;

    for entry in SIGNALS {
        let Some(score) = (entry.score)(evidence, facts) else {
            continue;
        };
        let weight = (entry.weight)(&config.signal_weights);
        let contribution = weight * score;
        weighted_sum += contribution;
        weight_sum += weight;
        if dominant.map(|(_, c)| contribution > c).unwrap_or(true) {
            dominant = Some((entry.rule_id, contribution));
        }
    }

    let (rule_id, _) = dominant?;
    if weight_sum <= 0.0 {
        return None;
    }
    Some(((weighted_sum / weight_sum).clamp(0.0, 1.0), rule_id.to_string()))
}

/// Rank all candidates for one evidence record, best first. `facts` must be
/// ordered by recency (most recently updated first) — ties in score then
/// favor the fresher project.
pub fn rank(
    evidence: &Evidence,
    facts: &[ProjectFacts],
    config: &EngineConfig,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = facts
        .iter()
        .filter_map(|f| {
            score_pair(evidence, f, config).map(|(score, dominant_rule)| ScoredCandidate {
                project_id: f.project.id.clone(),
                score,
                dominant_rule,
            })
        })
        .collect();
    // Stable sort preserves the recency order within equal scores.
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

// ---------------------------------------------------------------------------
// Decision + persistence
// ---------------------------------------------------------------------------

/// What one resolve pass did for one evidence record.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    /// One candidate cleared the auto-link bar without a close rival.
    AutoLinked { link_id: String, project_id: String, score: f64 },
    /// One or more candidates landed in the review band.
    QueuedForReview { candidates: usize },
    /// Nothing scored at or above the review threshold.
    NoMatch,
    /// A confirmed link already exists; the evidence is settled.
    AlreadyResolved,
}

/// Resolve one stored evidence record end to end: score candidates, apply
/// the threshold policy, and persist links. Also files an
/// `unknown_project_code` suggestion for any extracted code that matches no
/// project on record.
pub fn resolve_evidence(
    db: &AuditDb,
    config: &EngineConfig,
    row: &DbEvidence,
) -> Result<ResolutionOutcome, EngineError> {
    let existing = db.get_links_for_evidence(&row.id)?;
    if existing
        .iter()
        .any(|l| LinkStatus::parse(&l.status) == Some(LinkStatus::Confirmed))
    {
        return Ok(ResolutionOutcome::AlreadyResolved);
    }
    // Pairs a human already rejected are out of the running for good.
    let rejected: Vec<String> = existing
        .iter()
        .filter(|l| LinkStatus::parse(&l.status) == Some(LinkStatus::Rejected))
        .map(|l| l.project_id.clone())
        .collect();

    let evidence = row.to_evidence();

    let mut facts = Vec::new();
    for project in db.get_all_projects()? {
        facts.push(ProjectFacts::load(db, project)?);
    }

    file_orphan_codes(db, &evidence, &row.id, &facts)?;

    let ranked = rank(&evidence, &facts, config);
    let in_band: Vec<&ScoredCandidate> = ranked
        .iter()
        .filter(|c| c.score >= config.review_threshold && !rejected.contains(&c.project_id))
        .collect();

    if in_band.is_empty() {
        db.prune_open_links(&row.id, &[])?;
        debug!("resolve {}: no candidate in band", row.id);
        return Ok(ResolutionOutcome::NoMatch);
    }

    let top = in_band[0];
    let runner_up_close = in_band
        .get(1)
        .map(|second| (top.score - second.score) < config.tie_epsilon)
        .unwrap_or(false);
    let auto = top.score >= config.auto_link_threshold
        && !runner_up_close
        && db.rule_allows_auto_apply(&top.dominant_rule)?;

    if auto {
        // The rejected filter above guarantees no terminal row blocks this.
        if let Some(link_id) = db.upsert_candidate_link(
            &row.id,
            &top.project_id,
            top.score,
            &top.dominant_rule,
            LinkStatus::AutoLinked,
        )? {
            db.prune_open_links(&row.id, std::slice::from_ref(&top.project_id))?;
            info!(
                "auto-linked evidence {} -> {} ({:.2} via {})",
                row.id, top.project_id, top.score, top.dominant_rule
            );
            return Ok(ResolutionOutcome::AutoLinked {
                link_id,
                project_id: top.project_id.clone(),
                score: top.score,
            });
        }
    }

    let mut kept: Vec<String> = Vec::new();
    for candidate in &in_band {
        let written = db.upsert_candidate_link(
            &row.id,
            &candidate.project_id,
            candidate.score,
            &candidate.dominant_rule,
            LinkStatus::PendingReview,
        )?;
        if written.is_some() {
            kept.push(candidate.project_id.clone());
        }
    }
    db.prune_open_links(&row.id, &kept)?;
    debug!("resolve {}: {} candidate(s) queued for review", row.id, kept.len());
    Ok(ResolutionOutcome::QueuedForReview { candidates: kept.len() })
}

/// Extracted codes that match no project (exactly or as a one-edit serial
/// typo) point at a gap in the store itself, not in the evidence. File one
/// suggestion per unknown code, keyed by fingerprint because there is no
/// project to hang it on.
fn file_orphan_codes(
    db: &AuditDb,
    evidence: &Evidence,
    evidence_id: &str,
    facts: &[ProjectFacts],
) -> Result<(), EngineError> {
    for code in &evidence.code_candidates {
        let known = facts
            .iter()
            .any(|f| signals::code_matches(code, &f.project.code));
        if known {
            continue;
        }
        let finding = NewSuggestion {
            project_id: None,
            kind: SuggestionKind::UnknownProjectCode,
            detail: format!("Code {code} appears in evidence but matches no project on record"),
            proposed_fix: json!({ "code": code, "evidenceId": evidence_id }),
            confidence: 0.85,
            fingerprint: fingerprint(&["unknown_project_code", code]),
        };
        if db.upsert_suggestion(&finding, false)?.is_some() {
            info!("unknown project code {code} in evidence {evidence_id}");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;
    use crate::db::DbProject;
    use crate::evidence::{normalize, StructuredFields};
    use crate::model::{SourceType, SuggestionStatus};

    fn project(id: &str, code: &str, name: &str, client: Option<&str>, fee: Option<f64>) -> DbProject {
        DbProject {
            id: id.to_string(),
            code: code.to_string(),
            name: name.to_string(),
            client: client.map(|s| s.to_string()),
            contract_fee: fee,
            paid_to_date: 0.0,
            outstanding: 0.0,
            status: "active".to_string(),
            parent_id: None,
            contract_term_months: None,
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
            updated_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    fn stored_evidence(db: &AuditDb, text: &str, source_id: &str) -> DbEvidence {
        let ev = normalize(SourceType::Email, text, &StructuredFields::default(), source_id);
        let id = db.insert_evidence(&ev).expect("insert evidence");
        db.get_evidence(&id).expect("query").expect("row")
    }

    /// Rules start unpromoted; tests exercising the auto-link path flip the
    /// flag the way the rule adapter eventually would.
    fn promote(db: &AuditDb, rule_id: &str) {
        db.conn_ref()
            .execute(
                "UPDATE rules SET auto_apply_enabled = 1 WHERE id = ?1",
                [rule_id],
            )
            .unwrap();
    }

    #[test]
    fn test_auto_link_on_strong_name_and_amount() {
        let db = test_db();
        let config = EngineConfig::default();
        db.upsert_project(&project(
            "proj-30",
            "25 BK-030",
            "Beach Club at Mandarin Oriental Bali",
            Some("Mandarin Oriental"),
            Some(550_000.0),
        ))
        .unwrap();
        db.upsert_project(&project(
            "proj-29",
            "23 BK-029",
            "Mandarin Oriental Bali",
            Some("Mandarin Oriental"),
            Some(1_200_000.0),
        ))
        .unwrap();
        promote(&db, "match.name_overlap");

        let row = stored_evidence(
            &db,
            "Beach Club at Mandarin Oriental Bali $550,000",
            "email-1",
        );
        let outcome = resolve_evidence(&db, &config, &row).unwrap();
        match outcome {
            ResolutionOutcome::AutoLinked { project_id, score, .. } => {
                assert_eq!(project_id, "proj-30");
                assert!(score >= config.auto_link_threshold, "score {}", score);
            }
            other => panic!("expected auto link, got {:?}", other),
        }
        // The sibling project must not hold an open candidate afterwards.
        let links = db.get_links_for_evidence(&row.id).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].project_id, "proj-30");
        assert_eq!(links[0].status, "auto_linked");
    }

    #[test]
    fn test_close_rivals_go_to_review() {
        let db = test_db();
        let config = EngineConfig::default();
        db.upsert_project(&project("proj-a", "24 CH-001", "Chedi Hotel Muscat", None, None))
            .unwrap();
        db.upsert_project(&project("proj-b", "24 CH-002", "Chedi Hotel Lustica", None, None))
            .unwrap();

        // Exact code for both is impossible; name overlap lands both in the
        // same band, within epsilon of each other.
        promote(&db, "match.name_overlap");
        let row = stored_evidence(&db, "Chedi Hotel update", "email-2");
        let outcome = resolve_evidence(&db, &config, &row).unwrap();
        match outcome {
            ResolutionOutcome::QueuedForReview { candidates } => assert_eq!(candidates, 2),
            other => panic!("expected review queue, got {:?}", other),
        }
        let links = db.get_links_for_evidence(&row.id).unwrap();
        assert!(links.iter().all(|l| l.status == "pending_review"));
    }

    #[test]
    fn test_exact_code_auto_links_alone() {
        let db = test_db();
        let config = EngineConfig::default();
        db.upsert_project(&project("proj-50", "23 BK-050", "Regent Phu Quoc", None, None))
            .unwrap();
        promote(&db, "match.project_code");

        let row = stored_evidence(&db, "per 23BK050 schedule attached", "email-3");
        let outcome = resolve_evidence(&db, &config, &row).unwrap();
        assert!(
            matches!(outcome, ResolutionOutcome::AutoLinked { ref project_id, .. } if project_id == "proj-50"),
            "got {:?}",
            outcome
        );
    }

    #[test]
    fn test_unpromoted_rule_blocks_auto_link() {
        let db = test_db();
        let config = EngineConfig::default();
        db.upsert_project(&project("proj-50", "23 BK-050", "Regent Phu Quoc", None, None))
            .unwrap();

        // No promotion: a perfect code match still goes to review.
        let row = stored_evidence(&db, "per 23BK050 schedule attached", "email-4");
        let outcome = resolve_evidence(&db, &config, &row).unwrap();
        assert!(
            matches!(outcome, ResolutionOutcome::QueuedForReview { candidates: 1 }),
            "got {:?}",
            outcome
        );
    }

    #[test]
    fn test_no_match_prunes_stale_candidates() {
        let db = test_db();
        let config = EngineConfig::default();
        db.upsert_project(&project("proj-x", "22 ZZ-900", "Alpine Lodge", None, None))
            .unwrap();

        let row = stored_evidence(&db, "lunch order for friday", "email-5");
        // Seed a stale open candidate by hand.
        db.upsert_candidate_link(&row.id, "proj-x", 0.6, "match.name_overlap", LinkStatus::PendingReview)
            .unwrap();
        let outcome = resolve_evidence(&db, &config, &row).unwrap();
        assert_eq!(outcome, ResolutionOutcome::NoMatch);
        assert!(db.get_links_for_evidence(&row.id).unwrap().is_empty());
    }

    #[test]
    fn test_confirmed_evidence_is_left_alone() {
        let db = test_db();
        let config = EngineConfig::default();
        db.upsert_project(&project("proj-50", "23 BK-050", "Regent Phu Quoc", None, None))
            .unwrap();
        let row = stored_evidence(&db, "per 23BK050 schedule", "email-6");
        db.upsert_candidate_link(&row.id, "proj-50", 1.0, "match.project_code", LinkStatus::Confirmed)
            .unwrap();

        let outcome = resolve_evidence(&db, &config, &row).unwrap();
        assert_eq!(outcome, ResolutionOutcome::AlreadyResolved);
    }

    #[test]
    fn test_rejected_pair_never_comes_back() {
        let db = test_db();
        let config = EngineConfig::default();
        db.upsert_project(&project("proj-50", "23 BK-050", "Regent Phu Quoc", None, None))
            .unwrap();
        promote(&db, "match.project_code");
        let row = stored_evidence(&db, "per 23BK050 schedule", "email-11");
        db.upsert_candidate_link(&row.id, "proj-50", 1.0, "match.project_code", LinkStatus::Rejected)
            .unwrap();

        let outcome = resolve_evidence(&db, &config, &row).unwrap();
        assert_eq!(outcome, ResolutionOutcome::NoMatch);
        // The rejected row survives as the audit trail.
        let links = db.get_links_for_evidence(&row.id).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].status, "rejected");
    }

    #[test]
    fn test_orphan_code_files_suggestion_once() {
        let db = test_db();
        let config = EngineConfig::default();

        let row = stored_evidence(&db, "new signing 26 NN-101 kickoff soon", "email-7");
        resolve_evidence(&db, &config, &row).unwrap();

        let count = |db: &AuditDb| -> i64 {
            db.conn_ref()
                .query_row(
                    "SELECT COUNT(*) FROM suggestions WHERE kind = 'unknown_project_code'",
                    [],
                    |r| r.get(0),
                )
                .unwrap()
        };
        assert_eq!(count(&db), 1);

        // Same code in a second artifact: the open row is refreshed, not
        // duplicated.
        let row2 = stored_evidence(&db, "re 26 NN-101 site visit", "email-8");
        resolve_evidence(&db, &config, &row2).unwrap();
        assert_eq!(count(&db), 1);

        // Rejected once, the fingerprint never comes back.
        let id: String = db
            .conn_ref()
            .query_row(
                "SELECT id FROM suggestions WHERE kind = 'unknown_project_code'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        db.set_suggestion_status(&id, SuggestionStatus::Rejected, None).unwrap();
        let row3 = stored_evidence(&db, "again 26 NN-101", "email-9");
        resolve_evidence(&db, &config, &row3).unwrap();
        let open: i64 = db
            .conn_ref()
            .query_row(
                "SELECT COUNT(*) FROM suggestions WHERE kind = 'unknown_project_code'
                 AND status = 'pending'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(open, 0);
    }

    #[test]
    fn test_raising_threshold_never_adds_auto_links() {
        let db = test_db();
        db.upsert_project(&project(
            "proj-30",
            "25 BK-030",
            "Beach Club at Mandarin Oriental Bali",
            Some("Mandarin Oriental"),
            Some(550_000.0),
        ))
        .unwrap();
        promote(&db, "match.name_overlap");
        let row = stored_evidence(
            &db,
            "Beach Club at Mandarin Oriental Bali $550,000",
            "email-10",
        );

        let lenient = EngineConfig::default();
        let mut strict = EngineConfig::default();
        strict.auto_link_threshold = 1.01; // nothing can clear it

        let out = resolve_evidence(&db, &strict, &row).unwrap();
        assert!(matches!(out, ResolutionOutcome::QueuedForReview { .. }));
        let out = resolve_evidence(&db, &lenient, &row).unwrap();
        assert!(matches!(out, ResolutionOutcome::AutoLinked { .. }));
    }
}
