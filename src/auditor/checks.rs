//! The integrity checks, one `CheckFn` each, behind the same registry shape
//! as the resolver's signals. A check sees a pre-joined snapshot of one
//! project and returns at most one finding.

use chrono::NaiveDate;
use serde_json::json;

use crate::config::EngineConfig;
use crate::db::suggestions::NewSuggestion;
use crate::db::{
    AuditDb, DbContractTerms, DbDiscipline, DbError, DbFeePhase, DbInvoice, DbProject,
    DbTimelinePhase,
};
use crate::evidence::discipline_keywords;
use crate::helpers::{fingerprint, name_tokens};
use crate::model::{LinkStatus, ProjectStatus, SuggestionKind};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One project with every sub-record the checks look at, loaded once per
/// audit pass so the checks themselves stay pure.
#[derive(Debug, Clone)]
pub struct ProjectSnapshot {
    pub project: DbProject,
    pub disciplines: Vec<DbDiscipline>,
    pub fee_phases: Vec<DbFeePhase>,
    pub timeline_phases: Vec<DbTimelinePhase>,
    pub invoices: Vec<DbInvoice>,
    pub contract_terms: Option<DbContractTerms>,
    /// Discipline keywords seen in evidence confirmed or auto-linked to this
    /// project. Feeds the scope-check confidence.
    pub linked_keywords: Vec<String>,
}

impl ProjectSnapshot {
    pub fn load(db: &AuditDb, project: DbProject) -> Result<Self, DbError> {
        let mut linked_keywords: Vec<String> = Vec::new();
        for link in db.get_links_for_project(&project.id)? {
            let settled_in = matches!(
                LinkStatus::parse(&link.status),
                Some(LinkStatus::Confirmed) | Some(LinkStatus::AutoLinked)
            );
            if !settled_in {
                continue;
            }
            if let Some(row) = db.get_evidence(&link.evidence_id)? {
                for keyword in row.to_evidence().keywords {
                    if !linked_keywords.contains(&keyword) {
                        linked_keywords.push(keyword);
                    }
                }
            }
        }

        Ok(Self {
            disciplines: db.get_disciplines(&project.id)?,
            fee_phases: db.get_fee_phases(&project.id)?,
            timeline_phases: db.get_timeline_phases(&project.id)?,
            invoices: db.get_invoices(&project.id)?,
            contract_terms: db.get_contract_terms(&project.id)?,
            linked_keywords,
            project,
        })
    }

    fn is_active(&self) -> bool {
        ProjectStatus::parse(&self.project.status) == Some(ProjectStatus::Active)
    }

    /// Contract term in months, from the project row or the contract record.
    fn term_months(&self) -> Option<i64> {
        self.project
            .contract_term_months
            .or_else(|| self.contract_terms.as_ref().and_then(|t| t.term_months))
    }

    /// Fee worth bothering about at all.
    fn non_trivial_fee(&self, config: &EngineConfig) -> Option<f64> {
        self.project
            .contract_fee
            .filter(|fee| *fee >= config.trivial_fee_floor)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub type CheckFn = fn(&ProjectSnapshot, &EngineConfig, NaiveDate) -> Option<NewSuggestion>;

pub struct CheckEntry {
    /// Kinds this check may emit; the audit engine prunes stale open rows
    /// of these kinds when the check stops firing.
    pub kinds: &'static [SuggestionKind],
    pub run: CheckFn,
}

pub const CHECKS: &[CheckEntry] = &[
    CheckEntry {
        kinds: &[SuggestionKind::MissingScope],
        run: check_missing_scope,
    },
    CheckEntry {
        kinds: &[SuggestionKind::MissingFeeBreakdown],
        run: check_missing_fee_breakdown,
    },
    CheckEntry {
        kinds: &[SuggestionKind::FeeMismatch],
        run: check_fee_mismatch,
    },
    CheckEntry {
        kinds: &[
            SuggestionKind::TimelineMismatch,
            SuggestionKind::MissingTimeline,
        ],
        run: check_timeline,
    },
    CheckEntry {
        kinds: &[SuggestionKind::MissingContract],
        run: check_missing_contract,
    },
    CheckEntry {
        kinds: &[SuggestionKind::MissingInvoice],
        run: check_invoice_coverage,
    },
];

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// A project billing real money with no recorded scope breakdown. The more
/// distinct disciplines we can actually observe (project name, linked
/// evidence), the more confident the finding.
fn check_missing_scope(
    snap: &ProjectSnapshot,
    config: &EngineConfig,
    _today: NaiveDate,
) -> Option<NewSuggestion> {
    snap.non_trivial_fee(config)?;
    if !snap.disciplines.is_empty() {
        return None;
    }

    let mut observed = discipline_keywords(&name_tokens(&snap.project.name));
    for keyword in &snap.linked_keywords {
        if !observed.contains(keyword) {
            observed.push(keyword.clone());
        }
    }
    let confidence = (0.55 + 0.15 * observed.len() as f64).min(0.95);

    Some(NewSuggestion {
        project_id: Some(snap.project.id.clone()),
        kind: SuggestionKind::MissingScope,
        detail: format!(
            "{} has a contract fee but no discipline scope on record",
            snap.project.code
        ),
        proposed_fix: json!({ "disciplines": observed }),
        confidence,
        fingerprint: fingerprint(&[
            &snap.project.id,
            "missing_scope",
            &observed.join(","),
        ]),
    })
}

// ---------------------------------------------------------------------------
// Fee breakdown
// ---------------------------------------------------------------------------

fn check_missing_fee_breakdown(
    snap: &ProjectSnapshot,
    config: &EngineConfig,
    _today: NaiveDate,
) -> Option<NewSuggestion> {
    snap.non_trivial_fee(config)?;
    if !snap.fee_phases.is_empty() {
        return None;
    }
    Some(NewSuggestion {
        project_id: Some(snap.project.id.clone()),
        kind: SuggestionKind::MissingFeeBreakdown,
        detail: format!(
            "{} has a contract fee but no fee phase breakdown",
            snap.project.code
        ),
        proposed_fix: json!({}),
        confidence: 0.80,
        fingerprint: fingerprint(&[&snap.project.id, "missing_fee_breakdown"]),
    })
}

/// Phase fees should sum to the contract fee. Fires only past BOTH the
/// absolute and the relative tolerance, so neither rounding cents on a big
/// contract nor a few hundred dollars on a small one makes noise.
fn check_fee_mismatch(
    snap: &ProjectSnapshot,
    config: &EngineConfig,
    _today: NaiveDate,
) -> Option<NewSuggestion> {
    let fee = snap.project.contract_fee.filter(|f| *f > 0.0)?;
    if snap.fee_phases.is_empty() {
        return None;
    }
    let phase_sum: f64 = snap.fee_phases.iter().map(|p| p.fee).sum();
    let diff = (phase_sum - fee).abs();
    let ratio = diff / fee;
    if diff <= config.fee_tolerance_abs || ratio <= config.fee_tolerance_rel {
        return None;
    }

    let confidence = (ratio / (ratio + config.fee_tolerance_rel)).min(0.99);
    Some(NewSuggestion {
        project_id: Some(snap.project.id.clone()),
        kind: SuggestionKind::FeeMismatch,
        detail: format!(
            "{} fee phases sum to {:.2} against a contract fee of {:.2}",
            snap.project.code, phase_sum, fee
        ),
        proposed_fix: json!({ "contractFee": fee, "phaseSum": phase_sum }),
        confidence,
        fingerprint: fingerprint(&[
            &snap.project.id,
            "fee_mismatch",
            &format!("{phase_sum:.2}"),
            &format!("{fee:.2}"),
        ]),
    })
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// Standard durations by phase name, used when a timeline row carries
/// neither dates nor an explicit duration.
const STANDARD_PHASE_WEEKS: &[(&str, f64)] = &[
    ("concept", 4.0),
    ("schematic", 6.0),
    ("design development", 8.0),
    ("documentation", 10.0),
    ("tender", 4.0),
    ("construction", 16.0),
];
const DEFAULT_PHASE_WEEKS: f64 = 6.0;

fn phase_weeks(phase: &DbTimelinePhase) -> f64 {
    if let Some(weeks) = phase.duration_weeks {
        return weeks;
    }
    if let (Some(start), Some(end)) = (
        phase.start_date.as_deref().and_then(parse_day),
        phase.end_date.as_deref().and_then(parse_day),
    ) {
        let days = (end - start).num_days();
        if days > 0 {
            return days as f64 / 7.0;
        }
    }
    let name = phase.phase.to_lowercase();
    STANDARD_PHASE_WEEKS
        .iter()
        .find(|(label, _)| name.contains(label))
        .map(|(_, weeks)| *weeks)
        .unwrap_or(DEFAULT_PHASE_WEEKS)
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn check_timeline(
    snap: &ProjectSnapshot,
    _config: &EngineConfig,
    _today: NaiveDate,
) -> Option<NewSuggestion> {
    if snap.timeline_phases.is_empty() {
        if !snap.is_active() {
            return None;
        }
        return Some(NewSuggestion {
            project_id: Some(snap.project.id.clone()),
            kind: SuggestionKind::MissingTimeline,
            detail: format!("{} is active with no timeline on record", snap.project.code),
            proposed_fix: json!({}),
            confidence: 0.80,
            fingerprint: fingerprint(&[&snap.project.id, "missing_timeline"]),
        });
    }

    let term_months = snap.term_months()?;
    if term_months <= 0 {
        return None;
    }
    let term_weeks = term_months as f64 * (52.0 / 12.0);
    let total_weeks: f64 = snap.timeline_phases.iter().map(phase_weeks).sum();
    if total_weeks <= term_weeks {
        return None;
    }

    Some(NewSuggestion {
        project_id: Some(snap.project.id.clone()),
        kind: SuggestionKind::TimelineMismatch,
        detail: format!(
            "{} timeline spans {:.1} weeks against a {}-month contract term",
            snap.project.code, total_weeks, term_months
        ),
        proposed_fix: json!({ "timelineWeeks": total_weeks, "termMonths": term_months }),
        confidence: 0.75,
        fingerprint: fingerprint(&[
            &snap.project.id,
            "timeline_mismatch",
            &format!("{total_weeks:.1}"),
            &term_months.to_string(),
        ]),
    })
}

// ---------------------------------------------------------------------------
// Contract on file
// ---------------------------------------------------------------------------

/// Money is moving on an active project with no contract record. Close to a
/// hard rule.
fn check_missing_contract(
    snap: &ProjectSnapshot,
    _config: &EngineConfig,
    _today: NaiveDate,
) -> Option<NewSuggestion> {
    if !snap.is_active() || snap.contract_terms.is_some() {
        return None;
    }
    let financial_activity = !snap.invoices.is_empty() || snap.project.paid_to_date > 0.0;
    if !financial_activity {
        return None;
    }
    Some(NewSuggestion {
        project_id: Some(snap.project.id.clone()),
        kind: SuggestionKind::MissingContract,
        detail: format!(
            "{} is active with invoices but no contract terms on file",
            snap.project.code
        ),
        proposed_fix: json!({}),
        confidence: 0.95,
        fingerprint: fingerprint(&[&snap.project.id, "missing_contract"]),
    })
}

// ---------------------------------------------------------------------------
// Invoice coverage
// ---------------------------------------------------------------------------

/// Fee phases whose expected completion window has passed without an invoice
/// referencing them. One aggregated finding per project.
fn check_invoice_coverage(
    snap: &ProjectSnapshot,
    config: &EngineConfig,
    today: NaiveDate,
) -> Option<NewSuggestion> {
    let mut uncovered: Vec<&str> = Vec::new();
    for fee_phase in snap.fee_phases.iter().filter(|p| p.fee > 0.0) {
        let end = snap
            .timeline_phases
            .iter()
            .find(|t| t.phase.eq_ignore_ascii_case(&fee_phase.phase))
            .and_then(|t| t.end_date.as_deref())
            .and_then(parse_day);
        // No dated timeline row for the phase: no window to judge against.
        let Some(end) = end else { continue };
        if end + chrono::Duration::days(config.invoice_grace_days) >= today {
            continue;
        }
        let invoiced = snap.invoices.iter().any(|inv| {
            inv.phase
                .as_deref()
                .map(|p| p.eq_ignore_ascii_case(&fee_phase.phase))
                .unwrap_or(false)
        });
        if !invoiced {
            uncovered.push(&fee_phase.phase);
        }
    }

    if uncovered.is_empty() {
        return None;
    }
    Some(NewSuggestion {
        project_id: Some(snap.project.id.clone()),
        kind: SuggestionKind::MissingInvoice,
        detail: format!(
            "{} has completed phases with no invoice: {}",
            snap.project.code,
            uncovered.join(", ")
        ),
        proposed_fix: json!({ "phases": uncovered }),
        confidence: 0.70,
        fingerprint: fingerprint(&[
            &snap.project.id,
            "missing_invoice",
            &uncovered.join(","),
        ]),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
