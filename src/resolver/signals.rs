//! Resolver scoring signals.
//!
//! Each signal is an independent scoring function behind a common fn-pointer
//! interface, registered with a rule id and a weight accessor. The resolver
//! combines whatever signals are present via a re-normalized weighted sum —
//! adding a signal means adding a registry entry, not touching resolver
//! control flow.
//!
//! A signal returns None when it cannot be computed for the pair (no amount
//! extracted, no code present). Absent means "no opinion", not zero.

use crate::config::SignalWeights;
use crate::db::{AuditDb, DbError, DbProject};
use crate::evidence::Evidence;
use crate::helpers::name_tokens;

// ---------------------------------------------------------------------------
// Candidate facts
// ---------------------------------------------------------------------------

/// Everything a signal may want to know about one candidate project,
/// pre-joined so scoring stays pure.
#[derive(Debug, Clone)]
pub struct ProjectFacts {
    pub project: DbProject,
    /// Normalized tokens of the project name + client name.
    pub tokens: Vec<String>,
    /// Scope disciplines, falling back to discipline words in the name.
    pub disciplines: Vec<String>,
}

impl ProjectFacts {
    pub fn load(db: &AuditDb, project: DbProject) -> Result<Self, DbError> {
        let mut tokens = name_tokens(&project.name);
        if let Some(client) = project.client.as_deref() {
            for token in name_tokens(client) {
                if !tokens.contains(&token) {
                    tokens.push(token);
                }
            }
        }

        let mut disciplines: Vec<String> = db
            .get_disciplines(&project.id)?
            .into_iter()
            .map(|d| d.discipline.to_lowercase())
            .collect();
        if disciplines.is_empty() {
            // No scope rows yet: the project name itself may carry them
            // ("Chedi Hotel Landscape & Interiors").
            disciplines = crate::evidence::discipline_keywords(&name_tokens(&project.name));
        }

        Ok(Self {
            project,
            tokens,
            disciplines,
        })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub type SignalFn = fn(&Evidence, &ProjectFacts) -> Option<f64>;

pub struct SignalEntry {
    pub rule_id: &'static str,
    pub weight: fn(&SignalWeights) -> f64,
    pub score: SignalFn,
}

pub const SIGNALS: &[SignalEntry] = &[
    SignalEntry {
        rule_id: "match.project_code",
        weight: |w| w.project_code,
        score: signal_project_code,
    },
    SignalEntry {
        rule_id: "match.name_overlap",
        weight: |w| w.name_overlap,
        score: signal_name_overlap,
    },
    SignalEntry {
        rule_id: "match.keyword_overlap",
        weight: |w| w.keyword_overlap,
        score: signal_keyword_overlap,
    },
    SignalEntry {
        rule_id: "match.amount_proximity",
        weight: |w| w.amount_proximity,
        score: signal_amount_proximity,
    },
];

// ---------------------------------------------------------------------------
// Signal: project code (near-binary, highest weight)
// ---------------------------------------------------------------------------

/// Split a canonical code "YY AA-NNN" into (year, letters, serial).
fn split_code(code: &str) -> Option<(&str, &str, &str)> {
    let (year, rest) = code.split_once(' ')?;
    let (letters, serial) = rest.split_once('-')?;
    if year.len() == 2 && letters.len() == 2 && serial.len() == 3 {
        Some((year, letters, serial))
    } else {
        None
    }
}

/// Whether an extracted code points at this project code, exactly or as a
/// one-edit serial typo.
pub fn code_matches(code: &str, project_code: &str) -> bool {
    if code == project_code {
        return true;
    }
    match (split_code(code), split_code(project_code)) {
        (Some((ey, el, es)), Some((py, pl, ps))) => {
            ey == py && el == pl && strsim::levenshtein(es, ps) == 1
        }
        _ => false,
    }
}

/// Exact canonical equality scores 1.0. A same-year, same-letters code whose
/// serial is one edit away scores 0.75 — writers fat-finger serials, not
/// year+discipline prefixes. Anything else: the signal is absent, never a
/// negative vote.
fn signal_project_code(evidence: &Evidence, facts: &ProjectFacts) -> Option<f64> {
    if evidence.code_candidates.is_empty() {
        return None;
    }
    let mut best: Option<f64> = None;
    for code in &evidence.code_candidates {
        if *code == facts.project.code {
            return Some(1.0);
        }
        if code_matches(code, &facts.project.code) {
            best = Some(0.75);
        }
    }
    best
}

// ---------------------------------------------------------------------------
// Signal: client/name token overlap
// ---------------------------------------------------------------------------

/// Jaccard overlap between evidence name tokens and project name+client
/// tokens, with single-token fuzzy credit (Jaro-Winkler ≥ 0.88) so
/// "oriental"/"orientale" still count.
///
/// An empty intersection means the signal is absent, not zero: evidence
/// that shares no name material with a project says nothing about it,
/// and a present zero would drag down candidates identified by a code or
/// an amount alone.
fn signal_name_overlap(evidence: &Evidence, facts: &ProjectFacts) -> Option<f64> {
    if evidence.name_tokens.is_empty() || facts.tokens.is_empty() {
        return None;
    }

    let mut matched = 0usize;
    for project_token in &facts.tokens {
        let hit = evidence.name_tokens.iter().any(|ev_token| {
            ev_token == project_token || strsim::jaro_winkler(ev_token, project_token) >= 0.88
        });
        if hit {
            matched += 1;
        }
    }
    if matched == 0 {
        return None;
    }

    let union = evidence.name_tokens.len() + facts.tokens.len() - matched;
    Some(matched as f64 / union as f64)
}

// ---------------------------------------------------------------------------
// Signal: discipline keyword overlap
// ---------------------------------------------------------------------------

/// Same absence rule as the name signal: no shared discipline, no opinion.
fn signal_keyword_overlap(evidence: &Evidence, facts: &ProjectFacts) -> Option<f64> {
    if evidence.keywords.is_empty() || facts.disciplines.is_empty() {
        return None;
    }
    let matched = evidence
        .keywords
        .iter()
        .filter(|k| facts.disciplines.contains(k))
        .count();
    if matched == 0 {
        return None;
    }
    let union = evidence.keywords.len() + facts.disciplines.len() - matched;
    Some(matched as f64 / union as f64)
}

// ---------------------------------------------------------------------------
// Signal: monetary amount proximity
// ---------------------------------------------------------------------------

/// Inverse distance between the closest evidence amount and the contract
/// fee: linear from 1.0 at an exact match down to 0.0 at 25% relative
/// difference.
fn signal_amount_proximity(evidence: &Evidence, facts: &ProjectFacts) -> Option<f64> {
    let fee = facts.project.contract_fee.filter(|f| *f > 0.0)?;
    if evidence.amounts.is_empty() {
        return None;
    }
    let best = evidence
        .amounts
        .iter()
        .map(|a| {
            let rel = (a.value - fee).abs() / fee;
            (1.0 - rel / 0.25).clamp(0.0, 1.0)
        })
        .fold(0.0f64, f64::max);
    Some(best)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
