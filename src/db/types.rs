//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

/// A row from the `projects` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbProject {
    pub id: String,
    /// Canonical firm code, e.g. "25 BK-030".
    pub code: String,
    pub name: String,
    pub client: Option<String>,
    pub contract_fee: Option<f64>,
    pub paid_to_date: f64,
    pub outstanding: f64,
    pub status: String,
    pub parent_id: Option<String>,
    pub contract_term_months: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from `project_disciplines` (scope breakdown).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbDiscipline {
    pub project_id: String,
    pub discipline: String,
    pub fee: Option<f64>,
}

/// A row from `fee_phases`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbFeePhase {
    pub id: i64,
    pub project_id: String,
    pub phase: String,
    pub fee: f64,
    pub sort_order: i64,
}

/// A row from `timeline_phases`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbTimelinePhase {
    pub id: i64,
    pub project_id: String,
    pub phase: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub duration_weeks: Option<f64>,
}

/// A row from `invoices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbInvoice {
    pub id: String,
    pub project_id: String,
    pub phase: Option<String>,
    pub amount: f64,
    pub issued_at: Option<String>,
    pub paid_at: Option<String>,
}

/// A row from `contract_terms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbContractTerms {
    pub project_id: String,
    pub signed_at: Option<String>,
    pub term_months: Option<i64>,
    pub retainer: Option<f64>,
    pub notes: Option<String>,
}

/// A row from the `evidence` table. Token and amount columns are JSON TEXT.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbEvidence {
    pub id: String,
    pub source_type: String,
    pub source_id: String,
    pub code_candidates: String,
    pub name_tokens: String,
    pub keywords: String,
    pub amounts: String,
    pub dates: String,
    pub created_at: String,
}

/// A row from the `links` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbLink {
    pub id: String,
    pub evidence_id: String,
    pub project_id: String,
    pub confidence: f64,
    /// Rule id of the dominant matching signal ("match.*").
    pub rule_id: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `suggestions` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbSuggestion {
    pub id: String,
    /// Null only for `unknown_project_code`, which proposes a project that
    /// does not exist yet.
    pub project_id: Option<String>,
    pub kind: String,
    pub detail: String,
    /// Machine-readable fix payload (JSON).
    pub proposed_fix: String,
    pub confidence: f64,
    pub fingerprint: String,
    pub rule_id: String,
    pub status: String,
    pub snoozed_until: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `rules` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbRule {
    pub id: String,
    pub label: String,
    pub description: String,
    pub times_confirmed: i64,
    pub times_rejected: i64,
    pub accuracy: f64,
    pub auto_apply_enabled: bool,
    pub updated_at: Option<String>,
}

/// A row from the append-only `feedback_events` log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbFeedbackEvent {
    pub id: String,
    pub target_kind: String,
    pub target_id: String,
    pub rule_id: String,
    pub decision: String,
    pub context: Option<String>,
    pub confidence_before: Option<f64>,
    pub confidence_after: Option<f64>,
    pub created_at: String,
}

/// A row from `candidate_rules` (context-mining proposals).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCandidateRule {
    pub id: String,
    pub fingerprint: String,
    pub suggested_name: String,
    pub description: String,
    pub support_count: i64,
    /// JSON array of supporting feedback event ids.
    pub event_ids: String,
    pub created_at: String,
    pub updated_at: String,
}
