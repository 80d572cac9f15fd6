//! Domain enums shared across the engine.
//!
//! Everything here is stored as TEXT in SQLite, so each enum carries an
//! `as_str`/`parse` pair rather than relying on serde for the column codec.
//! The serde derives exist for the review/reporting surfaces, which hand
//! these out as JSON.

use serde::{Deserialize, Serialize};

/// The kind of raw artifact evidence was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Email,
    Document,
    InvoiceLine,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Email => "email",
            SourceType::Document => "document",
            SourceType::InvoiceLine => "invoice_line",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(SourceType::Email),
            "document" => Some(SourceType::Document),
            "invoice_line" => Some(SourceType::InvoiceLine),
            _ => None,
        }
    }
}

/// Project lifecycle status. Transitions are one-way except
/// `proposal → active` and `active → archived/cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Proposal,
    Active,
    Archived,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Proposal => "proposal",
            ProjectStatus::Active => "active",
            ProjectStatus::Archived => "archived",
            ProjectStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "proposal" => Some(ProjectStatus::Proposal),
            "active" => Some(ProjectStatus::Active),
            "archived" => Some(ProjectStatus::Archived),
            "cancelled" => Some(ProjectStatus::Cancelled),
            _ => None,
        }
    }
}

/// Decision state of an evidence→project link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    AutoLinked,
    PendingReview,
    Confirmed,
    Rejected,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::AutoLinked => "auto_linked",
            LinkStatus::PendingReview => "pending_review",
            LinkStatus::Confirmed => "confirmed",
            LinkStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto_linked" => Some(LinkStatus::AutoLinked),
            "pending_review" => Some(LinkStatus::PendingReview),
            "confirmed" => Some(LinkStatus::Confirmed),
            "rejected" => Some(LinkStatus::Rejected),
            _ => None,
        }
    }

    /// Terminal links are never touched by the resolver or the ledger.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LinkStatus::Confirmed | LinkStatus::Rejected)
    }
}

/// Status of an audit suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Accepted,
    Rejected,
    Snoozed,
    AutoApplied,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Accepted => "accepted",
            SuggestionStatus::Rejected => "rejected",
            SuggestionStatus::Snoozed => "snoozed",
            SuggestionStatus::AutoApplied => "auto_applied",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SuggestionStatus::Pending),
            "accepted" => Some(SuggestionStatus::Accepted),
            "rejected" => Some(SuggestionStatus::Rejected),
            "snoozed" => Some(SuggestionStatus::Snoozed),
            "auto_applied" => Some(SuggestionStatus::AutoApplied),
            _ => None,
        }
    }

    /// Accepted and rejected are terminal; re-audits must not resurrect them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SuggestionStatus::Accepted | SuggestionStatus::Rejected)
    }

    /// Open suggestions are updated in place by re-audits.
    pub fn is_open(&self) -> bool {
        matches!(self, SuggestionStatus::Pending | SuggestionStatus::Snoozed)
    }
}

/// The kind of integrity gap a suggestion describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    MissingScope,
    MissingFeeBreakdown,
    FeeMismatch,
    TimelineMismatch,
    MissingTimeline,
    MissingContract,
    MissingInvoice,
    UnknownProjectCode,
}

impl SuggestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionKind::MissingScope => "missing_scope",
            SuggestionKind::MissingFeeBreakdown => "missing_fee_breakdown",
            SuggestionKind::FeeMismatch => "fee_mismatch",
            SuggestionKind::TimelineMismatch => "timeline_mismatch",
            SuggestionKind::MissingTimeline => "missing_timeline",
            SuggestionKind::MissingContract => "missing_contract",
            SuggestionKind::MissingInvoice => "missing_invoice",
            SuggestionKind::UnknownProjectCode => "unknown_project_code",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "missing_scope" => Some(SuggestionKind::MissingScope),
            "missing_fee_breakdown" => Some(SuggestionKind::MissingFeeBreakdown),
            "fee_mismatch" => Some(SuggestionKind::FeeMismatch),
            "timeline_mismatch" => Some(SuggestionKind::TimelineMismatch),
            "missing_timeline" => Some(SuggestionKind::MissingTimeline),
            "missing_contract" => Some(SuggestionKind::MissingContract),
            "missing_invoice" => Some(SuggestionKind::MissingInvoice),
            "unknown_project_code" => Some(SuggestionKind::UnknownProjectCode),
            _ => None,
        }
    }

    /// The id of the rule that governs auto-apply for this kind.
    pub fn rule_id(&self) -> String {
        format!("suggest.{}", self.as_str())
    }
}

/// A human decision recorded against a link or suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accepted,
    Rejected,
    Modified,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Accepted => "accepted",
            Decision::Rejected => "rejected",
            Decision::Modified => "modified",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "accepted" => Some(Decision::Accepted),
            "rejected" => Some(Decision::Rejected),
            "modified" => Some(Decision::Modified),
            _ => None,
        }
    }

    /// Modified counts against the rule: the proposal was not right as written.
    pub fn counts_as_rejection(&self) -> bool {
        matches!(self, Decision::Rejected | Decision::Modified)
    }
}

/// Whether a feedback event targets a link or a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Link,
    Suggestion,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Link => "link",
            TargetKind::Suggestion => "suggestion",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "link" => Some(TargetKind::Link),
            "suggestion" => Some(TargetKind::Suggestion),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_as_str_parse() {
        for kind in [
            SuggestionKind::MissingScope,
            SuggestionKind::FeeMismatch,
            SuggestionKind::UnknownProjectCode,
        ] {
            assert_eq!(SuggestionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(LinkStatus::parse("pending_review"), Some(LinkStatus::PendingReview));
        assert_eq!(SuggestionStatus::parse("bogus"), None);
    }

    #[test]
    fn test_modified_counts_as_rejection() {
        assert!(Decision::Modified.counts_as_rejection());
        assert!(Decision::Rejected.counts_as_rejection());
        assert!(!Decision::Accepted.counts_as_rejection());
    }

    #[test]
    fn test_terminal_states() {
        assert!(SuggestionStatus::Accepted.is_terminal());
        assert!(SuggestionStatus::Rejected.is_terminal());
        assert!(!SuggestionStatus::AutoApplied.is_terminal());
        assert!(SuggestionStatus::Snoozed.is_open());
        assert!(LinkStatus::Confirmed.is_terminal());
        assert!(!LinkStatus::AutoLinked.is_terminal());
    }
}
