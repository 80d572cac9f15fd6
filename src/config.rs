//! Engine configuration stored in `~/.studioops/config.json`.
//!
//! Every threshold the business docs assert (0.90 auto-apply, 0.50 review,
//! 20-sample promotion minimum) is a tunable default here, not a constant:
//! none of those numbers were ever derived from labeled data, so operators
//! must be able to adjust them without a rebuild. Per-field serde defaults
//! mean a partial config file only overrides what it names.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Relative weight of each resolver signal. Missing signals re-normalize
/// over the weights of the signals that are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalWeights {
    #[serde(default = "default_weight_code")]
    pub project_code: f64,
    #[serde(default = "default_weight_name")]
    pub name_overlap: f64,
    #[serde(default = "default_weight_keyword")]
    pub keyword_overlap: f64,
    #[serde(default = "default_weight_amount")]
    pub amount_proximity: f64,
}

fn default_weight_code() -> f64 {
    0.45
}

fn default_weight_name() -> f64 {
    0.25
}

fn default_weight_keyword() -> f64 {
    0.15
}

fn default_weight_amount() -> f64 {
    0.15
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            project_code: default_weight_code(),
            name_overlap: default_weight_name(),
            keyword_overlap: default_weight_keyword(),
            amount_proximity: default_weight_amount(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Links at or above this score auto-link when the governing rule allows.
    #[serde(default = "default_auto_link_threshold")]
    pub auto_link_threshold: f64,
    /// Links at or above this score enter the review queue.
    #[serde(default = "default_review_threshold")]
    pub review_threshold: f64,
    /// Candidates within this score gap of the top candidate are treated as
    /// tied, and all go to review instead of auto-picking one.
    #[serde(default = "default_tie_epsilon")]
    pub tie_epsilon: f64,
    /// Suggestions at or above this confidence auto-apply when the governing
    /// rule allows.
    #[serde(default = "default_auto_apply_threshold")]
    pub auto_apply_threshold: f64,
    /// Contract fees below this are too small to demand scope/fee breakdown.
    #[serde(default = "default_trivial_fee_floor")]
    pub trivial_fee_floor: f64,
    /// Fee mismatch fires only when the discrepancy exceeds BOTH tolerances.
    #[serde(default = "default_fee_tolerance_abs")]
    pub fee_tolerance_abs: f64,
    #[serde(default = "default_fee_tolerance_rel")]
    pub fee_tolerance_rel: f64,
    /// Days past a phase's timeline end before a missing invoice is flagged.
    #[serde(default = "default_invoice_grace_days")]
    pub invoice_grace_days: i64,
    /// Snoozed suggestions return to pending after this many days.
    #[serde(default = "default_snooze_days")]
    pub snooze_days: i64,
    /// Rule promotion: accuracy floor and sample minimum.
    #[serde(default = "default_promotion_accuracy")]
    pub promotion_accuracy: f64,
    #[serde(default = "default_promotion_min_samples")]
    pub promotion_min_samples: i64,
    /// Rule demotion: consecutive rejections that kill auto-apply.
    #[serde(default = "default_demotion_streak")]
    pub demotion_streak: i64,
    #[serde(default)]
    pub signal_weights: SignalWeights,
}

fn default_auto_link_threshold() -> f64 {
    0.90
}

fn default_review_threshold() -> f64 {
    0.50
}

fn default_tie_epsilon() -> f64 {
    0.02
}

fn default_auto_apply_threshold() -> f64 {
    0.90
}

fn default_trivial_fee_floor() -> f64 {
    10_000.0
}

fn default_fee_tolerance_abs() -> f64 {
    1_000.0
}

fn default_fee_tolerance_rel() -> f64 {
    0.005
}

fn default_invoice_grace_days() -> i64 {
    30
}

fn default_snooze_days() -> i64 {
    14
}

fn default_promotion_accuracy() -> f64 {
    0.90
}

fn default_promotion_min_samples() -> i64 {
    20
}

fn default_demotion_streak() -> i64 {
    3
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_link_threshold: default_auto_link_threshold(),
            review_threshold: default_review_threshold(),
            tie_epsilon: default_tie_epsilon(),
            auto_apply_threshold: default_auto_apply_threshold(),
            trivial_fee_floor: default_trivial_fee_floor(),
            fee_tolerance_abs: default_fee_tolerance_abs(),
            fee_tolerance_rel: default_fee_tolerance_rel(),
            invoice_grace_days: default_invoice_grace_days(),
            snooze_days: default_snooze_days(),
            promotion_accuracy: default_promotion_accuracy(),
            promotion_min_samples: default_promotion_min_samples(),
            demotion_streak: default_demotion_streak(),
            signal_weights: SignalWeights::default(),
        }
    }
}

impl EngineConfig {
    /// Load from `~/.studioops/config.json`, falling back to defaults when
    /// the file does not exist. A file that exists but does not parse is an
    /// error — silently ignoring a typo'd threshold would be worse.
    pub fn load() -> Result<Self, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Home directory not found".to_string()))?;
        Self::load_from(&home.join(".studioops").join("config.json"))
    }

    pub fn load_from(path: &Path) -> Result<Self, EngineError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| EngineError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }
}
