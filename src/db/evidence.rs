//! Evidence rows: intake with `source_id` dedup, plus the reads the
//! resolver and pipeline passes work from.

use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::evidence::{Amount, Evidence};
use crate::model::SourceType;

use super::{AuditDb, DbError, DbEvidence};

fn map_evidence_row(row: &Row) -> rusqlite::Result<DbEvidence> {
    Ok(DbEvidence {
        id: row.get(0)?,
        source_type: row.get(1)?,
        source_id: row.get(2)?,
        code_candidates: row.get(3)?,
        name_tokens: row.get(4)?,
        keywords: row.get(5)?,
        amounts: row.get(6)?,
        dates: row.get(7)?,
        created_at: row.get(8)?,
    })
}

const EVIDENCE_COLS: &str =
    "id, source_type, source_id, code_candidates, name_tokens, keywords, amounts, dates, created_at";

impl AuditDb {
    /// Persist a normalized evidence record, assigning an `ev-` id.
    ///
    /// Re-ingesting an already-seen `source_id` is a no-op that returns the
    /// existing id — evidence is an immutable snapshot of its artifact.
    pub fn insert_evidence(&self, evidence: &Evidence) -> Result<String, DbError> {
        if let Some(existing) = self.get_evidence_by_source_id(&evidence.source_id)? {
            return Ok(existing.id);
        }

        let id = format!("ev-{}", Uuid::new_v4());
        self.conn_ref().execute(
            "INSERT INTO evidence (id, source_type, source_id, code_candidates, name_tokens,
                keywords, amounts, dates, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                evidence.source_type.as_str(),
                evidence.source_id,
                serde_json::to_string(&evidence.code_candidates).unwrap_or_else(|_| "[]".into()),
                serde_json::to_string(&evidence.name_tokens).unwrap_or_else(|_| "[]".into()),
                serde_json::to_string(&evidence.keywords).unwrap_or_else(|_| "[]".into()),
                serde_json::to_string(&evidence.amounts).unwrap_or_else(|_| "[]".into()),
                serde_json::to_string(&evidence.dates).unwrap_or_else(|_| "[]".into()),
                Self::now(),
            ],
        )?;
        Ok(id)
    }

    pub fn get_evidence(&self, id: &str) -> Result<Option<DbEvidence>, DbError> {
        let sql = format!("SELECT {} FROM evidence WHERE id = ?1", EVIDENCE_COLS);
        Ok(self
            .conn_ref()
            .query_row(&sql, params![id], map_evidence_row)
            .optional()?)
    }

    pub fn get_evidence_by_source_id(&self, source_id: &str) -> Result<Option<DbEvidence>, DbError> {
        let sql = format!("SELECT {} FROM evidence WHERE source_id = ?1", EVIDENCE_COLS);
        Ok(self
            .conn_ref()
            .query_row(&sql, params![source_id], map_evidence_row)
            .optional()?)
    }

    /// Evidence without a confirmed link, oldest first — the working set for
    /// a resolve pass. Items with only open (pending/auto) links are included
    /// so re-resolving can update them against a grown project store.
    pub fn get_unconfirmed_evidence(&self) -> Result<Vec<DbEvidence>, DbError> {
        let sql = format!(
            "SELECT {} FROM evidence e
             WHERE NOT EXISTS (
                SELECT 1 FROM links l
                WHERE l.evidence_id = e.id AND l.status = 'confirmed'
             )
             ORDER BY e.created_at, e.id",
            EVIDENCE_COLS
        );
        let mut stmt = self.conn_ref().prepare(&sql)?;
        let rows = stmt.query_map([], map_evidence_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl DbEvidence {
    /// Rehydrate the canonical `Evidence` value from a row. Malformed JSON
    /// in a column degrades to an empty field, mirroring the normalizer's
    /// never-fail contract.
    pub fn to_evidence(&self) -> Evidence {
        Evidence {
            source_type: SourceType::parse(&self.source_type).unwrap_or(SourceType::Document),
            source_id: self.source_id.clone(),
            code_candidates: serde_json::from_str(&self.code_candidates).unwrap_or_default(),
            name_tokens: serde_json::from_str(&self.name_tokens).unwrap_or_default(),
            keywords: serde_json::from_str(&self.keywords).unwrap_or_default(),
            amounts: serde_json::from_str::<Vec<Amount>>(&self.amounts).unwrap_or_default(),
            dates: serde_json::from_str(&self.dates).unwrap_or_default(),
        }
    }
}
