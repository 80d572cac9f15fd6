//! Suggestion rows and the idempotence semantics the auditor relies on.
//!
//! Per `(project, kind)` there is at most one open row. Re-running a check
//! updates that row in place; a terminal row with the same fingerprint
//! suppresses re-insertion (no oscillation); anything else inserts fresh.

use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::model::{SuggestionKind, SuggestionStatus};

use super::{AuditDb, DbError, DbSuggestion};

fn map_suggestion_row(row: &Row) -> rusqlite::Result<DbSuggestion> {
    Ok(DbSuggestion {
        id: row.get(0)?,
        project_id: row.get(1)?,
        kind: row.get(2)?,
        detail: row.get(3)?,
        proposed_fix: row.get(4)?,
        confidence: row.get(5)?,
        fingerprint: row.get(6)?,
        rule_id: row.get(7)?,
        status: row.get(8)?,
        snoozed_until: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

const SUGGESTION_COLS: &str = "id, project_id, kind, detail, proposed_fix, confidence,
     fingerprint, rule_id, status, snoozed_until, created_at, updated_at";

/// A freshly computed finding, before persistence decides its fate.
#[derive(Debug, Clone)]
pub struct NewSuggestion {
    pub project_id: Option<String>,
    pub kind: SuggestionKind,
    pub detail: String,
    pub proposed_fix: serde_json::Value,
    pub confidence: f64,
    pub fingerprint: String,
}

impl AuditDb {
    /// Persist a computed finding under the idempotence rules.
    ///
    /// Returns the id of the open/new row, or None when a prior terminal or
    /// auto-applied row with the same fingerprint already settled this
    /// finding.
    pub fn upsert_suggestion(
        &self,
        finding: &NewSuggestion,
        auto_apply: bool,
    ) -> Result<Option<String>, DbError> {
        // An open row for the same (project, kind) is updated in place.
        // unknown_project_code rows have no project; they key on fingerprint.
        let open = match finding.project_id.as_deref() {
            Some(project_id) => self.get_open_suggestion(project_id, finding.kind)?,
            None => self.get_open_orphan_suggestion(finding.kind, &finding.fingerprint)?,
        };

        if let Some(existing) = open {
            self.conn_ref().execute(
                "UPDATE suggestions SET detail = ?1, proposed_fix = ?2, confidence = ?3,
                    fingerprint = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    finding.detail,
                    finding.proposed_fix.to_string(),
                    finding.confidence,
                    finding.fingerprint,
                    Self::now(),
                    existing.id
                ],
            )?;
            return Ok(Some(existing.id));
        }

        // A settled row with the same fingerprint means the humans (or the
        // auto-apply path) already dealt with exactly this finding.
        if self.fingerprint_settled(&finding.fingerprint)? {
            return Ok(None);
        }

        let status = if auto_apply {
            SuggestionStatus::AutoApplied
        } else {
            SuggestionStatus::Pending
        };
        let id = format!("sug-{}", Uuid::new_v4());
        let now = Self::now();
        self.conn_ref().execute(
            "INSERT INTO suggestions (id, project_id, kind, detail, proposed_fix, confidence,
                fingerprint, rule_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                id,
                finding.project_id,
                finding.kind.as_str(),
                finding.detail,
                finding.proposed_fix.to_string(),
                finding.confidence,
                finding.fingerprint,
                finding.kind.rule_id(),
                status.as_str(),
                now,
                now
            ],
        )?;
        Ok(Some(id))
    }

    pub fn get_suggestion(&self, id: &str) -> Result<Option<DbSuggestion>, DbError> {
        let sql = format!("SELECT {} FROM suggestions WHERE id = ?1", SUGGESTION_COLS);
        Ok(self
            .conn_ref()
            .query_row(&sql, params![id], map_suggestion_row)
            .optional()?)
    }

    pub fn get_open_suggestion(
        &self,
        project_id: &str,
        kind: SuggestionKind,
    ) -> Result<Option<DbSuggestion>, DbError> {
        let sql = format!(
            "SELECT {} FROM suggestions
             WHERE project_id = ?1 AND kind = ?2 AND status IN ('pending', 'snoozed')",
            SUGGESTION_COLS
        );
        Ok(self
            .conn_ref()
            .query_row(&sql, params![project_id, kind.as_str()], map_suggestion_row)
            .optional()?)
    }

    fn get_open_orphan_suggestion(
        &self,
        kind: SuggestionKind,
        fingerprint: &str,
    ) -> Result<Option<DbSuggestion>, DbError> {
        let sql = format!(
            "SELECT {} FROM suggestions
             WHERE project_id IS NULL AND kind = ?1 AND fingerprint = ?2
               AND status IN ('pending', 'snoozed')",
            SUGGESTION_COLS
        );
        Ok(self
            .conn_ref()
            .query_row(&sql, params![kind.as_str(), fingerprint], map_suggestion_row)
            .optional()?)
    }

    fn fingerprint_settled(&self, fingerprint: &str) -> Result<bool, DbError> {
        let count: i64 = self.conn_ref().query_row(
            "SELECT COUNT(*) FROM suggestions
             WHERE fingerprint = ?1 AND status IN ('accepted', 'rejected', 'auto_applied')",
            params![fingerprint],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// The review queue: every pending suggestion, most confident first.
    pub fn get_pending_suggestions(&self) -> Result<Vec<DbSuggestion>, DbError> {
        let sql = format!(
            "SELECT {} FROM suggestions WHERE status = 'pending'
             ORDER BY confidence DESC, created_at, id",
            SUGGESTION_COLS
        );
        let mut stmt = self.conn_ref().prepare(&sql)?;
        let rows = stmt.query_map([], map_suggestion_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn get_open_suggestions_for_project(
        &self,
        project_id: &str,
    ) -> Result<Vec<DbSuggestion>, DbError> {
        let sql = format!(
            "SELECT {} FROM suggestions
             WHERE project_id = ?1 AND status IN ('pending', 'snoozed')
             ORDER BY kind",
            SUGGESTION_COLS
        );
        let mut stmt = self.conn_ref().prepare(&sql)?;
        let rows = stmt.query_map(params![project_id], map_suggestion_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Delete open rows for kinds a fresh audit no longer produced — the
    /// underlying data was fixed, so the finding evaporates. Terminal rows
    /// stay for the audit trail.
    pub fn prune_open_suggestions(
        &self,
        project_id: &str,
        kinds_kept: &[SuggestionKind],
    ) -> Result<usize, DbError> {
        let mut pruned = 0;
        for row in self.get_open_suggestions_for_project(project_id)? {
            let keep = SuggestionKind::parse(&row.kind)
                .map(|k| kinds_kept.contains(&k))
                .unwrap_or(false);
            if !keep {
                self.conn_ref()
                    .execute("DELETE FROM suggestions WHERE id = ?1", params![row.id])?;
                pruned += 1;
            }
        }
        Ok(pruned)
    }

    pub fn set_suggestion_status(
        &self,
        id: &str,
        status: SuggestionStatus,
        snoozed_until: Option<&str>,
    ) -> Result<(), DbError> {
        self.conn_ref().execute(
            "UPDATE suggestions SET status = ?1, snoozed_until = ?2, updated_at = ?3
             WHERE id = ?4",
            params![status.as_str(), snoozed_until, Self::now(), id],
        )?;
        Ok(())
    }

    /// Return snoozed suggestions whose cool-down has elapsed to pending.
    pub fn wake_snoozed_suggestions(&self, now: &str) -> Result<usize, DbError> {
        let woken = self.conn_ref().execute(
            "UPDATE suggestions SET status = 'pending', snoozed_until = NULL, updated_at = ?1
             WHERE status = 'snoozed' AND snoozed_until IS NOT NULL AND snoozed_until <= ?1",
            params![now],
        )?;
        Ok(woken)
    }
}
