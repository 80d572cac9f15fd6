//! Feedback event log (append-only) and candidate-rule rows.

use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::model::{Decision, TargetKind};

use super::{AuditDb, DbCandidateRule, DbError, DbFeedbackEvent};

fn map_event_row(row: &Row) -> rusqlite::Result<DbFeedbackEvent> {
    Ok(DbFeedbackEvent {
        id: row.get(0)?,
        target_kind: row.get(1)?,
        target_id: row.get(2)?,
        rule_id: row.get(3)?,
        decision: row.get(4)?,
        context: row.get(5)?,
        confidence_before: row.get(6)?,
        confidence_after: row.get(7)?,
        created_at: row.get(8)?,
    })
}

const EVENT_COLS: &str = "id, target_kind, target_id, rule_id, decision, context,
     confidence_before, confidence_after, created_at";

impl AuditDb {
    /// Append a feedback event. Events are immutable once written; there is
    /// deliberately no update or delete counterpart.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_feedback_event(
        &self,
        target_kind: TargetKind,
        target_id: &str,
        rule_id: &str,
        decision: Decision,
        context: Option<&str>,
        confidence_before: Option<f64>,
        confidence_after: Option<f64>,
    ) -> Result<DbFeedbackEvent, DbError> {
        let id = format!("fb-{}", Uuid::new_v4());
        let created_at = Self::now();
        self.conn_ref().execute(
            "INSERT INTO feedback_events (id, target_kind, target_id, rule_id, decision,
                context, confidence_before, confidence_after, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                target_kind.as_str(),
                target_id,
                rule_id,
                decision.as_str(),
                context,
                confidence_before,
                confidence_after,
                created_at
            ],
        )?;
        Ok(DbFeedbackEvent {
            id,
            target_kind: target_kind.as_str().to_string(),
            target_id: target_id.to_string(),
            rule_id: rule_id.to_string(),
            decision: decision.as_str().to_string(),
            context: context.map(|s| s.to_string()),
            confidence_before,
            confidence_after,
            created_at,
        })
    }

    /// All events for one rule in log order — the recompute input.
    pub fn get_feedback_events_for_rule(
        &self,
        rule_id: &str,
    ) -> Result<Vec<DbFeedbackEvent>, DbError> {
        let sql = format!(
            "SELECT {} FROM feedback_events WHERE rule_id = ?1 ORDER BY rowid",
            EVENT_COLS
        );
        let mut stmt = self.conn_ref().prepare(&sql)?;
        let rows = stmt.query_map(params![rule_id], map_event_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Events that carry free-text context, in log order — the mining input.
    pub fn get_feedback_events_with_context(&self) -> Result<Vec<DbFeedbackEvent>, DbError> {
        let sql = format!(
            "SELECT {} FROM feedback_events
             WHERE context IS NOT NULL AND TRIM(context) != ''
             ORDER BY rowid",
            EVENT_COLS
        );
        let mut stmt = self.conn_ref().prepare(&sql)?;
        let rows = stmt.query_map([], map_event_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    // -- candidate rules ---------------------------------------------------

    /// Record (or refresh) a mined candidate rule, keyed by fingerprint.
    pub fn upsert_candidate_rule(
        &self,
        fingerprint: &str,
        suggested_name: &str,
        description: &str,
        support_count: i64,
        event_ids: &[String],
    ) -> Result<(), DbError> {
        let now = Self::now();
        self.conn_ref().execute(
            "INSERT INTO candidate_rules (id, fingerprint, suggested_name, description,
                support_count, event_ids, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT (fingerprint) DO UPDATE SET
                support_count = excluded.support_count,
                description = excluded.description,
                event_ids = excluded.event_ids,
                updated_at = excluded.updated_at",
            params![
                format!("cand-{}", Uuid::new_v4()),
                fingerprint,
                suggested_name,
                description,
                support_count,
                serde_json::to_string(event_ids).unwrap_or_else(|_| "[]".into()),
                now
            ],
        )?;
        Ok(())
    }

    pub fn get_candidate_rules(&self) -> Result<Vec<DbCandidateRule>, DbError> {
        let mut stmt = self.conn_ref().prepare(
            "SELECT id, fingerprint, suggested_name, description, support_count, event_ids,
                    created_at, updated_at
             FROM candidate_rules ORDER BY support_count DESC, suggested_name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DbCandidateRule {
                id: row.get(0)?,
                fingerprint: row.get(1)?,
                suggested_name: row.get(2)?,
                description: row.get(3)?,
                support_count: row.get(4)?,
                event_ids: row.get(5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn get_candidate_rule_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<DbCandidateRule>, DbError> {
        Ok(self
            .conn_ref()
            .query_row(
                "SELECT id, fingerprint, suggested_name, description, support_count, event_ids,
                        created_at, updated_at
                 FROM candidate_rules WHERE fingerprint = ?1",
                params![fingerprint],
                |row| {
                    Ok(DbCandidateRule {
                        id: row.get(0)?,
                        fingerprint: row.get(1)?,
                        suggested_name: row.get(2)?,
                        description: row.get(3)?,
                        support_count: row.get(4)?,
                        event_ids: row.get(5)?,
                        created_at: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                },
            )
            .optional()?)
    }
}
