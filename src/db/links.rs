//! Link rows: evidence→project candidates and their decision states.
//!
//! The resolver owns open rows (`pending_review`/`auto_linked`) and may
//! rewrite them on every pass; `confirmed`/`rejected` rows belong to the
//! human record and are never touched here beyond explicit status updates
//! from the ledger.

use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::model::LinkStatus;

use super::{AuditDb, DbError, DbLink};

fn map_link_row(row: &Row) -> rusqlite::Result<DbLink> {
    Ok(DbLink {
        id: row.get(0)?,
        evidence_id: row.get(1)?,
        project_id: row.get(2)?,
        confidence: row.get(3)?,
        rule_id: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const LINK_COLS: &str =
    "id, evidence_id, project_id, confidence, rule_id, status, created_at, updated_at";

impl AuditDb {
    /// Create or refresh a resolver candidate for `(evidence, project)`.
    ///
    /// An existing open row is updated in place (confidence, rule, status);
    /// an existing terminal row wins and is left untouched. Returns the id
    /// of the row that now represents the pair, or None when a terminal row
    /// blocked the write.
    pub fn upsert_candidate_link(
        &self,
        evidence_id: &str,
        project_id: &str,
        confidence: f64,
        rule_id: &str,
        status: LinkStatus,
    ) -> Result<Option<String>, DbError> {
        if let Some(existing) = self.get_link_for_pair(evidence_id, project_id)? {
            let existing_status = LinkStatus::parse(&existing.status);
            if existing_status.map(|s| s.is_terminal()).unwrap_or(false) {
                return Ok(None);
            }
            self.conn_ref().execute(
                "UPDATE links SET confidence = ?1, rule_id = ?2, status = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![confidence, rule_id, status.as_str(), Self::now(), existing.id],
            )?;
            return Ok(Some(existing.id));
        }

        let id = format!("lnk-{}", Uuid::new_v4());
        let now = Self::now();
        self.conn_ref().execute(
            "INSERT INTO links (id, evidence_id, project_id, confidence, rule_id, status,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                evidence_id,
                project_id,
                confidence,
                rule_id,
                status.as_str(),
                now,
                now
            ],
        )?;
        Ok(Some(id))
    }

    pub fn get_link(&self, id: &str) -> Result<Option<DbLink>, DbError> {
        let sql = format!("SELECT {} FROM links WHERE id = ?1", LINK_COLS);
        Ok(self
            .conn_ref()
            .query_row(&sql, params![id], map_link_row)
            .optional()?)
    }

    pub fn get_link_for_pair(
        &self,
        evidence_id: &str,
        project_id: &str,
    ) -> Result<Option<DbLink>, DbError> {
        let sql = format!(
            "SELECT {} FROM links WHERE evidence_id = ?1 AND project_id = ?2",
            LINK_COLS
        );
        Ok(self
            .conn_ref()
            .query_row(&sql, params![evidence_id, project_id], map_link_row)
            .optional()?)
    }

    pub fn get_links_for_evidence(&self, evidence_id: &str) -> Result<Vec<DbLink>, DbError> {
        let sql = format!(
            "SELECT {} FROM links WHERE evidence_id = ?1 ORDER BY confidence DESC, id",
            LINK_COLS
        );
        let mut stmt = self.conn_ref().prepare(&sql)?;
        let rows = stmt.query_map(params![evidence_id], map_link_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// The review queue: every pending link, strongest first.
    pub fn get_pending_links(&self) -> Result<Vec<DbLink>, DbError> {
        let sql = format!(
            "SELECT {} FROM links WHERE status = 'pending_review'
             ORDER BY confidence DESC, created_at, id",
            LINK_COLS
        );
        let mut stmt = self.conn_ref().prepare(&sql)?;
        let rows = stmt.query_map([], map_link_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Links pointing at one project, strongest first.
    pub fn get_links_for_project(&self, project_id: &str) -> Result<Vec<DbLink>, DbError> {
        let sql = format!(
            "SELECT {} FROM links WHERE project_id = ?1 ORDER BY confidence DESC, id",
            LINK_COLS
        );
        let mut stmt = self.conn_ref().prepare(&sql)?;
        let rows = stmt.query_map(params![project_id], map_link_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Drop open candidates for this evidence that a fresh resolve no longer
    /// produced. Terminal rows are never deleted.
    pub fn prune_open_links(
        &self,
        evidence_id: &str,
        keep_project_ids: &[String],
    ) -> Result<usize, DbError> {
        let mut pruned = 0;
        for link in self.get_links_for_evidence(evidence_id)? {
            let open = LinkStatus::parse(&link.status)
                .map(|s| !s.is_terminal())
                .unwrap_or(false);
            if open && !keep_project_ids.contains(&link.project_id) {
                self.conn_ref()
                    .execute("DELETE FROM links WHERE id = ?1", params![link.id])?;
                pruned += 1;
            }
        }
        Ok(pruned)
    }

    pub fn set_link_status(&self, id: &str, status: LinkStatus) -> Result<(), DbError> {
        self.conn_ref().execute(
            "UPDATE links SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), Self::now(), id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;

    #[test]
    fn test_upsert_updates_open_row_in_place() {
        let db = test_db();
        let first = db
            .upsert_candidate_link("ev-1", "proj-1", 0.62, "match.name_overlap", LinkStatus::PendingReview)
            .expect("insert")
            .expect("id");
        let second = db
            .upsert_candidate_link("ev-1", "proj-1", 0.71, "match.amount_proximity", LinkStatus::PendingReview)
            .expect("update")
            .expect("id");
        assert_eq!(first, second);

        let link = db.get_link(&first).expect("query").expect("found");
        assert!((link.confidence - 0.71).abs() < 1e-9);
        assert_eq!(link.rule_id, "match.amount_proximity");

        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM links", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_upsert_never_touches_terminal_row() {
        let db = test_db();
        let id = db
            .upsert_candidate_link("ev-1", "proj-1", 0.85, "match.project_code", LinkStatus::PendingReview)
            .expect("insert")
            .expect("id");
        db.set_link_status(&id, LinkStatus::Rejected).expect("reject");

        let blocked = db
            .upsert_candidate_link("ev-1", "proj-1", 0.95, "match.project_code", LinkStatus::AutoLinked)
            .expect("upsert");
        assert!(blocked.is_none(), "terminal row blocks the resolver");

        let link = db.get_link(&id).expect("query").expect("found");
        assert_eq!(link.status, "rejected");
        assert!((link.confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_prune_open_links_keeps_terminal_and_named() {
        let db = test_db();
        let keep = db
            .upsert_candidate_link("ev-1", "proj-a", 0.7, "match.name_overlap", LinkStatus::PendingReview)
            .unwrap()
            .unwrap();
        db.upsert_candidate_link("ev-1", "proj-b", 0.6, "match.name_overlap", LinkStatus::PendingReview)
            .unwrap()
            .unwrap();
        let confirmed = db
            .upsert_candidate_link("ev-1", "proj-c", 0.9, "match.project_code", LinkStatus::PendingReview)
            .unwrap()
            .unwrap();
        db.set_link_status(&confirmed, LinkStatus::Confirmed).unwrap();

        let pruned = db
            .prune_open_links("ev-1", &["proj-a".to_string()])
            .expect("prune");
        assert_eq!(pruned, 1, "only proj-b goes");

        let remaining = db.get_links_for_evidence("ev-1").expect("query");
        let ids: Vec<&str> = remaining.iter().map(|l| l.id.as_str()).collect();
        assert!(ids.contains(&keep.as_str()));
        assert!(ids.contains(&confirmed.as_str()));
        assert_eq!(remaining.len(), 2);
    }
}
