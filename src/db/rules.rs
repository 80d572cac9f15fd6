//! Rule rows. Seeded by the baseline migration; mutated only by the rule
//! adapter's recompute, never deleted.

use rusqlite::{params, OptionalExtension, Row};

use super::{AuditDb, DbError, DbRule};

fn map_rule_row(row: &Row) -> rusqlite::Result<DbRule> {
    Ok(DbRule {
        id: row.get(0)?,
        label: row.get(1)?,
        description: row.get(2)?,
        times_confirmed: row.get(3)?,
        times_rejected: row.get(4)?,
        accuracy: row.get(5)?,
        auto_apply_enabled: row.get::<_, i64>(6)? != 0,
        updated_at: row.get(7)?,
    })
}

const RULE_COLS: &str = "id, label, description, times_confirmed, times_rejected, accuracy,
     auto_apply_enabled, updated_at";

impl AuditDb {
    pub fn get_rule(&self, id: &str) -> Result<Option<DbRule>, DbError> {
        let sql = format!("SELECT {} FROM rules WHERE id = ?1", RULE_COLS);
        Ok(self
            .conn_ref()
            .query_row(&sql, params![id], map_rule_row)
            .optional()?)
    }

    pub fn get_all_rules(&self) -> Result<Vec<DbRule>, DbError> {
        let sql = format!("SELECT {} FROM rules ORDER BY id", RULE_COLS);
        let mut stmt = self.conn_ref().prepare(&sql)?;
        let rows = stmt.query_map([], map_rule_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Whether auto-apply is currently earned for a rule. Unknown rule ids
    /// answer false — never auto-apply on a rule we can't account for.
    pub fn rule_allows_auto_apply(&self, id: &str) -> Result<bool, DbError> {
        Ok(self
            .get_rule(id)?
            .map(|r| r.auto_apply_enabled)
            .unwrap_or(false))
    }

    /// Write back the result of a recompute. Called only by the rule
    /// adapter, which derives every field from the feedback event log.
    pub fn update_rule_stats(
        &self,
        id: &str,
        times_confirmed: i64,
        times_rejected: i64,
        accuracy: f64,
        auto_apply_enabled: bool,
    ) -> Result<(), DbError> {
        self.conn_ref().execute(
            "UPDATE rules SET times_confirmed = ?1, times_rejected = ?2, accuracy = ?3,
                auto_apply_enabled = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                times_confirmed,
                times_rejected,
                accuracy,
                auto_apply_enabled as i64,
                Self::now(),
                id
            ],
        )?;
        Ok(())
    }
}
