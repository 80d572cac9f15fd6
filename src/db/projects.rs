//! Project store reads, plus upserts used by the importer and tests.
//!
//! The engine itself never creates or deletes a project — it only proposes
//! creation via `unknown_project_code` suggestions. The upserts here exist
//! for the import path and for seeding test fixtures.

use rusqlite::{params, OptionalExtension, Row};

use super::{AuditDb, DbContractTerms, DbDiscipline, DbError, DbFeePhase, DbInvoice, DbProject,
            DbTimelinePhase};

fn map_project_row(row: &Row) -> rusqlite::Result<DbProject> {
    Ok(DbProject {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        client: row.get(3)?,
        contract_fee: row.get(4)?,
        paid_to_date: row.get(5)?,
        outstanding: row.get(6)?,
        status: row.get(7)?,
        parent_id: row.get(8)?,
        contract_term_months: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

const PROJECT_COLS: &str = "id, code, name, client, contract_fee, paid_to_date, outstanding,
     status, parent_id, contract_term_months, created_at, updated_at";

impl AuditDb {
    /// Insert or update a project (importer/test path).
    pub fn upsert_project(&self, project: &DbProject) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT INTO projects (id, code, name, client, contract_fee, paid_to_date,
                outstanding, status, parent_id, contract_term_months, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT (id) DO UPDATE SET
                code = excluded.code,
                name = excluded.name,
                client = excluded.client,
                contract_fee = excluded.contract_fee,
                paid_to_date = excluded.paid_to_date,
                outstanding = excluded.outstanding,
                status = excluded.status,
                parent_id = excluded.parent_id,
                contract_term_months = excluded.contract_term_months,
                updated_at = excluded.updated_at",
            params![
                project.id,
                project.code,
                project.name,
                project.client,
                project.contract_fee,
                project.paid_to_date,
                project.outstanding,
                project.status,
                project.parent_id,
                project.contract_term_months,
                project.created_at,
                project.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_project(&self, id: &str) -> Result<Option<DbProject>, DbError> {
        let sql = format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLS);
        Ok(self
            .conn_ref()
            .query_row(&sql, params![id], map_project_row)
            .optional()?)
    }

    pub fn get_project_by_code(&self, code: &str) -> Result<Option<DbProject>, DbError> {
        let sql = format!("SELECT {} FROM projects WHERE code = ?1", PROJECT_COLS);
        Ok(self
            .conn_ref()
            .query_row(&sql, params![code], map_project_row)
            .optional()?)
    }

    /// All projects, most recently active first — the resolver's tie-break
    /// order.
    pub fn get_all_projects(&self) -> Result<Vec<DbProject>, DbError> {
        let sql = format!(
            "SELECT {} FROM projects ORDER BY updated_at DESC, id",
            PROJECT_COLS
        );
        let mut stmt = self.conn_ref().prepare(&sql)?;
        let rows = stmt.query_map([], map_project_row)?;
        let mut projects = Vec::new();
        for row in rows {
            projects.push(row?);
        }
        Ok(projects)
    }

    // -- sub-records the auditor reads ------------------------------------

    pub fn add_discipline(
        &self,
        project_id: &str,
        discipline: &str,
        fee: Option<f64>,
    ) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT OR REPLACE INTO project_disciplines (project_id, discipline, fee)
             VALUES (?1, ?2, ?3)",
            params![project_id, discipline, fee],
        )?;
        Ok(())
    }

    pub fn get_disciplines(&self, project_id: &str) -> Result<Vec<DbDiscipline>, DbError> {
        let mut stmt = self.conn_ref().prepare(
            "SELECT project_id, discipline, fee FROM project_disciplines
             WHERE project_id = ?1 ORDER BY discipline",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok(DbDiscipline {
                project_id: row.get(0)?,
                discipline: row.get(1)?,
                fee: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn add_fee_phase(
        &self,
        project_id: &str,
        phase: &str,
        fee: f64,
        sort_order: i64,
    ) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT INTO fee_phases (project_id, phase, fee, sort_order) VALUES (?1, ?2, ?3, ?4)",
            params![project_id, phase, fee, sort_order],
        )?;
        Ok(())
    }

    pub fn get_fee_phases(&self, project_id: &str) -> Result<Vec<DbFeePhase>, DbError> {
        let mut stmt = self.conn_ref().prepare(
            "SELECT id, project_id, phase, fee, sort_order FROM fee_phases
             WHERE project_id = ?1 ORDER BY sort_order, id",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok(DbFeePhase {
                id: row.get(0)?,
                project_id: row.get(1)?,
                phase: row.get(2)?,
                fee: row.get(3)?,
                sort_order: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn add_timeline_phase(
        &self,
        project_id: &str,
        phase: &str,
        start_date: Option<&str>,
        end_date: Option<&str>,
        duration_weeks: Option<f64>,
    ) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT INTO timeline_phases (project_id, phase, start_date, end_date, duration_weeks)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![project_id, phase, start_date, end_date, duration_weeks],
        )?;
        Ok(())
    }

    pub fn get_timeline_phases(&self, project_id: &str) -> Result<Vec<DbTimelinePhase>, DbError> {
        let mut stmt = self.conn_ref().prepare(
            "SELECT id, project_id, phase, start_date, end_date, duration_weeks
             FROM timeline_phases WHERE project_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok(DbTimelinePhase {
                id: row.get(0)?,
                project_id: row.get(1)?,
                phase: row.get(2)?,
                start_date: row.get(3)?,
                end_date: row.get(4)?,
                duration_weeks: row.get(5)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn add_invoice(&self, invoice: &DbInvoice) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT OR REPLACE INTO invoices (id, project_id, phase, amount, issued_at, paid_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                invoice.id,
                invoice.project_id,
                invoice.phase,
                invoice.amount,
                invoice.issued_at,
                invoice.paid_at
            ],
        )?;
        Ok(())
    }

    pub fn get_invoices(&self, project_id: &str) -> Result<Vec<DbInvoice>, DbError> {
        let mut stmt = self.conn_ref().prepare(
            "SELECT id, project_id, phase, amount, issued_at, paid_at FROM invoices
             WHERE project_id = ?1 ORDER BY issued_at, id",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok(DbInvoice {
                id: row.get(0)?,
                project_id: row.get(1)?,
                phase: row.get(2)?,
                amount: row.get(3)?,
                issued_at: row.get(4)?,
                paid_at: row.get(5)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn upsert_contract_terms(&self, terms: &DbContractTerms) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT INTO contract_terms (project_id, signed_at, term_months, retainer, notes)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (project_id) DO UPDATE SET
                signed_at = excluded.signed_at,
                term_months = excluded.term_months,
                retainer = excluded.retainer,
                notes = excluded.notes",
            params![
                terms.project_id,
                terms.signed_at,
                terms.term_months,
                terms.retainer,
                terms.notes
            ],
        )?;
        Ok(())
    }

    pub fn get_contract_terms(&self, project_id: &str) -> Result<Option<DbContractTerms>, DbError> {
        Ok(self
            .conn_ref()
            .query_row(
                "SELECT project_id, signed_at, term_months, retainer, notes
                 FROM contract_terms WHERE project_id = ?1",
                params![project_id],
                |row| {
                    Ok(DbContractTerms {
                        project_id: row.get(0)?,
                        signed_at: row.get(1)?,
                        term_months: row.get(2)?,
                        retainer: row.get(3)?,
                        notes: row.get(4)?,
                    })
                },
            )
            .optional()?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;

    fn sample_project(id: &str, code: &str, name: &str) -> DbProject {
        let now = AuditDb::now();
        DbProject {
            id: id.to_string(),
            code: code.to_string(),
            name: name.to_string(),
            client: None,
            contract_fee: None,
            paid_to_date: 0.0,
            outstanding: 0.0,
            status: "proposal".to_string(),
            parent_id: None,
            contract_term_months: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[test]
    fn test_upsert_and_get_by_code() {
        let db = test_db();
        db.upsert_project(&sample_project("proj-1", "23 BK-029", "Mandarin Oriental Bali"))
            .expect("upsert");

        let p = db
            .get_project_by_code("23 BK-029")
            .expect("query")
            .expect("found");
        assert_eq!(p.id, "proj-1");
        assert_eq!(p.name, "Mandarin Oriental Bali");
        assert!(db.get_project_by_code("99 XY-999").expect("query").is_none());
    }

    #[test]
    fn test_upsert_updates_in_place() {
        let db = test_db();
        let mut p = sample_project("proj-1", "23 BK-029", "Old Name");
        db.upsert_project(&p).expect("insert");
        p.name = "New Name".to_string();
        p.contract_fee = Some(550_000.0);
        db.upsert_project(&p).expect("update");

        let got = db.get_project("proj-1").expect("query").expect("found");
        assert_eq!(got.name, "New Name");
        assert_eq!(got.contract_fee, Some(550_000.0));
        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM projects", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_sub_records_round_trip() {
        let db = test_db();
        db.upsert_project(&sample_project("proj-1", "25 BK-030", "Beach Club"))
            .expect("upsert");
        db.add_discipline("proj-1", "landscape", Some(200_000.0)).expect("disc");
        db.add_fee_phase("proj-1", "concept", 100_000.0, 0).expect("fee");
        db.add_timeline_phase("proj-1", "concept", Some("2026-01-01"), Some("2026-02-15"), None)
            .expect("timeline");
        db.add_invoice(&DbInvoice {
            id: "inv-1".to_string(),
            project_id: "proj-1".to_string(),
            phase: Some("concept".to_string()),
            amount: 50_000.0,
            issued_at: Some("2026-02-20".to_string()),
            paid_at: None,
        })
        .expect("invoice");

        assert_eq!(db.get_disciplines("proj-1").unwrap().len(), 1);
        assert_eq!(db.get_fee_phases("proj-1").unwrap().len(), 1);
        assert_eq!(db.get_timeline_phases("proj-1").unwrap().len(), 1);
        assert_eq!(db.get_invoices("proj-1").unwrap().len(), 1);
        assert!(db.get_contract_terms("proj-1").unwrap().is_none());
    }
}
