//! Maintenance sweep: wake snoozed suggestions, retry unlinked evidence,
//! audit every project, mine feedback for candidate rules.
//!
//! Usage: `audit_sweep [DB_PATH]`. Without an argument the default database
//! at `~/.studioops/studioops.db` is used. Intended to run from cron or a
//! task scheduler; everything interesting goes to the log.

use std::path::PathBuf;
use std::process::ExitCode;

use log::{error, info};

use studioops::{pipeline, AuditDb, EngineConfig};

fn run() -> Result<(), studioops::EngineError> {
    let config = EngineConfig::load()?;
    let db = match std::env::args().nth(1) {
        Some(path) => AuditDb::open_at(PathBuf::from(path))?,
        None => AuditDb::open()?,
    };

    let report = pipeline::run_sweep(&db, &config, None)?;
    info!(
        "sweep done: {} evidence ({} auto-linked, {} queued, {} unmatched), \
         {} projects audited ({} open suggestions, {} auto-applied, {} pruned), \
         {} woken, {} candidate rules, {} failures",
        report.evidence_processed,
        report.auto_linked,
        report.queued_for_review,
        report.unmatched,
        report.projects_audited,
        report.suggestions_open,
        report.auto_applied,
        report.suggestions_pruned,
        report.woken,
        report.candidate_rules_proposed,
        report.failures,
    );

    let summary = studioops::reporting::engine_summary(&db)?;
    info!(
        "{} rules, {} auto-apply-enabled, {:.0}% avg accuracy, queues: {} links / {} suggestions",
        summary.rules_total,
        summary.rules_auto_apply,
        summary.avg_accuracy * 100.0,
        summary.pending_links,
        summary.pending_suggestions,
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("sweep failed: {err}");
            ExitCode::FAILURE
        }
    }
}
