//! Page-audit collaborator glue and report files.

use crate::config::AuditSettings;
use crate::session::{Session, SessionError, SessionReport};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

/// External tool that loads the page and produces a performance report.
#[async_trait]
pub trait Auditor: Send + Sync {
    async fn audit(&self, url: &str, settings: &AuditSettings) -> anyhow::Result<serde_json::Value>;
}

/// Normalises a domain argument: a bare host without any `.` (e.g. `localhost`)
/// gets a trailing `/`.
pub fn navigation_target(domain: &str) -> String {
    let domain = domain.trim();
    if !domain.ends_with('/') && !domain.contains('.') {
        format!("{}/", domain)
    } else {
        domain.to_string()
    }
}

/// `https://<target>`
pub fn navigation_url(target: &str) -> String {
    format!("https://{}", target)
}

/// `report-<target with '/' as '-'>.json`
pub fn report_file_name(target: &str) -> String {
    format!("report-{}.json", target.replace('/', "-").trim())
}

/// Writes `report` pretty-printed into `data_dir`, returning its path.
pub fn write_report(
    data_dir: &Path,
    target: &str,
    report: &serde_json::Value,
) -> Result<PathBuf, SessionError> {
    let path = data_dir.join(report_file_name(target));
    let json = serde_json::to_string_pretty(report)?;
    fs::create_dir_all(data_dir)
        .and_then(|_| fs::write(&path, json))
        .map_err(|source| SessionError::Report {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

/// Audits the session's page, lets in-flight images settle, writes the report,
/// then resolves the session. A failed navigation still gets its report written.
pub async fn run_audit(
    session: &Session,
    auditor: &dyn Auditor,
    target: &str,
    data_dir: &Path,
) -> Result<SessionReport, SessionError> {
    let settings = session.config().audit_settings();
    let report = auditor
        .audit(session.navigation_url(), &settings)
        .await
        .map_err(SessionError::Audit)?;
    session.settle().await;

    let path = write_report(data_dir, target, &report)?;
    tracing::info!(path = %path.display(), "audit report written");

    session.finish()
}
