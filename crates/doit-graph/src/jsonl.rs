//! JSONL export: one line per non-ephemeral issue.
//!
//! Each line is the issue with its labels plus its outgoing dependency
//! edges, ordered by issue ID so repeated exports diff cleanly.

use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::dependency::Dependency;
use crate::error::{Result, StoreError};
use crate::issue::Issue;
use crate::scope::Scope;
use crate::store::Store;
use crate::store::codec::{DEPENDENCY_COLUMNS, ISSUE_COLUMNS, dependency_from_row};
use crate::store::query::SqlWhere;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    #[serde(flatten)]
    pub issue: Issue,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
}

/// Parses an export stream. Blank lines are skipped.
pub fn read_records(reader: impl BufRead) -> Result<Vec<ExportRecord>> {
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = serde_json::from_str(trimmed).map_err(|e| {
            StoreError::validation(format!("export line {}: {e}", line_no + 1))
        })?;
        records.push(record);
    }
    Ok(records)
}

impl Store {
    /// Writes the tenant's exportable issues; returns how many were written.
    pub fn export_jsonl(&self, scope: &Scope, writer: &mut impl Write) -> Result<usize> {
        let records = self.export_records(scope)?;
        for record in &records {
            serde_json::to_writer(&mut *writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        tracing::info!(count = records.len(), "exported issues");
        Ok(records.len())
    }

    /// Export to `path` via a temp file and rename, so readers never see a
    /// partial file.
    pub fn export_jsonl_to_path(&self, scope: &Scope, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = tmp_write_path(path);
        let written = (|| -> Result<usize> {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            let count = self.export_jsonl(scope, &mut writer)?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
            Ok(count)
        })();
        let count = match written {
            Ok(count) => count,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(err);
            }
        };
        if let Err(err) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err.into());
        }
        Ok(count)
    }

    fn export_records(&self, scope: &Scope) -> Result<Vec<ExportRecord>> {
        let tenant_id = scope.tenant_id("export_jsonl")?;
        let mut clause = SqlWhere::scoped(tenant_id, scope.projects());
        clause.push("i.ephemeral = 0", std::iter::empty());
        let sql = format!(
            "SELECT {ISSUE_COLUMNS} FROM issues i{} ORDER BY i.id ASC",
            clause.render()
        );
        self.with_conn(|conn| {
            let issues = crate::store::query_issues(conn, &sql, clause.into_params())?;

            let mut edges: HashMap<String, Vec<Dependency>> = HashMap::new();
            let mut stmt = conn.prepare(&format!(
                "SELECT {DEPENDENCY_COLUMNS} FROM dependencies d \
                 WHERE EXISTS (SELECT 1 FROM issues s WHERE s.id = d.issue_id AND s.tenant_id = ?1) \
                 ORDER BY d.issue_id, d.depends_on_id"
            ))?;
            let rows = stmt.query_map(params![tenant_id.to_string()], dependency_from_row)?;
            for row in rows {
                let dep = row?;
                edges.entry(dep.issue_id.clone()).or_default().push(dep);
            }

            Ok(issues
                .into_iter()
                .map(|issue| ExportRecord {
                    dependencies: edges.remove(&issue.id).unwrap_or_default(),
                    issue,
                })
                .collect())
        })
    }
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{}", std::process::id(), uuid::Uuid::new_v4().simple()));
    PathBuf::from(tmp)
}
