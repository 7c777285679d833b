use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use super::codec::{get_ts, ts};
use super::{Store, ensure_issue};
use crate::error::Result;
use crate::issue::{CompactionLevel, CompactionSnapshot, Issue};
use crate::scope::Scope;

/// Records `issue`'s current text as the snapshot for `level`.
/// `UNIQUE(issue_id, level)` rejects a second write for the same level.
pub(crate) fn insert_snapshot(
    conn: &Connection,
    issue: &Issue,
    level: CompactionLevel,
    summary: &str,
    at: &DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO compaction_snapshots
            (issue_id, level, title, description, design, acceptance_criteria, notes, summary, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            issue.id,
            level,
            issue.title,
            issue.description,
            issue.design,
            issue.acceptance_criteria,
            issue.notes,
            summary,
            ts(at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Store {
    /// Ordered by level.
    pub fn compaction_snapshots(
        &self,
        scope: &Scope,
        issue_id: &str,
    ) -> Result<Vec<CompactionSnapshot>> {
        let tenant_id = scope.tenant_id("compaction_snapshots")?;
        self.with_conn(|conn| {
            ensure_issue(conn, tenant_id, issue_id)?;
            let mut stmt = conn.prepare(
                r#"
                SELECT id, issue_id, level, title, description, design,
                       acceptance_criteria, notes, summary, created_at
                FROM compaction_snapshots WHERE issue_id = ?1 ORDER BY level ASC
                "#,
            )?;
            let rows = stmt.query_map(params![issue_id], |row| {
                Ok(CompactionSnapshot {
                    id: row.get("id")?,
                    issue_id: row.get("issue_id")?,
                    level: row.get("level")?,
                    title: row.get("title")?,
                    description: row.get("description")?,
                    design: row.get("design")?,
                    acceptance_criteria: row.get("acceptance_criteria")?,
                    notes: row.get("notes")?,
                    summary: row.get("summary")?,
                    created_at: get_ts(row, "created_at")?,
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }
}
