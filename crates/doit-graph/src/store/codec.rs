//! Column encodings shared by the store modules.
//!
//! Timestamps are fixed-width RFC 3339 UTC text (microsecond precision) so
//! lexical order equals chronological order. UUIDs are hyphenated text.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use uuid::Uuid;

use crate::content_hash::ContentHash;
use crate::dependency::{DepType, Dependency};
use crate::issue::{CompactionLevel, EventType, Issue, IssueType, Status};

pub(crate) fn ts(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn opt_ts(value: Option<&DateTime<Utc>>) -> Option<String> {
    value.map(ts)
}

/// Current time truncated to the stored precision.
pub(crate) fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::parse_from_rfc3339(&ts(&now))
        .map(|parsed| parsed.with_timezone(&Utc))
        .unwrap_or(now)
}

/// Text timestamp column.
pub(crate) struct SqlTs(pub DateTime<Utc>);

impl FromSql for SqlTs {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|parsed| SqlTs(parsed.with_timezone(&Utc)))
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Text UUID column.
pub(crate) struct SqlUuid(pub Uuid);

impl FromSql for SqlUuid {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        Uuid::parse_str(raw)
            .map(SqlUuid)
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

pub(crate) fn get_ts(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    row.get::<_, SqlTs>(column).map(|v| v.0)
}

pub(crate) fn get_opt_ts(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<SqlTs>>(column).map(|v| v.map(|v| v.0))
}

pub(crate) fn get_uuid(row: &Row<'_>, column: &str) -> rusqlite::Result<Uuid> {
    row.get::<_, SqlUuid>(column).map(|v| v.0)
}

pub(crate) fn get_opt_uuid(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<Uuid>> {
    row.get::<_, Option<SqlUuid>>(column).map(|v| v.map(|v| v.0))
}

macro_rules! text_enum_sql {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToSql for $ty {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_str()))
                }
            }

            impl FromSql for $ty {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    value
                        .as_str()?
                        .parse()
                        .map_err(|e: crate::error::StoreError| FromSqlError::Other(Box::new(e)))
                }
            }
        )*
    };
}

text_enum_sql!(Status, IssueType, DepType, EventType);

impl ToSql for CompactionLevel {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(self.as_u8())))
    }
}

impl FromSql for CompactionLevel {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_i64()?;
        let byte = u8::try_from(raw).map_err(|_| FromSqlError::OutOfRange(raw))?;
        CompactionLevel::try_from(byte).map_err(|_| FromSqlError::OutOfRange(raw))
    }
}

/// Column list for issue reads; the table is aliased `i`.
pub(crate) const ISSUE_COLUMNS: &str = r#"
    i.id, i.tenant_id, i.project_id, i.title, i.description, i.design,
    i.acceptance_criteria, i.notes, i.content_hash, i.status, i.priority,
    i.issue_type, i.assignee, i.owner, i.created_by, i.created_at,
    i.updated_at, i.closed_at, i.due_at, i.defer_until, i.close_reason,
    i.external_ref, i.compaction_level, i.compacted_at, i.ephemeral, i.pinned,
    (SELECT d.depends_on_id FROM dependencies d
      WHERE d.issue_id = i.id AND d.type = 'parent-child'
      ORDER BY d.created_at LIMIT 1) AS parent_id
"#;

/// Maps a row selected with [`ISSUE_COLUMNS`]. Labels are attached later.
pub(crate) fn issue_from_row(row: &Row<'_>) -> rusqlite::Result<Issue> {
    Ok(Issue {
        id: row.get("id")?,
        tenant_id: get_uuid(row, "tenant_id")?,
        project_id: get_opt_uuid(row, "project_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        design: row.get("design")?,
        acceptance_criteria: row.get("acceptance_criteria")?,
        notes: row.get("notes")?,
        content_hash: ContentHash(row.get("content_hash")?),
        status: row.get("status")?,
        priority: row.get("priority")?,
        issue_type: row.get("issue_type")?,
        assignee: row.get("assignee")?,
        owner: row.get("owner")?,
        created_by: row.get("created_by")?,
        created_at: get_ts(row, "created_at")?,
        updated_at: get_ts(row, "updated_at")?,
        closed_at: get_opt_ts(row, "closed_at")?,
        due_at: get_opt_ts(row, "due_at")?,
        defer_until: get_opt_ts(row, "defer_until")?,
        close_reason: row.get("close_reason")?,
        external_ref: row.get("external_ref")?,
        compaction_level: row.get("compaction_level")?,
        compacted_at: get_opt_ts(row, "compacted_at")?,
        ephemeral: row.get("ephemeral")?,
        pinned: row.get("pinned")?,
        labels: Vec::new(),
        parent_id: row.get("parent_id")?,
    })
}

pub(crate) const DEPENDENCY_COLUMNS: &str =
    "issue_id, depends_on_id, type, created_at, created_by, thread_id";

pub(crate) fn dependency_from_row(row: &Row<'_>) -> rusqlite::Result<Dependency> {
    Ok(Dependency {
        issue_id: row.get("issue_id")?,
        depends_on_id: row.get("depends_on_id")?,
        dep_type: row.get("type")?,
        created_at: get_ts(row, "created_at")?,
        created_by: row.get("created_by")?,
        thread_id: row.get("thread_id")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_are_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let fractional = whole + chrono::Duration::microseconds(5);
        assert_eq!(ts(&whole), "2026-03-01T12:00:00.000000Z");
        assert_eq!(ts(&whole).len(), ts(&fractional).len());
        assert!(ts(&whole) < ts(&fractional));
    }

    #[test]
    fn now_round_trips_through_text() {
        let now = now();
        let parsed = DateTime::parse_from_rfc3339(&ts(&now)).unwrap();
        assert_eq!(parsed.with_timezone(&Utc), now);
    }
}
