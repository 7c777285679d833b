//! Memory decay for aged closed issues.
//!
//! Level 0 keeps full text. Past the closed-age threshold an issue drops to
//! level 1 (summary plus acceptance criteria); past twice the threshold it
//! drops to level 2 (summary only). Each transition first snapshots the text
//! it is about to overwrite and commits on its own.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::issue::{CompactionLevel, EventType, Issue, NewEvent, Status};
use crate::scope::Scope;
use crate::store::annotations::insert_event;
use crate::store::codec::{get_ts, now, ts};
use crate::store::issues::write_issue;
use crate::store::snapshots::insert_snapshot;
use crate::store::{Store, load_issue};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactResult {
    pub issue_id: String,
    pub old_level: CompactionLevel,
    pub new_level: CompactionLevel,
}

/// Level an issue closed at `closed_at` should be at by `now`.
pub fn target_level(
    closed_at: DateTime<Utc>,
    now: DateTime<Utc>,
    threshold: Duration,
) -> CompactionLevel {
    let age = now - closed_at;
    if age > threshold * 2 {
        CompactionLevel::Minimal
    } else if age > threshold {
        CompactionLevel::Summarized
    } else {
        CompactionLevel::Full
    }
}

/// `[type] title`, then (level 1 only) the first two description lines,
/// then `Closed: <reason>`, joined by ` | `.
pub fn generate_summary(issue: &Issue, level: CompactionLevel) -> String {
    let mut parts = vec![format!("[{}] {}", issue.issue_type, issue.title)];
    if level == CompactionLevel::Summarized {
        let lead = issue
            .description
            .lines()
            .take(2)
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(" ");
        let lead = lead.trim();
        if !lead.is_empty() {
            parts.push(lead.to_string());
        }
    }
    if !issue.close_reason.is_empty() {
        parts.push(format!("Closed: {}", issue.close_reason));
    }
    parts.join(" | ")
}

/// Stored-form timestamp `multiple * threshold` before `at`. Empty when out
/// of range, which no stored timestamp sorts below.
fn cutoff(at: DateTime<Utc>, threshold: Duration, multiple: i32) -> String {
    threshold
        .checked_mul(multiple)
        .and_then(|span| at.checked_sub_signed(span))
        .map(|t| ts(&t))
        .unwrap_or_default()
}

pub struct Compactor<'a> {
    store: &'a Store,
    batch_size: usize,
}

impl<'a> Compactor<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            batch_size: store.config().compaction.batch_size,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn compact_old(&self, scope: &Scope, threshold: Duration) -> Result<Vec<CompactResult>> {
        self.compact_old_at(scope, threshold, now())
    }

    /// One batch of the oldest-closed issues in the tenant. A failing
    /// transition aborts the rest of the batch; earlier ones stay committed.
    pub fn compact_old_at(
        &self,
        scope: &Scope,
        threshold: Duration,
        at: DateTime<Utc>,
    ) -> Result<Vec<CompactResult>> {
        let tenant_id = scope.tenant_id("compact_old")?;
        // Only issues due for their next level take a batch slot.
        let summarize_before = cutoff(at, threshold, 1);
        let minimize_before = cutoff(at, threshold, 2);
        let candidates = self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, closed_at, compaction_level FROM issues
                WHERE tenant_id = ?1 AND status = ?2 AND closed_at IS NOT NULL
                  AND compaction_level < ?3
                  AND closed_at < ?4
                  AND (compaction_level = ?5 OR closed_at < ?6)
                ORDER BY closed_at ASC, id ASC
                LIMIT ?7
                "#,
            )?;
            let rows = stmt.query_map(
                params![
                    tenant_id.to_string(),
                    Status::Closed,
                    CompactionLevel::Minimal,
                    summarize_before,
                    CompactionLevel::Full,
                    minimize_before,
                    i64::try_from(self.batch_size).unwrap_or(i64::MAX),
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        get_ts(row, "closed_at")?,
                        row.get::<_, CompactionLevel>(2)?,
                    ))
                },
            )?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })?;

        let mut results = Vec::new();
        for (issue_id, closed_at, level) in candidates {
            let target = target_level(closed_at, at, threshold);
            if target <= level {
                continue;
            }
            match self.transition(tenant_id, &issue_id, target, at) {
                Ok(Some(result)) => results.push(result),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(
                        issue_id = %issue_id,
                        error = %err,
                        compacted = results.len(),
                        "compaction batch aborted"
                    );
                    return Err(err);
                }
            }
        }
        tracing::info!(
            compacted = results.len(),
            threshold_hours = threshold.num_hours(),
            "compaction batch finished"
        );
        Ok(results)
    }

    fn transition(
        &self,
        tenant_id: uuid::Uuid,
        issue_id: &str,
        target: CompactionLevel,
        at: DateTime<Utc>,
    ) -> Result<Option<CompactResult>> {
        self.store.with_tx(|tx| {
            let mut issue = load_issue(tx, tenant_id, issue_id)?;
            let old_level = issue.compaction_level;
            if target <= old_level {
                return Ok(None);
            }
            let summary = generate_summary(&issue, target);
            insert_snapshot(tx, &issue, target, &summary, &at)?;

            issue.description = summary;
            issue.design.clear();
            issue.notes.clear();
            if target == CompactionLevel::Minimal {
                issue.acceptance_criteria.clear();
            }
            issue.compaction_level = target;
            issue.compacted_at = Some(at);
            issue.updated_at = at;
            issue.content_hash = issue.compute_content_hash();
            write_issue(tx, &issue)?;
            insert_event(
                tx,
                &NewEvent::new(issue_id, EventType::Compacted)
                    .values(Some(old_level.to_string()), Some(target.to_string())),
                &at,
            )?;
            tracing::debug!(issue_id, from = %old_level, to = %target, "issue compacted");
            Ok(Some(CompactResult {
                issue_id: issue_id.to_string(),
                old_level,
                new_level: target,
            }))
        })
    }
}
