use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::codec::{ISSUE_COLUMNS, now, opt_ts, ts};
use super::query::{SqlWhere, order_by, page};
use super::{Store, annotations, ensure_issue, ensure_project, load_issue, query_issues};
use crate::dependency::DepType;
use crate::error::{Result, StoreError};
use crate::filter::IssueFilter;
use crate::ids::{IdTable, allocate_in};
use crate::issue::{
    DEFAULT_PRIORITY, EventType, Issue, IssueUpdate, NewEvent, NewIssue, Status, content_hash_of,
    validate_priority,
};
use crate::scope::Scope;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: Status,
    pub count: u64,
}

impl Store {
    /// Inserts the issue, its optional parent edge, its labels and a
    /// `created` event in one transaction.
    ///
    /// An empty `input.id` allocates a hash ID with the configured prefix.
    pub fn create_issue(&self, scope: &Scope, mut input: NewIssue) -> Result<Issue> {
        let tenant_id = scope.tenant_id("create_issue")?;
        let prefix = self.config().id_prefix.clone();
        let issue = self.with_tx(|tx| {
            if input.id.trim().is_empty() {
                input.id = allocate_in(tx, IdTable::Issues, tenant_id, &prefix)?;
            }
            insert_issue(tx, tenant_id, &input)
        })?;
        tracing::info!(
            issue_id = %issue.id,
            issue_type = %issue.issue_type,
            parent = issue.parent_id.as_deref().unwrap_or(""),
            "issue created"
        );
        Ok(issue)
    }

    pub fn get_issue(&self, scope: &Scope, id: &str) -> Result<Issue> {
        let tenant_id = scope.tenant_id("get_issue")?;
        tracing::debug!(issue_id = id, "get issue");
        self.with_conn(|conn| load_issue(conn, tenant_id, id))
    }

    /// Applies only the present fields; refreshes `updated_at` and the
    /// content hash; closing stamps `closed_at`, reopening clears it.
    pub fn update_issue(
        &self,
        scope: &Scope,
        id: &str,
        update: IssueUpdate,
        actor: &str,
    ) -> Result<Issue> {
        let tenant_id = scope.tenant_id("update_issue")?;
        if let Some(title) = &update.title
            && title.trim().is_empty()
        {
            return Err(StoreError::validation("title cannot be empty"));
        }
        if let Some(priority) = update.priority {
            validate_priority(priority)?;
        }

        let issue = self.with_tx(|tx| {
            let mut issue = load_issue(tx, tenant_id, id)?;
            if update.is_empty() {
                return Ok(issue);
            }
            let at = now();
            let old_status = issue.status;
            let changed = apply_update(&mut issue, update);

            if issue.status != old_status {
                let event = match (old_status, issue.status) {
                    (_, Status::Closed) => {
                        issue.closed_at = Some(at);
                        EventType::Closed
                    }
                    (Status::Closed, _) => {
                        issue.closed_at = None;
                        EventType::Reopened
                    }
                    _ => EventType::StatusChanged,
                };
                let mut record = NewEvent::new(id, event).actor(actor).values(
                    Some(old_status.as_str().to_string()),
                    Some(issue.status.as_str().to_string()),
                );
                if event == EventType::Closed && !issue.close_reason.is_empty() {
                    record = record.comment(issue.close_reason.clone());
                }
                annotations::insert_event(tx, &record, &at)?;
            }
            if !changed.is_empty() {
                annotations::insert_event(
                    tx,
                    &NewEvent::new(id, EventType::Updated)
                        .actor(actor)
                        .values(None, Some(changed.join(","))),
                    &at,
                )?;
            }

            issue.updated_at = at;
            issue.content_hash = issue.compute_content_hash();
            write_issue(tx, &issue)?;
            load_issue(tx, tenant_id, id)
        })?;

        tracing::info!(issue_id = id, status = %issue.status, "issue updated");
        Ok(issue)
    }

    pub fn list_issues(&self, scope: &Scope, filter: &IssueFilter) -> Result<Vec<Issue>> {
        let tenant_id = scope.tenant_id("list_issues")?;
        let mut clause = SqlWhere::scoped(tenant_id, scope.projects());
        clause.predicates(&filter.predicates)?;
        let mut sql = format!(
            "SELECT {ISSUE_COLUMNS} FROM issues i{}{}",
            clause.render(),
            order_by(filter.sort)
        );
        let mut params = clause.into_params();
        sql.push_str(&page(&mut params, filter.limit, filter.offset));
        let issues = self.with_conn(|conn| query_issues(conn, &sql, params))?;
        tracing::debug!(count = issues.len(), sort = filter.sort.as_str(), "listed issues");
        Ok(issues)
    }

    /// Removes the issue with its edges (both directions), labels,
    /// comments, events and snapshots. Child counters are kept.
    pub fn delete_issue(&self, scope: &Scope, id: &str) -> Result<()> {
        let tenant_id = scope.tenant_id("delete_issue")?;
        self.with_tx(|tx| {
            ensure_issue(tx, tenant_id, id)?;
            tx.execute(
                "DELETE FROM dependencies WHERE issue_id = ?1 OR depends_on_id = ?1",
                params![id],
            )?;
            for table in ["labels", "comments", "events", "compaction_snapshots"] {
                tx.execute(&format!("DELETE FROM {table} WHERE issue_id = ?1"), params![id])?;
            }
            tx.execute("DELETE FROM issues WHERE id = ?1", params![id])?;
            Ok(())
        })?;
        tracing::info!(issue_id = id, "issue deleted");
        Ok(())
    }

    /// One entry per status, zero counts included.
    pub fn count_issues_by_status(&self, scope: &Scope) -> Result<Vec<StatusCount>> {
        let tenant_id = scope.tenant_id("count_issues_by_status")?;
        let clause = SqlWhere::scoped(tenant_id, scope.projects());
        let sql = format!(
            "SELECT i.status, COUNT(*) FROM issues i{} GROUP BY i.status",
            clause.render()
        );
        let counted: Vec<(Status, i64)> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(clause.into_params()), |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })?;
        Ok(Status::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: counted
                    .iter()
                    .find(|(s, _)| *s == status)
                    .and_then(|(_, c)| u64::try_from(*c).ok())
                    .unwrap_or(0),
            })
            .collect())
    }
}

/// Validates and inserts `input` with its parent edge, labels and
/// `created` event. Runs inside the caller's transaction.
pub(crate) fn insert_issue(conn: &Connection, tenant_id: Uuid, input: &NewIssue) -> Result<Issue> {
    let id = input.id.trim();
    if id.is_empty() {
        return Err(StoreError::validation("issue id is required"));
    }
    let title = input.title.trim();
    if title.is_empty() {
        return Err(StoreError::validation("title is required"));
    }
    let priority = validate_priority(input.priority.unwrap_or(DEFAULT_PRIORITY))?;
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM issues WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    if exists {
        return Err(StoreError::validation(format!("issue id already exists: {id}")));
    }
    if let Some(project_id) = input.project_id {
        ensure_project(conn, tenant_id, project_id)?;
    }
    if let Some(parent_id) = &input.parent_id {
        ensure_issue(conn, tenant_id, parent_id)?;
    }

    let at = now();
    let stamp = ts(&at);
    let closed_at = (input.status == Status::Closed).then(|| stamp.clone());
    let hash = content_hash_of(
        title,
        &input.description,
        &input.design,
        &input.acceptance_criteria,
        &input.notes,
    );
    conn.execute(
        r#"
        INSERT INTO issues (
            id, tenant_id, project_id, title, description, design,
            acceptance_criteria, notes, content_hash, status, priority,
            issue_type, assignee, owner, created_by, created_at, updated_at,
            closed_at, due_at, defer_until, ephemeral
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                  ?15, ?16, ?16, ?17, ?18, ?19, ?20)
        "#,
        params![
            id,
            tenant_id.to_string(),
            input.project_id.map(|p| p.to_string()),
            title,
            input.description,
            input.design,
            input.acceptance_criteria,
            input.notes,
            hash.as_str(),
            input.status,
            priority,
            input.issue_type,
            input.assignee,
            input.owner,
            input.created_by,
            stamp,
            closed_at,
            opt_ts(input.due_at.as_ref()),
            opt_ts(input.defer_until.as_ref()),
            input.ephemeral,
        ],
    )?;

    if let Some(parent_id) = &input.parent_id {
        conn.execute(
            r#"
            INSERT INTO dependencies (issue_id, depends_on_id, type, created_at, created_by)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![id, parent_id, DepType::ParentChild, stamp, input.created_by],
        )?;
    }
    for label in normalize_labels(&input.labels) {
        conn.execute(
            "INSERT OR IGNORE INTO labels (issue_id, label) VALUES (?1, ?2)",
            params![id, label],
        )?;
    }
    annotations::insert_event(
        conn,
        &NewEvent::new(id, EventType::Created)
            .actor(&input.created_by)
            .values(None, Some(title.to_string())),
        &at,
    )?;
    load_issue(conn, tenant_id, id)
}

/// Applies present fields, returning the names of non-status fields that
/// actually changed.
fn apply_update(issue: &mut Issue, update: IssueUpdate) -> Vec<&'static str> {
    let mut changed = Vec::new();

    macro_rules! set {
        ($field:ident, $value:expr) => {
            if let Some(value) = $value
                && issue.$field != value
            {
                issue.$field = value;
                changed.push(stringify!($field));
            }
        };
    }

    set!(title, update.title.map(|t| t.trim().to_string()));
    set!(description, update.description);
    set!(design, update.design);
    set!(acceptance_criteria, update.acceptance_criteria);
    set!(notes, update.notes);
    set!(priority, update.priority);
    set!(assignee, update.assignee);
    set!(owner, update.owner);
    set!(due_at, update.due_at);
    set!(defer_until, update.defer_until);
    set!(close_reason, update.close_reason);
    set!(pinned, update.pinned);
    set!(external_ref, update.external_ref);

    if let Some(status) = update.status {
        issue.status = status;
    }
    changed
}

/// Full-row write of the mutable columns.
pub(crate) fn write_issue(conn: &Connection, issue: &Issue) -> Result<()> {
    conn.execute(
        r#"
        UPDATE issues SET
            title = ?2, description = ?3, design = ?4, acceptance_criteria = ?5,
            notes = ?6, content_hash = ?7, status = ?8, priority = ?9,
            assignee = ?10, owner = ?11, updated_at = ?12, closed_at = ?13,
            due_at = ?14, defer_until = ?15, close_reason = ?16, external_ref = ?17,
            compaction_level = ?18, compacted_at = ?19, pinned = ?20
        WHERE id = ?1
        "#,
        params![
            issue.id,
            issue.title,
            issue.description,
            issue.design,
            issue.acceptance_criteria,
            issue.notes,
            issue.content_hash.as_str(),
            issue.status,
            issue.priority,
            issue.assignee,
            issue.owner,
            ts(&issue.updated_at),
            opt_ts(issue.closed_at.as_ref()),
            opt_ts(issue.due_at.as_ref()),
            opt_ts(issue.defer_until.as_ref()),
            issue.close_reason,
            issue.external_ref,
            issue.compaction_level,
            opt_ts(issue.compacted_at.as_ref()),
            issue.pinned,
        ],
    )?;
    Ok(())
}

pub(crate) fn normalize_labels(labels: &[String]) -> BTreeSet<String> {
    labels
        .iter()
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Predicate, SortOrder};
    use crate::issue::IssueType;

    fn store_with_tenant() -> (Store, Scope) {
        let store = Store::open_in_memory().unwrap();
        let tenant = store.create_tenant("Acme", "acme").unwrap();
        (store, Scope::tenant(tenant.id))
    }

    #[test]
    fn create_then_get_round_trips_fields() {
        let (store, scope) = store_with_tenant();
        let created = store
            .create_issue(
                &scope,
                NewIssue {
                    labels: vec!["backend".into(), " backend ".into(), "".into()],
                    priority: Some(1),
                    issue_type: IssueType::Bug,
                    ..NewIssue::new("doit-abc", "  Fix login  ")
                },
            )
            .unwrap();
        assert_eq!(created.title, "Fix login");
        assert_eq!(created.labels, vec!["backend".to_string()]);
        assert_eq!(created.compaction_level.as_u8(), 0);
        assert_eq!(created.content_hash, created.compute_content_hash());

        let fetched = store.get_issue(&scope, "doit-abc").unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn create_rejects_bad_input() {
        let (store, scope) = store_with_tenant();
        let err = store
            .create_issue(&scope, NewIssue::new("doit-a", "   "))
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let err = store
            .create_issue(
                &scope,
                NewIssue {
                    priority: Some(7),
                    ..NewIssue::new("doit-a", "t")
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let err = store
            .create_issue(
                &scope,
                NewIssue {
                    project_id: Some(Uuid::new_v4()),
                    ..NewIssue::new("doit-a", "t")
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "project", .. }));

        store
            .create_issue(&scope, NewIssue::new("doit-a", "t"))
            .unwrap();
        let err = store
            .create_issue(&scope, NewIssue::new("doit-a", "again"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn create_with_missing_parent_writes_nothing() {
        let (store, scope) = store_with_tenant();
        let err = store
            .create_issue(
                &scope,
                NewIssue {
                    parent_id: Some("doit-nope".into()),
                    labels: vec!["x".into()],
                    ..NewIssue::new("doit-child", "child")
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "issue", .. }));
        assert!(matches!(
            store.get_issue(&scope, "doit-child"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn update_changes_only_present_fields() {
        let (store, scope) = store_with_tenant();
        let original = store
            .create_issue(
                &scope,
                NewIssue {
                    description: "desc".into(),
                    assignee: "alice".into(),
                    ..NewIssue::new("doit-u1", "Title")
                },
            )
            .unwrap();
        let updated = store
            .update_issue(
                &scope,
                "doit-u1",
                IssueUpdate {
                    notes: Some("more".into()),
                    ..IssueUpdate::default()
                },
                "bob",
            )
            .unwrap();
        assert_eq!(updated.title, "Title");
        assert_eq!(updated.assignee, "alice");
        assert_eq!(updated.description, "desc");
        assert_eq!(updated.notes, "more");
        assert_ne!(updated.content_hash, original.content_hash);
        assert!(updated.updated_at >= original.updated_at);
    }

    #[test]
    fn closing_stamps_and_reopening_clears_closed_at() {
        let (store, scope) = store_with_tenant();
        store
            .create_issue(&scope, NewIssue::new("doit-c1", "close me"))
            .unwrap();
        let closed = store
            .update_issue(
                &scope,
                "doit-c1",
                IssueUpdate {
                    status: Some(Status::Closed),
                    close_reason: Some("done".into()),
                    ..IssueUpdate::default()
                },
                "alice",
            )
            .unwrap();
        assert!(closed.closed_at.is_some());
        assert_eq!(closed.close_reason, "done");

        let reopened = store
            .update_issue(&scope, "doit-c1", IssueUpdate::status(Status::Open), "alice")
            .unwrap();
        assert!(reopened.closed_at.is_none());

        let kinds: Vec<EventType> = store
            .list_events(&scope, "doit-c1", 10)
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventType::Reopened,
                EventType::Updated,
                EventType::Closed,
                EventType::Created
            ]
        );
    }

    #[test]
    fn list_applies_predicates_sort_and_paging() {
        let (store, scope) = store_with_tenant();
        for (id, priority, assignee) in [
            ("doit-l1", 3, "alice"),
            ("doit-l2", 0, "bob"),
            ("doit-l3", 1, "alice"),
        ] {
            store
                .create_issue(
                    &scope,
                    NewIssue {
                        priority: Some(priority),
                        assignee: assignee.into(),
                        ..NewIssue::new(id, format!("issue {id}"))
                    },
                )
                .unwrap();
        }
        let by_priority: Vec<String> = store
            .list_issues(&scope, &IssueFilter::new().sort(SortOrder::Priority))
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(by_priority, vec!["doit-l2", "doit-l3", "doit-l1"]);

        let alice = store
            .list_issues(
                &scope,
                &IssueFilter::new()
                    .assignee("alice")
                    .sort(SortOrder::Priority)
                    .limit(1)
                    .offset(1),
            )
            .unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].id, "doit-l1");

        let excluded = store
            .list_issues(
                &scope,
                &IssueFilter::new().with(Predicate::ExcludeStatuses(vec![Status::Open])),
            )
            .unwrap();
        assert!(excluded.is_empty());
    }

    #[test]
    fn hybrid_sort_prefers_recently_touched_within_priority() {
        let (store, scope) = store_with_tenant();
        for (id, priority) in [("doit-x", 2), ("doit-y", 2), ("doit-z", 0)] {
            store
                .create_issue(
                    &scope,
                    NewIssue {
                        priority: Some(priority),
                        ..NewIssue::new(id, id)
                    },
                )
                .unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        store
            .update_issue(
                &scope,
                "doit-x",
                IssueUpdate {
                    notes: Some("touched".into()),
                    ..IssueUpdate::default()
                },
                "me",
            )
            .unwrap();

        let hybrid: Vec<String> = store
            .list_issues(&scope, &IssueFilter::new().sort(SortOrder::Hybrid))
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(hybrid, vec!["doit-z", "doit-x", "doit-y"]);
    }

    #[test]
    fn counts_cover_every_status() {
        let (store, scope) = store_with_tenant();
        store
            .create_issue(&scope, NewIssue::new("doit-n1", "a"))
            .unwrap();
        let counts = store.count_issues_by_status(&scope).unwrap();
        assert_eq!(counts.len(), Status::ALL.len());
        assert_eq!(counts[0], StatusCount { status: Status::Open, count: 1 });
        assert!(counts[1..].iter().all(|c| c.count == 0));
    }

    #[test]
    fn unbound_scope_is_a_scope_error() {
        let store = Store::open_in_memory().unwrap();
        let err = store
            .list_issues(&Scope::unbound(), &IssueFilter::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::Scope { operation: "list_issues" }));
    }
}
