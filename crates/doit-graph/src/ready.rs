//! Ready-work view: open, unblocked, not deferred.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;

use crate::dependency::DepType;
use crate::error::Result;
use crate::filter::IssueFilter;
use crate::issue::{Issue, Status};
use crate::scope::Scope;
use crate::store::codec::{ISSUE_COLUMNS, now, ts};
use crate::store::query::{SqlWhere, page, placeholders};
use crate::store::{Store, query_issues};

/// An issue is blocked while any of its gating edges points at an issue
/// that is not closed. See [`DepType::is_blocking`].
fn unblocked() -> (String, Vec<Value>) {
    let gating: Vec<Value> = DepType::ALL
        .into_iter()
        .filter(DepType::is_blocking)
        .map(|kind| Value::Text(kind.as_str().to_string()))
        .collect();
    let sql = format!(
        "NOT EXISTS (\
         SELECT 1 FROM dependencies b JOIN issues t ON t.id = b.depends_on_id \
         WHERE b.issue_id = i.id AND b.type IN ({}) AND t.status <> 'closed')",
        placeholders(gating.len())
    );
    (sql, gating)
}

const NOT_DEFERRED: &str = "(i.defer_until IS NULL OR i.defer_until <= ?)";

impl Store {
    /// Ready issues ordered by priority then age. The filter's predicates
    /// and paging apply; its sort order does not.
    pub fn list_ready(&self, scope: &Scope, filter: &IssueFilter) -> Result<Vec<Issue>> {
        self.list_ready_at(scope, filter, now())
    }

    /// [`Store::list_ready`] evaluated at a fixed instant.
    pub fn list_ready_at(
        &self,
        scope: &Scope,
        filter: &IssueFilter,
        at: DateTime<Utc>,
    ) -> Result<Vec<Issue>> {
        let tenant_id = scope.tenant_id("list_ready")?;
        let mut clause = SqlWhere::scoped(tenant_id, scope.projects());
        clause.push("i.status = ?", [Value::Text(Status::Open.as_str().to_string())]);
        let (unblocked, gating) = unblocked();
        clause.push(&unblocked, gating);
        clause.push(NOT_DEFERRED, [Value::Text(ts(&at))]);
        clause.predicates(&filter.predicates)?;

        let mut sql = format!(
            "SELECT {ISSUE_COLUMNS} FROM issues i{} ORDER BY i.priority ASC, i.created_at ASC, i.id ASC",
            clause.render()
        );
        let mut params = clause.into_params();
        sql.push_str(&page(&mut params, filter.limit, filter.offset));
        let ready = self.with_conn(|conn| query_issues(conn, &sql, params))?;
        tracing::debug!(count = ready.len(), "computed ready work");
        Ok(ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{IssueUpdate, NewIssue};
    use chrono::Duration;

    fn ids(issues: Vec<Issue>) -> Vec<String> {
        issues.into_iter().map(|i| i.id).collect()
    }

    fn seeded() -> (Store, Scope) {
        let store = Store::open_in_memory().unwrap();
        let tenant = store.create_tenant("Acme", "acme").unwrap();
        (store, Scope::tenant(tenant.id))
    }

    #[test]
    fn ready_respects_blocking_deps() {
        let (store, scope) = seeded();
        for id in ["doit-a", "doit-b"] {
            store.create_issue(&scope, NewIssue::new(id, id)).unwrap();
        }
        store
            .add_dependency(&scope, "doit-a", "doit-b", DepType::Blocks, "me")
            .unwrap();
        assert_eq!(
            ids(store.list_ready(&scope, &IssueFilter::new()).unwrap()),
            vec!["doit-b"]
        );

        store
            .update_issue(&scope, "doit-b", IssueUpdate::status(Status::Closed), "me")
            .unwrap();
        assert_eq!(
            ids(store.list_ready(&scope, &IssueFilter::new()).unwrap()),
            vec!["doit-a"]
        );
    }

    #[test]
    fn informational_edges_do_not_gate() {
        let (store, scope) = seeded();
        for id in ["doit-a", "doit-b"] {
            store.create_issue(&scope, NewIssue::new(id, id)).unwrap();
        }
        store
            .add_dependency(&scope, "doit-a", "doit-b", DepType::WaitsFor, "me")
            .unwrap();
        assert_eq!(
            store.list_ready(&scope, &IssueFilter::new()).unwrap().len(),
            2
        );
    }

    #[test]
    fn deferral_hides_until_reached() {
        let (store, scope) = seeded();
        let t0 = now();
        store
            .create_issue(
                &scope,
                NewIssue {
                    defer_until: Some(t0 + Duration::hours(6)),
                    ..NewIssue::new("doit-d", "later")
                },
            )
            .unwrap();
        let filter = IssueFilter::new();
        assert!(store.list_ready_at(&scope, &filter, t0).unwrap().is_empty());
        assert_eq!(
            ids(store
                .list_ready_at(&scope, &filter, t0 + Duration::hours(6))
                .unwrap()),
            vec!["doit-d"]
        );
    }

    #[test]
    fn ordering_is_priority_then_age() {
        let (store, scope) = seeded();
        for (id, priority) in [("doit-p2", 2), ("doit-p0", 0), ("doit-p2b", 2)] {
            store
                .create_issue(
                    &scope,
                    NewIssue {
                        priority: Some(priority),
                        ..NewIssue::new(id, id)
                    },
                )
                .unwrap();
        }
        assert_eq!(
            ids(store.list_ready(&scope, &IssueFilter::new().limit(2)).unwrap()),
            vec!["doit-p0", "doit-p2"]
        );
    }
}
