use rusqlite::{Connection, params};

use super::codec::{DEPENDENCY_COLUMNS, dependency_from_row, now, ts};
use super::{Store, annotations, ensure_issue};
use crate::dependency::{DepType, Dependency, Direction};
use crate::error::{Result, StoreError};
use crate::issue::{EventType, NewEvent};
use crate::scope::Scope;

/// Inserts or retypes the edge. Both endpoints must already be checked.
pub(crate) fn upsert_dependency(
    conn: &Connection,
    issue_id: &str,
    depends_on_id: &str,
    dep_type: DepType,
    actor: &str,
    thread_id: Option<&str>,
) -> Result<Dependency> {
    let at = now();
    conn.execute(
        r#"
        INSERT INTO dependencies (issue_id, depends_on_id, type, created_at, created_by, thread_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT (issue_id, depends_on_id) DO UPDATE SET
            type = excluded.type,
            created_by = excluded.created_by,
            thread_id = excluded.thread_id
        "#,
        params![issue_id, depends_on_id, dep_type, ts(&at), actor, thread_id],
    )?;
    annotations::insert_event(
        conn,
        &NewEvent::new(issue_id, EventType::DependencyAdded)
            .actor(actor)
            .values(None, Some(format!("{dep_type}:{depends_on_id}"))),
        &at,
    )?;
    let sql = format!(
        "SELECT {DEPENDENCY_COLUMNS} FROM dependencies WHERE issue_id = ?1 AND depends_on_id = ?2"
    );
    Ok(conn.query_row(&sql, params![issue_id, depends_on_id], dependency_from_row)?)
}

impl Store {
    /// Upsert: re-adding an existing pair overwrites its type.
    pub fn add_dependency(
        &self,
        scope: &Scope,
        issue_id: &str,
        depends_on_id: &str,
        dep_type: DepType,
        actor: &str,
    ) -> Result<Dependency> {
        let tenant_id = scope.tenant_id("add_dependency")?;
        if issue_id == depends_on_id {
            return Err(StoreError::validation(format!(
                "issue cannot depend on itself: {issue_id}"
            )));
        }
        let dep = self.with_tx(|tx| {
            ensure_issue(tx, tenant_id, issue_id)?;
            ensure_issue(tx, tenant_id, depends_on_id)?;
            upsert_dependency(tx, issue_id, depends_on_id, dep_type, actor, None)
        })?;
        tracing::info!(
            issue_id,
            depends_on_id,
            dep_type = dep_type.as_str(),
            "dependency added"
        );
        Ok(dep)
    }

    /// Idempotent. Returns whether an edge was removed.
    pub fn remove_dependency(
        &self,
        scope: &Scope,
        issue_id: &str,
        depends_on_id: &str,
        actor: &str,
    ) -> Result<bool> {
        let tenant_id = scope.tenant_id("remove_dependency")?;
        let removed = self.with_tx(|tx| {
            ensure_issue(tx, tenant_id, issue_id)?;
            let removed = tx.execute(
                "DELETE FROM dependencies WHERE issue_id = ?1 AND depends_on_id = ?2",
                params![issue_id, depends_on_id],
            )?;
            if removed > 0 {
                annotations::insert_event(
                    tx,
                    &NewEvent::new(issue_id, EventType::DependencyRemoved)
                        .actor(actor)
                        .values(Some(depends_on_id.to_string()), None),
                    &now(),
                )?;
            }
            Ok(removed > 0)
        })?;
        if removed {
            tracing::info!(issue_id, depends_on_id, "dependency removed");
        }
        Ok(removed)
    }

    /// `Upstream`: edges out of the issue. `Downstream`: edges into it.
    pub fn list_dependencies(
        &self,
        scope: &Scope,
        issue_id: &str,
        direction: Direction,
    ) -> Result<Vec<Dependency>> {
        let tenant_id = scope.tenant_id("list_dependencies")?;
        let predicate = match direction {
            Direction::Upstream => "issue_id = ?1",
            Direction::Downstream => "depends_on_id = ?1",
            Direction::Both => "(issue_id = ?1 OR depends_on_id = ?1)",
        };
        let sql = format!(
            "SELECT {DEPENDENCY_COLUMNS} FROM dependencies WHERE {predicate} \
             ORDER BY created_at ASC, issue_id ASC, depends_on_id ASC"
        );
        self.with_conn(|conn| {
            ensure_issue(conn, tenant_id, issue_id)?;
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![issue_id], dependency_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::NewIssue;

    fn seeded(ids: &[&str]) -> (Store, Scope) {
        let store = Store::open_in_memory().unwrap();
        let tenant = store.create_tenant("Acme", "acme").unwrap();
        let scope = Scope::tenant(tenant.id);
        for id in ids {
            store
                .create_issue(&scope, NewIssue::new(*id, format!("issue {id}")))
                .unwrap();
        }
        (store, scope)
    }

    #[test]
    fn re_adding_overwrites_type() {
        let (store, scope) = seeded(&["doit-a", "doit-b"]);
        store
            .add_dependency(&scope, "doit-a", "doit-b", DepType::Related, "me")
            .unwrap();
        let dep = store
            .add_dependency(&scope, "doit-a", "doit-b", DepType::Blocks, "me")
            .unwrap();
        assert_eq!(dep.dep_type, DepType::Blocks);
        let deps = store
            .list_dependencies(&scope, "doit-a", Direction::Upstream)
            .unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].dep_type, DepType::Blocks);
    }

    #[test]
    fn self_and_dangling_edges_are_rejected() {
        let (store, scope) = seeded(&["doit-a"]);
        let err = store
            .add_dependency(&scope, "doit-a", "doit-a", DepType::Blocks, "me")
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        let err = store
            .add_dependency(&scope, "doit-a", "doit-zz", DepType::Blocks, "me")
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn removal_is_idempotent() {
        let (store, scope) = seeded(&["doit-a", "doit-b"]);
        store
            .add_dependency(&scope, "doit-a", "doit-b", DepType::Blocks, "me")
            .unwrap();
        assert!(store.remove_dependency(&scope, "doit-a", "doit-b", "me").unwrap());
        assert!(!store.remove_dependency(&scope, "doit-a", "doit-b", "me").unwrap());
    }

    #[test]
    fn direction_selects_edge_side() {
        let (store, scope) = seeded(&["doit-a", "doit-b", "doit-c"]);
        store
            .add_dependency(&scope, "doit-a", "doit-b", DepType::Blocks, "me")
            .unwrap();
        store
            .add_dependency(&scope, "doit-c", "doit-a", DepType::Tracks, "me")
            .unwrap();
        let up = store
            .list_dependencies(&scope, "doit-a", Direction::Upstream)
            .unwrap();
        let down = store
            .list_dependencies(&scope, "doit-a", Direction::Downstream)
            .unwrap();
        let both = store
            .list_dependencies(&scope, "doit-a", Direction::Both)
            .unwrap();
        assert_eq!(up.len(), 1);
        assert_eq!(up[0].depends_on_id, "doit-b");
        assert_eq!(down.len(), 1);
        assert_eq!(down[0].issue_id, "doit-c");
        assert_eq!(both.len(), 2);
    }
}
