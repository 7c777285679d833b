//! Bounded hierarchy walk over `parent-child` edges.

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use uuid::Uuid;

use crate::error::Result;
use crate::issue::Issue;
use crate::scope::Scope;
use crate::store::{Store, load_issue};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub issue: Issue,
    /// Hops from the root; the root is 0.
    pub depth: usize,
    /// The node this one was reached from. `None` for the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

fn children_of(conn: &Connection, tenant_id: Uuid, parent_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        r#"
        SELECT d.issue_id FROM dependencies d
        JOIN issues c ON c.id = d.issue_id
        WHERE d.depends_on_id = ?1 AND d.type = 'parent-child' AND c.tenant_id = ?2
        ORDER BY d.issue_id
        "#,
    )?;
    let rows = stmt.query_map(params![parent_id, tenant_id.to_string()], |row| row.get(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
}

impl Store {
    /// Breadth-first from `root_id`, at most `max_depth` hops. Each issue
    /// appears once, at its shallowest depth; cycles terminate.
    ///
    /// Ordered by depth, then priority, then creation time.
    pub fn dependency_tree(
        &self,
        scope: &Scope,
        root_id: &str,
        max_depth: usize,
    ) -> Result<Vec<TreeNode>> {
        let tenant_id = scope.tenant_id("dependency_tree")?;
        let mut nodes = self.with_conn(|conn| {
            let root = load_issue(conn, tenant_id, root_id)?;
            let mut visited: HashSet<String> = HashSet::from([root.id.clone()]);
            let mut queue: VecDeque<(String, usize)> = VecDeque::from([(root.id.clone(), 0)]);
            let mut nodes = vec![TreeNode {
                issue: root,
                depth: 0,
                parent_id: None,
            }];

            while let Some((id, depth)) = queue.pop_front() {
                if depth >= max_depth {
                    continue;
                }
                for child_id in children_of(conn, tenant_id, &id)? {
                    if !visited.insert(child_id.clone()) {
                        continue;
                    }
                    let issue = load_issue(conn, tenant_id, &child_id)?;
                    queue.push_back((child_id, depth + 1));
                    nodes.push(TreeNode {
                        issue,
                        depth: depth + 1,
                        parent_id: Some(id.clone()),
                    });
                }
            }
            Ok(nodes)
        })?;

        nodes.sort_by(|a, b| {
            a.depth
                .cmp(&b.depth)
                .then(a.issue.priority.cmp(&b.issue.priority))
                .then(a.issue.created_at.cmp(&b.issue.created_at))
                .then_with(|| a.issue.id.cmp(&b.issue.id))
        });
        tracing::debug!(root = root_id, nodes = nodes.len(), max_depth, "walked hierarchy");
        Ok(nodes)
    }
}
