//! Translates scopes and typed predicates into SQL with bound parameters.

use rusqlite::types::Value;
use uuid::Uuid;

use super::codec::ts;
use crate::error::Result;
use crate::filter::{Predicate, SortOrder};
use crate::issue::validate_priority;

/// Accumulated `WHERE` clauses over the `issues i` alias.
#[derive(Debug, Default)]
pub(crate) struct SqlWhere {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl SqlWhere {
    /// Starts with the tenant binding and the project allow-list.
    pub(crate) fn scoped(tenant_id: Uuid, projects: &[Uuid]) -> Self {
        let mut sql = Self::default();
        sql.push("i.tenant_id = ?", [text(tenant_id.to_string())]);
        if !projects.is_empty() {
            let params: Vec<Value> = projects.iter().map(|p| text(p.to_string())).collect();
            sql.push(
                &format!("i.project_id IN ({})", placeholders(params.len())),
                params,
            );
        }
        sql
    }

    pub(crate) fn push(&mut self, clause: &str, params: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause.to_string());
        self.params.extend(params);
    }

    pub(crate) fn predicates(&mut self, predicates: &[Predicate]) -> Result<()> {
        for predicate in predicates {
            self.predicate(predicate)?;
        }
        Ok(())
    }

    pub(crate) fn predicate(&mut self, predicate: &Predicate) -> Result<()> {
        match predicate {
            Predicate::Status(status) => {
                self.push("i.status = ?", [text(status.as_str())]);
            }
            Predicate::ExcludeStatuses(statuses) if !statuses.is_empty() => {
                let params: Vec<Value> = statuses.iter().map(|s| text(s.as_str())).collect();
                self.push(
                    &format!("i.status NOT IN ({})", placeholders(params.len())),
                    params,
                );
            }
            Predicate::ExcludeStatuses(_) => {}
            Predicate::Priority(priority) => {
                let priority = validate_priority(*priority)?;
                self.push("i.priority = ?", [Value::Integer(i64::from(priority))]);
            }
            Predicate::Type(kind) => {
                self.push("i.issue_type = ?", [text(kind.as_str())]);
            }
            Predicate::ExcludeTypes(kinds) if !kinds.is_empty() => {
                let params: Vec<Value> = kinds.iter().map(|k| text(k.as_str())).collect();
                self.push(
                    &format!("i.issue_type NOT IN ({})", placeholders(params.len())),
                    params,
                );
            }
            Predicate::ExcludeTypes(_) => {}
            Predicate::Assignee(assignee) => {
                self.push("i.assignee = ?", [text(assignee)]);
            }
            Predicate::Owner(owner) => {
                self.push("i.owner = ?", [text(owner)]);
            }
            Predicate::Ephemeral(flag) => {
                self.push("i.ephemeral = ?", [Value::Integer(i64::from(*flag))]);
            }
            Predicate::Pinned(flag) => {
                self.push("i.pinned = ?", [Value::Integer(i64::from(*flag))]);
            }
            Predicate::Parent(parent_id) => {
                self.push(
                    "EXISTS (SELECT 1 FROM dependencies p \
                     WHERE p.issue_id = i.id AND p.depends_on_id = ? AND p.type = 'parent-child')",
                    [text(parent_id)],
                );
            }
            Predicate::Search(needle) => {
                let trimmed = needle.trim();
                if !trimmed.is_empty() {
                    let pattern = format!("%{}%", escape_like(trimmed));
                    self.push(
                        "(i.title LIKE ? ESCAPE '\\' OR i.description LIKE ? ESCAPE '\\')",
                        [text(&pattern), text(&pattern)],
                    );
                }
            }
            Predicate::LabelsAll(labels) => {
                for label in labels {
                    self.push(
                        "EXISTS (SELECT 1 FROM labels l WHERE l.issue_id = i.id AND l.label = ?)",
                        [text(label)],
                    );
                }
            }
            Predicate::LabelsAny(labels) if !labels.is_empty() => {
                let params: Vec<Value> = labels.iter().map(text).collect();
                self.push(
                    &format!(
                        "EXISTS (SELECT 1 FROM labels l WHERE l.issue_id = i.id AND l.label IN ({}))",
                        placeholders(params.len())
                    ),
                    params,
                );
            }
            Predicate::LabelsAny(_) => {}
            Predicate::CreatedAfter(at) => {
                self.push("i.created_at > ?", [text(ts(at))]);
            }
            Predicate::CreatedBefore(at) => {
                self.push("i.created_at < ?", [text(ts(at))]);
            }
            Predicate::UpdatedAfter(at) => {
                self.push("i.updated_at > ?", [text(ts(at))]);
            }
            Predicate::OverdueAt(at) => {
                self.push(
                    "i.due_at IS NOT NULL AND i.due_at < ? AND i.status <> 'closed'",
                    [text(ts(at))],
                );
            }
        }
        Ok(())
    }

    /// ` WHERE a AND b`, or empty.
    pub(crate) fn render(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub(crate) fn into_params(self) -> Vec<Value> {
        self.params
    }
}

pub(crate) fn order_by(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::Priority => " ORDER BY i.priority ASC, i.created_at ASC, i.id ASC",
        SortOrder::Oldest => " ORDER BY i.created_at ASC, i.id ASC",
        SortOrder::Updated => " ORDER BY i.updated_at DESC, i.id ASC",
        SortOrder::Hybrid => " ORDER BY i.priority ASC, i.updated_at DESC, i.id ASC",
    }
}

/// ` LIMIT ? OFFSET ?` appended with its parameters.
pub(crate) fn page(params: &mut Vec<Value>, limit: Option<usize>, offset: usize) -> String {
    match limit {
        Some(limit) => {
            params.push(Value::Integer(clamp_i64(limit)));
            params.push(Value::Integer(clamp_i64(offset)));
            " LIMIT ? OFFSET ?".to_string()
        }
        None if offset > 0 => {
            params.push(Value::Integer(clamp_i64(offset)));
            " LIMIT -1 OFFSET ?".to_string()
        }
        None => String::new(),
    }
}

pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn clamp_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn text(value: impl AsRef<str>) -> Value {
    Value::Text(value.as_ref().to_string())
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
