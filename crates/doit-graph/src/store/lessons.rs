use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, params};

use super::codec::{get_opt_ts, get_opt_uuid, get_ts, get_uuid, now, ts};
use super::query::placeholders;
use super::{Store, ensure_issue, ensure_project};
use crate::error::{Result, StoreError};
use crate::ids::{IdTable, allocate_in};
use crate::lesson::{LESSON_ID_PREFIX, Lesson, LessonFilter, LessonStatus, NewLesson};
use crate::scope::Scope;

const DEFAULT_LESSON_LIMIT: usize = 50;

const LESSON_COLUMNS: &str = "id, tenant_id, project_id, issue_id, title, mistake, correction, \
     expert, components, severity, status, created_by, created_at, resolved_at, resolved_by";

fn lesson_from_row(row: &Row<'_>) -> rusqlite::Result<Lesson> {
    let components: String = row.get("components")?;
    let status: String = row.get("status")?;
    Ok(Lesson {
        id: row.get("id")?,
        tenant_id: get_uuid(row, "tenant_id")?,
        project_id: get_opt_uuid(row, "project_id")?,
        issue_id: row.get("issue_id")?,
        title: row.get("title")?,
        mistake: row.get("mistake")?,
        correction: row.get("correction")?,
        expert: row.get("expert")?,
        components: serde_json::from_str(&components).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?,
        severity: row.get("severity")?,
        status: status.parse().map_err(|e: StoreError| {
            rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e))
        })?,
        created_by: row.get("created_by")?,
        created_at: get_ts(row, "created_at")?,
        resolved_at: get_opt_ts(row, "resolved_at")?,
        resolved_by: row.get("resolved_by")?,
    })
}

impl Store {
    pub fn record_lesson(&self, scope: &Scope, input: NewLesson) -> Result<Lesson> {
        let tenant_id = scope.tenant_id("record_lesson")?;
        let severity = input.validate()?;
        let components: Vec<String> = input
            .components
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        let components_json = serde_json::to_string(&components)?;

        let lesson = self.with_tx(|tx| {
            if let Some(project_id) = input.project_id {
                ensure_project(tx, tenant_id, project_id)?;
            }
            if let Some(issue_id) = &input.issue_id {
                ensure_issue(tx, tenant_id, issue_id)?;
            }
            let id = allocate_in(tx, IdTable::Lessons, tenant_id, LESSON_ID_PREFIX)?;
            tx.execute(
                &format!(
                    "INSERT INTO lessons ({LESSON_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, NULL, '')"
                ),
                params![
                    id,
                    tenant_id.to_string(),
                    input.project_id.map(|p| p.to_string()),
                    input.issue_id,
                    input.title.trim(),
                    input.mistake,
                    input.correction,
                    input.expert,
                    components_json,
                    severity,
                    LessonStatus::Open.as_str(),
                    input.created_by,
                    ts(&now()),
                ],
            )?;
            load_lesson(tx, tenant_id, &id)
        })?;
        tracing::info!(lesson_id = %lesson.id, severity = lesson.severity, "lesson recorded");
        Ok(lesson)
    }

    /// Most severe first, then newest. Defaults to 50 results.
    pub fn list_lessons(&self, scope: &Scope, filter: &LessonFilter) -> Result<Vec<Lesson>> {
        let tenant_id = scope.tenant_id("list_lessons")?;
        let mut sql = format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE tenant_id = ?");
        let mut params: Vec<Value> = vec![Value::Text(tenant_id.to_string())];

        if let Some(project_id) = filter.project_id {
            sql.push_str(" AND project_id = ?");
            params.push(Value::Text(project_id.to_string()));
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            params.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(expert) = &filter.expert {
            sql.push_str(" AND expert = ?");
            params.push(Value::Text(expert.clone()));
        }
        if let Some(component) = &filter.component {
            sql.push_str(" AND EXISTS (SELECT 1 FROM json_each(lessons.components) WHERE value = ?)");
            params.push(Value::Text(component.clone()));
        }
        if let Some(severity) = filter.severity {
            sql.push_str(" AND severity = ?");
            params.push(Value::Integer(i64::from(severity)));
        }
        if !scope.projects().is_empty() {
            sql.push_str(&format!(
                " AND project_id IN ({})",
                placeholders(scope.projects().len())
            ));
            params.extend(scope.projects().iter().map(|p| Value::Text(p.to_string())));
        }
        sql.push_str(" ORDER BY severity ASC, created_at DESC, id ASC LIMIT ?");
        let limit = filter.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LESSON_LIMIT);
        params.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(params), lesson_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn resolve_lesson(&self, scope: &Scope, id: &str, resolved_by: &str) -> Result<Lesson> {
        let tenant_id = scope.tenant_id("resolve_lesson")?;
        let lesson = self.with_tx(|tx| {
            let updated = tx.execute(
                r#"
                UPDATE lessons SET status = ?3, resolved_at = ?4, resolved_by = ?5
                WHERE id = ?1 AND tenant_id = ?2
                "#,
                params![
                    id,
                    tenant_id.to_string(),
                    LessonStatus::Resolved.as_str(),
                    ts(&now()),
                    resolved_by
                ],
            )?;
            if updated == 0 {
                return Err(StoreError::not_found("lesson", id));
            }
            load_lesson(tx, tenant_id, id)
        })?;
        tracing::info!(lesson_id = id, resolved_by, "lesson resolved");
        Ok(lesson)
    }
}

fn load_lesson(conn: &rusqlite::Connection, tenant_id: uuid::Uuid, id: &str) -> Result<Lesson> {
    conn.query_row(
        &format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = ?1 AND tenant_id = ?2"),
        params![id, tenant_id.to_string()],
        lesson_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("lesson", id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(title: &str, severity: i32, components: &[&str]) -> NewLesson {
        NewLesson {
            title: title.into(),
            mistake: "did the wrong thing".into(),
            correction: "do the right thing".into(),
            expert: "ops".into(),
            components: components.iter().map(|c| c.to_string()).collect(),
            severity: Some(severity),
            ..NewLesson::default()
        }
    }

    #[test]
    fn lessons_get_prefixed_ids_and_filter() {
        let store = Store::open_in_memory().unwrap();
        let scope = Scope::tenant(store.create_tenant("Acme", "acme").unwrap().id);
        let minor = store
            .record_lesson(&scope, lesson("minor", 3, &["db"]))
            .unwrap();
        let major = store
            .record_lesson(&scope, lesson("major", 1, &["api", "db"]))
            .unwrap();
        assert!(minor.id.starts_with("lsn-"));
        assert_eq!(major.components, vec!["api", "db"]);

        let all = store.list_lessons(&scope, &LessonFilter::default()).unwrap();
        assert_eq!(all[0].id, major.id);

        let api = store
            .list_lessons(
                &scope,
                &LessonFilter {
                    component: Some("api".into()),
                    ..LessonFilter::default()
                },
            )
            .unwrap();
        assert_eq!(api.len(), 1);

        let resolved = store.resolve_lesson(&scope, &minor.id, "lead").unwrap();
        assert_eq!(resolved.status, LessonStatus::Resolved);
        assert!(resolved.resolved_at.is_some());
        let open = store
            .list_lessons(
                &scope,
                &LessonFilter {
                    status: Some(LessonStatus::Open),
                    ..LessonFilter::default()
                },
            )
            .unwrap();
        assert_eq!(open.len(), 1);
        assert!(store.resolve_lesson(&scope, "lsn-zzz", "lead").is_err());
    }

    #[test]
    fn lessons_reference_issues_in_tenant() {
        let store = Store::open_in_memory().unwrap();
        let scope = Scope::tenant(store.create_tenant("Acme", "acme").unwrap().id);
        let err = store
            .record_lesson(
                &scope,
                NewLesson {
                    issue_id: Some("doit-missing".into()),
                    ..lesson("x", 2, &[])
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "issue", .. }));
    }
}
