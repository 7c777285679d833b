use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use super::codec::{get_ts, now, ts};
use super::{Store, ensure_issue};
use crate::error::{Result, StoreError};
use crate::issue::{Comment, Event, EventType, NewEvent};
use crate::scope::Scope;

pub(crate) fn insert_event(conn: &Connection, event: &NewEvent, at: &DateTime<Utc>) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO events (issue_id, event_type, actor, old_value, new_value, comment, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            event.issue_id,
            event.event_type,
            event.actor,
            event.old_value,
            event.new_value,
            event.comment,
            ts(at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Store {
    /// Idempotent. Returns whether the label was newly attached.
    pub fn add_label(&self, scope: &Scope, issue_id: &str, label: &str, actor: &str) -> Result<bool> {
        let tenant_id = scope.tenant_id("add_label")?;
        let label = normalize_label(label)?;
        self.with_tx(|tx| {
            ensure_issue(tx, tenant_id, issue_id)?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO labels (issue_id, label) VALUES (?1, ?2)",
                params![issue_id, label],
            )?;
            if inserted > 0 {
                insert_event(
                    tx,
                    &NewEvent::new(issue_id, EventType::LabelAdded)
                        .actor(actor)
                        .values(None, Some(label.clone())),
                    &now(),
                )?;
            }
            Ok(inserted > 0)
        })
    }

    /// Idempotent. Returns whether a label was removed.
    pub fn remove_label(
        &self,
        scope: &Scope,
        issue_id: &str,
        label: &str,
        actor: &str,
    ) -> Result<bool> {
        let tenant_id = scope.tenant_id("remove_label")?;
        let label = normalize_label(label)?;
        self.with_tx(|tx| {
            ensure_issue(tx, tenant_id, issue_id)?;
            let removed = tx.execute(
                "DELETE FROM labels WHERE issue_id = ?1 AND label = ?2",
                params![issue_id, label],
            )?;
            if removed > 0 {
                insert_event(
                    tx,
                    &NewEvent::new(issue_id, EventType::LabelRemoved)
                        .actor(actor)
                        .values(Some(label.clone()), None),
                    &now(),
                )?;
            }
            Ok(removed > 0)
        })
    }

    /// Sorted.
    pub fn list_labels(&self, scope: &Scope, issue_id: &str) -> Result<Vec<String>> {
        let tenant_id = scope.tenant_id("list_labels")?;
        self.with_conn(|conn| {
            ensure_issue(conn, tenant_id, issue_id)?;
            let mut stmt =
                conn.prepare("SELECT label FROM labels WHERE issue_id = ?1 ORDER BY label")?;
            let rows = stmt.query_map(params![issue_id], |row| row.get(0))?;
            Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
        })
    }

    pub fn add_comment(
        &self,
        scope: &Scope,
        issue_id: &str,
        author: &str,
        text: &str,
    ) -> Result<Comment> {
        let tenant_id = scope.tenant_id("add_comment")?;
        if text.trim().is_empty() {
            return Err(StoreError::validation("comment text is required"));
        }
        let comment = self.with_tx(|tx| {
            ensure_issue(tx, tenant_id, issue_id)?;
            let at = now();
            tx.execute(
                "INSERT INTO comments (issue_id, author, text, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![issue_id, author, text, ts(&at)],
            )?;
            let id = tx.last_insert_rowid();
            insert_event(
                tx,
                &NewEvent::new(issue_id, EventType::Commented)
                    .actor(author)
                    .comment(text),
                &at,
            )?;
            Ok(Comment {
                id,
                issue_id: issue_id.to_string(),
                author: author.to_string(),
                text: text.to_string(),
                created_at: at,
            })
        })?;
        tracing::info!(issue_id, comment_id = comment.id, "comment added");
        Ok(comment)
    }

    /// Oldest first.
    pub fn list_comments(&self, scope: &Scope, issue_id: &str) -> Result<Vec<Comment>> {
        let tenant_id = scope.tenant_id("list_comments")?;
        self.with_conn(|conn| {
            ensure_issue(conn, tenant_id, issue_id)?;
            let mut stmt = conn.prepare(
                r#"
                SELECT id, issue_id, author, text, created_at
                FROM comments WHERE issue_id = ?1 ORDER BY id ASC
                "#,
            )?;
            let rows = stmt.query_map(params![issue_id], |row| {
                Ok(Comment {
                    id: row.get("id")?,
                    issue_id: row.get("issue_id")?,
                    author: row.get("author")?,
                    text: row.get("text")?,
                    created_at: get_ts(row, "created_at")?,
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn add_event(&self, scope: &Scope, event: NewEvent) -> Result<i64> {
        let tenant_id = scope.tenant_id("add_event")?;
        self.with_tx(|tx| {
            ensure_issue(tx, tenant_id, &event.issue_id)?;
            insert_event(tx, &event, &now())
        })
    }

    /// Newest first.
    pub fn list_events(&self, scope: &Scope, issue_id: &str, limit: usize) -> Result<Vec<Event>> {
        let tenant_id = scope.tenant_id("list_events")?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(|conn| {
            ensure_issue(conn, tenant_id, issue_id)?;
            let mut stmt = conn.prepare(
                r#"
                SELECT id, issue_id, event_type, actor, old_value, new_value, comment, created_at
                FROM events WHERE issue_id = ?1 ORDER BY id DESC LIMIT ?2
                "#,
            )?;
            let rows = stmt.query_map(params![issue_id, limit], |row| {
                Ok(Event {
                    id: row.get("id")?,
                    issue_id: row.get("issue_id")?,
                    event_type: row.get("event_type")?,
                    actor: row.get("actor")?,
                    old_value: row.get("old_value")?,
                    new_value: row.get("new_value")?,
                    comment: row.get("comment")?,
                    created_at: get_ts(row, "created_at")?,
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }
}

fn normalize_label(label: &str) -> Result<String> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return Err(StoreError::validation("label cannot be empty"));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::NewIssue;

    fn seeded() -> (Store, Scope) {
        let store = Store::open_in_memory().unwrap();
        let tenant = store.create_tenant("Acme", "acme").unwrap();
        let scope = Scope::tenant(tenant.id);
        store
            .create_issue(&scope, NewIssue::new("doit-x", "x"))
            .unwrap();
        (store, scope)
    }

    #[test]
    fn labels_are_an_idempotent_set() {
        let (store, scope) = seeded();
        assert!(store.add_label(&scope, "doit-x", "ui", "a").unwrap());
        assert!(!store.add_label(&scope, "doit-x", " ui ", "a").unwrap());
        assert!(store.add_label(&scope, "doit-x", "api", "a").unwrap());
        assert_eq!(store.list_labels(&scope, "doit-x").unwrap(), vec!["api", "ui"]);
        assert!(store.remove_label(&scope, "doit-x", "ui", "a").unwrap());
        assert!(!store.remove_label(&scope, "doit-x", "ui", "a").unwrap());
        assert_eq!(store.list_labels(&scope, "doit-x").unwrap(), vec!["api"]);
    }

    #[test]
    fn comments_are_oldest_first_and_logged() {
        let (store, scope) = seeded();
        store.add_comment(&scope, "doit-x", "amy", "first").unwrap();
        store.add_comment(&scope, "doit-x", "bo", "second").unwrap();
        let texts: Vec<String> = store
            .list_comments(&scope, "doit-x")
            .unwrap()
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["first", "second"]);

        let newest = &store.list_events(&scope, "doit-x", 1).unwrap()[0];
        assert_eq!(newest.event_type, EventType::Commented);
        assert_eq!(newest.comment.as_deref(), Some("second"));
        assert!(store.add_comment(&scope, "doit-x", "amy", " ").is_err());
    }

    #[test]
    fn custom_events_are_appended() {
        let (store, scope) = seeded();
        store
            .add_event(
                &scope,
                NewEvent::new("doit-x", EventType::Updated)
                    .actor("bot")
                    .values(Some("a".into()), Some("b".into())),
            )
            .unwrap();
        let events = store.list_events(&scope, "doit-x", 10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].actor, "bot");
        assert_eq!(events[1].event_type, EventType::Created);
    }
}
