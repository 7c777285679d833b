use uuid::Uuid;

use super::deps::upsert_dependency;
use super::issues::insert_issue;
use super::{Store, ensure_issue, load_issue};
use crate::dependency::DepType;
use crate::error::{Result, StoreError};
use crate::ids::{IdTable, allocate_in};
use crate::issue::{Issue, IssueType, NewIssue};
use crate::scope::Scope;

pub const MESSAGE_ID_PREFIX: &str = "msg";
pub const MESSAGE_TITLE_LIMIT: usize = 80;

/// Input for `Store::send_message`.
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub body: String,
    pub from: String,
    /// Recipient; becomes the message issue's assignee.
    pub to: String,
    /// Prior message this one replies to.
    pub thread_id: Option<String>,
    pub project_id: Option<Uuid>,
    pub ephemeral: bool,
}

pub(crate) fn message_title(body: &str) -> String {
    let first = body.trim();
    if first.chars().count() <= MESSAGE_TITLE_LIMIT {
        return first.to_string();
    }
    let cut: String = first.chars().take(MESSAGE_TITLE_LIMIT - 3).collect();
    format!("{cut}...")
}

impl Store {
    /// Stores the message as a `message` issue assigned to the recipient,
    /// with a `replies-to` edge onto `thread_id` when given.
    pub fn send_message(&self, scope: &Scope, message: NewMessage) -> Result<Issue> {
        let tenant_id = scope.tenant_id("send_message")?;
        if message.body.trim().is_empty() {
            return Err(StoreError::validation("message body is required"));
        }
        let issue = self.with_tx(|tx| {
            if let Some(thread_id) = &message.thread_id {
                ensure_issue(tx, tenant_id, thread_id)?;
            }
            let id = allocate_in(tx, IdTable::Issues, tenant_id, MESSAGE_ID_PREFIX)?;
            let input = NewIssue {
                id: id.clone(),
                title: message_title(&message.body),
                description: message.body.clone(),
                issue_type: IssueType::Message,
                assignee: message.to.clone(),
                created_by: message.from.clone(),
                project_id: message.project_id,
                ephemeral: message.ephemeral,
                ..NewIssue::default()
            };
            insert_issue(tx, tenant_id, &input)?;
            if let Some(thread_id) = &message.thread_id {
                upsert_dependency(
                    tx,
                    &id,
                    thread_id,
                    DepType::RepliesTo,
                    &message.from,
                    Some(thread_id),
                )?;
            }
            load_issue(tx, tenant_id, &id)
        })?;
        tracing::info!(
            message_id = %issue.id,
            to = %issue.assignee,
            thread = message.thread_id.as_deref().unwrap_or(""),
            "message sent"
        );
        Ok(issue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::Direction;

    #[test]
    fn long_bodies_are_truncated_to_eighty_chars() {
        let body = "x".repeat(200);
        let title = message_title(&body);
        assert_eq!(title.chars().count(), 80);
        assert!(title.ends_with("..."));
        assert_eq!(message_title("  short  "), "short");
        let exact = "y".repeat(80);
        assert_eq!(message_title(&exact), exact);
    }

    #[test]
    fn replies_link_to_thread() {
        let store = Store::open_in_memory().unwrap();
        let scope = Scope::tenant(store.create_tenant("Acme", "acme").unwrap().id);
        let first = store
            .send_message(
                &scope,
                NewMessage {
                    body: "deploy is blocked".into(),
                    from: "alice".into(),
                    to: "bob".into(),
                    ..NewMessage::default()
                },
            )
            .unwrap();
        assert!(first.id.starts_with("msg-"));
        assert_eq!(first.issue_type, IssueType::Message);
        assert_eq!(first.assignee, "bob");

        let reply = store
            .send_message(
                &scope,
                NewMessage {
                    body: "unblocked now".into(),
                    from: "bob".into(),
                    to: "alice".into(),
                    thread_id: Some(first.id.clone()),
                    ..NewMessage::default()
                },
            )
            .unwrap();
        let deps = store
            .list_dependencies(&scope, &reply.id, Direction::Upstream)
            .unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].dep_type, DepType::RepliesTo);
        assert_eq!(deps[0].depends_on_id, first.id);
        assert_eq!(deps[0].thread_id.as_deref(), Some(first.id.as_str()));

        let err = store
            .send_message(
                &scope,
                NewMessage {
                    body: "to nowhere".into(),
                    thread_id: Some("msg-nope".into()),
                    ..NewMessage::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
