use crate::cli::MessageCommands;
use crate::commands::issue::print_issue_list;
use crate::support::{OrExit, Session, print_json};
use doit_graph::{IssueFilter, IssueType, NewMessage, SortOrder, StoreConfig};
use serde_json::json;

pub fn run(command: MessageCommands, session: &Session, config: &StoreConfig) {
    match command {
        MessageCommands::Send {
            to,
            body,
            thread,
            ephemeral,
        } => {
            let message = session
                .store
                .send_message(
                    &session.scope,
                    NewMessage {
                        body,
                        from: session.actor.clone(),
                        to,
                        thread_id: thread,
                        project_id: session.project_id(),
                        ephemeral,
                    },
                )
                .or_exit("failed to send message");
            if session.json {
                print_json(&json!({ "action": "message.send", "message": message }));
            } else {
                println!(
                    "doit message send\n  Sent: {}\n  To: {}",
                    message.id, message.assignee
                );
            }
        }

        MessageCommands::Inbox { to, limit } => {
            let filter = IssueFilter::new()
                .issue_type(IssueType::Message)
                .assignee(to)
                .sort(SortOrder::Oldest)
                .limit(config.clamp_limit(limit));
            let messages = session
                .store
                .list_issues(&session.scope, &filter)
                .or_exit("failed to list messages");
            print_issue_list("message.inbox", &messages, session.json);
        }
    }
}
