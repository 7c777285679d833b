use crate::cli::CommentCommands;
use crate::support::{OrExit, Session, print_json};
use serde_json::json;

pub fn run(command: CommentCommands, session: &Session) {
    match command {
        CommentCommands::Add { id, text } => {
            let comment = session
                .store
                .add_comment(&session.scope, &id, &session.actor, &text)
                .or_exit("failed to add comment");
            if session.json {
                print_json(&json!({ "action": "comment.add", "comment": comment }));
            } else {
                println!("doit comment add\n  Issue: {id}\n  Comment: #{}", comment.id);
            }
        }

        CommentCommands::List { id } => {
            let comments = session
                .store
                .list_comments(&session.scope, &id)
                .or_exit("failed to list comments");
            if session.json {
                print_json(&json!({ "action": "comment.list", "id": id, "comments": comments }));
            } else {
                println!("doit comment list {id} ({})", comments.len());
                for comment in comments {
                    println!(
                        "  [{}] {}: {}",
                        comment.created_at.format("%Y-%m-%d %H:%M"),
                        comment.author,
                        comment.text
                    );
                }
            }
        }
    }
}
