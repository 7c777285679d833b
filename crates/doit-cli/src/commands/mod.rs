pub mod comment;
pub mod compact;
pub mod dep;
pub mod export;
pub mod init;
pub mod issue;
pub mod key;
pub mod label;
pub mod lesson;
pub mod message;
pub mod project;
pub mod ready;
pub mod tenant;
pub mod tree;

use doit_graph::Issue;

/// One-line rendering shared by list-style commands.
pub(crate) fn issue_line(issue: &Issue) -> String {
    let mut line = format!(
        "  {} [P{}] [{}] {} - {}",
        issue.id, issue.priority, issue.issue_type, issue.status, issue.title
    );
    if !issue.assignee.is_empty() {
        line.push_str(&format!(" (@{})", issue.assignee));
    }
    line
}
