use crate::cli::IssueCommands;
use crate::commands::issue_line;
use crate::support::{OrExit, Session, fail, parse_optional_when, parse_when, print_json};
use chrono::Utc;
use doit_graph::{Issue, IssueFilter, IssueUpdate, NewIssue, Status, StoreConfig};
use serde_json::json;

pub fn run(command: IssueCommands, session: &Session, config: &StoreConfig) {
    match command {
        IssueCommands::Add {
            title,
            id,
            parent,
            description,
            design,
            acceptance_criteria,
            notes,
            priority,
            issue_type,
            assignee,
            owner,
            labels,
            due,
            defer,
            ephemeral,
        } => {
            let now = Utc::now();
            let input = NewIssue {
                id: id.unwrap_or_default(),
                title,
                description,
                design,
                acceptance_criteria,
                notes,
                priority,
                issue_type,
                assignee,
                owner,
                created_by: session.actor.clone(),
                project_id: session.project_id(),
                parent_id: parent,
                labels,
                ephemeral,
                due_at: due.map(|raw| parse_when(&raw, now).unwrap_or_else(|e| fail(e))),
                defer_until: defer.map(|raw| parse_when(&raw, now).unwrap_or_else(|e| fail(e))),
                ..NewIssue::default()
            };
            run_add(input, session);
        }

        IssueCommands::Show { id } => {
            let issue = session
                .store
                .get_issue(&session.scope, &id)
                .or_exit("failed to load issue");
            if session.json {
                print_json(&issue);
            } else {
                print_issue(&issue);
            }
        }

        IssueCommands::List {
            filter,
            sort,
            offset,
        } => {
            let limit = config.clamp_limit(filter.limit);
            let filter = filter.into_filter().sort(sort).limit(limit).offset(offset);
            let issues = session
                .store
                .list_issues(&session.scope, &filter)
                .or_exit("failed to list issues");
            print_issue_list("issue.list", &issues, session.json);
        }

        IssueCommands::Update {
            id,
            title,
            description,
            design,
            acceptance_criteria,
            notes,
            status,
            priority,
            assignee,
            owner,
            due,
            defer,
            pinned,
        } => {
            let now = Utc::now();
            let update = IssueUpdate {
                title,
                description,
                design,
                acceptance_criteria,
                notes,
                status,
                priority,
                assignee,
                owner,
                due_at: due.map(|raw| parse_optional_when(&raw, now).unwrap_or_else(|e| fail(e))),
                defer_until: defer
                    .map(|raw| parse_optional_when(&raw, now).unwrap_or_else(|e| fail(e))),
                pinned,
                ..IssueUpdate::default()
            };
            run_update("issue.update", &id, update, session);
        }

        IssueCommands::Close { id, reason } => {
            let update = IssueUpdate {
                close_reason: Some(reason),
                ..IssueUpdate::status(Status::Closed)
            };
            run_update("issue.close", &id, update, session);
        }

        IssueCommands::Reopen { id } => {
            run_update("issue.reopen", &id, IssueUpdate::status(Status::Open), session);
        }

        IssueCommands::Delete { id } => {
            session
                .store
                .delete_issue(&session.scope, &id)
                .or_exit("failed to delete issue");
            if session.json {
                print_json(&json!({ "action": "issue.delete", "id": id }));
            } else {
                println!("doit issue delete\n  Deleted: {id}");
            }
        }

        IssueCommands::Stats => {
            let counts = session
                .store
                .count_issues_by_status(&session.scope)
                .or_exit("failed to count issues");
            if session.json {
                print_json(&json!({ "action": "issue.stats", "counts": counts }));
            } else {
                println!("doit issue stats");
                for count in counts {
                    println!("  {:<12} {}", count.status, count.count);
                }
            }
        }

        IssueCommands::Events { id, limit } => {
            let events = session
                .store
                .list_events(&session.scope, &id, limit)
                .or_exit("failed to list events");
            if session.json {
                print_json(&json!({ "action": "issue.events", "id": id, "events": events }));
            } else {
                println!("doit issue events {id} ({})", events.len());
                for event in events {
                    let change = match (&event.old_value, &event.new_value) {
                        (Some(old), Some(new)) => format!(" {old} -> {new}"),
                        (None, Some(new)) => format!(" {new}"),
                        _ => String::new(),
                    };
                    println!(
                        "  {} {} by {}{change}",
                        event.created_at.format("%Y-%m-%d %H:%M:%S"),
                        event.event_type.as_str(),
                        if event.actor.is_empty() { "-" } else { event.actor.as_str() },
                    );
                }
            }
        }

        IssueCommands::ChildId { parent } => {
            let child = session
                .store
                .next_child_id(&session.scope, &parent)
                .or_exit("failed to allocate child id");
            if session.json {
                print_json(&json!({ "action": "issue.child-id", "parent": parent, "id": child }));
            } else {
                println!("{child}");
            }
        }
    }
}

fn run_add(mut input: NewIssue, session: &Session) {
    // Children without an explicit ID take the parent's next dotted number.
    if input.id.is_empty()
        && let Some(parent) = &input.parent_id
    {
        input.id = session
            .store
            .next_child_id(&session.scope, parent)
            .or_exit("failed to allocate child id");
    }
    let issue = session
        .store
        .create_issue(&session.scope, input)
        .or_exit("failed to create issue");

    if session.json {
        print_json(&json!({ "action": "issue.add", "issue": issue }));
    } else {
        println!(
            "doit issue add\n  Created: {}\n  Title: {}\n  Type: {}\n  Priority: {}",
            issue.id, issue.title, issue.issue_type, issue.priority
        );
        if let Some(parent) = &issue.parent_id {
            println!("  Parent: {parent}");
        }
    }
}

fn run_update(action: &str, id: &str, update: IssueUpdate, session: &Session) {
    let issue = session
        .store
        .update_issue(&session.scope, id, update, &session.actor)
        .or_exit("failed to update issue");
    if session.json {
        print_json(&json!({ "action": action, "issue": issue }));
    } else {
        println!(
            "doit {}\n  Issue: {}\n  Status: {}",
            action.replace('.', " "),
            issue.id,
            issue.status
        );
    }
}

pub(crate) fn print_issue_list(action: &str, issues: &[Issue], json_output: bool) {
    if json_output {
        print_json(&json!({
            "action": action,
            "count": issues.len(),
            "items": issues,
        }));
    } else {
        println!("doit {} ({})", action.replace('.', " "), issues.len());
        for issue in issues {
            println!("{}", issue_line(issue));
        }
    }
}

fn print_issue(issue: &Issue) {
    println!("{}: {}", issue.id, issue.title);
    println!(
        "  Status: {}  Priority: {}  Type: {}",
        issue.status, issue.priority, issue.issue_type
    );
    for (label, value) in [("Assignee", &issue.assignee), ("Owner", &issue.owner)] {
        if !value.is_empty() {
            println!("  {label}: {value}");
        }
    }
    if let Some(parent) = &issue.parent_id {
        println!("  Parent: {parent}");
    }
    if !issue.labels.is_empty() {
        println!("  Labels: {}", issue.labels.join(", "));
    }
    if let Some(due) = issue.due_at {
        println!("  Due: {}", due.to_rfc3339());
    }
    if let Some(defer) = issue.defer_until {
        println!("  Deferred until: {}", defer.to_rfc3339());
    }
    if issue.compaction_level.as_u8() > 0 {
        println!("  Compaction level: {}", issue.compaction_level);
    }
    for (label, value) in [
        ("Description", &issue.description),
        ("Design", &issue.design),
        ("Acceptance criteria", &issue.acceptance_criteria),
        ("Notes", &issue.notes),
    ] {
        if !value.is_empty() {
            println!("\n{label}:\n{value}");
        }
    }
    if !issue.close_reason.is_empty() {
        println!("\nClosed: {}", issue.close_reason);
    }
}

impl crate::cli::FilterArgs {
    pub(crate) fn into_filter(self) -> IssueFilter {
        use doit_graph::Predicate;

        let mut filter = IssueFilter::new();
        if let Some(status) = self.status {
            filter = filter.status(status);
        }
        if let Some(issue_type) = self.issue_type {
            filter = filter.issue_type(issue_type);
        }
        if let Some(priority) = self.priority {
            filter = filter.with(Predicate::Priority(priority));
        }
        if let Some(assignee) = self.assignee {
            filter = filter.assignee(assignee);
        }
        if !self.labels.is_empty() {
            filter = filter.with(Predicate::LabelsAll(self.labels));
        }
        if !self.any_labels.is_empty() {
            filter = filter.with(Predicate::LabelsAny(self.any_labels));
        }
        if let Some(parent) = self.parent {
            filter = filter.parent(parent);
        }
        if let Some(search) = self.search {
            filter = filter.search(search);
        }
        filter
    }
}
