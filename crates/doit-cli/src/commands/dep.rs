use crate::cli::DepCommands;
use crate::support::{OrExit, Session, print_json};
use serde_json::json;

pub fn run(command: DepCommands, session: &Session) {
    let store = &session.store;
    let scope = &session.scope;
    match command {
        DepCommands::Add {
            issue_id,
            depends_on_id,
            dep_type,
        } => {
            let dependency = store
                .add_dependency(scope, &issue_id, &depends_on_id, dep_type, &session.actor)
                .or_exit("failed to add dependency");
            if session.json {
                print_json(&json!({ "action": "dep.add", "dependency": dependency }));
            } else {
                println!(
                    "doit dep add\n  Added: {issue_id} -> {depends_on_id} ({})",
                    dep_type.as_str()
                );
            }
        }

        DepCommands::Remove {
            issue_id,
            depends_on_id,
        } => {
            let removed = store
                .remove_dependency(scope, &issue_id, &depends_on_id, &session.actor)
                .or_exit("failed to remove dependency");
            if session.json {
                print_json(&json!({
                    "action": "dep.remove",
                    "issueId": issue_id,
                    "dependsOnId": depends_on_id,
                    "removed": removed,
                }));
            } else if removed {
                println!("doit dep remove\n  Removed: {issue_id} -> {depends_on_id}");
            } else {
                println!("doit dep remove\n  No edge: {issue_id} -> {depends_on_id}");
            }
        }

        DepCommands::List { id, direction } => {
            let deps = store
                .list_dependencies(scope, &id, direction)
                .or_exit("failed to list dependencies");
            if session.json {
                print_json(&json!({ "action": "dep.list", "id": id, "dependencies": deps }));
            } else {
                println!("doit dep list {id} ({})", deps.len());
                for dep in deps {
                    println!(
                        "  {} -> {} ({})",
                        dep.issue_id,
                        dep.depends_on_id,
                        dep.dep_type.as_str()
                    );
                }
            }
        }
    }
}
