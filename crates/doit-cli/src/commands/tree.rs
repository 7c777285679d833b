use crate::support::{OrExit, Session, print_json};
use serde_json::json;

pub fn run(id: String, max_depth: usize, session: &Session) {
    let nodes = session
        .store
        .dependency_tree(&session.scope, &id, max_depth)
        .or_exit("failed to walk hierarchy");

    if session.json {
        print_json(&json!({
            "action": "tree",
            "root": id,
            "maxDepth": max_depth,
            "nodes": nodes,
        }));
        return;
    }

    println!("doit tree {id} ({} nodes)", nodes.len());
    for node in &nodes {
        println!(
            "{}{} [{}] {}",
            "  ".repeat(node.depth + 1),
            node.issue.id,
            node.issue.status,
            node.issue.title
        );
    }
}
