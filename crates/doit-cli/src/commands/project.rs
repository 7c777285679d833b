use crate::cli::ProjectCommands;
use crate::support::{OrExit, Session, print_json};
use serde_json::json;

pub fn run(command: ProjectCommands, session: &Session) {
    let store = &session.store;
    let scope = &session.scope;
    match command {
        ProjectCommands::Create { name, slug } => {
            let project = store
                .create_project(scope, &name, &slug)
                .or_exit("failed to create project");
            if session.json {
                print_json(&json!({ "action": "project.create", "project": project }));
            } else {
                println!(
                    "doit project create\n  Created: {} ({})\n  ID: {}",
                    project.slug, project.name, project.id
                );
            }
        }

        ProjectCommands::List => {
            let projects = store.list_projects(scope).or_exit("failed to list projects");
            if session.json {
                print_json(&json!({ "action": "project.list", "projects": projects }));
            } else {
                println!("doit project list ({})", projects.len());
                for project in projects {
                    println!("  {} - {}", project.slug, project.name);
                }
            }
        }

        ProjectCommands::Update {
            slug,
            name,
            new_slug,
        } => {
            let project = store
                .project_by_slug(scope, &slug)
                .or_exit("failed to resolve project");
            let project = store
                .update_project(scope, project.id, name.as_deref(), new_slug.as_deref())
                .or_exit("failed to update project");
            if session.json {
                print_json(&json!({ "action": "project.update", "project": project }));
            } else {
                println!(
                    "doit project update\n  Updated: {} ({})",
                    project.slug, project.name
                );
            }
        }
    }
}
