use crate::cli::LabelCommands;
use crate::support::{OrExit, Session, print_json};
use serde_json::json;

pub fn run(command: LabelCommands, session: &Session) {
    let store = &session.store;
    let scope = &session.scope;
    match command {
        LabelCommands::Add { id, label } => {
            let added = store
                .add_label(scope, &id, &label, &session.actor)
                .or_exit("failed to add label");
            report("label.add", &id, &label, added, session.json);
        }

        LabelCommands::Remove { id, label } => {
            let removed = store
                .remove_label(scope, &id, &label, &session.actor)
                .or_exit("failed to remove label");
            report("label.remove", &id, &label, removed, session.json);
        }

        LabelCommands::List { id } => {
            let labels = store.list_labels(scope, &id).or_exit("failed to list labels");
            if session.json {
                print_json(&json!({ "action": "label.list", "id": id, "labels": labels }));
            } else {
                println!("doit label list {id}");
                for label in labels {
                    println!("  {label}");
                }
            }
        }
    }
}

fn report(action: &str, id: &str, label: &str, changed: bool, json_output: bool) {
    if json_output {
        print_json(&json!({
            "action": action,
            "id": id,
            "label": label,
            "changed": changed,
        }));
    } else {
        let note = if changed { "" } else { " (unchanged)" };
        println!("doit {}\n  {id}: {label}{note}", action.replace('.', " "));
    }
}
