use crate::support::{OrExit, Session, print_json};
use serde_json::json;
use std::io::{self, Write};
use std::path::PathBuf;

pub fn run(output: Option<PathBuf>, session: &Session) {
    match output {
        Some(path) => {
            let count = session
                .store
                .export_jsonl_to_path(&session.scope, &path)
                .or_exit("export failed");
            if session.json {
                print_json(&json!({
                    "action": "export",
                    "path": path.display().to_string(),
                    "count": count,
                }));
            } else {
                println!("doit export\n  Path: {}\n  Issues: {count}", path.display());
            }
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            session
                .store
                .export_jsonl(&session.scope, &mut lock)
                .or_exit("export failed");
            lock.flush().or_exit("export failed");
        }
    }
}
