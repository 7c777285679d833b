use crate::support::{open_store, print_json};
use doit_graph::StoreConfig;
use serde_json::json;

pub fn run(config: &StoreConfig, json_output: bool) {
    let store = open_store(config);
    let version = store.schema_version().unwrap_or_else(|e| {
        crate::support::fail(format!("failed to read schema version: {e}"))
    });

    if json_output {
        print_json(&json!({
            "action": "init",
            "databasePath": config.database_path.display().to_string(),
            "schemaVersion": version,
        }));
    } else {
        println!(
            "doit init\n  Database: {}\n  Schema version: {version}",
            config.database_path.display()
        );
    }
}
