use crate::cli::{GlobalArgs, KeyCommands};
use crate::support::{OrExit, open_store, print_json};
use doit_graph::StoreConfig;
use serde_json::json;

pub fn run(command: KeyCommands, config: &StoreConfig, global: &GlobalArgs) {
    let store = open_store(config);
    match command {
        KeyCommands::Issue { tenant_slug, label } => {
            let issued = store
                .issue_api_key(&tenant_slug, &label)
                .or_exit("failed to issue api key");
            if global.json {
                print_json(&json!({
                    "action": "key.issue",
                    "rawKey": issued.raw_key,
                    "key": issued.info,
                }));
            } else {
                println!(
                    "doit key issue\n  Tenant: {tenant_slug}\n  Prefix: {}\n  Key: {}\n  (the key is not shown again)",
                    issued.info.prefix, issued.raw_key
                );
            }
        }

        KeyCommands::List { tenant_slug } => {
            let keys = store
                .list_api_keys(&tenant_slug)
                .or_exit("failed to list api keys");
            if global.json {
                print_json(&json!({ "action": "key.list", "keys": keys }));
            } else {
                println!("doit key list ({})", keys.len());
                for key in keys {
                    let state = if key.is_revoked() { "revoked" } else { "live" };
                    println!("  {} [{state}] {}", key.prefix, key.label);
                }
            }
        }

        KeyCommands::Revoke { prefix } => {
            store
                .revoke_api_key(&prefix)
                .or_exit("failed to revoke api key");
            if global.json {
                print_json(&json!({ "action": "key.revoke", "prefix": prefix }));
            } else {
                println!("doit key revoke\n  Revoked: {prefix}");
            }
        }
    }
}
