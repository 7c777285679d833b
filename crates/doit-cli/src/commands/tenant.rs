use crate::cli::{GlobalArgs, TenantCommands};
use crate::support::{OrExit, open_store, print_json};
use doit_graph::StoreConfig;
use serde_json::json;

pub fn run(command: TenantCommands, config: &StoreConfig, global: &GlobalArgs) {
    let store = open_store(config);
    match command {
        TenantCommands::Create { name, slug } => {
            let tenant = store
                .create_tenant(&name, &slug)
                .or_exit("failed to create tenant");
            if global.json {
                print_json(&json!({ "action": "tenant.create", "tenant": tenant }));
            } else {
                println!(
                    "doit tenant create\n  Created: {} ({})\n  ID: {}",
                    tenant.slug, tenant.name, tenant.id
                );
            }
        }

        TenantCommands::List => {
            let tenants = store.list_tenants().or_exit("failed to list tenants");
            if global.json {
                print_json(&json!({ "action": "tenant.list", "tenants": tenants }));
            } else {
                println!("doit tenant list ({})", tenants.len());
                for tenant in tenants {
                    println!("  {} - {}", tenant.slug, tenant.name);
                }
            }
        }
    }
}
