use crate::cli::CompactCommands;
use crate::support::{OrExit, Session, print_json};
use doit_graph::{CompactionConfig, Compactor, StoreConfig};
use serde_json::json;

pub fn run(command: CompactCommands, session: &Session, config: &StoreConfig) {
    match command {
        CompactCommands::Run {
            older_than_hours,
            batch_size,
        } => {
            let threshold = match older_than_hours {
                Some(hours) => CompactionConfig {
                    closed_age_hours: hours,
                    ..config.compaction.clone()
                }
                .threshold(),
                None => config.compaction.threshold(),
            };
            let mut compactor = Compactor::new(&session.store);
            if let Some(batch_size) = batch_size {
                compactor = compactor.with_batch_size(batch_size);
            }
            let results = compactor
                .compact_old(&session.scope, threshold)
                .or_exit("compaction failed");

            if session.json {
                print_json(&json!({
                    "action": "compact.run",
                    "thresholdHours": threshold.num_hours(),
                    "compacted": results,
                }));
            } else {
                println!(
                    "doit compact run\n  Threshold: {}h\n  Compacted: {}",
                    threshold.num_hours(),
                    results.len()
                );
                for result in results {
                    println!(
                        "  {} level {} -> {}",
                        result.issue_id, result.old_level, result.new_level
                    );
                }
            }
        }

        CompactCommands::Snapshots { id } => {
            let snapshots = session
                .store
                .compaction_snapshots(&session.scope, &id)
                .or_exit("failed to load snapshots");
            if session.json {
                print_json(&json!({
                    "action": "compact.snapshots",
                    "id": id,
                    "snapshots": snapshots,
                }));
            } else {
                println!("doit compact snapshots {id} ({})", snapshots.len());
                for snapshot in snapshots {
                    println!(
                        "\n--- level {} at {} ---\n{}",
                        snapshot.level,
                        snapshot.created_at.to_rfc3339(),
                        snapshot.render_original().trim_end()
                    );
                }
            }
        }
    }
}
