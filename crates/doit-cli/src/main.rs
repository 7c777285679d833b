//! doit CLI: the `doit` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands, GlobalArgs};
use doit_graph::StoreConfig;
use support::{Session, load_config};
use tracing_subscriber::EnvFilter;

fn main() {
    let Cli { global, command } = Cli::parse();
    let config = load_config(&global);
    init_tracing(&config.log_level);

    match command {
        Commands::Init => commands::init::run(&config, global.json),

        Commands::Tenant { command } => commands::tenant::run(command, &config, &global),

        Commands::Key { command } => commands::key::run(command, &config, &global),

        Commands::Project { command } => commands::project::run(command, &session(&global, &config)),

        Commands::Issue { command } => {
            commands::issue::run(command, &session(&global, &config), &config)
        }

        Commands::Dep { command } => commands::dep::run(command, &session(&global, &config)),

        Commands::Ready { filter } => {
            commands::ready::run(filter, &session(&global, &config), &config)
        }

        Commands::Tree { id, max_depth } => {
            commands::tree::run(id, max_depth, &session(&global, &config))
        }

        Commands::Label { command } => commands::label::run(command, &session(&global, &config)),

        Commands::Comment { command } => commands::comment::run(command, &session(&global, &config)),

        Commands::Compact { command } => {
            commands::compact::run(command, &session(&global, &config), &config)
        }

        Commands::Lesson { command } => {
            commands::lesson::run(command, &session(&global, &config), &config)
        }

        Commands::Message { command } => {
            commands::message::run(command, &session(&global, &config), &config)
        }

        Commands::Export { output } => commands::export::run(output, &session(&global, &config)),
    }
}

fn session(global: &GlobalArgs, config: &StoreConfig) -> Session {
    Session::open(global, config)
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
