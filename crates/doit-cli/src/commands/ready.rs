use crate::cli::FilterArgs;
use crate::commands::issue::print_issue_list;
use crate::support::{OrExit, Session};
use doit_graph::StoreConfig;

pub fn run(filter: FilterArgs, session: &Session, config: &StoreConfig) {
    let limit = config.clamp_limit(filter.limit);
    let filter = filter.into_filter().limit(limit);
    let ready = session
        .store
        .list_ready(&session.scope, &filter)
        .or_exit("failed to compute ready work");
    print_issue_list("ready", &ready, session.json);
}
