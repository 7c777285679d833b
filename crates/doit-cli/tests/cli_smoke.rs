use serde_json::Value;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(prefix: &str) -> Self {
        let dir = tempfile::Builder::new()
            .prefix(&format!("doit-cli-{prefix}-"))
            .tempdir()
            .expect("temp dir should be created");
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn db(&self) -> PathBuf {
        self.path().join("doit.db")
    }
}

fn run_doit<I, S>(db: &Path, args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = env!("CARGO_BIN_EXE_doit");
    Command::new(bin)
        .arg("--db")
        .arg(db)
        .args(args)
        .env("DOIT_LOG", "warn")
        .env_remove("DOIT_TENANT")
        .env_remove("DOIT_API_KEY")
        .env_remove("DOIT_PROJECT")
        .env_remove("DOIT_CONFIG")
        .output()
        .expect("doit command should execute")
}

fn assert_success(output: &Output) {
    if !output.status.success() {
        panic!(
            "command failed with status {:?}\nstdout:\n{}\nstderr:\n{}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn assert_failure(output: &Output) {
    if output.status.success() {
        panic!(
            "command unexpectedly succeeded\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn parse_json_stdout(output: &Output) -> Value {
    serde_json::from_slice::<Value>(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "expected valid JSON stdout, got error: {e}\nstdout:\n{}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

fn doit_json<const N: usize>(db: &Path, args: [&str; N]) -> Value {
    let output = run_doit(db, args.iter().copied().chain(["--json"]));
    assert_success(&output);
    parse_json_stdout(&output)
}

fn with_tenant(dir: &Workspace) {
    let output = run_doit(&dir.db(), ["tenant", "create", "Acme", "acme"]);
    assert_success(&output);
}

#[test]
fn init_reports_schema_version() {
    let dir = Workspace::new("init");
    let payload = doit_json(&dir.db(), ["init"]);
    assert_eq!(payload["action"], "init");
    assert!(payload["schemaVersion"].as_i64().unwrap_or(0) >= 1);
    assert!(dir.db().exists());
}

#[test]
fn commands_without_tenant_fail() {
    let dir = Workspace::new("no-tenant");
    let output = run_doit(&dir.db(), ["issue", "list"]);
    assert_failure(&output);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error: no tenant selected"), "stderr: {stderr}");
}

#[test]
fn ready_follows_blockers() {
    let dir = Workspace::new("ready");
    with_tenant(&dir);
    let db = dir.db();

    let db_issue = doit_json(
        &db,
        ["--tenant", "acme", "issue", "add", "provision db", "--id", "doit-db"],
    );
    assert_eq!(db_issue["issue"]["id"], "doit-db");
    doit_json(
        &db,
        ["--tenant", "acme", "issue", "add", "ship api", "--id", "doit-api", "--priority", "1"],
    );
    doit_json(
        &db,
        ["--tenant", "acme", "dep", "add", "doit-api", "doit-db", "--type", "blocks"],
    );

    let ready = doit_json(&db, ["--tenant", "acme", "ready"]);
    assert_eq!(ready["count"], 1);
    assert_eq!(ready["items"][0]["id"], "doit-db");

    let closed = doit_json(
        &db,
        ["--tenant", "acme", "issue", "close", "doit-db", "--reason", "done"],
    );
    assert_eq!(closed["issue"]["status"], "closed");

    let ready = doit_json(&db, ["--tenant", "acme", "ready"]);
    assert_eq!(ready["items"][0]["id"], "doit-api");

    let events = doit_json(&db, ["--tenant", "acme", "issue", "events", "doit-db"]);
    let kinds: Vec<&str> = events["events"]
        .as_array()
        .expect("events array")
        .iter()
        .filter_map(|event| event["event_type"].as_str())
        .collect();
    assert!(kinds.contains(&"closed"), "events: {kinds:?}");
    assert_eq!(kinds.last(), Some(&"created"));
}

#[test]
fn children_get_dotted_ids_and_show_in_tree() {
    let dir = Workspace::new("tree");
    with_tenant(&dir);
    let db = dir.db();

    doit_json(
        &db,
        ["--tenant", "acme", "issue", "add", "epic", "--id", "doit-epic", "--type", "epic"],
    );
    let child = doit_json(
        &db,
        ["--tenant", "acme", "issue", "add", "first step", "--parent", "doit-epic"],
    );
    assert_eq!(child["issue"]["id"], "doit-epic.1");
    assert_eq!(child["issue"]["parent_id"], "doit-epic");

    let tree = doit_json(&db, ["--tenant", "acme", "tree", "doit-epic"]);
    let nodes = tree["nodes"].as_array().expect("nodes array");
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[1]["depth"], 1);
    assert_eq!(nodes[1]["issue"]["id"], "doit-epic.1");
}

#[test]
fn api_key_selects_tenant_until_revoked() {
    let dir = Workspace::new("keys");
    with_tenant(&dir);
    let db = dir.db();

    let issued = doit_json(&db, ["key", "issue", "acme", "--label", "ci"]);
    let raw_key = issued["rawKey"].as_str().expect("raw key").to_string();
    let prefix = issued["key"]["prefix"].as_str().expect("prefix").to_string();

    let output = run_doit(&db, ["--api-key", &raw_key, "issue", "add", "via key", "--json"]);
    assert_success(&output);
    assert_eq!(parse_json_stdout(&output)["issue"]["title"], "via key");

    doit_json(&db, ["key", "revoke", &prefix]);
    let output = run_doit(&db, ["--api-key", &raw_key, "issue", "list"]);
    assert_failure(&output);
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to authenticate"));
}

#[test]
fn export_writes_jsonl_file() {
    let dir = Workspace::new("export");
    with_tenant(&dir);
    let db = dir.db();

    doit_json(&db, ["--tenant", "acme", "issue", "add", "keep me", "--id", "doit-k"]);
    doit_json(
        &db,
        ["--tenant", "acme", "issue", "add", "scratch", "--id", "doit-s", "--ephemeral"],
    );

    let out = dir.path().join("export/issues.jsonl");
    let out_arg = out.to_string_lossy().to_string();
    let payload = doit_json(&db, ["--tenant", "acme", "export", "--output", &out_arg]);
    assert_eq!(payload["count"], 1);

    let text = fs::read_to_string(&out).expect("export file should exist");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1);
    let record: Value = serde_json::from_str(lines[0]).expect("valid jsonl line");
    assert_eq!(record["id"], "doit-k");
}

#[test]
fn compaction_leaves_recent_closures_alone() {
    let dir = Workspace::new("compact");
    with_tenant(&dir);
    let db = dir.db();

    doit_json(&db, ["--tenant", "acme", "issue", "add", "done", "--id", "doit-d"]);
    doit_json(&db, ["--tenant", "acme", "issue", "close", "doit-d"]);
    let payload = doit_json(&db, ["--tenant", "acme", "compact", "run"]);
    assert_eq!(payload["compacted"].as_array().map(Vec::len), Some(0));

    let snapshots = doit_json(&db, ["--tenant", "acme", "compact", "snapshots", "doit-d"]);
    assert_eq!(snapshots["snapshots"].as_array().map(Vec::len), Some(0));
}

#[test]
fn invalid_values_are_rejected() {
    let dir = Workspace::new("invalid");
    with_tenant(&dir);
    let db = dir.db();

    assert_failure(&run_doit(
        &db,
        ["--tenant", "acme", "issue", "add", "x", "--priority", "9"],
    ));
    assert_failure(&run_doit(
        &db,
        ["--tenant", "acme", "issue", "add", "x", "--type", "saga"],
    ));
    assert_failure(&run_doit(
        &db,
        ["--tenant", "acme", "issue", "add", "x", "--defer", "someday"],
    ));
    assert_failure(&run_doit(&db, ["--tenant", "nope", "issue", "list"]));
}
