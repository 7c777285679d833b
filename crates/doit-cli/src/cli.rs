use clap::{Args, Parser, Subcommand};
use doit_graph::{DepType, Direction, IssueType, LessonStatus, SortOrder, Status};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "doit",
    about = "doit: a dependency-aware work graph for autonomous agents",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone, Debug)]
pub struct GlobalArgs {
    /// TOML config file
    #[arg(long, global = true, env = "DOIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database path (overrides config and DOIT_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Tenant slug to operate in
    #[arg(long, global = true, env = "DOIT_TENANT")]
    pub tenant: Option<String>,

    /// API key; resolves the tenant when --tenant is absent
    #[arg(long, global = true, env = "DOIT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Project slug; narrows reads and tags new issues
    #[arg(long, global = true, env = "DOIT_PROJECT")]
    pub project: Option<String>,

    /// Actor recorded on events
    #[arg(long, global = true, env = "DOIT_ACTOR", default_value = "cli")]
    pub actor: String,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and apply migrations
    Init,

    /// Manage tenants
    Tenant {
        #[command(subcommand)]
        command: TenantCommands,
    },

    /// Manage projects in the current tenant
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Manage API keys
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },

    /// Manage issues
    Issue {
        #[command(subcommand)]
        command: IssueCommands,
    },

    /// Manage dependencies between issues
    Dep {
        #[command(subcommand)]
        command: DepCommands,
    },

    /// List open, unblocked, non-deferred issues
    Ready {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Show the parent-child hierarchy below an issue
    Tree {
        /// Root issue ID
        id: String,

        /// Maximum depth below the root
        #[arg(long, default_value_t = 10)]
        max_depth: usize,
    },

    /// Manage labels
    Label {
        #[command(subcommand)]
        command: LabelCommands,
    },

    /// Manage comments
    Comment {
        #[command(subcommand)]
        command: CommentCommands,
    },

    /// Compact aged closed issues
    Compact {
        #[command(subcommand)]
        command: CompactCommands,
    },

    /// Record and query lessons learned
    Lesson {
        #[command(subcommand)]
        command: LessonCommands,
    },

    /// Send messages between agents
    Message {
        #[command(subcommand)]
        command: MessageCommands,
    },

    /// Export non-ephemeral issues as JSONL
    Export {
        /// Output file; stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum TenantCommands {
    /// Create a tenant
    Create {
        /// Display name
        name: String,

        /// URL-safe slug
        slug: String,
    },

    /// List tenants
    List,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ProjectCommands {
    /// Create a project
    Create {
        /// Display name
        name: String,

        /// URL-safe slug, unique within the tenant
        slug: String,
    },

    /// List projects
    List,

    /// Rename or re-slug a project
    Update {
        /// Current slug
        slug: String,

        /// New display name
        #[arg(long)]
        name: Option<String>,

        /// New slug
        #[arg(long = "new-slug")]
        new_slug: Option<String>,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum KeyCommands {
    /// Mint a key for a tenant; the raw key is printed once
    Issue {
        /// Tenant slug
        tenant_slug: String,

        /// Free-form label
        #[arg(long, default_value = "")]
        label: String,
    },

    /// List keys of a tenant
    List {
        /// Tenant slug
        tenant_slug: String,
    },

    /// Revoke every live key with this prefix
    Revoke {
        /// Key prefix as shown by `key list`
        prefix: String,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum IssueCommands {
    /// Add a new issue
    Add {
        /// Issue title
        title: String,

        /// Optional explicit issue ID
        #[arg(long)]
        id: Option<String>,

        /// Parent issue; the ID becomes the next dotted child ID
        #[arg(long)]
        parent: Option<String>,

        /// Issue description
        #[arg(long, default_value = "")]
        description: String,

        /// Design notes
        #[arg(long, default_value = "")]
        design: String,

        /// Acceptance criteria
        #[arg(long = "acceptance", default_value = "")]
        acceptance_criteria: String,

        /// Working notes
        #[arg(long, default_value = "")]
        notes: String,

        /// Priority (0 = highest, 4 = lowest)
        #[arg(long)]
        priority: Option<i32>,

        /// Issue type
        #[arg(long = "type", default_value = "task")]
        issue_type: IssueType,

        /// Assignee
        #[arg(long, default_value = "")]
        assignee: String,

        /// Owner
        #[arg(long, default_value = "")]
        owner: String,

        /// Label (repeatable)
        #[arg(long = "label")]
        labels: Vec<String>,

        /// Due time: RFC 3339 or relative (`+3d`, `12h`)
        #[arg(long)]
        due: Option<String>,

        /// Hide from ready work until this time
        #[arg(long)]
        defer: Option<String>,

        /// Leave out of exports
        #[arg(long)]
        ephemeral: bool,
    },

    /// Show one issue
    Show {
        /// Issue ID
        id: String,
    },

    /// List issues
    List {
        #[command(flatten)]
        filter: FilterArgs,

        /// Sort order: priority, oldest, updated, hybrid
        #[arg(long, default_value = "hybrid")]
        sort: SortOrder,

        /// Skip this many results
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Update fields of an issue
    Update {
        /// Issue ID
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// New design notes
        #[arg(long)]
        design: Option<String>,

        /// New acceptance criteria
        #[arg(long = "acceptance")]
        acceptance_criteria: Option<String>,

        /// New working notes
        #[arg(long)]
        notes: Option<String>,

        /// New status
        #[arg(long)]
        status: Option<Status>,

        /// New priority
        #[arg(long)]
        priority: Option<i32>,

        /// New assignee
        #[arg(long)]
        assignee: Option<String>,

        /// New owner
        #[arg(long)]
        owner: Option<String>,

        /// Due time; `none` clears it
        #[arg(long)]
        due: Option<String>,

        /// Defer time; `none` clears it
        #[arg(long)]
        defer: Option<String>,

        /// Pin or unpin
        #[arg(long)]
        pinned: Option<bool>,
    },

    /// Close an issue
    Close {
        /// Issue ID
        id: String,

        /// Close reason
        #[arg(long, default_value = "")]
        reason: String,
    },

    /// Reopen a closed issue
    Reopen {
        /// Issue ID
        id: String,
    },

    /// Delete an issue with its edges, labels, comments and events
    Delete {
        /// Issue ID
        id: String,
    },

    /// Count issues per status
    Stats,

    /// Show the audit trail of an issue, newest first
    Events {
        /// Issue ID
        id: String,

        /// Maximum number of events
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Reserve the next dotted child ID under a parent
    ChildId {
        /// Parent issue ID
        parent: String,
    },
}

/// Filters shared by `issue list` and `ready`.
#[derive(Args, Clone, Debug, Default)]
pub struct FilterArgs {
    /// Only this status
    #[arg(long)]
    pub status: Option<Status>,

    /// Only this type
    #[arg(long = "type")]
    pub issue_type: Option<IssueType>,

    /// Only this priority
    #[arg(long)]
    pub priority: Option<i32>,

    /// Only this assignee
    #[arg(long)]
    pub assignee: Option<String>,

    /// Must carry this label (repeatable; all required)
    #[arg(long = "label")]
    pub labels: Vec<String>,

    /// Must carry at least one of these labels (repeatable)
    #[arg(long = "any-label")]
    pub any_labels: Vec<String>,

    /// Direct children of this issue
    #[arg(long)]
    pub parent: Option<String>,

    /// Substring match over title and description
    #[arg(long)]
    pub search: Option<String>,

    /// Maximum number of results (clamped to the configured max)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum DepCommands {
    /// Add a dependency edge (upserts the type)
    Add {
        /// Source issue ID
        issue_id: String,

        /// Target dependency issue ID
        depends_on_id: String,

        /// Dependency type
        #[arg(long = "type", default_value = "blocks")]
        dep_type: DepType,
    },

    /// Remove a dependency edge
    Remove {
        /// Source issue ID
        issue_id: String,

        /// Target dependency issue ID
        depends_on_id: String,
    },

    /// List edges touching an issue
    List {
        /// Issue ID
        id: String,

        /// upstream, downstream, or both
        #[arg(long, default_value = "upstream")]
        direction: Direction,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum LabelCommands {
    /// Attach a label
    Add {
        /// Issue ID
        id: String,

        /// Label
        label: String,
    },

    /// Detach a label
    Remove {
        /// Issue ID
        id: String,

        /// Label
        label: String,
    },

    /// List labels of an issue
    List {
        /// Issue ID
        id: String,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum CommentCommands {
    /// Append a comment
    Add {
        /// Issue ID
        id: String,

        /// Comment text
        text: String,
    },

    /// List comments, oldest first
    List {
        /// Issue ID
        id: String,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum CompactCommands {
    /// Run one compaction batch
    Run {
        /// Closed-age threshold in hours (defaults to config)
        #[arg(long)]
        older_than_hours: Option<u64>,

        /// Batch size (defaults to config)
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Show the content preserved before each compaction of an issue
    Snapshots {
        /// Issue ID
        id: String,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum LessonCommands {
    /// Record a lesson
    Record {
        /// Short title
        title: String,

        /// What went wrong
        #[arg(long)]
        mistake: String,

        /// What to do instead
        #[arg(long)]
        correction: String,

        /// Expert area
        #[arg(long, default_value = "")]
        expert: String,

        /// Affected component (repeatable)
        #[arg(long = "component")]
        components: Vec<String>,

        /// Severity 1 (critical) to 4 (minor)
        #[arg(long)]
        severity: Option<i32>,

        /// Issue the lesson came from
        #[arg(long)]
        issue: Option<String>,
    },

    /// List lessons, most severe first
    List {
        /// open or resolved
        #[arg(long)]
        status: Option<LessonStatus>,

        /// Expert area
        #[arg(long)]
        expert: Option<String>,

        /// Component
        #[arg(long)]
        component: Option<String>,

        /// Severity
        #[arg(long)]
        severity: Option<i32>,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Mark a lesson resolved
    Resolve {
        /// Lesson ID
        id: String,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum MessageCommands {
    /// Send a message
    Send {
        /// Recipient
        to: String,

        /// Message body; the title is derived from it
        body: String,

        /// Message being replied to
        #[arg(long)]
        thread: Option<String>,

        /// Leave out of exports
        #[arg(long)]
        ephemeral: bool,
    },

    /// List messages addressed to a recipient
    Inbox {
        /// Recipient
        to: String,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
    },
}
