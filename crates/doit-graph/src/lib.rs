//! # doit-graph
//!
//! Work-item graph engine backed by SQLite.
//!
//! This crate provides:
//! - `Issue`, `Dependency` and friends (the work-item model)
//! - `Store`, a pooled, tenant-scoped SQLite store with versioned schema
//! - Readiness (`Store::list_ready`) over `blocks` edges
//! - Hierarchical IDs (`Store::next_child_id`) and hash-style IDs
//! - Dependency trees, lessons, agent messages
//! - `Compactor`, which summarizes aged closed issues in two stages
//! - JSONL export for portable snapshots
//!
//! Every store operation takes a [`Scope`]; operations that need a tenant
//! fail with [`StoreError::Scope`] when handed an unbound one.
//!
//! ## Data model
//!
//! ```text
//! tenant ─┬─ project ── issue ──(typed edge)──> issue
//!         │               ├─ labels / comments / events
//!         │               └─ compaction snapshots
//!         ├─ api keys
//!         └─ lessons
//! ```

pub mod compact;
pub mod config;
pub mod content_hash;
pub mod dependency;
pub mod error;
pub mod filter;
pub mod ids;
pub mod issue;
pub mod jsonl;
pub mod lesson;
pub mod ready;
pub mod scope;
pub mod store;
pub mod tenant;
pub mod tree;

pub use compact::{CompactResult, Compactor, generate_summary, target_level};
pub use config::{CompactionConfig, StoreConfig, validate_id_prefix};
pub use content_hash::{ContentHash, ContentHashBuilder, sha256_hex};
pub use dependency::{DepType, Dependency, Direction};
pub use error::{ErrorClass, Result, StoreError};
pub use filter::{IssueFilter, Predicate, SortOrder};
pub use ids::{allocate_id, hash_length_for};
pub use issue::{
    Comment, CompactionLevel, CompactionSnapshot, DEFAULT_PRIORITY, Event, EventType, Issue,
    IssueType, IssueUpdate, MAX_PRIORITY, MIN_PRIORITY, NewEvent, NewIssue, Status,
};
pub use jsonl::{ExportRecord, read_records};
pub use lesson::{Lesson, LessonFilter, LessonStatus, NewLesson};
pub use scope::Scope;
pub use store::{NewMessage, StatusCount, Store};
pub use tenant::{ApiKeyInfo, IssuedApiKey, Project, Tenant, validate_slug};
pub use tree::TreeNode;
