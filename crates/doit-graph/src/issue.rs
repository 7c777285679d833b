//! Issue type: the universal work item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::content_hash::ContentHash;
use crate::error::StoreError;

pub const MIN_PRIORITY: i32 = 0;
pub const MAX_PRIORITY: i32 = 4;
pub const DEFAULT_PRIORITY: i32 = 2;

/// Workflow state of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Open,
    InProgress,
    Blocked,
    Deferred,
    Closed,
    Pinned,
    Hooked,
}

impl Status {
    pub const ALL: [Status; 7] = [
        Status::Open,
        Status::InProgress,
        Status::Blocked,
        Status::Deferred,
        Status::Closed,
        Status::Pinned,
        Status::Hooked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Open => "open",
            Status::InProgress => "in_progress",
            Status::Blocked => "blocked",
            Status::Deferred => "deferred",
            Status::Closed => "closed",
            Status::Pinned => "pinned",
            Status::Hooked => "hooked",
        }
    }
}

impl FromStr for Status {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| StoreError::validation(format!("unknown status `{s}`")))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Bug,
    Feature,
    #[default]
    Task,
    Epic,
    Chore,
    Decision,
    Message,
    Molecule,
    Event,
}

impl IssueType {
    pub const ALL: [IssueType; 9] = [
        IssueType::Bug,
        IssueType::Feature,
        IssueType::Task,
        IssueType::Epic,
        IssueType::Chore,
        IssueType::Decision,
        IssueType::Message,
        IssueType::Molecule,
        IssueType::Event,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Bug => "bug",
            IssueType::Feature => "feature",
            IssueType::Task => "task",
            IssueType::Epic => "epic",
            IssueType::Chore => "chore",
            IssueType::Decision => "decision",
            IssueType::Message => "message",
            IssueType::Molecule => "molecule",
            IssueType::Event => "event",
        }
    }
}

impl FromStr for IssueType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IssueType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| StoreError::validation(format!("unknown issue type `{s}`")))
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Memory-decay stage. Only ever moves forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum CompactionLevel {
    #[default]
    Full = 0,
    Summarized = 1,
    Minimal = 2,
}

impl CompactionLevel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<CompactionLevel> for u8 {
    fn from(level: CompactionLevel) -> Self {
        level.as_u8()
    }
}

impl TryFrom<u8> for CompactionLevel {
    type Error = StoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CompactionLevel::Full),
            1 => Ok(CompactionLevel::Summarized),
            2 => Ok(CompactionLevel::Minimal),
            other => Err(StoreError::validation(format!(
                "compaction level out of range: {other}"
            ))),
        }
    }
}

impl fmt::Display for CompactionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// A tracked work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    // ── Identity & scope ──
    pub id: String,
    pub tenant_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,

    // ── Content ──
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub design: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub acceptance_criteria: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    pub content_hash: ContentHash,

    // ── Status & workflow ──
    pub status: Status,
    pub priority: i32,
    pub issue_type: IssueType,

    // ── Assignment ──
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub assignee: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_by: String,

    // ── Timestamps ──
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defer_until: Option<DateTime<Utc>>,

    // ── Closure ──
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub close_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,

    // ── Compaction ──
    pub compaction_level: CompactionLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compacted_at: Option<DateTime<Utc>>,

    // ── Flags ──
    #[serde(default)]
    pub ephemeral: bool,
    #[serde(default)]
    pub pinned: bool,

    // ── Denormalized (populated on read) ──
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Issue {
    /// Fingerprint of the free-text fields.
    pub fn compute_content_hash(&self) -> ContentHash {
        content_hash_of(
            &self.title,
            &self.description,
            &self.design,
            &self.acceptance_criteria,
            &self.notes,
        )
    }
}

pub(crate) fn content_hash_of(
    title: &str,
    description: &str,
    design: &str,
    acceptance_criteria: &str,
    notes: &str,
) -> ContentHash {
    ContentHash::builder()
        .field("title", title)
        .field("description", description)
        .field("design", design)
        .field("acceptance_criteria", acceptance_criteria)
        .field("notes", notes)
        .finish()
}

pub(crate) fn validate_priority(priority: i32) -> Result<i32, StoreError> {
    if (MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        Ok(priority)
    } else {
        Err(StoreError::validation(format!(
            "priority must be in range [{MIN_PRIORITY}, {MAX_PRIORITY}] (got {priority})"
        )))
    }
}

/// Input for `Store::create_issue`.
#[derive(Debug, Clone, Default)]
pub struct NewIssue {
    /// Pre-allocated identifier (hash ID or dotted child ID).
    pub id: String,
    pub title: String,
    pub description: String,
    pub design: String,
    pub acceptance_criteria: String,
    pub notes: String,
    pub status: Status,
    pub priority: Option<i32>,
    pub issue_type: IssueType,
    pub assignee: String,
    pub owner: String,
    pub created_by: String,
    pub project_id: Option<Uuid>,
    /// Creates a `parent-child` edge from the new issue to this parent.
    pub parent_id: Option<String>,
    pub labels: Vec<String>,
    pub ephemeral: bool,
    pub due_at: Option<DateTime<Utc>>,
    pub defer_until: Option<DateTime<Utc>>,
}

impl NewIssue {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update. `None` leaves a field unchanged; it never clears it.
///
/// Nullable columns use a nested option: `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct IssueUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub design: Option<String>,
    pub acceptance_criteria: Option<String>,
    pub notes: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<i32>,
    pub assignee: Option<String>,
    pub owner: Option<String>,
    pub due_at: Option<Option<DateTime<Utc>>>,
    pub defer_until: Option<Option<DateTime<Utc>>>,
    pub close_reason: Option<String>,
    pub pinned: Option<bool>,
    pub external_ref: Option<Option<String>>,
}

impl IssueUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.design.is_none()
            && self.acceptance_criteria.is_none()
            && self.notes.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.assignee.is_none()
            && self.owner.is_none()
            && self.due_at.is_none()
            && self.defer_until.is_none()
            && self.close_reason.is_none()
            && self.pinned.is_none()
            && self.external_ref.is_none()
    }

    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Discussion entry on an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub issue_id: String,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Category of an audit trail entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Created,
    Updated,
    StatusChanged,
    Commented,
    Closed,
    Reopened,
    DependencyAdded,
    DependencyRemoved,
    LabelAdded,
    LabelRemoved,
    Compacted,
}

impl EventType {
    pub const ALL: [EventType; 11] = [
        EventType::Created,
        EventType::Updated,
        EventType::StatusChanged,
        EventType::Commented,
        EventType::Closed,
        EventType::Reopened,
        EventType::DependencyAdded,
        EventType::DependencyRemoved,
        EventType::LabelAdded,
        EventType::LabelRemoved,
        EventType::Compacted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Created => "created",
            EventType::Updated => "updated",
            EventType::StatusChanged => "status_changed",
            EventType::Commented => "commented",
            EventType::Closed => "closed",
            EventType::Reopened => "reopened",
            EventType::DependencyAdded => "dependency_added",
            EventType::DependencyRemoved => "dependency_removed",
            EventType::LabelAdded => "label_added",
            EventType::LabelRemoved => "label_removed",
            EventType::Compacted => "compacted",
        }
    }
}

impl FromStr for EventType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| StoreError::validation(format!("unknown event type `{s}`")))
    }
}

/// Audit trail entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub issue_id: String,
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for `Store::add_event`.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub issue_id: String,
    pub event_type: EventType,
    pub actor: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub comment: Option<String>,
}

impl NewEvent {
    pub fn new(issue_id: impl Into<String>, event_type: EventType) -> Self {
        Self {
            issue_id: issue_id.into(),
            event_type,
            actor: String::new(),
            old_value: None,
            new_value: None,
            comment: None,
        }
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn values(mut self, old: Option<String>, new: Option<String>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Content preserved immediately before a compaction transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionSnapshot {
    pub id: i64,
    pub issue_id: String,
    pub level: CompactionLevel,
    pub title: String,
    pub description: String,
    pub design: String,
    pub acceptance_criteria: String,
    pub notes: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl CompactionSnapshot {
    /// Human-readable rendering of the preserved content.
    pub fn render_original(&self) -> String {
        let mut out = format!("Title: {}\n", self.title);
        for (label, value) in [
            ("Description", &self.description),
            ("Design", &self.design),
            ("Acceptance Criteria", &self.acceptance_criteria),
            ("Notes", &self.notes),
        ] {
            if !value.is_empty() {
                out.push_str(&format!("{label}: {value}\n"));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert!("done".parse::<Status>().is_err());
    }

    #[test]
    fn compaction_levels_are_ordered() {
        assert!(CompactionLevel::Full < CompactionLevel::Summarized);
        assert!(CompactionLevel::Summarized < CompactionLevel::Minimal);
        assert!(CompactionLevel::try_from(3).is_err());
        assert_eq!(
            serde_json::to_string(&CompactionLevel::Minimal).unwrap(),
            "2"
        );
    }

    #[test]
    fn priority_bounds_are_enforced() {
        assert!(validate_priority(0).is_ok());
        assert!(validate_priority(4).is_ok());
        assert!(matches!(
            validate_priority(5),
            Err(StoreError::Validation(_))
        ));
        assert!(validate_priority(-1).is_err());
    }

    #[test]
    fn render_original_skips_empty_sections() {
        let snapshot = CompactionSnapshot {
            id: 1,
            issue_id: "doit-abc".to_string(),
            level: CompactionLevel::Summarized,
            title: "Fix login".to_string(),
            description: "Users cannot log in".to_string(),
            design: String::new(),
            acceptance_criteria: String::new(),
            notes: "see logs".to_string(),
            summary: String::new(),
            created_at: Utc::now(),
        };
        assert_eq!(
            snapshot.render_original(),
            "Title: Fix login\nDescription: Users cannot log in\nNotes: see logs\n"
        );
    }
}
