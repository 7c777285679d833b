//! Dependency types: typed edges in the issue graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// A directed edge `issue_id -> depends_on_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub issue_id: String,
    pub depends_on_id: String,
    #[serde(rename = "type", alias = "dep_type")]
    pub dep_type: DepType,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

/// Dependency type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DepType {
    Blocks,
    ConditionalBlocks,
    WaitsFor,
    ParentChild,
    Related,
    RelatesTo,
    DiscoveredFrom,
    CausedBy,
    RepliesTo,
    Duplicates,
    Supersedes,
    AuthoredBy,
    AssignedTo,
    ApprovedBy,
    Attests,
    Validates,
    Tracks,
    Until,
    DelegatedFrom,
}

impl DepType {
    pub const ALL: [DepType; 19] = [
        DepType::Blocks,
        DepType::ConditionalBlocks,
        DepType::WaitsFor,
        DepType::ParentChild,
        DepType::Related,
        DepType::RelatesTo,
        DepType::DiscoveredFrom,
        DepType::CausedBy,
        DepType::RepliesTo,
        DepType::Duplicates,
        DepType::Supersedes,
        DepType::AuthoredBy,
        DepType::AssignedTo,
        DepType::ApprovedBy,
        DepType::Attests,
        DepType::Validates,
        DepType::Tracks,
        DepType::Until,
        DepType::DelegatedFrom,
    ];

    /// Whether this edge excludes its source from ready work.
    ///
    /// `conditional-blocks` and `waits-for` are stored but do not gate.
    pub fn is_blocking(&self) -> bool {
        matches!(self, DepType::Blocks)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DepType::Blocks => "blocks",
            DepType::ConditionalBlocks => "conditional-blocks",
            DepType::WaitsFor => "waits-for",
            DepType::ParentChild => "parent-child",
            DepType::Related => "related",
            DepType::RelatesTo => "relates-to",
            DepType::DiscoveredFrom => "discovered-from",
            DepType::CausedBy => "caused-by",
            DepType::RepliesTo => "replies-to",
            DepType::Duplicates => "duplicates",
            DepType::Supersedes => "supersedes",
            DepType::AuthoredBy => "authored-by",
            DepType::AssignedTo => "assigned-to",
            DepType::ApprovedBy => "approved-by",
            DepType::Attests => "attests",
            DepType::Validates => "validates",
            DepType::Tracks => "tracks",
            DepType::Until => "until",
            DepType::DelegatedFrom => "delegated-from",
        }
    }
}

impl FromStr for DepType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DepType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| StoreError::validation(format!("unknown dependency type `{s}`")))
    }
}

impl fmt::Display for DepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of an edge the queried issue sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Edges where the issue is the source (what it depends on).
    #[default]
    Upstream,
    /// Edges where the issue is the target (what depends on it).
    Downstream,
    Both,
}

impl FromStr for Direction {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "upstream" | "up" => Ok(Direction::Upstream),
            "downstream" | "down" => Ok(Direction::Downstream),
            "both" => Ok(Direction::Both),
            other => Err(StoreError::validation(format!(
                "unknown direction `{other}` (expected upstream, downstream or both)"
            ))),
        }
    }
}
