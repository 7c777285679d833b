//! Typed issue filters.
//!
//! Callers describe what they want as [`Predicate`] values; the store
//! translates them into SQL with bound parameters.

use chrono::{DateTime, Utc};
use std::str::FromStr;

use crate::error::StoreError;
use crate::issue::{IssueType, Status};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Status(Status),
    ExcludeStatuses(Vec<Status>),
    Priority(i32),
    Type(IssueType),
    ExcludeTypes(Vec<IssueType>),
    Assignee(String),
    Owner(String),
    Ephemeral(bool),
    Pinned(bool),
    /// Direct children of the given issue.
    Parent(String),
    /// Case-insensitive substring over title and description.
    Search(String),
    /// Carries every one of these labels.
    LabelsAll(Vec<String>),
    /// Carries at least one of these labels.
    LabelsAny(Vec<String>),
    CreatedAfter(DateTime<Utc>),
    CreatedBefore(DateTime<Utc>),
    UpdatedAfter(DateTime<Utc>),
    /// Not closed and due before the given instant.
    OverdueAt(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Priority ascending, then oldest first.
    Priority,
    /// Oldest first.
    Oldest,
    /// Most recently updated first.
    Updated,
    /// Priority ascending, then most recently updated first.
    #[default]
    Hybrid,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Priority => "priority",
            SortOrder::Oldest => "oldest",
            SortOrder::Updated => "updated",
            SortOrder::Hybrid => "hybrid",
        }
    }
}

impl FromStr for SortOrder {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "priority" => Ok(SortOrder::Priority),
            "oldest" => Ok(SortOrder::Oldest),
            "updated" => Ok(SortOrder::Updated),
            "hybrid" | "" => Ok(SortOrder::Hybrid),
            other => Err(StoreError::validation(format!(
                "unknown sort order `{other}` (expected priority, oldest, updated or hybrid)"
            ))),
        }
    }
}

/// Predicates are ANDed together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueFilter {
    pub predicates: Vec<Predicate>,
    pub sort: SortOrder,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl IssueFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn status(self, status: Status) -> Self {
        self.with(Predicate::Status(status))
    }

    pub fn issue_type(self, issue_type: IssueType) -> Self {
        self.with(Predicate::Type(issue_type))
    }

    pub fn assignee(self, assignee: impl Into<String>) -> Self {
        self.with(Predicate::Assignee(assignee.into()))
    }

    pub fn parent(self, parent_id: impl Into<String>) -> Self {
        self.with(Predicate::Parent(parent_id.into()))
    }

    pub fn search(self, text: impl Into<String>) -> Self {
        self.with(Predicate::Search(text.into()))
    }

    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_predicates_in_order() {
        let filter = IssueFilter::new()
            .status(Status::Open)
            .assignee("alice")
            .search("login")
            .limit(10);
        assert_eq!(
            filter.predicates,
            vec![
                Predicate::Status(Status::Open),
                Predicate::Assignee("alice".into()),
                Predicate::Search("login".into()),
            ]
        );
        assert_eq!(filter.limit, Some(10));
        assert_eq!(filter.sort, SortOrder::Hybrid);
    }

    #[test]
    fn sort_order_parses() {
        assert_eq!("oldest".parse::<SortOrder>().unwrap(), SortOrder::Oldest);
        assert_eq!("".parse::<SortOrder>().unwrap(), SortOrder::Hybrid);
        assert!("newest".parse::<SortOrder>().is_err());
    }
}
