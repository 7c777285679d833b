//! Lessons learned: a mistake, its correction, and who knew better.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Result, StoreError};

pub const LESSON_ID_PREFIX: &str = "lsn";
pub const DEFAULT_SEVERITY: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    #[default]
    Open,
    Resolved,
}

impl LessonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LessonStatus::Open => "open",
            LessonStatus::Resolved => "resolved",
        }
    }
}

impl FromStr for LessonStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "open" => Ok(LessonStatus::Open),
            "resolved" => Ok(LessonStatus::Resolved),
            other => Err(StoreError::validation(format!(
                "unknown lesson status `{other}`"
            ))),
        }
    }
}

impl fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub tenant_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_id: Option<String>,
    pub title: String,
    pub mistake: String,
    pub correction: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expert: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    pub severity: i32,
    pub status: LessonStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resolved_by: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewLesson {
    pub project_id: Option<Uuid>,
    pub issue_id: Option<String>,
    pub title: String,
    pub mistake: String,
    pub correction: String,
    pub expert: String,
    pub components: Vec<String>,
    /// 1 (critical) to 4 (minor); defaults to 2.
    pub severity: Option<i32>,
    pub created_by: String,
}

impl NewLesson {
    pub(crate) fn validate(&self) -> Result<i32> {
        for (field, value) in [
            ("title", &self.title),
            ("mistake", &self.mistake),
            ("correction", &self.correction),
        ] {
            if value.trim().is_empty() {
                return Err(StoreError::validation(format!("lesson {field} is required")));
            }
        }
        let severity = self.severity.unwrap_or(DEFAULT_SEVERITY);
        if !(1..=4).contains(&severity) {
            return Err(StoreError::validation(format!(
                "lesson severity must be in range [1, 4] (got {severity})"
            )));
        }
        Ok(severity)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LessonFilter {
    pub project_id: Option<Uuid>,
    pub status: Option<LessonStatus>,
    pub expert: Option<String>,
    pub component: Option<String>,
    pub severity: Option<i32>,
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_defaults_and_bounds() {
        let mut lesson = NewLesson {
            title: "retry".into(),
            mistake: "no backoff".into(),
            correction: "exponential backoff".into(),
            ..NewLesson::default()
        };
        assert_eq!(lesson.validate().unwrap(), 2);
        lesson.severity = Some(5);
        assert!(lesson.validate().is_err());
        lesson.severity = Some(1);
        lesson.correction = "  ".into();
        assert!(lesson.validate().is_err());
    }
}
