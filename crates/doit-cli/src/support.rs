use crate::cli::GlobalArgs;
use chrono::{DateTime, TimeDelta, Utc};
use doit_graph::{Project, Scope, Store, StoreConfig};
use serde::Serialize;
use std::fmt::Display;

/// Prints `error: <message>` and exits 1.
pub fn fail(message: impl Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

pub trait OrExit<T> {
    /// Unwraps or fails with `<what>: <error>`.
    fn or_exit(self, what: &str) -> T;
}

impl<T, E: Display> OrExit<T> for Result<T, E> {
    fn or_exit(self, what: &str) -> T {
        self.unwrap_or_else(|e| fail(format!("{what}: {e}")))
    }
}

pub fn load_config(global: &GlobalArgs) -> StoreConfig {
    let mut config = StoreConfig::load(global.config.as_deref()).or_exit("failed to load config");
    if let Some(db) = &global.db {
        config.database_path = db.clone();
    }
    config
}

pub fn open_store(config: &StoreConfig) -> Store {
    Store::open(config.clone()).unwrap_or_else(|e| {
        fail(format!(
            "failed to open {}: {e}",
            config.database_path.display()
        ))
    })
}

/// Store plus the caller's resolved tenant scope.
pub struct Session {
    pub store: Store,
    pub scope: Scope,
    pub project: Option<Project>,
    pub actor: String,
    pub json: bool,
}

impl Session {
    pub fn open(global: &GlobalArgs, config: &StoreConfig) -> Self {
        let store = open_store(config);
        let tenant = match (&global.tenant, &global.api_key) {
            (Some(slug), _) => store.tenant_by_slug(slug).or_exit("failed to resolve tenant"),
            (None, Some(key)) => store.resolve_api_key(key).or_exit("failed to authenticate"),
            (None, None) => fail("no tenant selected (pass --tenant or --api-key)"),
        };
        let mut scope = Scope::tenant(tenant.id);
        let project = global.project.as_deref().map(|slug| {
            store
                .project_by_slug(&scope, slug)
                .or_exit("failed to resolve project")
        });
        if let Some(project) = &project {
            scope = scope.with_projects([project.id]);
        }
        tracing::debug!(tenant = %tenant.slug, project = ?global.project, "session opened");
        Self {
            store,
            scope,
            project,
            actor: global.actor.clone(),
            json: global.json,
        }
    }

    pub fn project_id(&self) -> Option<uuid::Uuid> {
        self.project.as_ref().map(|p| p.id)
    }
}

pub fn print_json(value: &impl Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).expect("json serialization")
    );
}

/// RFC 3339, or a relative offset from now: `+3d`, `12h`, `30m`, `2w`.
pub fn parse_when(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    let body = raw.strip_prefix('+').unwrap_or(raw);
    let unit = body
        .chars()
        .last()
        .ok_or_else(|| format!("invalid time `{raw}` (expected RFC 3339 or e.g. +3d)"))?;
    let amount: i64 = body[..body.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| format!("invalid time `{raw}` (expected RFC 3339 or e.g. +3d)"))?;
    let offset = match unit {
        'm' => TimeDelta::try_minutes(amount),
        'h' => TimeDelta::try_hours(amount),
        'd' => TimeDelta::try_days(amount),
        'w' => TimeDelta::try_weeks(amount),
        _ => return Err(format!("invalid time unit in `{raw}` (use m, h, d or w)")),
    };
    offset
        .and_then(|offset| now.checked_add_signed(offset))
        .ok_or_else(|| format!("time `{raw}` is out of range"))
}

/// Like [`parse_when`], but `none` (or empty) clears the field.
pub fn parse_optional_when(
    raw: &str,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, String> {
    match raw.trim() {
        "" | "none" => Ok(None),
        other => parse_when(other, now).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_times_offset_from_now() {
        let now = Utc::now();
        assert_eq!(parse_when("+3d", now).unwrap(), now + TimeDelta::days(3));
        assert_eq!(parse_when("12h", now).unwrap(), now + TimeDelta::hours(12));
        assert_eq!(parse_when("2w", now).unwrap(), now + TimeDelta::weeks(2));
        assert!(parse_when("3y", now).is_err());
        assert!(parse_when("soon", now).is_err());
        assert!(parse_when("", now).is_err());
    }

    #[test]
    fn oversized_offsets_are_errors() {
        let now = Utc::now();
        let err = parse_when("+99999999999999d", now).unwrap_err();
        assert!(err.contains("out of range"), "{err}");
        assert!(parse_when("+9223372036854775807m", now).is_err());
        assert!(parse_when("+-99999999999w", now).is_err());
    }

    #[test]
    fn absolute_times_and_clearing() {
        let now = Utc::now();
        let at = parse_when("2026-01-02T03:04:05Z", now).unwrap();
        assert_eq!(at.to_rfc3339(), "2026-01-02T03:04:05+00:00");
        assert_eq!(parse_optional_when("none", now).unwrap(), None);
        assert!(parse_optional_when("+1d", now).unwrap().is_some());
    }
}
