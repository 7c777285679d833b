//! Tenants, projects and API keys.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::content_hash::sha256_hex;
use crate::error::{Result, StoreError};

/// Length of the displayed key prefix.
pub const API_KEY_PREFIX_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

/// Stored metadata for an API key. The raw key is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyInfo {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub prefix: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ApiKeyInfo {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

/// Returned once from `Store::issue_api_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedApiKey {
    pub raw_key: String,
    pub info: ApiKeyInfo,
}

/// 64 lowercase hex characters from two v4 UUIDs.
pub(crate) fn generate_raw_key() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub(crate) fn key_prefix(raw_key: &str) -> &str {
    raw_key.get(..API_KEY_PREFIX_LEN).unwrap_or(raw_key)
}

pub(crate) fn key_digest(raw_key: &str) -> String {
    sha256_hex(raw_key)
}

fn slug_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9-]{0,62}$").expect("slug regex must compile"))
}

pub fn validate_slug(slug: &str) -> Result<()> {
    if slug_re().is_match(slug) {
        Ok(())
    } else {
        Err(StoreError::validation(format!(
            "slug must be lowercase alphanumerics and dashes, starting with an alphanumeric (got `{slug}`)"
        )))
    }
}

pub(crate) fn validate_name(kind: &str, name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::validation(format!("{kind} name is required")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_keys_are_64_hex_chars() {
        let key = generate_raw_key();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key_prefix(&key).len(), API_KEY_PREFIX_LEN);
        assert_ne!(key, generate_raw_key());
    }

    #[test]
    fn digest_is_stable() {
        assert_eq!(key_digest("abc"), key_digest("abc"));
        assert_ne!(key_digest("abc"), key_digest("abd"));
    }

    #[test]
    fn slug_rules() {
        assert!(validate_slug("acme").is_ok());
        assert!(validate_slug("acme-2").is_ok());
        assert!(validate_slug("-acme").is_err());
        assert!(validate_slug("Acme").is_err());
        assert!(validate_slug("").is_err());
        assert!(validate_slug(&"a".repeat(64)).is_err());
    }
}
