//! Identifier allocation: hash IDs and dotted child IDs.
//!
//! Hash IDs are `<prefix>-<hex>`, where the hex is a truncated SHA-256 over
//! `<unix-nanos>-<random>-<attempt>`. The hex length grows with the
//! population so collisions stay rare without making small trackers carry
//! long IDs.

use chrono::Utc;
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::config::validate_id_prefix;
use crate::content_hash::sha256_hex;
use crate::error::{Result, StoreError};
use crate::scope::Scope;
use crate::store::Store;

pub const MAX_ID_ATTEMPTS: u32 = 30;
/// Consecutive collisions before the hash grows by one character.
pub const ATTEMPTS_PER_LENGTH: u32 = 10;

/// 3 chars up to 100 items, 4 up to 500, 5 up to 1500, 6 beyond.
pub fn hash_length_for(population: u64) -> usize {
    match population {
        0..=100 => 3,
        101..=500 => 4,
        501..=1500 => 5,
        _ => 6,
    }
}

/// Core allocation loop.
///
/// `exists` reports whether a candidate is taken; `seed` produces the hash
/// input for an attempt number.
pub fn allocate_id(
    prefix: &str,
    population: u64,
    mut exists: impl FnMut(&str) -> Result<bool>,
    mut seed: impl FnMut(u32) -> String,
) -> Result<String> {
    let mut length = hash_length_for(population);
    for attempt in 0..MAX_ID_ATTEMPTS {
        let digest = sha256_hex(&seed(attempt));
        let candidate = format!("{prefix}-{}", &digest[..length.min(digest.len())]);
        if !exists(&candidate)? {
            return Ok(candidate);
        }
        tracing::debug!(candidate, attempt, "id collision");
        if attempt % ATTEMPTS_PER_LENGTH == ATTEMPTS_PER_LENGTH - 1 {
            length += 1;
        }
    }
    Err(StoreError::ResourceExhausted(format!(
        "could not allocate a unique `{prefix}` id after {MAX_ID_ATTEMPTS} attempts"
    )))
}

fn default_seed(attempt: u32) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let random = Uuid::new_v4().as_u128() as u64;
    format!("{nanos}-{random}-{attempt}")
}

/// Tables that own hash IDs.
#[derive(Debug, Clone, Copy)]
pub(crate) enum IdTable {
    Issues,
    Lessons,
}

impl IdTable {
    fn name(self) -> &'static str {
        match self {
            IdTable::Issues => "issues",
            IdTable::Lessons => "lessons",
        }
    }
}

pub(crate) fn allocate_in(
    conn: &Connection,
    table: IdTable,
    tenant_id: Uuid,
    prefix: &str,
) -> Result<String> {
    let table = table.name();
    let population: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE tenant_id = ?1"),
        params![tenant_id.to_string()],
        |row| row.get(0),
    )?;
    let exists_sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1)");
    allocate_id(
        prefix,
        u64::try_from(population).unwrap_or(0),
        |candidate| Ok(conn.query_row(&exists_sql, params![candidate], |row| row.get(0))?),
        default_seed,
    )
}

impl Store {
    /// New top-level issue ID. An empty prefix uses the configured default.
    pub fn generate_id(&self, scope: &Scope, prefix: &str) -> Result<String> {
        let tenant_id = scope.tenant_id("generate_id")?;
        let prefix = if prefix.trim().is_empty() {
            self.config().id_prefix.clone()
        } else {
            prefix.trim().to_string()
        };
        validate_id_prefix(&prefix)?;
        self.with_conn(|conn| allocate_in(conn, IdTable::Issues, tenant_id, &prefix))
    }

    /// Next dotted child ID for `parent_id` (`parent.1`, `parent.2`, ...).
    ///
    /// A single upsert-increment, so concurrent callers receive distinct
    /// sequential numbers. Counters outlive deleted children.
    pub fn next_child_id(&self, scope: &Scope, parent_id: &str) -> Result<String> {
        let tenant_id = scope.tenant_id("next_child_id")?;
        let n: i64 = self.with_tx(|tx| {
            crate::store::ensure_issue(tx, tenant_id, parent_id)?;
            Ok(tx.query_row(
                r#"
                INSERT INTO child_counters (parent_id, last_child) VALUES (?1, 1)
                ON CONFLICT (parent_id) DO UPDATE SET last_child = last_child + 1
                RETURNING last_child
                "#,
                params![parent_id],
                |row| row.get(0),
            )?)
        })?;
        Ok(format!("{parent_id}.{n}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_follow_population() {
        assert_eq!(hash_length_for(0), 3);
        assert_eq!(hash_length_for(100), 3);
        assert_eq!(hash_length_for(101), 4);
        assert_eq!(hash_length_for(500), 4);
        assert_eq!(hash_length_for(501), 5);
        assert_eq!(hash_length_for(1500), 5);
        assert_eq!(hash_length_for(1501), 6);
    }

    #[test]
    fn first_free_candidate_wins() {
        let id = allocate_id("doit", 0, |_| Ok(false), |a| format!("seed-{a}")).unwrap();
        let expected = &sha256_hex("seed-0")[..3];
        assert_eq!(id, format!("doit-{expected}"));
    }

    #[test]
    fn length_grows_after_ten_collisions() {
        let mut lengths = Vec::new();
        let id = allocate_id(
            "doit",
            0,
            |candidate| {
                lengths.push(candidate.len() - "doit-".len());
                Ok(lengths.len() <= 10)
            },
            |a| format!("seed-{a}"),
        )
        .unwrap();
        assert_eq!(&lengths[..10], &[3; 10]);
        assert_eq!(lengths[10], 4);
        assert_eq!(id.len(), "doit-".len() + 4);
    }

    #[test]
    fn exhaustion_after_thirty_attempts() {
        let mut calls = 0;
        let err = allocate_id(
            "doit",
            2000,
            |_| {
                calls += 1;
                Ok(true)
            },
            |a| a.to_string(),
        )
        .unwrap_err();
        assert_eq!(calls, MAX_ID_ATTEMPTS);
        assert!(matches!(err, StoreError::ResourceExhausted(_)));
    }

    #[test]
    fn store_ids_use_configured_prefix() {
        let store = Store::open_in_memory().unwrap();
        let tenant = store.create_tenant("Acme", "acme").unwrap();
        let scope = Scope::tenant(tenant.id);
        let id = store.generate_id(&scope, "").unwrap();
        assert!(id.starts_with("doit-"));
        assert_eq!(id.len(), "doit-".len() + 3);
        assert!(store.generate_id(&scope, "Bad!").is_err());
        assert!(store.generate_id(&Scope::unbound(), "").is_err());
    }
}
