//! SQLite-backed graph store.
//!
//! `Store` is `Send + Sync`; its only shared state is the connection pool.
//! Operations are split across submodules as `impl Store` blocks:
//!
//! ```text
//! issues      create / get / update / list / delete / counts
//! deps        typed edges, upsert + idempotent removal
//! annotations labels, comments, events
//! snapshots   compaction snapshots (read side)
//! tenants     tenants, projects, api keys
//! lessons     lessons learned
//! messages    message issues with reply threading
//! ```

pub(crate) mod annotations;
pub(crate) mod codec;
mod deps;
pub(crate) mod issues;
mod lessons;
mod messages;
mod pool;
pub(crate) mod query;
mod schema;
pub(crate) mod snapshots;
mod tenants;

pub use issues::StatusCount;
pub use messages::NewMessage;

use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use std::collections::HashMap;
use std::fs;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::issue::Issue;
use codec::{ISSUE_COLUMNS, issue_from_row};
use pool::Pool;
use query::placeholders;

pub struct Store {
    pool: Pool,
    config: StoreConfig,
}

impl Store {
    /// Opens (creating if needed) the database at `config.database_path`
    /// and applies pending migrations.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        if let Some(parent) = config.database_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let pool = Pool::open(
            &config.database_path,
            config.pool_size,
            config.query_timeout(),
        )?;
        Self::init(pool, config)
    }

    /// Private in-memory database with a single connection.
    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with(StoreConfig::default())
    }

    pub fn open_in_memory_with(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let pool = Pool::in_memory(config.query_timeout())?;
        Self::init(pool, config)
    }

    fn init(pool: Pool, config: StoreConfig) -> Result<Self> {
        let version = {
            let mut conn = pool.get()?;
            schema::migrate(&mut conn)?
        };
        tracing::debug!(
            path = %config.database_path.display(),
            pool_size = config.pool_size,
            schema_version = version,
            "store opened"
        );
        Ok(Self { pool, config })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn schema_version(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?))
    }

    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.pool.get()?;
        f(&conn)
    }

    /// Runs `f` inside an IMMEDIATE transaction; commits on `Ok`.
    pub(crate) fn with_tx<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

pub(crate) fn ensure_issue(conn: &Connection, tenant_id: Uuid, id: &str) -> Result<()> {
    let found: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM issues WHERE id = ?1 AND tenant_id = ?2)",
        params![id, tenant_id.to_string()],
        |row| row.get(0),
    )?;
    if found {
        Ok(())
    } else {
        Err(StoreError::not_found("issue", id))
    }
}

pub(crate) fn ensure_project(conn: &Connection, tenant_id: Uuid, project_id: Uuid) -> Result<()> {
    let found: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1 AND tenant_id = ?2)",
        params![project_id.to_string(), tenant_id.to_string()],
        |row| row.get(0),
    )?;
    if found {
        Ok(())
    } else {
        Err(StoreError::not_found("project", project_id.to_string()))
    }
}

/// Reads one issue in the tenant, labels included.
pub(crate) fn load_issue(conn: &Connection, tenant_id: Uuid, id: &str) -> Result<Issue> {
    let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues i WHERE i.id = ?1 AND i.tenant_id = ?2");
    let issue = conn
        .query_row(&sql, params![id, tenant_id.to_string()], issue_from_row)
        .optional()?;
    let mut issue = issue.ok_or_else(|| StoreError::not_found("issue", id))?;
    attach_labels(conn, std::slice::from_mut(&mut issue))?;
    Ok(issue)
}

const LABEL_BATCH: usize = 500;

pub(crate) fn attach_labels(conn: &Connection, issues: &mut [Issue]) -> Result<()> {
    if issues.is_empty() {
        return Ok(());
    }
    let mut by_issue: HashMap<String, Vec<String>> = HashMap::new();
    for chunk in issues.chunks(LABEL_BATCH) {
        let sql = format!(
            "SELECT issue_id, label FROM labels WHERE issue_id IN ({}) ORDER BY label",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(chunk.iter().map(|issue| issue.id.as_str())),
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )?;
        for row in rows {
            let (issue_id, label) = row?;
            by_issue.entry(issue_id).or_default().push(label);
        }
    }
    for issue in issues.iter_mut() {
        issue.labels = by_issue.remove(&issue.id).unwrap_or_default();
    }
    Ok(())
}

/// Runs a prepared issue query and attaches labels.
pub(crate) fn query_issues(
    conn: &Connection,
    sql: &str,
    params: Vec<rusqlite::types::Value>,
) -> Result<Vec<Issue>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(params), issue_from_row)?;
    let mut issues = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    attach_labels(conn, &mut issues)?;
    Ok(issues)
}
