//! Versioned schema. Each entry in `MIGRATIONS` moves `user_version` up by one.

use rusqlite::Connection;

use crate::error::Result;

const MIGRATIONS: &[&str] = &[
    // 1: core graph and tenancy
    r#"
    CREATE TABLE tenants (
        id          TEXT PRIMARY KEY,
        name        TEXT NOT NULL,
        slug        TEXT NOT NULL UNIQUE,
        created_at  TEXT NOT NULL
    );

    CREATE TABLE projects (
        id          TEXT PRIMARY KEY,
        tenant_id   TEXT NOT NULL REFERENCES tenants(id),
        name        TEXT NOT NULL,
        slug        TEXT NOT NULL,
        created_at  TEXT NOT NULL,
        UNIQUE (tenant_id, slug)
    );

    CREATE TABLE api_keys (
        id          TEXT PRIMARY KEY,
        tenant_id   TEXT NOT NULL REFERENCES tenants(id),
        prefix      TEXT NOT NULL,
        key_hash    TEXT NOT NULL UNIQUE,
        label       TEXT NOT NULL DEFAULT '',
        created_at  TEXT NOT NULL,
        revoked_at  TEXT
    );
    CREATE INDEX idx_api_keys_prefix ON api_keys(prefix);

    CREATE TABLE issues (
        id                  TEXT PRIMARY KEY,
        tenant_id           TEXT NOT NULL REFERENCES tenants(id),
        project_id          TEXT REFERENCES projects(id),
        title               TEXT NOT NULL CHECK (length(title) > 0),
        description         TEXT NOT NULL DEFAULT '',
        design              TEXT NOT NULL DEFAULT '',
        acceptance_criteria TEXT NOT NULL DEFAULT '',
        notes               TEXT NOT NULL DEFAULT '',
        content_hash        TEXT NOT NULL,
        status              TEXT NOT NULL DEFAULT 'open',
        priority            INTEGER NOT NULL DEFAULT 2 CHECK (priority BETWEEN 0 AND 4),
        issue_type          TEXT NOT NULL DEFAULT 'task',
        assignee            TEXT NOT NULL DEFAULT '',
        owner               TEXT NOT NULL DEFAULT '',
        created_by          TEXT NOT NULL DEFAULT '',
        created_at          TEXT NOT NULL,
        updated_at          TEXT NOT NULL,
        closed_at           TEXT,
        due_at              TEXT,
        defer_until         TEXT,
        close_reason        TEXT NOT NULL DEFAULT '',
        external_ref        TEXT,
        compaction_level    INTEGER NOT NULL DEFAULT 0 CHECK (compaction_level BETWEEN 0 AND 2),
        compacted_at        TEXT,
        ephemeral           INTEGER NOT NULL DEFAULT 0,
        pinned              INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX idx_issues_tenant_status ON issues(tenant_id, status);
    CREATE INDEX idx_issues_tenant_priority ON issues(tenant_id, priority, created_at);
    CREATE INDEX idx_issues_closed_at ON issues(closed_at) WHERE closed_at IS NOT NULL;

    CREATE TABLE dependencies (
        issue_id        TEXT NOT NULL REFERENCES issues(id),
        depends_on_id   TEXT NOT NULL REFERENCES issues(id),
        type            TEXT NOT NULL DEFAULT 'blocks',
        created_at      TEXT NOT NULL,
        created_by      TEXT NOT NULL DEFAULT '',
        thread_id       TEXT,
        PRIMARY KEY (issue_id, depends_on_id),
        CHECK (issue_id <> depends_on_id)
    );
    CREATE INDEX idx_dependencies_target ON dependencies(depends_on_id, type);

    CREATE TABLE labels (
        issue_id    TEXT NOT NULL REFERENCES issues(id),
        label       TEXT NOT NULL,
        PRIMARY KEY (issue_id, label)
    );
    CREATE INDEX idx_labels_label ON labels(label);

    CREATE TABLE comments (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        issue_id    TEXT NOT NULL REFERENCES issues(id),
        author      TEXT NOT NULL DEFAULT '',
        text        TEXT NOT NULL,
        created_at  TEXT NOT NULL
    );
    CREATE INDEX idx_comments_issue ON comments(issue_id, id);

    CREATE TABLE events (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        issue_id    TEXT NOT NULL REFERENCES issues(id),
        event_type  TEXT NOT NULL,
        actor       TEXT NOT NULL DEFAULT '',
        old_value   TEXT,
        new_value   TEXT,
        comment     TEXT,
        created_at  TEXT NOT NULL
    );

    CREATE TABLE child_counters (
        parent_id   TEXT PRIMARY KEY,
        last_child  INTEGER NOT NULL
    );

    CREATE TABLE compaction_snapshots (
        id                  INTEGER PRIMARY KEY AUTOINCREMENT,
        issue_id            TEXT NOT NULL REFERENCES issues(id),
        level               INTEGER NOT NULL CHECK (level BETWEEN 1 AND 2),
        title               TEXT NOT NULL,
        description         TEXT NOT NULL,
        design              TEXT NOT NULL,
        acceptance_criteria TEXT NOT NULL,
        notes               TEXT NOT NULL,
        summary             TEXT NOT NULL,
        created_at          TEXT NOT NULL,
        UNIQUE (issue_id, level)
    );
    "#,
    // 2: lessons, event ordering index
    r#"
    CREATE TABLE lessons (
        id          TEXT PRIMARY KEY,
        tenant_id   TEXT NOT NULL REFERENCES tenants(id),
        project_id  TEXT REFERENCES projects(id),
        issue_id    TEXT,
        title       TEXT NOT NULL,
        mistake     TEXT NOT NULL,
        correction  TEXT NOT NULL,
        expert      TEXT NOT NULL DEFAULT '',
        components  TEXT NOT NULL DEFAULT '[]',
        severity    INTEGER NOT NULL DEFAULT 2 CHECK (severity BETWEEN 1 AND 4),
        status      TEXT NOT NULL DEFAULT 'open',
        created_by  TEXT NOT NULL DEFAULT '',
        created_at  TEXT NOT NULL,
        resolved_at TEXT,
        resolved_by TEXT NOT NULL DEFAULT ''
    );
    CREATE INDEX idx_lessons_tenant ON lessons(tenant_id, status, created_at);

    CREATE INDEX idx_events_issue ON events(issue_id, id);
    "#,
];

#[cfg(test)]
pub(crate) fn current_version() -> i64 {
    MIGRATIONS.len() as i64
}

/// Applies pending migrations, each in its own transaction.
pub(crate) fn migrate(conn: &mut Connection) -> Result<i64> {
    let mut version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    let start = usize::try_from(version).unwrap_or(0);
    for (index, sql) in MIGRATIONS.iter().enumerate().skip(start) {
        let target = index as i64 + 1;
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", target)?;
        tx.commit()?;
        tracing::info!(version = target, "applied schema migration");
        version = target;
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(migrate(&mut conn).unwrap(), current_version());
        assert_eq!(migrate(&mut conn).unwrap(), current_version());
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'child_counters'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }

    #[test]
    fn snapshot_uniqueness_is_enforced_by_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO tenants VALUES ('t', 'T', 't', '2026-01-01T00:00:00.000000Z');
            INSERT INTO issues (id, tenant_id, title, content_hash, created_at, updated_at)
              VALUES ('doit-a', 't', 'A', 'h', '2026-01-01T00:00:00.000000Z', '2026-01-01T00:00:00.000000Z');
            INSERT INTO compaction_snapshots
              (issue_id, level, title, description, design, acceptance_criteria, notes, summary, created_at)
              VALUES ('doit-a', 1, 'A', '', '', '', '', 's', '2026-01-01T00:00:00.000000Z');
            "#,
        )
        .unwrap();
        let dup = conn.execute(
            r#"INSERT INTO compaction_snapshots
              (issue_id, level, title, description, design, acceptance_criteria, notes, summary, created_at)
              VALUES ('doit-a', 1, 'A', '', '', '', '', 's', '2026-01-01T00:00:00.000000Z')"#,
            [],
        );
        assert!(dup.is_err());
    }
}
