use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use super::codec::{get_opt_ts, get_ts, get_uuid, now, ts};
use super::Store;
use crate::error::{Result, StoreError};
use crate::scope::Scope;
use crate::tenant::{
    ApiKeyInfo, IssuedApiKey, Project, Tenant, generate_raw_key, key_digest, key_prefix,
    validate_name, validate_slug,
};

fn tenant_from_row(row: &Row<'_>) -> rusqlite::Result<Tenant> {
    Ok(Tenant {
        id: get_uuid(row, "id")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        created_at: get_ts(row, "created_at")?,
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: get_uuid(row, "id")?,
        tenant_id: get_uuid(row, "tenant_id")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        created_at: get_ts(row, "created_at")?,
    })
}

fn api_key_from_row(row: &Row<'_>) -> rusqlite::Result<ApiKeyInfo> {
    Ok(ApiKeyInfo {
        id: get_uuid(row, "id")?,
        tenant_id: get_uuid(row, "tenant_id")?,
        prefix: row.get("prefix")?,
        label: row.get("label")?,
        created_at: get_ts(row, "created_at")?,
        revoked_at: get_opt_ts(row, "revoked_at")?,
    })
}

fn tenant_by_slug(conn: &Connection, slug: &str) -> Result<Tenant> {
    conn.query_row(
        "SELECT id, name, slug, created_at FROM tenants WHERE slug = ?1",
        params![slug],
        tenant_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("tenant", slug))
}

fn slug_taken(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<bool> {
    Ok(conn.query_row(sql, params, |row| row.get(0))?)
}

impl Store {
    pub fn create_tenant(&self, name: &str, slug: &str) -> Result<Tenant> {
        let name = validate_name("tenant", name)?;
        validate_slug(slug)?;
        let tenant = self.with_tx(|tx| {
            if slug_taken(
                tx,
                "SELECT EXISTS(SELECT 1 FROM tenants WHERE slug = ?1)",
                params![slug],
            )? {
                return Err(StoreError::validation(format!("tenant slug already exists: {slug}")));
            }
            let tenant = Tenant {
                id: Uuid::new_v4(),
                name,
                slug: slug.to_string(),
                created_at: now(),
            };
            tx.execute(
                "INSERT INTO tenants (id, name, slug, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    tenant.id.to_string(),
                    tenant.name,
                    tenant.slug,
                    ts(&tenant.created_at)
                ],
            )?;
            Ok(tenant)
        })?;
        tracing::info!(tenant = %tenant.slug, tenant_id = %tenant.id, "tenant created");
        Ok(tenant)
    }

    pub fn list_tenants(&self) -> Result<Vec<Tenant>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, slug, created_at FROM tenants ORDER BY created_at, slug")?;
            let rows = stmt.query_map([], tenant_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn tenant_by_slug(&self, slug: &str) -> Result<Tenant> {
        self.with_conn(|conn| tenant_by_slug(conn, slug))
    }

    pub fn create_project(&self, scope: &Scope, name: &str, slug: &str) -> Result<Project> {
        let tenant_id = scope.tenant_id("create_project")?;
        let name = validate_name("project", name)?;
        validate_slug(slug)?;
        let project = self.with_tx(|tx| {
            if slug_taken(
                tx,
                "SELECT EXISTS(SELECT 1 FROM projects WHERE tenant_id = ?1 AND slug = ?2)",
                params![tenant_id.to_string(), slug],
            )? {
                return Err(StoreError::validation(format!(
                    "project slug already exists: {slug}"
                )));
            }
            let project = Project {
                id: Uuid::new_v4(),
                tenant_id,
                name,
                slug: slug.to_string(),
                created_at: now(),
            };
            tx.execute(
                "INSERT INTO projects (id, tenant_id, name, slug, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    project.id.to_string(),
                    tenant_id.to_string(),
                    project.name,
                    project.slug,
                    ts(&project.created_at)
                ],
            )?;
            Ok(project)
        })?;
        tracing::info!(project = %project.slug, project_id = %project.id, "project created");
        Ok(project)
    }

    pub fn list_projects(&self, scope: &Scope) -> Result<Vec<Project>> {
        let tenant_id = scope.tenant_id("list_projects")?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, tenant_id, name, slug, created_at FROM projects
                WHERE tenant_id = ?1 ORDER BY created_at, slug
                "#,
            )?;
            let rows = stmt.query_map(params![tenant_id.to_string()], project_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn project_by_slug(&self, scope: &Scope, slug: &str) -> Result<Project> {
        let tenant_id = scope.tenant_id("project_by_slug")?;
        self.with_conn(|conn| {
            conn.query_row(
                r#"
                SELECT id, tenant_id, name, slug, created_at FROM projects
                WHERE tenant_id = ?1 AND slug = ?2
                "#,
                params![tenant_id.to_string(), slug],
                project_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("project", slug))
        })
    }

    /// Renames and/or re-slugs a project. `None` leaves a field unchanged.
    pub fn update_project(
        &self,
        scope: &Scope,
        project_id: Uuid,
        name: Option<&str>,
        slug: Option<&str>,
    ) -> Result<Project> {
        let tenant_id = scope.tenant_id("update_project")?;
        let name = name.map(|n| validate_name("project", n)).transpose()?;
        if let Some(slug) = slug {
            validate_slug(slug)?;
        }
        self.with_tx(|tx| {
            let mut project = tx
                .query_row(
                    "SELECT id, tenant_id, name, slug, created_at FROM projects WHERE id = ?1 AND tenant_id = ?2",
                    params![project_id.to_string(), tenant_id.to_string()],
                    project_from_row,
                )
                .optional()?
                .ok_or_else(|| StoreError::not_found("project", project_id.to_string()))?;
            if let Some(slug) = slug
                && slug != project.slug
            {
                if slug_taken(
                    tx,
                    "SELECT EXISTS(SELECT 1 FROM projects WHERE tenant_id = ?1 AND slug = ?2)",
                    params![tenant_id.to_string(), slug],
                )? {
                    return Err(StoreError::validation(format!(
                        "project slug already exists: {slug}"
                    )));
                }
                project.slug = slug.to_string();
            }
            if let Some(name) = name {
                project.name = name;
            }
            tx.execute(
                "UPDATE projects SET name = ?2, slug = ?3 WHERE id = ?1",
                params![project.id.to_string(), project.name, project.slug],
            )?;
            Ok(project)
        })
    }

    /// Mints a key for the tenant. The raw key is returned here only;
    /// the store keeps its digest and display prefix.
    pub fn issue_api_key(&self, tenant_slug: &str, label: &str) -> Result<IssuedApiKey> {
        let raw_key = generate_raw_key();
        let info = self.with_tx(|tx| {
            let tenant = tenant_by_slug(tx, tenant_slug)?;
            let info = ApiKeyInfo {
                id: Uuid::new_v4(),
                tenant_id: tenant.id,
                prefix: key_prefix(&raw_key).to_string(),
                label: label.trim().to_string(),
                created_at: now(),
                revoked_at: None,
            };
            tx.execute(
                r#"
                INSERT INTO api_keys (id, tenant_id, prefix, key_hash, label, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    info.id.to_string(),
                    info.tenant_id.to_string(),
                    info.prefix,
                    key_digest(&raw_key),
                    info.label,
                    ts(&info.created_at)
                ],
            )?;
            Ok(info)
        })?;
        tracing::info!(tenant = tenant_slug, prefix = %info.prefix, "api key issued");
        Ok(IssuedApiKey { raw_key, info })
    }

    /// Tenant owning an unrevoked key. Unknown and revoked keys are both
    /// `NotFound`.
    pub fn resolve_api_key(&self, raw_key: &str) -> Result<Tenant> {
        let digest = key_digest(raw_key.trim());
        self.with_conn(|conn| {
            conn.query_row(
                r#"
                SELECT t.id, t.name, t.slug, t.created_at FROM api_keys k
                JOIN tenants t ON t.id = k.tenant_id
                WHERE k.key_hash = ?1 AND k.revoked_at IS NULL
                "#,
                params![digest],
                tenant_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("api key", key_prefix(raw_key.trim())))
        })
    }

    /// Soft-revokes every live key with this prefix.
    pub fn revoke_api_key(&self, prefix: &str) -> Result<()> {
        let revoked = self.with_tx(|tx| {
            Ok(tx.execute(
                "UPDATE api_keys SET revoked_at = ?2 WHERE prefix = ?1 AND revoked_at IS NULL",
                params![prefix, ts(&now())],
            )?)
        })?;
        if revoked == 0 {
            return Err(StoreError::not_found("api key", prefix));
        }
        tracing::info!(prefix, revoked, "api key revoked");
        Ok(())
    }

    pub fn list_api_keys(&self, tenant_slug: &str) -> Result<Vec<ApiKeyInfo>> {
        self.with_conn(|conn| {
            let tenant = tenant_by_slug(conn, tenant_slug)?;
            let mut stmt = conn.prepare(
                r#"
                SELECT id, tenant_id, prefix, label, created_at, revoked_at FROM api_keys
                WHERE tenant_id = ?1 ORDER BY created_at, prefix
                "#,
            )?;
            let rows = stmt.query_map(params![tenant.id.to_string()], api_key_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }
}
