//! Explicit tenant binding passed to every tenant-bound store call.

use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Tenant plus an optional project allow-list.
///
/// An empty `projects` list means "every project of the tenant, and issues
/// with no project". A non-empty list restricts reads to those projects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    tenant: Option<Uuid>,
    projects: Vec<Uuid>,
}

impl Scope {
    pub fn tenant(tenant_id: Uuid) -> Self {
        Self {
            tenant: Some(tenant_id),
            projects: Vec::new(),
        }
    }

    /// A scope with no tenant. Any tenant-bound call fails with
    /// `StoreError::Scope`.
    pub fn unbound() -> Self {
        Self::default()
    }

    pub fn with_projects(mut self, projects: impl IntoIterator<Item = Uuid>) -> Self {
        self.projects = projects.into_iter().collect();
        self
    }

    pub fn tenant_id(&self, operation: &'static str) -> Result<Uuid> {
        self.tenant.ok_or(StoreError::Scope { operation })
    }

    pub fn projects(&self) -> &[Uuid] {
        &self.projects
    }
}
