//! Permission store abstraction and in-memory backend
//!
//! The store is the read-side boundary to the tracker's relational schema.
//! The resolver issues independent point lookups and filtered fetches; it
//! never joins, and it never writes.

use crate::error::Result;
use crate::types::{
    GlobalPermission, Issue, IssueSecurityLevelMember, PermissionGrant, PermissionScheme, Project,
    ProjectMember,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PostgresPermissionStore;

/// Read interface over the entities the resolver consumes
///
/// Every method is tenant-scoped where the schema allows it. Absent rows are
/// `Ok(None)` / empty vectors; `Err` is reserved for backend failures.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Get a permission scheme by id
    async fn scheme(&self, scheme_id: &str) -> Result<Option<PermissionScheme>>;

    /// Get the organization's default permission scheme
    async fn default_scheme(&self, organization_id: &str) -> Result<Option<PermissionScheme>>;

    /// Get a project by id within an organization
    async fn project(&self, project_id: &str, organization_id: &str) -> Result<Option<Project>>;

    /// Get a user's role id in a project, if they are a member
    async fn project_role(&self, project_id: &str, user_id: &str) -> Result<Option<String>>;

    /// Get the ids of all groups a user belongs to within an organization
    async fn group_ids(&self, user_id: &str, organization_id: &str) -> Result<Vec<String>>;

    /// Get all grants attached to any of the given schemes
    async fn grants(&self, scheme_ids: &[String]) -> Result<Vec<PermissionGrant>>;

    /// Get all global permission rows for an organization
    async fn global_permissions(&self, organization_id: &str) -> Result<Vec<GlobalPermission>>;

    /// Get an issue by id within an organization
    async fn issue(&self, issue_id: &str, organization_id: &str) -> Result<Option<Issue>>;

    /// Get the member rows of an issue security level
    async fn security_level_members(
        &self,
        security_level_id: &str,
    ) -> Result<Vec<IssueSecurityLevelMember>>;
}

#[derive(Default)]
struct Tables {
    schemes: HashMap<String, PermissionScheme>,
    projects: HashMap<String, Project>,
    /// (project_id, user_id) -> membership row
    project_members: HashMap<(String, String), ProjectMember>,
    /// (organization_id, user_id) -> group ids
    group_members: HashMap<(String, String), Vec<String>>,
    grants: Vec<PermissionGrant>,
    global_permissions: Vec<GlobalPermission>,
    issues: HashMap<String, Issue>,
    security_members: Vec<IssueSecurityLevelMember>,
}

/// In-memory permission store
///
/// Deterministic backend for tests and examples. Tracks the number of queries
/// served so tests can assert that cache hits perform no store reads.
#[derive(Default)]
pub struct InMemoryPermissionStore {
    tables: Arc<RwLock<Tables>>,
    queries: AtomicU64,
}

impl InMemoryPermissionStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of store queries served since construction
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Insert or replace a permission scheme
    pub async fn put_scheme(&self, scheme: PermissionScheme) {
        let mut tables = self.tables.write().await;
        tables.schemes.insert(scheme.id.clone(), scheme);
    }

    /// Insert or replace a project
    pub async fn put_project(&self, project: Project) {
        let mut tables = self.tables.write().await;
        tables.projects.insert(project.id.clone(), project);
    }

    /// Assign a user's role within a project
    pub async fn put_project_role(&self, project_id: &str, user_id: &str, role_id: &str) {
        let mut tables = self.tables.write().await;
        tables.project_members.insert(
            (project_id.to_string(), user_id.to_string()),
            ProjectMember {
                project_id: project_id.to_string(),
                user_id: user_id.to_string(),
                project_role_id: role_id.to_string(),
            },
        );
    }

    /// Add a user to a group within an organization
    pub async fn put_group_member(&self, organization_id: &str, user_id: &str, group_id: &str) {
        let mut tables = self.tables.write().await;
        tables
            .group_members
            .entry((organization_id.to_string(), user_id.to_string()))
            .or_default()
            .push(group_id.to_string());
    }

    /// Attach a grant to a scheme
    pub async fn put_grant(&self, grant: PermissionGrant) {
        let mut tables = self.tables.write().await;
        tables.grants.push(grant);
    }

    /// Add a global permission row
    pub async fn put_global_permission(&self, permission: GlobalPermission) {
        let mut tables = self.tables.write().await;
        tables.global_permissions.push(permission);
    }

    /// Insert or replace an issue
    pub async fn put_issue(&self, issue: Issue) {
        let mut tables = self.tables.write().await;
        tables.issues.insert(issue.id.clone(), issue);
    }

    /// Add a security level member row
    pub async fn put_security_member(&self, member: IssueSecurityLevelMember) {
        let mut tables = self.tables.write().await;
        tables.security_members.push(member);
    }
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn scheme(&self, scheme_id: &str) -> Result<Option<PermissionScheme>> {
        self.record_query();
        let tables = self.tables.read().await;
        Ok(tables.schemes.get(scheme_id).cloned())
    }

    async fn default_scheme(&self, organization_id: &str) -> Result<Option<PermissionScheme>> {
        self.record_query();
        let tables = self.tables.read().await;
        Ok(tables
            .schemes
            .values()
            .find(|s| s.organization_id == organization_id && s.is_default)
            .cloned())
    }

    async fn project(&self, project_id: &str, organization_id: &str) -> Result<Option<Project>> {
        self.record_query();
        let tables = self.tables.read().await;
        Ok(tables
            .projects
            .get(project_id)
            .filter(|p| p.organization_id == organization_id)
            .cloned())
    }

    async fn project_role(&self, project_id: &str, user_id: &str) -> Result<Option<String>> {
        self.record_query();
        let tables = self.tables.read().await;
        Ok(tables
            .project_members
            .get(&(project_id.to_string(), user_id.to_string()))
            .map(|member| member.project_role_id.clone()))
    }

    async fn group_ids(&self, user_id: &str, organization_id: &str) -> Result<Vec<String>> {
        self.record_query();
        let tables = self.tables.read().await;
        Ok(tables
            .group_members
            .get(&(organization_id.to_string(), user_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn grants(&self, scheme_ids: &[String]) -> Result<Vec<PermissionGrant>> {
        self.record_query();
        if scheme_ids.is_empty() {
            return Ok(Vec::new());
        }
        let tables = self.tables.read().await;
        Ok(tables
            .grants
            .iter()
            .filter(|g| scheme_ids.contains(&g.permission_scheme_id))
            .cloned()
            .collect())
    }

    async fn global_permissions(&self, organization_id: &str) -> Result<Vec<GlobalPermission>> {
        self.record_query();
        let tables = self.tables.read().await;
        Ok(tables
            .global_permissions
            .iter()
            .filter(|p| p.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn issue(&self, issue_id: &str, organization_id: &str) -> Result<Option<Issue>> {
        self.record_query();
        let tables = self.tables.read().await;
        Ok(tables
            .issues
            .get(issue_id)
            .filter(|i| i.organization_id == organization_id)
            .cloned())
    }

    async fn security_level_members(
        &self,
        security_level_id: &str,
    ) -> Result<Vec<IssueSecurityLevelMember>> {
        self.record_query();
        let tables = self.tables.read().await;
        Ok(tables
            .security_members
            .iter()
            .filter(|m| m.issue_security_level_id == security_level_id)
            .cloned()
            .collect())
    }
}
