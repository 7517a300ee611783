//! Permission resolution engine
//!
//! Resolves, caches, and invalidates the effective permission set for a
//! (user, project, organization) triple and answers point queries against it:
//!
//! ```text
//! check_permission ──► global ADMINISTER override ──► cached project set
//!                                                        │ miss
//!                      scheme lookup ► inheritance walk ► grant collection
//!                                                        ► holder matching
//! ```
//!
//! A parallel, independently cached path resolves organization-level
//! permissions. Issue-security visibility is a third, uncached path.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::try_join;
use tracing::{debug, info};

use crate::cache::PermissionCache;
use crate::error::{AuthzError, Result};
use crate::store::PermissionStore;
use crate::types::{keys, PermissionKey, SchemeId, SecurityHolder};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Time-to-live for cached permission sets
    pub cache_ttl: Duration,

    /// Maximum parent hops beyond the starting scheme during the
    /// inheritance walk (chain length is at most `max_parent_hops + 1`)
    pub max_parent_hops: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            max_parent_hops: 5,
        }
    }
}

/// Permission resolution engine
///
/// Stateless apart from the injected store and cache: every resolution
/// recomputes independently from scratch on a cache miss, so concurrent
/// misses for the same key may redundantly recompute and last-write-wins on
/// the cache entry. That is safe because the computation is idempotent.
pub struct PermissionEngine {
    store: Arc<dyn PermissionStore>,
    cache: Arc<dyn PermissionCache>,
    config: EngineConfig,
}

impl PermissionEngine {
    /// Create an engine with default configuration
    pub fn new(store: Arc<dyn PermissionStore>, cache: Arc<dyn PermissionCache>) -> Self {
        Self::with_config(store, cache, EngineConfig::default())
    }

    /// Create an engine with a custom configuration
    pub fn with_config(
        store: Arc<dyn PermissionStore>,
        cache: Arc<dyn PermissionCache>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    /// Resolve the project-level permission keys a user holds in a project
    ///
    /// Cached under `perms:{org}:{project}:{user}` for the configured TTL. A
    /// cached entry, including an empty one, is returned without touching the
    /// store. On a miss the full pipeline runs: scheme lookup (falling back
    /// to the organization default), membership lookups, inheritance walk,
    /// grant collection, holder matching, and a cache write-back.
    pub async fn resolve_project_permissions(
        &self,
        user_id: &str,
        project_id: &str,
        organization_id: &str,
    ) -> Result<HashSet<PermissionKey>> {
        require(user_id, "user_id")?;
        require(project_id, "project_id")?;
        require(organization_id, "organization_id")?;

        let cache_key = project_permissions_key(organization_id, project_id, user_id);

        if let Some(cached) = self.cache.get(&cache_key).await? {
            debug!(key = %cache_key, "Project permission cache hit");
            return Ok(cached.into_iter().collect());
        }

        debug!(key = %cache_key, "Project permission cache miss, resolving");

        let scheme_id = self.effective_scheme_id(project_id, organization_id).await?;

        let Some(scheme_id) = scheme_id else {
            // No scheme anywhere: the empty result is still cached so
            // misconfigured projects do not hammer the store
            self.cache_permissions(&cache_key, &HashSet::new()).await?;
            return Ok(HashSet::new());
        };

        let (project_role, group_ids) = try_join!(
            self.store.project_role(project_id, user_id),
            self.store.group_ids(user_id, organization_id),
        )?;

        let chain = self.scheme_chain(&scheme_id).await?;
        let grants = self.store.grants(&chain).await?;

        let mut permissions = HashSet::new();
        for grant in grants {
            if grant
                .holder
                .matches(user_id, project_role.as_deref(), &group_ids)
            {
                permissions.insert(grant.permission_key);
            }
        }

        debug!(
            user = %user_id,
            project = %project_id,
            schemes = chain.len(),
            permissions = permissions.len(),
            "Resolved project permissions"
        );

        self.cache_permissions(&cache_key, &permissions).await?;
        Ok(permissions)
    }

    /// Check whether a user may perform an action in a project
    ///
    /// Organization administrators pass unconditionally: the global
    /// ADMINISTER permission takes precedence over project ACLs so that a
    /// misconfigured project (no scheme, role mismatch) can never lock
    /// administrators out.
    pub async fn check_permission(
        &self,
        user_id: &str,
        project_id: &str,
        organization_id: &str,
        permission_key: &str,
    ) -> Result<bool> {
        if self
            .check_global_permission(user_id, organization_id, keys::ADMINISTER)
            .await?
        {
            debug!(user = %user_id, "Global ADMINISTER override");
            return Ok(true);
        }

        let permissions = self
            .resolve_project_permissions(user_id, project_id, organization_id)
            .await?;
        Ok(permissions.contains(permission_key))
    }

    /// Resolve the organization-level permission keys a user holds
    ///
    /// Cached under `gperms:{org}:{user}`, same TTL discipline as the
    /// project path but with no project dimension.
    pub async fn resolve_global_permissions(
        &self,
        user_id: &str,
        organization_id: &str,
    ) -> Result<HashSet<PermissionKey>> {
        require(user_id, "user_id")?;
        require(organization_id, "organization_id")?;

        let cache_key = global_permissions_key(organization_id, user_id);

        if let Some(cached) = self.cache.get(&cache_key).await? {
            debug!(key = %cache_key, "Global permission cache hit");
            return Ok(cached.into_iter().collect());
        }

        let (group_ids, global_grants) = try_join!(
            self.store.group_ids(user_id, organization_id),
            self.store.global_permissions(organization_id),
        )?;

        let mut permissions = HashSet::new();
        for grant in global_grants {
            if grant.holder.matches(user_id, &group_ids) {
                permissions.insert(grant.permission_key);
            }
        }

        debug!(
            user = %user_id,
            org = %organization_id,
            permissions = permissions.len(),
            "Resolved global permissions"
        );

        self.cache_permissions(&cache_key, &permissions).await?;
        Ok(permissions)
    }

    /// Check whether a user holds an organization-level permission
    pub async fn check_global_permission(
        &self,
        user_id: &str,
        organization_id: &str,
        permission_key: &str,
    ) -> Result<bool> {
        let permissions = self
            .resolve_global_permissions(user_id, organization_id)
            .await?;
        Ok(permissions.contains(permission_key))
    }

    /// Check whether a user may see a specific issue
    ///
    /// Orthogonal to project permissions: an issue without a security level
    /// is visible to anyone who already passed the project browse check
    /// (which remains the caller's responsibility). A missing issue answers
    /// `false` rather than erroring.
    ///
    /// Deliberately uncached so that security-level membership changes take
    /// effect immediately.
    pub async fn check_issue_access(
        &self,
        user_id: &str,
        issue_id: &str,
        organization_id: &str,
    ) -> Result<bool> {
        require(user_id, "user_id")?;
        require(issue_id, "issue_id")?;
        require(organization_id, "organization_id")?;

        let Some(issue) = self.store.issue(issue_id, organization_id).await? else {
            return Ok(false);
        };

        let Some(security_level_id) = issue.security_level_id.as_deref() else {
            return Ok(true);
        };

        let (members, project_role, group_ids) = try_join!(
            self.store.security_level_members(security_level_id),
            self.store.project_role(&issue.project_id, user_id),
            self.store.group_ids(user_id, organization_id),
        )?;

        let visible = members.iter().any(|member| match &member.holder {
            SecurityHolder::ProjectRole { project_role_id } => {
                project_role.as_deref() == Some(project_role_id.as_str())
            }
            SecurityHolder::Group { group_id } => group_ids.iter().any(|g| g == group_id),
            SecurityHolder::User { user_id: granted } => granted == user_id,
            SecurityHolder::Reporter => issue.reporter_id.as_deref() == Some(user_id),
            SecurityHolder::Assignee => issue.assignee_id.as_deref() == Some(user_id),
        });

        debug!(
            user = %user_id,
            issue = %issue_id,
            level = %security_level_id,
            visible,
            "Issue security check"
        );

        Ok(visible)
    }

    /// Invalidate cached permission sets
    ///
    /// With a user: drops that user's global entry and their project entries
    /// across all projects of the organization. Without: drops every cached
    /// entry for the organization. Advisory and eventual; callers that mutate
    /// grants, role assignments, or group memberships are responsible for
    /// invoking this.
    pub async fn invalidate(&self, organization_id: &str, user_id: Option<&str>) -> Result<()> {
        require(organization_id, "organization_id")?;

        match user_id {
            Some(user_id) => {
                require(user_id, "user_id")?;
                self.cache
                    .delete(&global_permissions_key(organization_id, user_id))
                    .await?;
                // Project id sits mid-key, so this needs the wildcard form
                let removed = self
                    .cache
                    .delete_pattern(&format!("perms:{}:*:{}", organization_id, user_id))
                    .await?;
                info!(org = %organization_id, user = %user_id, removed, "Invalidated user permission cache");
            }
            None => {
                let projects = self
                    .cache
                    .delete_pattern(&format!("perms:{}:*", organization_id))
                    .await?;
                let globals = self
                    .cache
                    .delete_pattern(&format!("gperms:{}:*", organization_id))
                    .await?;
                info!(org = %organization_id, removed = projects + globals, "Invalidated organization permission cache");
            }
        }

        Ok(())
    }

    /// Determine which scheme governs a project
    ///
    /// Assigned scheme first, then the organization default. A missing
    /// project row behaves like a project with no scheme assigned.
    async fn effective_scheme_id(
        &self,
        project_id: &str,
        organization_id: &str,
    ) -> Result<Option<SchemeId>> {
        let assigned = self
            .store
            .project(project_id, organization_id)
            .await?
            .and_then(|p| p.permission_scheme_id);

        if assigned.is_some() {
            return Ok(assigned);
        }

        Ok(self
            .store
            .default_scheme(organization_id)
            .await?
            .map(|s| s.id))
    }

    /// Walk the scheme inheritance chain, self first, then ancestors
    ///
    /// Bounded at `max_parent_hops` hops past the starting scheme and guarded
    /// against cycles by refusing to revisit a scheme already in the chain.
    /// A missing scheme mid-chain truncates the walk instead of erroring:
    /// a malformed scheme graph must never loop or crash the resolver.
    async fn scheme_chain(&self, scheme_id: &str) -> Result<Vec<SchemeId>> {
        let mut chain = vec![scheme_id.to_string()];
        let mut current = scheme_id.to_string();

        for _ in 0..self.config.max_parent_hops {
            let Some(scheme) = self.store.scheme(&current).await? else {
                break;
            };
            let Some(parent_id) = scheme.parent_id else {
                break;
            };
            if chain.contains(&parent_id) {
                debug!(scheme = %scheme_id, cycle_at = %parent_id, "Scheme inheritance cycle, truncating");
                break;
            }
            chain.push(parent_id.clone());
            current = parent_id;
        }

        Ok(chain)
    }

    /// Write a resolved set back to the cache in a stable order
    async fn cache_permissions(&self, key: &str, permissions: &HashSet<PermissionKey>) -> Result<()> {
        let mut values: Vec<String> = permissions.iter().cloned().collect();
        values.sort();
        self.cache.set(key, &values, self.config.cache_ttl).await
    }
}

/// Cache key for a user's permission set within one project
fn project_permissions_key(organization_id: &str, project_id: &str, user_id: &str) -> String {
    format!("perms:{}:{}:{}", organization_id, project_id, user_id)
}

/// Cache key for a user's organization-level permission set
fn global_permissions_key(organization_id: &str, user_id: &str) -> String {
    format!("gperms:{}:{}", organization_id, user_id)
}

fn require(value: &str, name: &str) -> Result<()> {
    if value.is_empty() {
        return Err(AuthzError::InvalidInput(format!("{} must not be empty", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryPermissionCache;
    use crate::store::InMemoryPermissionStore;
    use crate::types::PermissionScheme;

    fn engine_with(store: Arc<InMemoryPermissionStore>) -> PermissionEngine {
        PermissionEngine::new(store, Arc::new(MemoryPermissionCache::new()))
    }

    #[tokio::test]
    async fn test_empty_inputs_rejected() {
        let engine = engine_with(Arc::new(InMemoryPermissionStore::new()));

        let err = engine
            .resolve_project_permissions("", "proj-1", "org-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::InvalidInput(_)));

        let err = engine.invalidate("", None).await.unwrap_err();
        assert!(matches!(err, AuthzError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_chain_single_scheme() {
        let store = Arc::new(InMemoryPermissionStore::new());
        store
            .put_scheme(PermissionScheme {
                id: "scheme-a".to_string(),
                organization_id: "org-1".to_string(),
                is_default: false,
                parent_id: None,
            })
            .await;

        let engine = engine_with(store);
        let chain = engine.scheme_chain("scheme-a").await.unwrap();
        assert_eq!(chain, vec!["scheme-a".to_string()]);
    }

    #[tokio::test]
    async fn test_chain_missing_scheme_still_contains_input() {
        // The walk starts from the requested id even if the row is gone
        let engine = engine_with(Arc::new(InMemoryPermissionStore::new()));
        let chain = engine.scheme_chain("scheme-ghost").await.unwrap();
        assert_eq!(chain, vec!["scheme-ghost".to_string()]);
    }

    #[tokio::test]
    async fn test_chain_truncates_on_missing_parent_row() {
        // A parent id pointing at a deleted scheme ends the walk gracefully
        let store = Arc::new(InMemoryPermissionStore::new());
        store
            .put_scheme(PermissionScheme {
                id: "scheme-a".to_string(),
                organization_id: "org-1".to_string(),
                is_default: false,
                parent_id: Some("scheme-deleted".to_string()),
            })
            .await;

        let engine = engine_with(store);
        let chain = engine.scheme_chain("scheme-a").await.unwrap();
        assert_eq!(
            chain,
            vec!["scheme-a".to_string(), "scheme-deleted".to_string()]
        );
    }

    #[test]
    fn test_cache_key_formats() {
        assert_eq!(
            project_permissions_key("org-1", "proj-1", "user-1"),
            "perms:org-1:proj-1:user-1"
        );
        assert_eq!(
            global_permissions_key("org-1", "user-1"),
            "gperms:org-1:user-1"
        );
    }
}
