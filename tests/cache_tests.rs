//! Cache behavior tests
//!
//! TTL expiry, trait-object access, concurrent writers, and the interplay
//! between cache expiry and engine recomputation.

use std::sync::Arc;
use std::time::Duration;

use tracker_authz::{
    keys, EngineConfig, GrantHolder, InMemoryPermissionStore, MemoryPermissionCache,
    PermissionCache, PermissionEngine, PermissionGrant, PermissionScheme, Project,
};

// ============================================================================
// TRAIT-OBJECT ACCESS
// ============================================================================

#[tokio::test]
async fn test_cache_via_trait_object() {
    let cache: Arc<dyn PermissionCache> = Arc::new(MemoryPermissionCache::new());

    cache
        .set("perms:o:p:u", &["A".to_string()], Duration::from_secs(300))
        .await
        .unwrap();
    assert_eq!(
        cache.get("perms:o:p:u").await.unwrap(),
        Some(vec!["A".to_string()])
    );

    cache.delete("perms:o:p:u").await.unwrap();
    assert!(cache.get("perms:o:p:u").await.unwrap().is_none());
}

// ============================================================================
// CONCURRENT ACCESS
// ============================================================================

#[tokio::test]
async fn test_concurrent_writers_last_write_wins() {
    // Concurrent cache-miss races redundantly write the same logical value;
    // any winner is acceptable because recomputation is idempotent
    let cache = Arc::new(MemoryPermissionCache::new());

    let mut handles = Vec::new();
    for i in 0..16 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            let value = vec![format!("KEY_{}", i % 2)];
            cache
                .set("perms:o:p:u", &value, Duration::from_secs(300))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let value = cache.get("perms:o:p:u").await.unwrap().unwrap();
    assert_eq!(value.len(), 1);
    assert!(value[0] == "KEY_0" || value[0] == "KEY_1");
}

#[tokio::test]
async fn test_concurrent_readers_during_pattern_delete() {
    let cache = Arc::new(MemoryPermissionCache::new());
    for i in 0..64 {
        cache
            .set(
                &format!("perms:org-1:proj-{}:user-1", i),
                &[],
                Duration::from_secs(300),
            )
            .await
            .unwrap();
    }

    let reader = {
        let cache = cache.clone();
        tokio::spawn(async move {
            for i in 0..64 {
                let _ = cache
                    .get(&format!("perms:org-1:proj-{}:user-1", i))
                    .await
                    .unwrap();
            }
        })
    };

    let removed = cache.delete_pattern("perms:org-1:*:user-1").await.unwrap();
    reader.await.unwrap();

    assert_eq!(removed, 64);
    assert!(cache.is_empty());
}

// ============================================================================
// TTL AND RECOMPUTATION
// ============================================================================

#[tokio::test]
async fn test_expired_entry_triggers_engine_recomputation() {
    let store = Arc::new(InMemoryPermissionStore::new());
    store
        .put_scheme(PermissionScheme {
            id: "scheme-1".to_string(),
            organization_id: "org-1".to_string(),
            is_default: false,
            parent_id: None,
        })
        .await;
    store
        .put_project(Project {
            id: "proj-1".to_string(),
            organization_id: "org-1".to_string(),
            permission_scheme_id: Some("scheme-1".to_string()),
        })
        .await;
    store
        .put_grant(PermissionGrant {
            id: "g1".to_string(),
            permission_scheme_id: "scheme-1".to_string(),
            permission_key: keys::BROWSE_PROJECTS.to_string(),
            holder: GrantHolder::Anyone,
        })
        .await;

    let config = EngineConfig {
        cache_ttl: Duration::from_millis(20),
        ..Default::default()
    };
    let engine = PermissionEngine::with_config(
        store.clone(),
        Arc::new(MemoryPermissionCache::new()),
        config,
    );

    let first = engine
        .resolve_project_permissions("user-1", "proj-1", "org-1")
        .await
        .unwrap();
    let queries = store.query_count();

    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = engine
        .resolve_project_permissions("user-1", "proj-1", "org-1")
        .await
        .unwrap();

    assert_eq!(first, second);
    assert!(store.query_count() > queries, "expiry must fall back to the store");
}
