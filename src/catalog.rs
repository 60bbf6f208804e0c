//! Catalog service: publish and search orchestration.
//!
//! This is where the read-through cache, the invalidation protocol, and
//! the query semantics meet. The service owns no state of its own: the
//! store and cache are injected trait handles, so tests substitute
//! in-memory or failing backends freely.
//!
//! The central contract: store failures are fatal to the enclosing
//! operation, cache failures never are. A failed or timed-out cache
//! read is a miss; a failed write-back or invalidation sweep is logged
//! and dropped. Correctness never depends on the cache, only
//! performance does.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::time::timeout;
use uuid::Uuid;

use crate::cache::SearchCache;
use crate::config::CacheConfig;
use crate::models::{Caller, Document, ResultSource, Role, SearchHit, SearchResponse};
use crate::query::SearchQuery;
use crate::store::CatalogStore;

/// Sentinel email for hits whose owning account no longer resolves.
pub const UNKNOWN_OWNER_EMAIL: &str = "Unknown";

/// Service-level error taxonomy.
///
/// Cache failures deliberately have no variant here: they are absorbed
/// inside the service and never surfaced to callers.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Missing or invalid credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller lacks the required role. No partial effect.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Missing/empty fields or otherwise malformed input. No partial
    /// effect.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Durable store failure. Fatal to the enclosing operation.
    #[error("store error: {0}")]
    Store(anyhow::Error),
}

/// Raw publish input, as received from a handler.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub subject: String,
    pub class_name: String,
    pub school: String,
    pub file_url: String,
}

/// Orchestrates the catalog store and search cache.
pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
    cache: Arc<dyn SearchCache>,
    cache_ttl: Duration,
    cache_op_timeout: Duration,
}

impl CatalogService {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        cache: Arc<dyn SearchCache>,
        cache_config: &CacheConfig,
    ) -> Self {
        Self {
            store,
            cache,
            cache_ttl: Duration::from_secs(cache_config.ttl_secs),
            cache_op_timeout: Duration::from_millis(cache_config.op_timeout_ms),
        }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    /// Publish a document.
    ///
    /// Authorization and validation happen before any mutation. On a
    /// successful store write the whole search cache is swept before
    /// returning, so a search that begins after this call completes can
    /// never be served a cached result set that predates the new
    /// document.
    pub async fn publish(
        &self,
        caller: &Caller,
        request: PublishRequest,
    ) -> Result<Document, CatalogError> {
        if caller.role != Role::Academy {
            return Err(CatalogError::Forbidden(
                "only academy accounts can publish documents".to_string(),
            ));
        }

        let subject = request.subject.trim().to_lowercase();
        let class_name = request.class_name.trim().to_lowercase();
        let school = request.school.trim().to_lowercase();
        let file_url = request.file_url.trim().to_string();

        if subject.is_empty() || class_name.is_empty() || school.is_empty() || file_url.is_empty()
        {
            return Err(CatalogError::InvalidInput(
                "subject, class_name, school, and file_url are all required".to_string(),
            ));
        }

        let document = Document {
            id: Uuid::new_v4().to_string(),
            owner_id: caller.id.clone(),
            file_url,
            subject,
            class_name,
            school,
            created_at: Utc::now().timestamp_millis(),
        };

        self.store
            .insert_document(&document)
            .await
            .map_err(CatalogError::Store)?;

        // The write is acknowledged; sweep unconditionally. A failed
        // sweep risks only a TTL-bounded window of stale reads, so the
        // publish still reports success.
        self.invalidate_cache().await;

        Ok(document)
    }

    /// Search the catalog.
    ///
    /// Non-personal queries read through the cache; personal queries
    /// bypass it entirely, in both directions, so one caller's private
    /// result set can never be served to another under the same filter
    /// combination.
    pub async fn search(
        &self,
        caller: &Caller,
        subject: &str,
        class_name: &str,
        school: &str,
        personal: bool,
    ) -> Result<SearchResponse, CatalogError> {
        // A student cannot request an owner-scoped view; the flag is
        // ignored, not rejected.
        let personal = personal && caller.role == Role::Academy;
        let query = SearchQuery::normalize(subject, class_name, school, personal);

        let key = query.cache_key();
        if let Some(ref key) = key {
            if let Some(hits) = self.cache_get(key).await {
                return Ok(SearchResponse {
                    hits,
                    source: ResultSource::Cache,
                });
            }
        }

        let owner = if personal {
            Some(caller.id.as_str())
        } else {
            None
        };
        let documents = self
            .store
            .search_documents(&query, owner)
            .await
            .map_err(CatalogError::Store)?;

        let hits = self.enrich(documents).await?;

        if let Some(ref key) = key {
            self.cache_put(key, &hits).await;
        }

        Ok(SearchResponse {
            hits,
            source: ResultSource::Database,
        })
    }

    /// Augment each document with its owner's email via one batch
    /// lookup of the distinct owner ids in the result set.
    async fn enrich(&self, documents: Vec<Document>) -> Result<Vec<SearchHit>, CatalogError> {
        let mut owner_ids: Vec<String> = Vec::new();
        for doc in &documents {
            if !owner_ids.contains(&doc.owner_id) {
                owner_ids.push(doc.owner_id.clone());
            }
        }

        let emails = self
            .store
            .emails_by_account_ids(&owner_ids)
            .await
            .map_err(CatalogError::Store)?;

        Ok(documents
            .into_iter()
            .map(|doc| {
                let owner_email = emails
                    .get(&doc.owner_id)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_OWNER_EMAIL.to_string());
                SearchHit {
                    id: doc.id,
                    file_url: doc.file_url,
                    subject: doc.subject,
                    class_name: doc.class_name,
                    school: doc.school,
                    created_at: doc.created_at,
                    owner_id: doc.owner_id,
                    owner_email,
                }
            })
            .collect())
    }

    // ============ Fail-open cache access ============

    async fn cache_get(&self, key: &str) -> Option<Vec<SearchHit>> {
        match timeout(self.cache_op_timeout, self.cache.get(key)).await {
            Ok(Ok(hits)) => hits,
            Ok(Err(err)) => {
                tracing::warn!(key, error = %err, "search cache read failed; falling through to store");
                None
            }
            Err(_) => {
                tracing::warn!(key, "search cache read timed out; falling through to store");
                None
            }
        }
    }

    async fn cache_put(&self, key: &str, hits: &[SearchHit]) {
        match timeout(self.cache_op_timeout, self.cache.put(key, hits, self.cache_ttl)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(key, error = %err, "search cache write failed; result not cached");
            }
            Err(_) => {
                tracing::warn!(key, "search cache write timed out; result not cached");
            }
        }
    }

    async fn invalidate_cache(&self) {
        match timeout(self.cache_op_timeout, self.cache.invalidate_all()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "could not sweep search cache; stale reads bounded by TTL");
            }
            Err(_) => {
                tracing::warn!("search cache sweep timed out; stale reads bounded by TTL");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::models::Account;
    use crate::store::MemoryCatalog;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Delegates to a real MemoryCache while counting operations.
    struct CountingCache {
        inner: MemoryCache,
        gets: AtomicUsize,
        puts: AtomicUsize,
        sweeps: AtomicUsize,
    }

    impl CountingCache {
        fn new() -> Self {
            Self {
                inner: MemoryCache::new(),
                gets: AtomicUsize::new(0),
                puts: AtomicUsize::new(0),
                sweeps: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SearchCache for CountingCache {
        async fn get(&self, key: &str) -> Result<Option<Vec<SearchHit>>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, hits: &[SearchHit], ttl: Duration) -> Result<()> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.inner.put(key, hits, ttl).await
        }

        async fn invalidate_all(&self) -> Result<()> {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            self.inner.invalidate_all().await
        }
    }

    /// Every operation errors. Exercises the fail-open contract.
    struct FailingCache;

    #[async_trait]
    impl SearchCache for FailingCache {
        async fn get(&self, _key: &str) -> Result<Option<Vec<SearchHit>>> {
            anyhow::bail!("cache backend unreachable")
        }

        async fn put(&self, _key: &str, _hits: &[SearchHit], _ttl: Duration) -> Result<()> {
            anyhow::bail!("cache backend unreachable")
        }

        async fn invalidate_all(&self) -> Result<()> {
            anyhow::bail!("cache backend unreachable")
        }
    }

    fn cache_config() -> CacheConfig {
        CacheConfig {
            ttl_secs: 3600,
            op_timeout_ms: 250,
        }
    }

    fn academy(id: &str, email: &str) -> Caller {
        Caller {
            id: id.to_string(),
            display_name: "Academy".to_string(),
            email: email.to_string(),
            role: Role::Academy,
        }
    }

    fn student(id: &str) -> Caller {
        Caller {
            id: id.to_string(),
            display_name: "Student".to_string(),
            email: "student@example.com".to_string(),
            role: Role::Student,
        }
    }

    fn publish_request(subject: &str, class_name: &str, school: &str) -> PublishRequest {
        PublishRequest {
            subject: subject.to_string(),
            class_name: class_name.to_string(),
            school: school.to_string(),
            file_url: "https://blobs.example/doc.pdf".to_string(),
        }
    }

    async fn store_with_academy(id: &str, email: &str) -> Arc<MemoryCatalog> {
        let store = Arc::new(MemoryCatalog::new());
        store
            .insert_account(&Account {
                id: id.to_string(),
                display_name: "Academy".to_string(),
                email: email.to_string(),
                role: Role::Academy,
                password_digest: String::new(),
                created_at: 0,
            })
            .await
            .unwrap();
        store
    }

    fn service(store: Arc<MemoryCatalog>, cache: Arc<dyn SearchCache>) -> CatalogService {
        CatalogService::new(store, cache, &cache_config())
    }

    #[tokio::test]
    async fn test_student_cannot_publish() {
        let store = Arc::new(MemoryCatalog::new());
        let svc = service(store.clone(), Arc::new(MemoryCache::new()));

        let err = svc
            .publish(&student("s1"), publish_request("math", "10th", "dps"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Forbidden(_)));

        let q = SearchQuery::normalize("", "", "", false);
        assert!(store.search_documents(&q, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_rejects_blank_fields() {
        let svc = service(
            store_with_academy("a1", "a@example.com").await,
            Arc::new(MemoryCache::new()),
        );
        let err = svc
            .publish(&academy("a1", "a@example.com"), publish_request("math", "   ", "dps"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_publish_normalizes_classification_fields() {
        let store = store_with_academy("a1", "a@example.com").await;
        let svc = service(store, Arc::new(MemoryCache::new()));

        let doc = svc
            .publish(
                &academy("a1", "a@example.com"),
                publish_request("  Mathematics ", "10TH Grade", " DPS "),
            )
            .await
            .unwrap();
        assert_eq!(doc.subject, "mathematics");
        assert_eq!(doc.class_name, "10th grade");
        assert_eq!(doc.school, "dps");
        assert_eq!(doc.owner_id, "a1");
    }

    #[tokio::test]
    async fn test_search_reads_through_and_fills_cache() {
        let store = store_with_academy("a1", "a@example.com").await;
        let cache = Arc::new(CountingCache::new());
        let svc = service(store, cache.clone());
        let caller = academy("a1", "a@example.com");

        svc.publish(&caller, publish_request("math", "10th", "dps"))
            .await
            .unwrap();

        let first = svc.search(&student("s1"), "math", "", "", false).await.unwrap();
        assert_eq!(first.source, ResultSource::Database);
        assert_eq!(first.hits.len(), 1);
        assert_eq!(first.hits[0].owner_email, "a@example.com");

        let second = svc.search(&student("s1"), " MATH ", "", "", false).await.unwrap();
        assert_eq!(second.source, ResultSource::Cache);
        assert_eq!(second.hits, first.hits);
        assert_eq!(cache.puts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_personal_queries_never_touch_the_cache() {
        let store = store_with_academy("a1", "a@example.com").await;
        let cache = Arc::new(CountingCache::new());
        let svc = service(store, cache.clone());
        let caller = academy("a1", "a@example.com");

        svc.publish(&caller, publish_request("math", "10th", "dps"))
            .await
            .unwrap();
        let sweeps_after_publish = cache.sweeps.load(Ordering::SeqCst);

        for _ in 0..3 {
            let got = svc.search(&caller, "math", "", "", true).await.unwrap();
            assert_eq!(got.source, ResultSource::Database);
        }

        assert_eq!(cache.gets.load(Ordering::SeqCst), 0);
        assert_eq!(cache.puts.load(Ordering::SeqCst), 0);
        assert_eq!(cache.sweeps.load(Ordering::SeqCst), sweeps_after_publish);
    }

    #[tokio::test]
    async fn test_publish_invalidates_cached_results() {
        let store = store_with_academy("a1", "a@example.com").await;
        let svc = service(store, Arc::new(MemoryCache::new()));
        let caller = academy("a1", "a@example.com");

        svc.publish(&caller, publish_request("math", "10th", "dps"))
            .await
            .unwrap();

        // Warm the cache.
        let warm = svc.search(&student("s1"), "math", "", "", false).await.unwrap();
        assert_eq!(warm.source, ResultSource::Database);
        let cached = svc.search(&student("s1"), "math", "", "", false).await.unwrap();
        assert_eq!(cached.source, ResultSource::Cache);
        assert_eq!(cached.hits.len(), 1);

        // A matching publish must evict the stale entry.
        svc.publish(&caller, publish_request("mathematics", "11th", "dps"))
            .await
            .unwrap();

        let fresh = svc.search(&student("s1"), "math", "", "", false).await.unwrap();
        assert_eq!(fresh.source, ResultSource::Database);
        assert_eq!(fresh.hits.len(), 2);
    }

    #[tokio::test]
    async fn test_owner_scoping_for_personal_queries() {
        let store = store_with_academy("a1", "a@example.com").await;
        store
            .insert_account(&Account {
                id: "a2".to_string(),
                display_name: "Other Academy".to_string(),
                email: "b@example.com".to_string(),
                role: Role::Academy,
                password_digest: String::new(),
                created_at: 0,
            })
            .await
            .unwrap();
        let svc = service(store, Arc::new(MemoryCache::new()));

        svc.publish(&academy("a1", "a@example.com"), publish_request("math", "10th", "dps"))
            .await
            .unwrap();
        svc.publish(&academy("a2", "b@example.com"), publish_request("math", "10th", "dps"))
            .await
            .unwrap();

        let own = svc
            .search(&academy("a1", "a@example.com"), "math", "", "", true)
            .await
            .unwrap();
        assert_eq!(own.hits.len(), 1);
        assert!(own.hits.iter().all(|h| h.owner_id == "a1"));

        // A student's personal flag is ignored: same results as
        // personal=false.
        let ignored = svc.search(&student("s1"), "math", "", "", true).await.unwrap();
        let public = svc.search(&student("s1"), "math", "", "", false).await.unwrap();
        assert_eq!(ignored.hits, public.hits);
        assert_eq!(ignored.hits.len(), 2);
    }

    #[tokio::test]
    async fn test_fail_open_when_cache_is_down() {
        let store = store_with_academy("a1", "a@example.com").await;
        let svc = service(store, Arc::new(FailingCache));
        let caller = academy("a1", "a@example.com");

        // Publish succeeds even though the invalidation sweep errors.
        svc.publish(&caller, publish_request("math", "10th", "dps"))
            .await
            .unwrap();

        // Search still returns correct store-backed results.
        for _ in 0..2 {
            let got = svc.search(&student("s1"), "math", "", "", false).await.unwrap();
            assert_eq!(got.source, ResultSource::Database);
            assert_eq!(got.hits.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_deleted_owner_enriches_to_unknown() {
        let store = store_with_academy("a1", "a@example.com").await;
        let svc = service(store.clone(), Arc::new(MemoryCache::new()));

        svc.publish(&academy("a1", "a@example.com"), publish_request("math", "10th", "dps"))
            .await
            .unwrap();
        store.remove_account("a1");

        let got = svc.search(&student("s1"), "math", "", "", false).await.unwrap();
        assert_eq!(got.hits.len(), 1);
        assert_eq!(got.hits[0].owner_email, UNKNOWN_OWNER_EMAIL);
    }

    #[tokio::test]
    async fn test_results_ordered_newest_first() {
        let store = store_with_academy("a1", "a@example.com").await;
        let svc = service(store, Arc::new(MemoryCache::new()));
        let caller = academy("a1", "a@example.com");

        let older = svc
            .publish(&caller, publish_request("math", "10th", "dps"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let newer = svc
            .publish(&caller, publish_request("math", "11th", "dps"))
            .await
            .unwrap();

        let got = svc.search(&student("s1"), "math", "", "", false).await.unwrap();
        let ids: Vec<&str> = got.hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec![newer.id.as_str(), older.id.as_str()]);
    }
}
