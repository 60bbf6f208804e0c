//! Storage abstraction for the StudyShelf catalog.
//!
//! The [`CatalogStore`] trait defines all durable operations needed by
//! the publish and search paths, enabling pluggable backends (SQLite in
//! production, in-memory in tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Account, Document};
use crate::query::SearchQuery;

pub use memory::MemoryCatalog;
pub use sqlite::SqliteCatalog;

/// Abstract durable store for Document and Account records.
///
/// The store is the single source of truth; the search cache only ever
/// holds derived copies of what these operations return.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_document`](CatalogStore::insert_document) | Append one published document |
/// | [`search_documents`](CatalogStore::search_documents) | Filtered metadata search |
/// | [`insert_account`](CatalogStore::insert_account) | Create an account (email unique) |
/// | [`get_account`](CatalogStore::get_account) | Look up an account by id |
/// | [`get_account_by_email`](CatalogStore::get_account_by_email) | Look up an account by email |
/// | [`emails_by_account_ids`](CatalogStore::emails_by_account_ids) | Batch id→email resolution |
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Append a document row. Documents are immutable once written.
    async fn insert_document(&self, doc: &Document) -> Result<()>;

    /// Return documents matching `query`, restricted to `owner` when
    /// given.
    ///
    /// Each present filter is a substring match against the
    /// corresponding stored field (both sides already lowercased), with
    /// AND semantics across filters; absent filters impose no
    /// constraint. Results are ordered by `created_at` descending, ties
    /// in insertion order.
    async fn search_documents(
        &self,
        query: &SearchQuery,
        owner: Option<&str>,
    ) -> Result<Vec<Document>>;

    /// Create an account. Fails if the email is already registered.
    async fn insert_account(&self, account: &Account) -> Result<()>;

    async fn get_account(&self, id: &str) -> Result<Option<Account>>;

    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Resolve account ids to emails in one call. Ids with no matching
    /// account are simply absent from the returned map.
    async fn emails_by_account_ids(&self, ids: &[String]) -> Result<HashMap<String, String>>;
}
