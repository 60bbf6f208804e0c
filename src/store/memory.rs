//! In-memory [`CatalogStore`] implementation for tests.
//!
//! Uses `Vec` and `HashMap` behind `std::sync::RwLock` for thread
//! safety. Matching semantics mirror the SQLite backend: substring
//! containment over already-normalized fields, AND across filters,
//! `created_at` descending with insertion order breaking ties.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Account, Document};
use crate::query::SearchQuery;

use super::CatalogStore;

/// In-memory store for testing.
pub struct MemoryCatalog {
    documents: RwLock<Vec<Document>>,
    accounts: RwLock<HashMap<String, Account>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            accounts: RwLock::new(HashMap::new()),
        }
    }

    /// Drop an account, leaving its documents orphaned. Exercises the
    /// enrichment sentinel path.
    pub fn remove_account(&self, id: &str) {
        self.accounts.write().unwrap().remove(id);
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn matches(doc: &Document, query: &SearchQuery, owner: Option<&str>) -> bool {
    if let Some(ref subject) = query.subject {
        if !doc.subject.contains(subject.as_str()) {
            return false;
        }
    }
    if let Some(ref class_name) = query.class_name {
        if !doc.class_name.contains(class_name.as_str()) {
            return false;
        }
    }
    if let Some(ref school) = query.school {
        if !doc.school.contains(school.as_str()) {
            return false;
        }
    }
    if let Some(owner_id) = owner {
        if doc.owner_id != owner_id {
            return false;
        }
    }
    true
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn insert_document(&self, doc: &Document) -> Result<()> {
        self.documents.write().unwrap().push(doc.clone());
        Ok(())
    }

    async fn search_documents(
        &self,
        query: &SearchQuery,
        owner: Option<&str>,
    ) -> Result<Vec<Document>> {
        let docs = self.documents.read().unwrap();
        let mut results: Vec<Document> = docs
            .iter()
            .filter(|d| matches(d, query, owner))
            .cloned()
            .collect();
        // Stable sort keeps insertion order among equal timestamps.
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(results)
    }

    async fn insert_account(&self, account: &Account) -> Result<()> {
        let mut accounts = self.accounts.write().unwrap();
        if accounts.values().any(|a| a.email == account.email) {
            anyhow::bail!("email already registered: {}", account.email);
        }
        accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn get_account(&self, id: &str) -> Result<Option<Account>> {
        Ok(self.accounts.read().unwrap().get(id).cloned())
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .unwrap()
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn emails_by_account_ids(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        let accounts = self.accounts.read().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| accounts.get(id).map(|a| (id.clone(), a.email.clone())))
            .collect())
    }
}
