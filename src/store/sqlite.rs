//! SQLite-backed [`CatalogStore`] implementation.
//!
//! Maps each store operation onto the schema created by
//! [`migrate`](crate::migrate). Substring matching uses `instr()` over
//! the already-lowercased classification columns, so no LIKE-wildcard
//! escaping is needed.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::models::{Account, Document, Role};
use crate::query::SearchQuery;

use super::CatalogStore;

/// SQLite implementation of the [`CatalogStore`] trait.
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn account_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
    let role_str: String = row.get("role");
    let role = Role::parse(&role_str)
        .with_context(|| format!("unknown role in accounts table: {role_str}"))?;
    Ok(Account {
        id: row.get("id"),
        display_name: row.get("display_name"),
        email: row.get("email"),
        role,
        password_digest: row.get("password_digest"),
        created_at: row.get("created_at"),
    })
}

fn document_from_row(row: &sqlx::sqlite::SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        file_url: row.get("file_url"),
        subject: row.get("subject"),
        class_name: row.get("class_name"),
        school: row.get("school"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn insert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, owner_id, file_url, subject, class_name, school, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.owner_id)
        .bind(&doc.file_url)
        .bind(&doc.subject)
        .bind(&doc.class_name)
        .bind(&doc.school)
        .bind(doc.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn search_documents(
        &self,
        query: &SearchQuery,
        owner: Option<&str>,
    ) -> Result<Vec<Document>> {
        let mut sql = String::from(
            "SELECT id, owner_id, file_url, subject, class_name, school, created_at \
             FROM documents",
        );

        let mut clauses: Vec<&str> = Vec::new();
        if query.subject.is_some() {
            clauses.push("instr(subject, ?) > 0");
        }
        if query.class_name.is_some() {
            clauses.push("instr(class_name, ?) > 0");
        }
        if query.school.is_some() {
            clauses.push("instr(school, ?) > 0");
        }
        if owner.is_some() {
            clauses.push("owner_id = ?");
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        // rowid ascending keeps insertion order among created_at ties.
        sql.push_str(" ORDER BY created_at DESC, rowid ASC");

        let mut q = sqlx::query(&sql);
        for filter in [&query.subject, &query.class_name, &query.school] {
            if let Some(value) = filter {
                q = q.bind(value);
            }
        }
        if let Some(owner_id) = owner {
            q = q.bind(owner_id);
        }

        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(document_from_row).collect())
    }

    async fn insert_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, display_name, email, role, password_digest, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.display_name)
        .bind(&account.email)
        .bind(account.role.as_str())
        .bind(&account.password_digest)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert account for {}", account.email))?;

        Ok(())
    }

    async fn get_account(&self, id: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            "SELECT id, display_name, email, role, password_digest, created_at \
             FROM accounts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            "SELECT id, display_name, email, role, password_digest, created_at \
             FROM accounts WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn emails_by_account_ids(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT id, email FROM accounts WHERE id IN ({placeholders})");

        let mut q = sqlx::query(&sql);
        for id in ids {
            q = q.bind(id);
        }

        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(|row| (row.get("id"), row.get("email")))
            .collect())
    }
}
