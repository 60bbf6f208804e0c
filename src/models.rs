//! Core data models for the StudyShelf catalog.
//!
//! These types represent the accounts, documents, and search results that
//! flow through the publish and search paths.

use serde::{Deserialize, Serialize};

/// Account role. Only academies may publish documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Academy,
    Student,
}

impl Role {
    /// Parse a role from its wire form (`"ACADEMY"` / `"STUDENT"`).
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "ACADEMY" => Some(Role::Academy),
            "STUDENT" => Some(Role::Student),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Academy => "ACADEMY",
            Role::Student => "STUDENT",
        }
    }
}

/// A registered user account stored in the catalog.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    pub password_digest: String,
    pub created_at: i64,
}

/// Verified caller identity, produced by the auth layer.
///
/// The catalog service trusts this verbatim and never re-derives it.
#[derive(Debug, Clone)]
pub struct Caller {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,
}

impl From<&Account> for Caller {
    fn from(a: &Account) -> Self {
        Caller {
            id: a.id.clone(),
            display_name: a.display_name.clone(),
            email: a.email.clone(),
            role: a.role,
        }
    }
}

/// A published document record.
///
/// Classification fields (`subject`, `class_name`, `school`) are stored
/// lowercased and trimmed, so matching never normalizes stored data at
/// query time. Rows are append-only; there is no update path.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub owner_id: String,
    pub file_url: String,
    pub subject: String,
    pub class_name: String,
    pub school: String,
    /// Unix epoch milliseconds. Descending sort order for results.
    pub created_at: i64,
}

/// An enriched search result row, as returned to callers and as cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub file_url: String,
    pub subject: String,
    pub class_name: String,
    pub school: String,
    pub created_at: i64,
    pub owner_id: String,
    /// Owning account's email, or `"Unknown"` if the account is gone.
    pub owner_email: String,
}

/// Where a search response was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Cache,
    Database,
}

/// Full search response: ordered hits plus provenance.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub source: ResultSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_round_trip() {
        assert_eq!(Role::parse("ACADEMY"), Some(Role::Academy));
        assert_eq!(Role::parse("STUDENT"), Some(Role::Student));
        assert_eq!(Role::parse("academy"), None);
        assert_eq!(Role::parse(""), None);
        assert_eq!(Role::parse(Role::Academy.as_str()), Some(Role::Academy));
    }

    #[test]
    fn test_result_source_wire_form() {
        assert_eq!(
            serde_json::to_string(&ResultSource::Cache).unwrap(),
            "\"cache\""
        );
        assert_eq!(
            serde_json::to_string(&ResultSource::Database).unwrap(),
            "\"database\""
        );
    }
}
