//! # StudyShelf
//!
//! A document-metadata catalog with cached search: academies publish PDF
//! documents tagged with subject/class/school metadata, and students
//! search across that metadata.
//!
//! Search results for non-personal queries flow through a read-through
//! cache that every successful publish invalidates wholesale, so a
//! search that starts after a publish completes can never see a cached
//! result set that predates the new document.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐      ┌────────────────┐      ┌──────────────┐
//! │   HTTP   │─────▶│ CatalogService │─────▶│ CatalogStore │
//! │   CLI    │      │ publish/search │      │   (SQLite)   │
//! └──────────┘      └───────┬────────┘      └──────────────┘
//!                           │ read-through / invalidate-all
//!                           ▼
//!                    ┌─────────────┐
//!                    │ SearchCache │
//!                    │ (TTL, fail- │
//!                    │   open)     │
//!                    └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`query`] | Search query normalization and cache keys |
//! | [`cache`] | Search-result cache trait and in-process backend |
//! | [`store`] | Catalog store trait, SQLite and in-memory backends |
//! | [`catalog`] | Publish/search orchestration and invalidation |
//! | [`auth`] | Accounts, login, and bearer tokens |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod auth;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod migrate;
pub mod models;
pub mod query;
pub mod server;
pub mod store;
