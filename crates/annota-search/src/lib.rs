//! # annota-search
//!
//! Search strategies and query translation for annota.
//!
//! This crate provides:
//! - A backend-neutral query translator for parsed request parameters
//! - An Elasticsearch strategy with relevance ranking and highlighting
//! - A Meilisearch strategy with relational row narrowing
//! - Per-query engine selection with a relational fallback path
//!
//! ## Example
//!
//! ```ignore
//! use annota_search::{build_search, translate, SearchConfig};
//!
//! let config = SearchConfig::from_env()?;
//! let (selector, index) = build_search(config, db_strategy, repository).await?;
//!
//! let query = translate(&params);
//! let result = selector.choose(&params).search(&query, 1, 25).await?;
//! ```

pub mod es;
pub mod meilisearch;
pub mod query;
pub mod selector;

// Re-export core types
pub use annota_core::*;

// Re-export search types
pub use es::{EsAuth, EsBackend, EsConfig};
pub use meilisearch::{MeilisearchBackend, MeilisearchClient, MeilisearchConfig};
pub use query::translate;
pub use selector::{build_search, BackendSelector, SearchConfig};
