//! Centralized default constants for the annota system.
//!
//! **This module is the single source of truth** for all shared default
//! values. Crates and binaries reference these constants instead of defining
//! their own magic numbers.

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for note listing and search responses.
pub const NOTES_PAGE_SIZE: u32 = 25;

/// Ceiling for the client-supplied `page_size` query parameter.
pub const MAX_PAGE_SIZE: u32 = 1000;

// =============================================================================
// QUOTA
// =============================================================================

/// Maximum notes one user may hold in one course.
pub const MAX_NOTES_PER_COURSE: i64 = 500;

// =============================================================================
// INDEXING
// =============================================================================

/// Notes per batch when re-indexing the whole store.
pub const REINDEX_BATCH_SIZE: i64 = 100;

// =============================================================================
// SEARCH BACKENDS
// =============================================================================

/// Default Elasticsearch index name.
pub const ELASTICSEARCH_INDEX: &str = "notes_index";

/// Default Meilisearch index uid.
pub const MEILISEARCH_INDEX: &str = "student_notes";
