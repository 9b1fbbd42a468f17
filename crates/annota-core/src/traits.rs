//! Core traits for annota abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;
use crate::search::{SearchResult, TranslatedQuery};

// =============================================================================
// NOTE REPOSITORY
// =============================================================================

/// Request for listing a user's notes within a course.
#[derive(Debug, Clone, Default)]
pub struct ListNotesRequest {
    pub user_id: String,
    pub course_id: String,
    /// 1-based page number
    pub page: u32,
    pub page_size: u32,
}

/// Response for listing notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListNotesResponse {
    pub rows: Vec<Note>,
    pub total: i64,
}

/// Repository for note CRUD operations against the primary store.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Insert a new note with a server-generated id and timestamps.
    async fn create(&self, req: CreateNoteRequest) -> Result<Note>;

    /// Fetch a note by id.
    async fn get(&self, id: Uuid) -> Result<Note>;

    /// Replace the text and tags of an existing note, refreshing `updated`.
    async fn update(&self, id: Uuid, req: UpdateNoteRequest) -> Result<Note>;

    /// Delete a note by id.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// List a user's notes in a course, most recently updated first.
    async fn list(&self, req: ListNotesRequest) -> Result<ListNotesResponse>;

    /// Number of notes a user holds in a course. Quota input.
    async fn count_for_course(&self, user_id: &str, course_id: &str) -> Result<i64>;

    /// Fetch full rows for a set of ids, most recently updated first.
    /// Unknown ids are skipped.
    async fn fetch_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Note>>;

    /// Delete every note belonging to a user. Returns the number of rows
    /// removed; 0 for an unknown user.
    async fn delete_for_user(&self, user_id: &str) -> Result<u64>;

    /// Walk the full table in stable id order. Used for re-indexing.
    async fn list_batch(&self, limit: i64, offset: i64) -> Result<Vec<Note>>;
}

// =============================================================================
// SEARCH BACKEND
// =============================================================================

/// A search strategy executing translated queries against one engine.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Short diagnostic name ("db", "es", "meilisearch"). Used as the
    /// heartbeat check identifier and the selftest error-key prefix.
    fn name(&self) -> &'static str;

    /// Execute a paginated search.
    async fn search(
        &self,
        query: &TranslatedQuery,
        page: u32,
        page_size: u32,
    ) -> Result<SearchResult>;

    /// Execute an unpaginated search. Used when a usage filter pins the
    /// result set to a handful of content blocks.
    async fn search_all(&self, query: &TranslatedQuery) -> Result<Vec<Note>>;

    /// Count matches without fetching rows.
    async fn count(&self, query: &TranslatedQuery) -> Result<i64>;

    /// Reachability probe. An error here fails the heartbeat with this
    /// backend's name as the check identifier.
    async fn check(&self) -> Result<()>;

    /// Diagnostics object merged into the selftest response. The relational
    /// strategy contributes nothing and returns an empty object.
    async fn info(&self) -> Result<JsonValue>;
}

// =============================================================================
// INDEX MIRROR
// =============================================================================

/// Keeps the active engine's index in step with the primary store.
///
/// Implementations are invoked explicitly on the write paths after the
/// store operation commits; database triggers and implicit hooks are not
/// used. Failures are surfaced to the caller, which logs and continues.
#[async_trait]
pub trait NoteIndex: Send + Sync {
    /// Add or replace one note document.
    async fn index_note(&self, note: &Note) -> Result<()>;

    /// Remove one note document. Unknown ids are not an error.
    async fn delete_note(&self, id: Uuid) -> Result<()>;

    /// Remove every document belonging to a user.
    async fn delete_for_user(&self, user_id: &str) -> Result<()>;

    /// Add or replace a batch of documents. Used for re-indexing.
    async fn bulk_index(&self, notes: &[Note]) -> Result<()>;
}

/// Mirror used when the relational strategy is active: nothing to sync.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullIndex;

#[async_trait]
impl NoteIndex for NullIndex {
    async fn index_note(&self, _note: &Note) -> Result<()> {
        Ok(())
    }

    async fn delete_note(&self, _id: Uuid) -> Result<()> {
        Ok(())
    }

    async fn delete_for_user(&self, _user_id: &str) -> Result<()> {
        Ok(())
    }

    async fn bulk_index(&self, _notes: &[Note]) -> Result<()> {
        Ok(())
    }
}
