//! # annota-core
//!
//! Core types, traits, and abstractions for the annota service.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other annota crates depend on: the note model, the error type, the
//! repository and search-backend traits, and the translated-query types the
//! backend strategies consume.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod search;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::{CreateNoteRequest, Note, NoteRange, UpdateNoteRequest};
pub use search::{
    FieldFilter, FilterField, FilterValue, SearchEngine, SearchParams, SearchResult,
    TranslatedQuery, HIGHLIGHT_END, HIGHLIGHT_START,
};
pub use traits::{
    ListNotesRequest, ListNotesResponse, NoteIndex, NoteRepository, NullIndex, SearchBackend,
};
