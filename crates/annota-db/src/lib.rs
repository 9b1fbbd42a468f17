//! # annota-db
//!
//! PostgreSQL database layer for annota.
//!
//! This crate provides:
//! - Connection pool management
//! - The note repository (CRUD, listing, quota counting, retirement)
//! - The relational search strategy (case-insensitive substring scan)
//!
//! ## Example
//!
//! ```rust,ignore
//! use annota_db::Database;
//! use annota_core::{CreateNoteRequest, NoteRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/annota").await?;
//!
//!     let note = db.notes.create(CreateNoteRequest {
//!         user: "a-user".to_string(),
//!         course_id: "course-v1:edX+DemoX+Demo".to_string(),
//!         usage_id: "block-v1:edX+DemoX+Demo+type@html+block@1".to_string(),
//!         text: "a comment".to_string(),
//!         quote: String::new(),
//!         ranges: vec![],
//!         tags: vec![],
//!     }).await?;
//!
//!     println!("Created note: {}", note.id);
//!     Ok(())
//! }
//! ```
pub mod notes;
pub mod pool;
pub mod search;

// Re-export core types
pub use annota_core::*;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// Re-export repository and strategy implementations
pub use notes::PgNoteRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use search::DatabaseSearch;

/// Combined database context with the note repository.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Note repository for CRUD operations.
    pub notes: PgNoteRepository,
    /// Relational search strategy over the same pool.
    pub search: DatabaseSearch,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            notes: PgNoteRepository::new(pool.clone()),
            search: DatabaseSearch::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_passes_plain_text() {
        assert_eq!(escape_like("plain text"), "plain text");
    }

    #[test]
    fn test_escape_like_escapes_percent() {
        assert_eq!(escape_like("100%"), "100\\%");
    }

    #[test]
    fn test_escape_like_escapes_underscore() {
        assert_eq!(escape_like("usage_id"), "usage\\_id");
    }

    #[test]
    fn test_escape_like_escapes_backslash_first() {
        assert_eq!(escape_like("a\\%b"), "a\\\\\\%b");
    }
}
