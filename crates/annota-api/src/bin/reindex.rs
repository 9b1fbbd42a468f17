//! Annota Re-indexer
//!
//! Rebuild the active search engine's index from the store of record.
//!
//! Usage:
//!   cargo run --bin annota-reindex
//!
//! Reads the same environment as annota-api: DATABASE_URL plus the
//! SEARCH_ENGINE / SEARCH_ENABLED pair and the engine's own variables.

use std::sync::Arc;
use std::time::Instant;

use annota_core::defaults::REINDEX_BATCH_SIZE;
use annota_core::{NoteIndex, NoteRepository, SearchBackend, SearchEngine};
use annota_db::{Database, DatabaseSearch, PgNoteRepository};
use annota_search::{build_search, SearchConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = SearchConfig::from_env()?;
    if !config.enabled || config.engine == SearchEngine::Db {
        println!("No search engine is active; nothing to reindex.");
        return Ok(());
    }

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/annota".to_string());

    println!("═══════════════════════════════════════════════════════════════");
    println!("Annota Re-indexer");
    println!("═══════════════════════════════════════════════════════════════");
    println!("Engine: {}", config.engine);
    println!();

    let db = Database::connect(&database_url).await?;
    let repository: Arc<dyn NoteRepository> = Arc::new(PgNoteRepository::new(db.pool().clone()));
    let db_strategy: Arc<dyn SearchBackend> = Arc::new(DatabaseSearch::new(db.pool().clone()));
    let (_, index) = build_search(config, db_strategy, repository).await?;

    let start = Instant::now();
    let mut offset: i64 = 0;
    let mut indexed: usize = 0;

    loop {
        let batch = db.notes.list_batch(REINDEX_BATCH_SIZE, offset).await?;
        if batch.is_empty() {
            break;
        }
        index.bulk_index(&batch).await?;
        indexed += batch.len();
        offset += REINDEX_BATCH_SIZE;
        println!("  indexed {} notes...", indexed);
    }

    println!();
    println!(
        "Done: {} notes in {:.2}s",
        indexed,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
