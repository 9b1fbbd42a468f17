//! Relational search strategy.
//!
//! Serves every query with no full-text criterion, and full-text queries
//! as a case-insensitive substring scan over `text` and the JSON-encoded
//! `tags` when the configured engine is the database itself. Ordering is
//! always most recently updated first; there is no relevance concept here.

use async_trait::async_trait;
use serde_json::json;
use sqlx::{Pool, Postgres};
use tracing::debug;

use annota_core::{
    Error, FilterField, FilterValue, Note, Result, SearchBackend, SearchResult, TranslatedQuery,
};

use crate::escape_like;
use crate::notes::{map_row_to_note, NOTE_COLUMNS};

/// Build the WHERE clause for a translated query, advancing `param_idx`
/// past the parameters it consumes. The text pattern binds once and is
/// reused for both ILIKE comparisons.
fn predicate_sql(query: &TranslatedQuery, param_idx: &mut usize) -> String {
    let mut clauses = Vec::new();
    for filter in &query.filters {
        let column = match filter.field {
            FilterField::User => "user_id",
            FilterField::CourseId => "course_id",
            FilterField::UsageId => "usage_id",
        };
        match &filter.value {
            FilterValue::Term(_) => clauses.push(format!("{} = ${}", column, param_idx)),
            FilterValue::AnyOf(_) => clauses.push(format!("{} = ANY(${})", column, param_idx)),
        }
        *param_idx += 1;
    }
    if query.text.is_some() {
        clauses.push(format!(
            "(text ILIKE ${} OR tags::text ILIKE ${})",
            param_idx, param_idx
        ));
        *param_idx += 1;
    }

    if clauses.is_empty() {
        "TRUE".to_string()
    } else {
        clauses.join(" AND ")
    }
}

/// Bind filter values and the optional text pattern in predicate order.
macro_rules! bind_predicate_params {
    ($query:expr, $translated:expr, $pattern:expr) => {{
        let mut q = $query;
        for filter in &$translated.filters {
            match &filter.value {
                FilterValue::Term(term) => q = q.bind(term),
                FilterValue::AnyOf(values) => q = q.bind(values),
            }
        }
        if let Some(pattern) = &$pattern {
            q = q.bind(pattern);
        }
        q
    }};
}

/// Search strategy backed by the primary store.
pub struct DatabaseSearch {
    pool: Pool<Postgres>,
}

impl DatabaseSearch {
    /// Create a new DatabaseSearch with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn like_pattern(query: &TranslatedQuery) -> Option<String> {
        query
            .text
            .as_ref()
            .map(|text| format!("%{}%", escape_like(text)))
    }

    async fn count_matches(&self, query: &TranslatedQuery) -> Result<i64> {
        let pattern = Self::like_pattern(query);
        let mut param_idx = 1;
        let predicate = predicate_sql(query, &mut param_idx);

        let sql = format!("SELECT COUNT(*) FROM student_note WHERE {}", predicate);
        let total: i64 = bind_predicate_params!(sqlx::query_scalar(&sql), query, pattern)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(total)
    }
}

#[async_trait]
impl SearchBackend for DatabaseSearch {
    fn name(&self) -> &'static str {
        "db"
    }

    async fn search(
        &self,
        query: &TranslatedQuery,
        page: u32,
        page_size: u32,
    ) -> Result<SearchResult> {
        let total = self.count_matches(query).await?;

        let pattern = Self::like_pattern(query);
        let mut param_idx = 1;
        let predicate = predicate_sql(query, &mut param_idx);
        let sql = format!(
            "SELECT {} FROM student_note WHERE {} \
             ORDER BY updated DESC, id DESC LIMIT ${} OFFSET ${}",
            NOTE_COLUMNS,
            predicate,
            param_idx,
            param_idx + 1
        );

        let offset = (page.saturating_sub(1) as i64) * page_size as i64;
        let rows = bind_predicate_params!(sqlx::query(&sql), query, pattern)
            .bind(page_size as i64)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        let rows: Vec<Note> = rows.iter().map(map_row_to_note).collect::<Result<_>>()?;

        debug!(
            subsystem = "db",
            component = "search",
            op = "search",
            result_count = rows.len(),
            total = total,
            "Relational search page served"
        );
        Ok(SearchResult { total, rows })
    }

    async fn search_all(&self, query: &TranslatedQuery) -> Result<Vec<Note>> {
        let pattern = Self::like_pattern(query);
        let mut param_idx = 1;
        let predicate = predicate_sql(query, &mut param_idx);
        let sql = format!(
            "SELECT {} FROM student_note WHERE {} ORDER BY updated DESC, id DESC",
            NOTE_COLUMNS, predicate
        );

        let rows = bind_predicate_params!(sqlx::query(&sql), query, pattern)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(map_row_to_note).collect()
    }

    async fn count(&self, query: &TranslatedQuery) -> Result<i64> {
        self.count_matches(query).await
    }

    async fn check(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn info(&self) -> Result<serde_json::Value> {
        Ok(json!({}))
    }
}
