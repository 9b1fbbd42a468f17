//! Note repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use annota_core::uuid_utils::new_v7;
use annota_core::{
    CreateNoteRequest, Error, ListNotesRequest, ListNotesResponse, Note, NoteRepository, Result,
    UpdateNoteRequest,
};

/// Column list shared by every query returning full note rows.
pub(crate) const NOTE_COLUMNS: &str =
    "id, user_id, course_id, usage_id, text, quote, ranges, tags, created, updated";

/// Map a database row to a Note. The `ranges` and `tags` columns hold JSONB.
pub(crate) fn map_row_to_note(row: &sqlx::postgres::PgRow) -> Result<Note> {
    let ranges: serde_json::Value = row.get("ranges");
    let tags: serde_json::Value = row.get("tags");

    Ok(Note {
        id: row.get("id"),
        user_id: row.get("user_id"),
        course_id: row.get("course_id"),
        usage_id: row.get("usage_id"),
        text: row.get("text"),
        quote: row.get("quote"),
        ranges: serde_json::from_value(ranges)?,
        tags: serde_json::from_value(tags)?,
        created: row.get("created"),
        updated: row.get("updated"),
    })
}

/// PostgreSQL implementation of NoteRepository.
pub struct PgNoteRepository {
    pool: Pool<Postgres>,
}

impl PgNoteRepository {
    /// Create a new PgNoteRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn create(&self, req: CreateNoteRequest) -> Result<Note> {
        let id = new_v7();
        let now = Utc::now();
        let ranges = serde_json::to_value(&req.ranges)?;
        let tags = serde_json::to_value(&req.tags)?;

        sqlx::query(
            "INSERT INTO student_note \
             (id, user_id, course_id, usage_id, text, quote, ranges, tags, created, updated) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)",
        )
        .bind(id)
        .bind(&req.user)
        .bind(&req.course_id)
        .bind(&req.usage_id)
        .bind(&req.text)
        .bind(&req.quote)
        .bind(&ranges)
        .bind(&tags)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Note {
            id,
            user_id: req.user,
            course_id: req.course_id,
            usage_id: req.usage_id,
            text: req.text,
            quote: req.quote,
            ranges: req.ranges,
            tags: req.tags,
            created: now,
            updated: now,
        })
    }

    async fn get(&self, id: Uuid) -> Result<Note> {
        let query = format!("SELECT {} FROM student_note WHERE id = $1", NOTE_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        match row {
            Some(row) => map_row_to_note(&row),
            None => Err(Error::NoteNotFound(id)),
        }
    }

    async fn update(&self, id: Uuid, req: UpdateNoteRequest) -> Result<Note> {
        let now = Utc::now();
        let tags = serde_json::to_value(&req.tags)?;

        let query = format!(
            "UPDATE student_note SET text = $1, tags = $2, updated = $3 \
             WHERE id = $4 RETURNING {}",
            NOTE_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(&req.text)
            .bind(&tags)
            .bind(now)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        match row {
            Some(row) => map_row_to_note(&row),
            None => Err(Error::NoteNotFound(id)),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM student_note WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NoteNotFound(id));
        }
        Ok(())
    }

    async fn list(&self, req: ListNotesRequest) -> Result<ListNotesResponse> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM student_note WHERE user_id = $1 AND course_id = $2",
        )
        .bind(&req.user_id)
        .bind(&req.course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        let offset = (req.page.saturating_sub(1) as i64) * req.page_size as i64;
        let query = format!(
            "SELECT {} FROM student_note WHERE user_id = $1 AND course_id = $2 \
             ORDER BY updated DESC, id DESC LIMIT $3 OFFSET $4",
            NOTE_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(&req.user_id)
            .bind(&req.course_id)
            .bind(req.page_size as i64)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let rows = rows.iter().map(map_row_to_note).collect::<Result<_>>()?;
        Ok(ListNotesResponse { rows, total })
    }

    async fn count_for_course(&self, user_id: &str, course_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM student_note WHERE user_id = $1 AND course_id = $2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count)
    }

    async fn fetch_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Note>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            "SELECT {} FROM student_note WHERE id = ANY($1) \
             ORDER BY updated DESC, id DESC",
            NOTE_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(map_row_to_note).collect()
    }

    async fn delete_for_user(&self, user_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM student_note WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn list_batch(&self, limit: i64, offset: i64) -> Result<Vec<Note>> {
        let query = format!(
            "SELECT {} FROM student_note ORDER BY id LIMIT $1 OFFSET $2",
            NOTE_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(map_row_to_note).collect()
    }
}
