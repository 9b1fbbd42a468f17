//! Meilisearch search strategy and index mirror.
//!
//! A thin typed-JSON client over the engine's REST API. Documents carry only
//! the searchable subset of a note (id, scope fields, text); matching ids are
//! narrowed back through the relational store, so rows come back in recency
//! order rather than engine relevance order. Totals are the engine's
//! `estimatedTotalHits`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use annota_core::defaults::MEILISEARCH_INDEX;
use annota_core::{
    Error, FilterField, FilterValue, Note, NoteIndex, NoteRepository, Result, SearchBackend,
    SearchResult, TranslatedQuery,
};

/// Cap on an unpaginated fetch, matching the engine's default result limit.
const MAX_UNPAGINATED_HITS: i64 = 1_000;

/// Configuration for the Meilisearch strategy.
#[derive(Debug, Clone)]
pub struct MeilisearchConfig {
    /// Engine URL, e.g. `http://meilisearch:7700`.
    pub url: String,
    /// API key; empty means no authentication.
    pub api_key: String,
    /// Index holding note documents.
    pub index: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for MeilisearchConfig {
    fn default() -> Self {
        Self {
            url: "http://meilisearch:7700".to_string(),
            api_key: String::new(),
            index: MEILISEARCH_INDEX.to_string(),
            timeout_secs: 30,
        }
    }
}

impl MeilisearchConfig {
    /// Build configuration from `MEILISEARCH_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("MEILISEARCH_URL")
                .unwrap_or_else(|_| "http://meilisearch:7700".to_string()),
            api_key: std::env::var("MEILISEARCH_API_KEY").unwrap_or_default(),
            index: std::env::var("MEILISEARCH_INDEX")
                .unwrap_or_else(|_| MEILISEARCH_INDEX.to_string()),
            timeout_secs: std::env::var("MEILISEARCH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}

/// Note document as stored in the engine. Only the searchable subset; the
/// relational store remains the source of truth for full rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MeiliNoteDocument {
    id: Uuid,
    user_id: String,
    course_id: String,
    text: String,
}

impl MeiliNoteDocument {
    fn from_note(note: &Note) -> Self {
        Self {
            id: note.id,
            user_id: note.user_id.clone(),
            course_id: note.course_id.clone(),
            text: note.text.clone(),
        }
    }
}

/// Request payload for the `/indexes/{uid}/search` endpoint.
#[derive(Debug, Serialize)]
struct MeiliSearchRequest<'a> {
    q: &'a str,
    offset: i64,
    limit: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    filter: Vec<String>,
}

/// Response from the `/indexes/{uid}/search` endpoint.
#[derive(Debug, Deserialize)]
struct MeiliSearchResponse {
    hits: Vec<MeiliNoteDocument>,
    #[serde(rename = "estimatedTotalHits", default)]
    estimated_total_hits: i64,
}

/// Response from the `/indexes/{uid}` endpoint.
#[derive(Debug, Deserialize)]
struct MeiliIndexInfo {
    #[serde(rename = "createdAt")]
    created_at: String,
}

/// Response from the `/health` endpoint.
#[derive(Debug, Deserialize)]
struct MeiliHealth {
    status: String,
}

/// Minimal REST client for the engine endpoints this service uses.
pub struct MeilisearchClient {
    client: Client,
    config: MeilisearchConfig,
}

impl MeilisearchClient {
    pub fn new(config: MeilisearchConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");
        Self { client, config }
    }

    pub fn from_env() -> Self {
        Self::new(MeilisearchConfig::from_env())
    }

    pub fn index(&self) -> &str {
        &self.config.index
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if self.config.api_key.is_empty() {
            request
        } else {
            request.bearer_auth(&self.config.api_key)
        }
    }

    async fn expect_accepted(&self, request: RequestBuilder, what: &str) -> Result<()> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| Error::Search(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Search(format!(
                "Meilisearch {} returned {}: {}",
                what, status, body
            )));
        }
        Ok(())
    }

    /// Liveness probe against `/health`.
    pub async fn health(&self) -> Result<bool> {
        let response = self
            .authorize(self.client.get(self.endpoint("/health")))
            .send()
            .await;

        match response {
            Ok(resp) => {
                if !resp.status().is_success() {
                    warn!("Meilisearch health check failed: {}", resp.status());
                    return Ok(false);
                }
                let health: MeiliHealth = resp
                    .json()
                    .await
                    .map_err(|e| Error::Search(format!("Failed to parse response: {}", e)))?;
                Ok(health.status == "available")
            }
            Err(e) => {
                warn!("Meilisearch health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Creation timestamp of the note index, for diagnostics.
    pub async fn index_created_at(&self) -> Result<String> {
        let response = self
            .authorize(
                self.client
                    .get(self.endpoint(&format!("/indexes/{}", self.config.index))),
            )
            .send()
            .await
            .map_err(|e| Error::Search(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Search(format!(
                "Meilisearch index info returned {}: {}",
                status, body
            )));
        }

        let info: MeiliIndexInfo = response
            .json()
            .await
            .map_err(|e| Error::Search(format!("Failed to parse response: {}", e)))?;
        Ok(info.created_at)
    }

    /// Create the note index and declare its filterable attributes. Both
    /// calls are idempotent on the engine side.
    pub async fn ensure_index(&self) -> Result<()> {
        self.expect_accepted(
            self.client
                .post(self.endpoint("/indexes"))
                .json(&json!({ "uid": self.config.index, "primaryKey": "id" })),
            "index creation",
        )
        .await?;

        self.expect_accepted(
            self.client
                .put(self.endpoint(&format!(
                    "/indexes/{}/settings/filterable-attributes",
                    self.config.index
                )))
                .json(&json!(["user_id", "course_id"])),
            "settings update",
        )
        .await?;

        info!(
            subsystem = "search",
            component = "meilisearch",
            op = "ensure_index",
            index_name = %self.config.index,
            "Ensured note index"
        );
        Ok(())
    }

    async fn search(&self, request: &MeiliSearchRequest<'_>) -> Result<MeiliSearchResponse> {
        let response = self
            .authorize(
                self.client
                    .post(self.endpoint(&format!("/indexes/{}/search", self.config.index)))
                    .json(request),
            )
            .send()
            .await
            .map_err(|e| Error::Search(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Search(format!(
                "Meilisearch search returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Search(format!("Failed to parse response: {}", e)))
    }

    async fn add_documents(&self, documents: &[MeiliNoteDocument]) -> Result<()> {
        self.expect_accepted(
            self.client
                .post(self.endpoint(&format!("/indexes/{}/documents", self.config.index)))
                .json(documents),
            "document indexing",
        )
        .await
    }

    async fn delete_document(&self, id: &str) -> Result<()> {
        self.expect_accepted(
            self.client.delete(self.endpoint(&format!(
                "/indexes/{}/documents/{}",
                self.config.index, id
            ))),
            "document deletion",
        )
        .await
    }

    async fn delete_by_filter(&self, filter: &str) -> Result<()> {
        self.expect_accepted(
            self.client
                .post(self.endpoint(&format!(
                    "/indexes/{}/documents/delete",
                    self.config.index
                )))
                .json(&json!({ "filter": filter })),
            "filtered deletion",
        )
        .await
    }
}

fn quote_value(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Render the scope filters in the engine's filter expression syntax. Usage
/// filters never reach the engine: `usage_id` is not a filterable attribute,
/// and usage-scoped requests are served relationally.
fn filter_expressions(query: &TranslatedQuery) -> Vec<String> {
    query
        .filters
        .iter()
        .filter_map(|filter| {
            let field = match filter.field {
                FilterField::User => "user_id",
                FilterField::CourseId => "course_id",
                FilterField::UsageId => return None,
            };
            Some(match &filter.value {
                FilterValue::Term(term) => format!("{} = {}", field, quote_value(term)),
                FilterValue::AnyOf(values) => format!(
                    "{} IN [{}]",
                    field,
                    values
                        .iter()
                        .map(|v| quote_value(v))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            })
        })
        .collect()
}

/// Meilisearch-backed search strategy. Also serves as the index mirror for
/// the same engine.
pub struct MeilisearchBackend {
    client: MeilisearchClient,
    repository: Arc<dyn NoteRepository>,
}

impl MeilisearchBackend {
    pub fn new(client: MeilisearchClient, repository: Arc<dyn NoteRepository>) -> Self {
        Self { client, repository }
    }

    /// Create the note index and its filter settings when missing.
    pub async fn ensure_index(&self) -> Result<()> {
        self.client.ensure_index().await
    }

    async fn narrowed(&self, response: MeiliSearchResponse) -> Result<SearchResult> {
        let ids: Vec<Uuid> = response.hits.iter().map(|hit| hit.id).collect();
        let rows = self.repository.fetch_by_ids(&ids).await?;
        Ok(SearchResult {
            total: response.estimated_total_hits,
            rows,
        })
    }
}

#[async_trait]
impl SearchBackend for MeilisearchBackend {
    fn name(&self) -> &'static str {
        "meilisearch"
    }

    async fn search(
        &self,
        query: &TranslatedQuery,
        page: u32,
        page_size: u32,
    ) -> Result<SearchResult> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);
        let request = MeiliSearchRequest {
            q: query.text.as_deref().unwrap_or(""),
            offset,
            limit: i64::from(page_size),
            filter: filter_expressions(query),
        };
        let response = self.client.search(&request).await?;
        let result = self.narrowed(response).await?;

        debug!(
            subsystem = "search",
            component = "meilisearch",
            op = "search",
            index_name = %self.client.index(),
            result_count = result.rows.len(),
            total = result.total,
            "Executed note search"
        );
        Ok(result)
    }

    async fn search_all(&self, query: &TranslatedQuery) -> Result<Vec<Note>> {
        let request = MeiliSearchRequest {
            q: query.text.as_deref().unwrap_or(""),
            offset: 0,
            limit: MAX_UNPAGINATED_HITS,
            filter: filter_expressions(query),
        };
        let response = self.client.search(&request).await?;
        Ok(self.narrowed(response).await?.rows)
    }

    async fn count(&self, query: &TranslatedQuery) -> Result<i64> {
        let request = MeiliSearchRequest {
            q: query.text.as_deref().unwrap_or(""),
            offset: 0,
            limit: 0,
            filter: filter_expressions(query),
        };
        let response = self.client.search(&request).await?;
        Ok(response.estimated_total_hits)
    }

    async fn check(&self) -> Result<()> {
        if self.client.health().await? {
            Ok(())
        } else {
            Err(Error::Search("Meilisearch reports unavailable".to_string()))
        }
    }

    async fn info(&self) -> Result<Value> {
        let created_at = self.client.index_created_at().await?;
        Ok(json!({ "meilisearch": created_at }))
    }
}

#[async_trait]
impl NoteIndex for MeilisearchBackend {
    async fn index_note(&self, note: &Note) -> Result<()> {
        self.client
            .add_documents(&[MeiliNoteDocument::from_note(note)])
            .await
    }

    async fn delete_note(&self, id: Uuid) -> Result<()> {
        self.client.delete_document(&id.to_string()).await
    }

    async fn delete_for_user(&self, user_id: &str) -> Result<()> {
        self.client
            .delete_by_filter(&format!("user_id = {}", quote_value(user_id)))
            .await
    }

    async fn bulk_index(&self, notes: &[Note]) -> Result<()> {
        if notes.is_empty() {
            return Ok(());
        }
        let documents: Vec<MeiliNoteDocument> =
            notes.iter().map(MeiliNoteDocument::from_note).collect();
        self.client.add_documents(&documents).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annota_core::FieldFilter;

    #[test]
    fn test_quote_value_escapes_quotes_and_backslashes() {
        assert_eq!(quote_value("plain"), "'plain'");
        assert_eq!(quote_value("it's"), r"'it\'s'");
        assert_eq!(quote_value(r"a\b"), r"'a\\b'");
    }

    #[test]
    fn test_filter_expressions_map_scope_fields() {
        let query = TranslatedQuery {
            filters: vec![
                FieldFilter {
                    field: FilterField::User,
                    value: FilterValue::Term("student-1".to_string()),
                },
                FieldFilter {
                    field: FilterField::CourseId,
                    value: FilterValue::Term("course-v1:edX+DemoX+2026".to_string()),
                },
            ],
            text: Some("grass".to_string()),
            highlight: false,
        };

        let filters = filter_expressions(&query);
        assert_eq!(
            filters,
            vec![
                "user_id = 'student-1'".to_string(),
                "course_id = 'course-v1:edX+DemoX+2026'".to_string(),
            ]
        );
    }

    #[test]
    fn test_filter_expressions_skip_usage_filters() {
        let query = TranslatedQuery {
            filters: vec![FieldFilter {
                field: FilterField::UsageId,
                value: FilterValue::AnyOf(vec!["block-v1:a".to_string()]),
            }],
            text: None,
            highlight: false,
        };
        assert!(filter_expressions(&query).is_empty());
    }

    #[test]
    fn test_filter_expressions_render_any_of_as_in() {
        let query = TranslatedQuery {
            filters: vec![FieldFilter {
                field: FilterField::User,
                value: FilterValue::AnyOf(vec!["a".to_string(), "b".to_string()]),
            }],
            text: None,
            highlight: false,
        };
        assert_eq!(filter_expressions(&query), vec!["user_id IN ['a', 'b']".to_string()]);
    }

    #[test]
    fn test_search_request_omits_empty_filter() {
        let request = MeiliSearchRequest {
            q: "grass",
            offset: 0,
            limit: 25,
            filter: Vec::new(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["q"], json!("grass"));
        assert_eq!(value["limit"], json!(25));
        assert!(value.get("filter").is_none());
    }

    #[test]
    fn test_search_response_reads_estimated_total() {
        let body = json!({
            "hits": [{
                "id": "0191b3a8-1111-7ccc-8ddd-eeeeffff0000",
                "user_id": "student-1",
                "course_id": "course-v1:edX+DemoX+2026",
                "text": "a note"
            }],
            "estimatedTotalHits": 42
        });
        let response: MeiliSearchResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.estimated_total_hits, 42);
        assert_eq!(response.hits.len(), 1);
        assert_eq!(response.hits[0].user_id, "student-1");
    }

    #[test]
    fn test_search_response_total_defaults_to_zero() {
        let body = json!({ "hits": [] });
        let response: MeiliSearchResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.estimated_total_hits, 0);
    }

    #[test]
    fn test_document_carries_searchable_subset_only() {
        let note = Note {
            id: Uuid::new_v4(),
            user_id: "student-1".to_string(),
            course_id: "course-v1:edX+DemoX+2026".to_string(),
            usage_id: "block-v1:html+1".to_string(),
            text: "the text".to_string(),
            quote: "the quote".to_string(),
            ranges: Vec::new(),
            tags: vec!["tag".to_string()],
            created: chrono::Utc::now(),
            updated: chrono::Utc::now(),
        };

        let value = serde_json::to_value(MeiliNoteDocument::from_note(&note)).unwrap();
        let fields: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(fields.len(), 4);
        assert!(value.get("quote").is_none());
        assert!(value.get("tags").is_none());
    }

    #[test]
    fn test_config_defaults() {
        let config = MeilisearchConfig::default();
        assert_eq!(config.url, "http://meilisearch:7700");
        assert_eq!(config.index, MEILISEARCH_INDEX);
        assert!(config.api_key.is_empty());
    }
}
