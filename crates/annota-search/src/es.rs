//! Elasticsearch search strategy and index mirror.
//!
//! Talks to the cluster through the official client. The index carries an
//! `html_strip` analyzer for note bodies and quotes and a lowercased keyword
//! analyzer for tags, so tag matches are case-insensitive but never
//! tokenized. Full-text queries run a `multi_match` over `text` and `tags`
//! inside a filtered bool query; matches come back in relevance order with
//! optional whole-field highlighting.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use elasticsearch::auth::Credentials;
use elasticsearch::cert::CertificateValidation;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use elasticsearch::indices::{IndicesCreateParts, IndicesExistsParts};
use elasticsearch::{
    DeleteByQueryParts, DeleteParts, Elasticsearch, IndexParts, SearchParts,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use annota_core::defaults::ELASTICSEARCH_INDEX;
use annota_core::{
    Error, FilterField, FilterValue, Note, NoteIndex, NoteRange, Result, SearchBackend,
    SearchResult, TranslatedQuery, HIGHLIGHT_END, HIGHLIGHT_START,
};

/// Cap on an unpaginated fetch, matching the cluster's default
/// `max_result_window`.
const MAX_RESULT_WINDOW: i64 = 10_000;

fn default_index() -> String {
    ELASTICSEARCH_INDEX.to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

/// Authentication options for the Elasticsearch connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EsAuth {
    Basic { username: String, password: String },
    Bearer { token: String },
}

/// Configuration for the Elasticsearch strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsConfig {
    /// Node URL, e.g. `http://localhost:9200`.
    pub url: String,
    /// Index holding note documents.
    #[serde(default = "default_index")]
    pub index: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Optional authentication.
    #[serde(default)]
    pub auth: Option<EsAuth>,
    /// Skip TLS certificate validation (self-signed dev clusters).
    #[serde(default)]
    pub insecure: bool,
}

impl Default for EsConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            index: default_index(),
            request_timeout_ms: default_request_timeout_ms(),
            auth: None,
            insecure: false,
        }
    }
}

impl EsConfig {
    /// Build configuration from `ELASTICSEARCH_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        let auth = match (
            std::env::var("ELASTICSEARCH_USERNAME"),
            std::env::var("ELASTICSEARCH_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) => Some(EsAuth::Basic { username, password }),
            _ => std::env::var("ELASTICSEARCH_API_TOKEN")
                .ok()
                .map(|token| EsAuth::Bearer { token }),
        };

        Self {
            url: std::env::var("ELASTICSEARCH_URL")
                .unwrap_or_else(|_| "http://localhost:9200".to_string()),
            index: std::env::var("ELASTICSEARCH_INDEX").unwrap_or_else(|_| default_index()),
            request_timeout_ms: std::env::var("ELASTICSEARCH_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_request_timeout_ms),
            auth,
            insecure: std::env::var("ELASTICSEARCH_INSECURE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

/// Note document as stored in the index. Ranges travel as a JSON-encoded
/// string in a keyword field; they are never searched, only carried.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EsNoteDocument {
    id: Uuid,
    user: String,
    course_id: String,
    usage_id: String,
    text: String,
    quote: String,
    ranges: String,
    tags: Vec<String>,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
}

impl EsNoteDocument {
    fn from_note(note: &Note) -> Result<Self> {
        Ok(Self {
            id: note.id,
            user: note.user_id.clone(),
            course_id: note.course_id.clone(),
            usage_id: note.usage_id.clone(),
            text: note.text.clone(),
            quote: note.quote.clone(),
            ranges: serde_json::to_string(&note.ranges)?,
            tags: note.tags.clone(),
            created: note.created,
            updated: note.updated,
        })
    }

    fn into_note(self) -> Result<Note> {
        let ranges: Vec<NoteRange> = serde_json::from_str(&self.ranges)?;
        Ok(Note {
            id: self.id,
            user_id: self.user,
            course_id: self.course_id,
            usage_id: self.usage_id,
            text: self.text,
            quote: self.quote,
            ranges,
            tags: self.tags,
            created: self.created,
            updated: self.updated,
        })
    }
}

/// Index settings and mappings for the note index.
fn index_mapping() -> Value {
    json!({
        "settings": {
            "analysis": {
                "analyzer": {
                    "html_strip": {
                        "type": "custom",
                        "tokenizer": "standard",
                        "filter": ["lowercase", "stop", "snowball"],
                        "char_filter": ["html_strip"]
                    },
                    "case_insensitive_keyword": {
                        "type": "custom",
                        "tokenizer": "keyword",
                        "filter": ["lowercase"]
                    }
                }
            }
        },
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "user": { "type": "keyword" },
                "course_id": { "type": "keyword" },
                "usage_id": { "type": "keyword" },
                "text": { "type": "text", "analyzer": "html_strip" },
                "quote": { "type": "text", "analyzer": "html_strip" },
                "ranges": { "type": "keyword", "index": false },
                "tags": { "type": "text", "analyzer": "case_insensitive_keyword" },
                "created": { "type": "date" },
                "updated": { "type": "date" }
            }
        }
    })
}

fn filter_clauses(query: &TranslatedQuery) -> Vec<Value> {
    query
        .filters
        .iter()
        .map(|filter| {
            let field = match filter.field {
                FilterField::User => "user",
                FilterField::CourseId => "course_id",
                FilterField::UsageId => "usage_id",
            };
            match &filter.value {
                FilterValue::Term(term) => json!({ "term": { field: term } }),
                FilterValue::AnyOf(values) => json!({ "terms": { field: values } }),
            }
        })
        .collect()
}

/// Build the request body for a translated query.
///
/// With a text criterion the bool query scores a `multi_match` over `text`
/// and `tags` under the scope filters, so results come back in relevance
/// order. Without one, everything is a filter and results sort by `updated`
/// descending.
fn search_body(query: &TranslatedQuery, from: Option<i64>, size: Option<i64>) -> Value {
    let filters = filter_clauses(query);

    let query_clause = match &query.text {
        Some(text) => json!({
            "bool": {
                "must": {
                    "multi_match": { "query": text, "fields": ["text", "tags"] }
                },
                "filter": filters
            }
        }),
        None => json!({
            "bool": { "filter": filters }
        }),
    };

    let mut body = json!({
        "query": query_clause,
        "track_total_hits": true
    });

    if query.text.is_none() {
        body["sort"] = json!([{ "updated": { "order": "desc" } }]);
    }
    if let Some(from) = from {
        body["from"] = json!(from);
    }
    if let Some(size) = size {
        body["size"] = json!(size);
    }
    if query.highlight {
        body["highlight"] = json!({
            "pre_tags": [HIGHLIGHT_START],
            "post_tags": [HIGHLIGHT_END],
            "number_of_fragments": 0,
            "fields": {
                "text": {},
                "tags": {}
            }
        });
    }

    body
}

/// Convert a response hit into a note, substituting highlighted fields when
/// the engine returned them. Whole-field highlighting means the fragment is
/// the full field value with markers inserted.
fn hit_to_note(hit: &Value) -> Result<Note> {
    let source = hit
        .get("_source")
        .cloned()
        .ok_or_else(|| Error::Search("search hit without _source".to_string()))?;
    let document: EsNoteDocument = serde_json::from_value(source)?;
    let mut note = document.into_note()?;

    if let Some(highlight) = hit.get("highlight") {
        if let Some(text) = highlight
            .get("text")
            .and_then(|v| v.as_array())
            .and_then(|fragments| fragments.first())
            .and_then(|v| v.as_str())
        {
            note.text = text.to_string();
        }
        if let Some(tags) = highlight.get("tags").and_then(|v| v.as_array()) {
            note.tags = tags
                .iter()
                .filter_map(|v| v.as_str())
                .map(String::from)
                .collect();
        }
    }

    Ok(note)
}

fn es_err(err: elasticsearch::Error) -> Error {
    Error::Search(err.to_string())
}

/// Elasticsearch-backed search strategy. Also serves as the index mirror
/// for the same cluster.
pub struct EsBackend {
    client: Elasticsearch,
    config: EsConfig,
}

impl EsBackend {
    pub fn new(config: EsConfig) -> Result<Self> {
        let client = Self::build_client(&config)?;
        Ok(Self { client, config })
    }

    fn build_client(config: &EsConfig) -> Result<Elasticsearch> {
        let url: elasticsearch::http::Url = config
            .url
            .parse()
            .map_err(|e| Error::Config(format!("invalid Elasticsearch URL: {}", e)))?;
        let pool = SingleNodeConnectionPool::new(url);
        let mut builder = TransportBuilder::new(pool)
            .timeout(Duration::from_millis(config.request_timeout_ms));

        if config.insecure {
            builder = builder.cert_validation(CertificateValidation::None);
        }
        if let Some(auth) = &config.auth {
            let credentials = match auth {
                EsAuth::Basic { username, password } => {
                    Credentials::Basic(username.clone(), password.clone())
                }
                EsAuth::Bearer { token } => Credentials::Bearer(token.clone()),
            };
            builder = builder.auth(credentials);
        }

        let transport = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build Elasticsearch transport: {}", e)))?;
        Ok(Elasticsearch::new(transport))
    }

    /// Create the note index with its analyzers and mappings when it does
    /// not exist yet. Racing creators are tolerated.
    pub async fn ensure_index(&self) -> Result<()> {
        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[&self.config.index]))
            .send()
            .await
            .map_err(es_err)?;
        if exists.status_code().is_success() {
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&self.config.index))
            .body(index_mapping())
            .send()
            .await
            .map_err(es_err)?;
        if !response.status_code().is_success() {
            let body = response.text().await.unwrap_or_default();
            if body.contains("resource_already_exists_exception") {
                return Ok(());
            }
            return Err(Error::Search(format!(
                "failed to create index {}: {}",
                self.config.index, body
            )));
        }

        info!(
            subsystem = "search",
            component = "elasticsearch",
            op = "ensure_index",
            index_name = %self.config.index,
            "Created note index"
        );
        Ok(())
    }

    async fn execute(&self, body: Value) -> Result<Value> {
        let response = self
            .client
            .search(SearchParts::Index(&[&self.config.index]))
            .body(body)
            .send()
            .await
            .map_err(es_err)?;

        if !response.status_code().is_success() {
            let body = response.text().await.unwrap_or_default();
            // A missing index means nothing has been indexed yet, not a
            // failed search.
            if body.contains("index_not_found_exception") {
                warn!(
                    subsystem = "search",
                    component = "elasticsearch",
                    index_name = %self.config.index,
                    "Note index does not exist, returning empty results"
                );
                return Ok(json!({ "hits": { "hits": [], "total": { "value": 0 } } }));
            }
            return Err(Error::Search(format!("search request failed: {}", body)));
        }

        response.json::<Value>().await.map_err(es_err)
    }

    fn parse_result(&self, body: &Value) -> Result<SearchResult> {
        let total = body
            .get("hits")
            .and_then(|h| h.get("total"))
            .and_then(|t| t.get("value"))
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        let hits = body
            .get("hits")
            .and_then(|h| h.get("hits"))
            .and_then(|h| h.as_array())
            .cloned()
            .unwrap_or_default();

        let mut rows = Vec::with_capacity(hits.len());
        for hit in &hits {
            rows.push(hit_to_note(hit)?);
        }

        Ok(SearchResult { total, rows })
    }
}

#[async_trait]
impl SearchBackend for EsBackend {
    fn name(&self) -> &'static str {
        "es"
    }

    async fn search(
        &self,
        query: &TranslatedQuery,
        page: u32,
        page_size: u32,
    ) -> Result<SearchResult> {
        let from = i64::from(page.saturating_sub(1)) * i64::from(page_size);
        let body = search_body(query, Some(from), Some(i64::from(page_size)));
        let response = self.execute(body).await?;
        let result = self.parse_result(&response)?;

        debug!(
            subsystem = "search",
            component = "elasticsearch",
            op = "search",
            index_name = %self.config.index,
            result_count = result.rows.len(),
            total = result.total,
            "Executed note search"
        );
        Ok(result)
    }

    async fn search_all(&self, query: &TranslatedQuery) -> Result<Vec<Note>> {
        let body = search_body(query, None, Some(MAX_RESULT_WINDOW));
        let response = self.execute(body).await?;
        Ok(self.parse_result(&response)?.rows)
    }

    async fn count(&self, query: &TranslatedQuery) -> Result<i64> {
        let body = search_body(query, None, Some(0));
        let response = self.execute(body).await?;
        Ok(response
            .get("hits")
            .and_then(|h| h.get("total"))
            .and_then(|t| t.get("value"))
            .and_then(|v| v.as_i64())
            .unwrap_or(0))
    }

    async fn check(&self) -> Result<()> {
        let response = self.client.ping().send().await.map_err(es_err)?;
        if !response.status_code().is_success() {
            return Err(Error::Search(format!(
                "Elasticsearch ping returned {}",
                response.status_code()
            )));
        }
        Ok(())
    }

    async fn info(&self) -> Result<Value> {
        let response = self.client.info().send().await.map_err(es_err)?;
        if !response.status_code().is_success() {
            return Err(Error::Search(format!(
                "Elasticsearch info returned {}",
                response.status_code()
            )));
        }
        let payload = response.json::<Value>().await.map_err(es_err)?;
        Ok(json!({ "es": payload }))
    }
}

#[async_trait]
impl NoteIndex for EsBackend {
    async fn index_note(&self, note: &Note) -> Result<()> {
        let document = EsNoteDocument::from_note(note)?;
        let id = note.id.to_string();
        let response = self
            .client
            .index(IndexParts::IndexId(&self.config.index, &id))
            .body(serde_json::to_value(&document)?)
            .send()
            .await
            .map_err(es_err)?;

        if !response.status_code().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Search(format!(
                "failed to index note {}: {}",
                id, body
            )));
        }
        Ok(())
    }

    async fn delete_note(&self, id: Uuid) -> Result<()> {
        let id = id.to_string();
        let response = self
            .client
            .delete(DeleteParts::IndexId(&self.config.index, &id))
            .send()
            .await
            .map_err(es_err)?;

        let status = response.status_code();
        // Already-absent documents are fine; the mirror only has to converge.
        if !status.is_success() && status.as_u16() != 404 {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Search(format!(
                "failed to delete note {} from index: {}",
                id, body
            )));
        }
        Ok(())
    }

    async fn delete_for_user(&self, user_id: &str) -> Result<()> {
        let response = self
            .client
            .delete_by_query(DeleteByQueryParts::Index(&[&self.config.index]))
            .body(json!({ "query": { "term": { "user": user_id } } }))
            .send()
            .await
            .map_err(es_err)?;

        if !response.status_code().is_success() {
            let body = response.text().await.unwrap_or_default();
            if body.contains("index_not_found_exception") {
                return Ok(());
            }
            return Err(Error::Search(format!(
                "failed to delete indexed notes for user: {}",
                body
            )));
        }
        Ok(())
    }

    async fn bulk_index(&self, notes: &[Note]) -> Result<()> {
        for note in notes {
            self.index_note(note).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annota_core::FieldFilter;
    use chrono::TimeZone;

    fn note() -> Note {
        Note {
            id: Uuid::parse_str("0191b3a8-1111-7ccc-8ddd-eeeeffff0000").unwrap(),
            user_id: "student-1".to_string(),
            course_id: "course-v1:edX+DemoX+2026".to_string(),
            usage_id: "block-v1:html+1".to_string(),
            text: "a note about photosynthesis".to_string(),
            quote: "the quoted passage".to_string(),
            ranges: vec![NoteRange {
                start: "/div[1]/p[1]".to_string(),
                end: "/div[1]/p[1]".to_string(),
                start_offset: 0,
                end_offset: 10,
            }],
            tags: vec!["biology".to_string()],
            created: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            updated: Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap(),
        }
    }

    fn text_query() -> TranslatedQuery {
        TranslatedQuery {
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
            text: Some("photosynthesis".to_string()),
            highlight: false,
        }
    }

    #[test]
    fn test_document_round_trip() {
        let original = note();
        let document = EsNoteDocument::from_note(&original).unwrap();
        assert_eq!(document.user, "student-1");
        assert!(document.ranges.starts_with('['));

        let back = document.into_note().unwrap();
        assert_eq!(back.id, original.id);
        assert_eq!(back.ranges, original.ranges);
        assert_eq!(back.tags, original.tags);
    }

    #[test]
    fn test_search_body_with_text_is_relevance_ordered() {
        let body = search_body(&text_query(), Some(0), Some(25));
        assert!(body.get("sort").is_none());
        assert_eq!(body["from"], json!(0));
        assert_eq!(body["size"], json!(25));
        assert_eq!(body["track_total_hits"], json!(true));

        let multi_match = &body["query"]["bool"]["must"]["multi_match"];
        assert_eq!(multi_match["query"], json!("photosynthesis"));
        assert_eq!(multi_match["fields"], json!(["text", "tags"]));

        let filters = body["query"]["bool"]["filter"].as_array().unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0]["term"]["user"], json!("student-1"));
    }

    #[test]
    fn test_search_body_without_text_sorts_by_updated() {
        let mut query = text_query();
        query.text = None;
        let body = search_body(&query, None, None);
        assert_eq!(body["sort"], json!([{ "updated": { "order": "desc" } }]));
        assert!(body.get("from").is_none());
        assert!(body.get("size").is_none());
        assert!(body["query"]["bool"].get("must").is_none());
    }

    #[test]
    fn test_search_body_usage_filter_uses_terms() {
        let query = TranslatedQuery {
            filters: vec![FieldFilter {
                field: FilterField::UsageId,
                value: FilterValue::AnyOf(vec!["block-v1:a".to_string(), "block-v1:b".to_string()]),
            }],
            text: Some("note".to_string()),
            highlight: false,
        };
        let body = search_body(&query, None, None);
        let filters = body["query"]["bool"]["filter"].as_array().unwrap();
        assert_eq!(
            filters[0]["terms"]["usage_id"],
            json!(["block-v1:a", "block-v1:b"])
        );
    }

    #[test]
    fn test_search_body_highlight_block() {
        let mut query = text_query();
        query.highlight = true;
        let body = search_body(&query, None, None);

        let highlight = &body["highlight"];
        assert_eq!(highlight["pre_tags"], json!([HIGHLIGHT_START]));
        assert_eq!(highlight["post_tags"], json!([HIGHLIGHT_END]));
        assert_eq!(highlight["number_of_fragments"], json!(0));
        assert!(highlight["fields"].get("text").is_some());
        assert!(highlight["fields"].get("tags").is_some());
    }

    #[test]
    fn test_hit_to_note_substitutes_highlighted_fields() {
        let document = EsNoteDocument::from_note(&note()).unwrap();
        let hit = json!({
            "_source": serde_json::to_value(&document).unwrap(),
            "highlight": {
                "text": [format!(
                    "a note about {}photosynthesis{}",
                    HIGHLIGHT_START, HIGHLIGHT_END
                )],
                "tags": [format!("{}biology{}", HIGHLIGHT_START, HIGHLIGHT_END)]
            }
        });

        let parsed = hit_to_note(&hit).unwrap();
        assert!(parsed.text.contains(HIGHLIGHT_START));
        assert!(parsed.text.contains("photosynthesis"));
        assert_eq!(parsed.tags.len(), 1);
        assert!(parsed.tags[0].starts_with(HIGHLIGHT_START));
    }

    #[test]
    fn test_hit_to_note_without_highlight_keeps_source() {
        let document = EsNoteDocument::from_note(&note()).unwrap();
        let hit = json!({ "_source": serde_json::to_value(&document).unwrap() });

        let parsed = hit_to_note(&hit).unwrap();
        assert_eq!(parsed.text, "a note about photosynthesis");
        assert_eq!(parsed.tags, vec!["biology".to_string()]);
    }

    #[test]
    fn test_hit_without_source_is_an_error() {
        let hit = json!({ "_id": "whatever" });
        assert!(hit_to_note(&hit).is_err());
    }

    #[test]
    fn test_index_mapping_analyzers() {
        let mapping = index_mapping();
        let analyzers = &mapping["settings"]["analysis"]["analyzer"];
        assert_eq!(analyzers["html_strip"]["char_filter"], json!(["html_strip"]));
        assert_eq!(
            analyzers["case_insensitive_keyword"]["tokenizer"],
            json!("keyword")
        );
        assert_eq!(
            mapping["mappings"]["properties"]["tags"]["analyzer"],
            json!("case_insensitive_keyword")
        );
        assert_eq!(mapping["mappings"]["properties"]["user"]["type"], json!("keyword"));
    }

    #[test]
    fn test_config_defaults() {
        let config = EsConfig::default();
        assert_eq!(config.url, "http://localhost:9200");
        assert_eq!(config.index, ELASTICSEARCH_INDEX);
        assert!(config.auth.is_none());
        assert!(!config.insecure);
    }
}
