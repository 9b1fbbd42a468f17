//! Engine selection.
//!
//! The active engine is fixed by configuration at startup; which strategy
//! serves a given request is decided per query. Requests without a full-text
//! criterion and usage-scoped requests always go to the relational strategy.
//! There is no fallback after selection: a failing engine surfaces its error.

use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use annota_core::{
    NoteIndex, NoteRepository, NullIndex, Result, SearchBackend, SearchEngine, SearchParams,
};

use crate::es::{EsBackend, EsConfig};
use crate::meilisearch::{MeilisearchBackend, MeilisearchClient};

/// Search engine configuration, read from the environment at startup.
///
/// An unknown `SEARCH_ENGINE` value is a configuration error and fails
/// startup rather than silently degrading to the relational strategy.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub engine: SearchEngine,
    pub enabled: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            engine: SearchEngine::default(),
            enabled: true,
        }
    }
}

impl SearchConfig {
    pub fn from_env() -> Result<Self> {
        let engine = match std::env::var("SEARCH_ENGINE") {
            Ok(value) => SearchEngine::from_str(&value)?,
            Err(_) => SearchEngine::default(),
        };
        let enabled = std::env::var("SEARCH_ENABLED")
            .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "false" | "0" | "no"))
            .unwrap_or(true);
        Ok(Self { engine, enabled })
    }

    /// The engine that should serve a request with these parameters.
    ///
    /// Usage-scoped requests are relational regardless of any text
    /// criterion. So are requests without a text criterion, and everything
    /// when search is disabled.
    pub fn engine_for(&self, params: &SearchParams) -> SearchEngine {
        if !params.usage_ids.is_empty() {
            return SearchEngine::Db;
        }
        if !self.enabled || !params.is_text_search() {
            return SearchEngine::Db;
        }
        self.engine
    }
}

/// The configured strategy pair: the relational strategy plus the active
/// engine's strategy.
pub struct BackendSelector {
    config: SearchConfig,
    db: Arc<dyn SearchBackend>,
    engine: Arc<dyn SearchBackend>,
}

impl BackendSelector {
    pub fn new(
        config: SearchConfig,
        db: Arc<dyn SearchBackend>,
        engine: Arc<dyn SearchBackend>,
    ) -> Self {
        Self { config, db, engine }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Pick the strategy serving a query.
    pub fn choose(&self, params: &SearchParams) -> Arc<dyn SearchBackend> {
        match self.config.engine_for(params) {
            SearchEngine::Db => self.db.clone(),
            _ => self.engine.clone(),
        }
    }

    /// The engine strategy to probe in operational checks, when an engine
    /// beyond the relational store is active.
    pub fn probe(&self) -> Option<Arc<dyn SearchBackend>> {
        if !self.config.enabled || self.config.engine == SearchEngine::Db {
            return None;
        }
        Some(self.engine.clone())
    }
}

/// Wire the configured strategies and the matching index mirror.
///
/// The relational strategy is always available; the engine strategy and the
/// mirror depend on configuration. A disabled or relational-only setup gets
/// a no-op mirror. Index bootstrap failures are not fatal: the engine may
/// simply not be up yet.
pub async fn build_search(
    config: SearchConfig,
    db: Arc<dyn SearchBackend>,
    repository: Arc<dyn NoteRepository>,
) -> Result<(BackendSelector, Arc<dyn NoteIndex>)> {
    let (engine, index): (Arc<dyn SearchBackend>, Arc<dyn NoteIndex>) =
        if !config.enabled {
            (db.clone(), Arc::new(NullIndex))
        } else {
            match config.engine {
                SearchEngine::Db => (db.clone(), Arc::new(NullIndex)),
                SearchEngine::Elasticsearch => {
                    let backend = Arc::new(EsBackend::new(EsConfig::from_env())?);
                    if let Err(e) = backend.ensure_index().await {
                        warn!("Could not ensure Elasticsearch index at startup: {}", e);
                    }
                    (backend.clone(), backend)
                }
                SearchEngine::Meilisearch => {
                    let backend = Arc::new(MeilisearchBackend::new(
                        MeilisearchClient::from_env(),
                        repository,
                    ));
                    if let Err(e) = backend.ensure_index().await {
                        warn!("Could not ensure Meilisearch index at startup: {}", e);
                    }
                    (backend.clone(), backend)
                }
            }
        };

    info!(
        subsystem = "search",
        engine = %config.engine,
        enabled = config.enabled,
        "Search configured"
    );
    Ok((BackendSelector::new(config, db, engine), index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use annota_core::{Note, SearchResult, TranslatedQuery};
    use async_trait::async_trait;

    struct StubBackend(&'static str);

    #[async_trait]
    impl SearchBackend for StubBackend {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn search(
            &self,
            _query: &TranslatedQuery,
            _page: u32,
            _page_size: u32,
        ) -> Result<SearchResult> {
            Ok(SearchResult::empty())
        }

        async fn search_all(&self, _query: &TranslatedQuery) -> Result<Vec<Note>> {
            Ok(Vec::new())
        }

        async fn count(&self, _query: &TranslatedQuery) -> Result<i64> {
            Ok(0)
        }

        async fn check(&self) -> Result<()> {
            Ok(())
        }

        async fn info(&self) -> Result<Value> {
            Ok(serde_json::json!({}))
        }
    }

    fn selector(engine: SearchEngine, enabled: bool) -> BackendSelector {
        BackendSelector::new(
            SearchConfig { engine, enabled },
            Arc::new(StubBackend("db")),
            Arc::new(StubBackend("engine")),
        )
    }

    fn text_params() -> SearchParams {
        SearchParams {
            user: Some("student-1".to_string()),
            course_id: None,
            usage_ids: Vec::new(),
            text: Some("grass".to_string()),
            highlight: false,
        }
    }

    #[test]
    fn test_text_query_goes_to_engine() {
        let s = selector(SearchEngine::Elasticsearch, true);
        assert_eq!(s.choose(&text_params()).name(), "engine");
    }

    #[test]
    fn test_query_without_text_goes_to_db() {
        let mut params = text_params();
        params.text = None;
        let s = selector(SearchEngine::Elasticsearch, true);
        assert_eq!(s.choose(&params).name(), "db");
    }

    #[test]
    fn test_empty_text_still_counts_as_text_criterion() {
        let mut params = text_params();
        params.text = Some(String::new());
        let s = selector(SearchEngine::Elasticsearch, true);
        assert_eq!(s.choose(&params).name(), "engine");
    }

    #[test]
    fn test_disabled_search_goes_to_db() {
        let s = selector(SearchEngine::Elasticsearch, false);
        assert_eq!(s.choose(&text_params()).name(), "db");
    }

    #[test]
    fn test_usage_scope_forces_db_even_with_text() {
        let mut params = text_params();
        params.usage_ids = vec!["block-v1:a".to_string()];
        let s = selector(SearchEngine::Meilisearch, true);
        assert_eq!(s.choose(&params).name(), "db");
    }

    #[test]
    fn test_db_engine_serves_text_queries_relationally() {
        let s = selector(SearchEngine::Db, true);
        assert_eq!(s.choose(&text_params()).name(), "db");
    }

    #[test]
    fn test_probe_only_for_active_external_engine() {
        assert!(selector(SearchEngine::Elasticsearch, true).probe().is_some());
        assert!(selector(SearchEngine::Elasticsearch, false).probe().is_none());
        assert!(selector(SearchEngine::Db, true).probe().is_none());
    }
}
