/// Verifies which strategy serves which search request.
///
/// The routing rules:
/// - any `usage_id` parameter forces the relational path
/// - search disabled forces the relational path
/// - a request without a text criterion uses the relational path
/// - otherwise the configured engine serves the request
///
/// Routing is decided per request, so one deployment serves mixed traffic
/// without reconfiguration.
use annota_search::{translate, FilterField, FilterValue, SearchConfig, SearchEngine, SearchParams};

fn config(engine: SearchEngine, enabled: bool) -> SearchConfig {
    SearchConfig { engine, enabled }
}

fn text_params(text: &str) -> SearchParams {
    SearchParams {
        user: Some("student-1".to_string()),
        course_id: Some("course-v1:edX+DemoX+2026".to_string()),
        text: Some(text.to_string()),
        ..Default::default()
    }
}

#[test]
fn test_text_search_uses_the_configured_engine() {
    let params = text_params("photosynthesis");
    assert_eq!(
        config(SearchEngine::Elasticsearch, true).engine_for(&params),
        SearchEngine::Elasticsearch
    );
    assert_eq!(
        config(SearchEngine::Meilisearch, true).engine_for(&params),
        SearchEngine::Meilisearch
    );
}

#[test]
fn test_usage_id_forces_the_relational_path() {
    let mut params = text_params("photosynthesis");
    params.usage_ids = vec!["block-v1:edX+DemoX+2026+type@html+block@1".to_string()];
    assert_eq!(
        config(SearchEngine::Elasticsearch, true).engine_for(&params),
        SearchEngine::Db,
        "usage_id scoping must bypass the engine even for text queries"
    );
}

#[test]
fn test_disabled_search_falls_back_to_the_relational_path() {
    let params = text_params("photosynthesis");
    assert_eq!(
        config(SearchEngine::Elasticsearch, false).engine_for(&params),
        SearchEngine::Db
    );
}

#[test]
fn test_metadata_only_requests_stay_relational() {
    let params = SearchParams {
        user: Some("student-1".to_string()),
        course_id: Some("course-v1:edX+DemoX+2026".to_string()),
        ..Default::default()
    };
    assert_eq!(
        config(SearchEngine::Elasticsearch, true).engine_for(&params),
        SearchEngine::Db,
        "A request without a text criterion needs no relevance ranking"
    );
}

#[test]
fn test_empty_text_value_still_counts_as_a_text_criterion() {
    // `?text=` carries the key with an empty value; the key alone selects
    // the engine path.
    let params = text_params("");
    assert_eq!(
        config(SearchEngine::Elasticsearch, true).engine_for(&params),
        SearchEngine::Elasticsearch
    );
}

#[test]
fn test_routing_decision_matches_translated_filters() {
    let mut params = text_params("mitochondria");
    params.usage_ids = vec![
        "block-v1:edX+DemoX+2026+type@html+block@1".to_string(),
        "block-v1:edX+DemoX+2026+type@html+block@2".to_string(),
    ];

    let query = translate(&params);
    assert!(query.has_usage_filter());
    assert_eq!(
        query.filter(FilterField::UsageId),
        Some(&FilterValue::AnyOf(params.usage_ids.clone()))
    );
    assert_eq!(
        config(SearchEngine::Elasticsearch, true).engine_for(&params),
        SearchEngine::Db,
        "Every query carrying a usage filter is served relationally"
    );
}
