//! Engine wired to the HTTP provider against a mocked embedding service.

use std::path::Path;

use peoplepad_records::{RecordDraft, SearchFilter};
use peoplepad_retrieval::{Peoplepad, PeoplepadConfig, RetrievalError};
use pretty_assertions::assert_eq;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, dimension: usize) -> PeoplepadConfig {
    let raw = format!(
        r#"
        [embedding]
        service_url = "{}"
        api_key = "test-key"
        dimension = {dimension}
        max_retries = 2
        retry_base_delay_ms = 1
        retry_max_delay_ms = 5

        [jobs]
        workers = 1
        "#,
        server.uri()
    );
    PeoplepadConfig::from_toml_str(&raw).unwrap()
}

async fn mount_metadata(server: &MockServer, dimension: usize) {
    Mock::given(method("GET"))
        .and(path("/metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "all-mpnet-base-v2",
            "dimension": dimension,
            "version": "3.0.1"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_provider_dimension_mismatch_is_fatal() {
    let server = MockServer::start().await;
    mount_metadata(&server, 768).await;

    let result = Peoplepad::builder()
        .with_config(config_for(&server, 384))
        .with_verify_provider(true)
        .build()
        .await;

    match result {
        Err(RetrievalError::Config(message)) => assert!(message.contains("768")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("engine built with mismatched provider"),
    }
}

#[tokio::test]
async fn test_write_then_search_over_http() {
    let server = MockServer::start().await;
    mount_metadata(&server, 3).await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "list",
            "model": "all-mpnet-base-v2",
            "data": [{"object": "embedding", "embedding": [0.6, 0.8, 0.0], "index": 0}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let engine = Peoplepad::builder()
        .with_config(config_for(&server, 3))
        .with_verify_provider(true)
        .build()
        .await
        .unwrap();
    let user = Uuid::new_v4();

    let record = engine
        .records()
        .create(
            user,
            RecordDraft::new("John Doe").with_notes("Met at conference, works in AI"),
        )
        .await
        .unwrap();
    engine.jobs().wait_idle().await;

    let hits = engine
        .search(user, "AI conference", SearchFilter::for_owner(user))
        .await
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.id, record.id);
    assert!(hits[0].distance < 1e-6);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_load_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("peoplepad.toml");
    std::fs::write(
        &file,
        "[embedding]\nservice_url = \"http://localhost:8080\"\ndimension = 384\n\n[search]\nmetric = \"l2\"\n",
    )
    .unwrap();

    let config = PeoplepadConfig::load(&file).unwrap();
    assert_eq!(config.embedding.dimension, 384);
    assert_eq!(config.search.metric.as_str(), "l2");

    let missing = PeoplepadConfig::load(Path::new("/nonexistent/peoplepad.toml")).unwrap_err();
    assert!(matches!(missing, RetrievalError::Io(_)));
}
