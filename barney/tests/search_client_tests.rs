mod common;

use pretty_assertions::assert_eq;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use barney::embeddings::EmbeddingApiClient;
use barney::error::{BarneyError, Upstream};
use barney::search::{AzureSearchClient, PassageSearch};

use common::{embedding_body, embeddings_config, search_body, search_config, DIMENSIONS};

fn search_path() -> String {
    format!("/indexes/{}/docs/search", common::INDEX)
}

fn client(server: &MockServer) -> AzureSearchClient {
    let embeddings = EmbeddingApiClient::new(&embeddings_config(&server.uri())).expect("embeddings");
    AzureSearchClient::new(&search_config(&server.uri()), embeddings).expect("search client")
}

async fn mount_embeddings(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("authorization", format!("Bearer {}", common::OPENAI_KEY).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_body(1, DIMENSIONS)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn search_embeds_query_and_returns_ranked_passages() {
    let server = MockServer::start().await;
    mount_embeddings(&server).await;

    Mock::given(method("POST"))
        .and(path(search_path()))
        .and(query_param("api-version", "2023-11-01"))
        .and(header("api-key", common::SEARCH_KEY))
        .and(body_partial_json(serde_json::json!({
            "select": "content,metadata",
            "top": 3,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&[
            ("Bold Napa Cabernet, 94pts", 0.91),
            ("Sonoma Zinfandel, 90pts", 0.82),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let passages = client(&server)
        .search("best Cabernet from Napa", 3)
        .await
        .expect("search");

    assert_eq!(passages.len(), 2);
    assert_eq!(passages[0].content, "Bold Napa Cabernet, 94pts");
    assert_eq!(passages[0].metadata.as_deref(), Some("winemag-reviews.csv"));
    assert!(passages[0].score >= passages[1].score);

    let requests = server.received_requests().await.expect("recorded requests");
    let search_request = requests
        .iter()
        .find(|r| r.url.path() == search_path())
        .expect("search request");
    let body: serde_json::Value = search_request.body_json().expect("json body");
    let vector_query = &body["vectorQueries"][0];
    assert_eq!(vector_query["kind"], "vector");
    assert_eq!(vector_query["fields"], "content_vector");
    assert_eq!(vector_query["k"], 3);
    assert_eq!(vector_query["vector"].as_array().map(Vec::len), Some(DIMENSIONS));
}

#[tokio::test]
async fn empty_index_result_is_not_an_error() {
    let server = MockServer::start().await;
    mount_embeddings(&server).await;

    Mock::given(method("POST"))
        .and(path(search_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&[])))
        .mount(&server)
        .await;

    let passages = client(&server).search("wine from Mars", 5).await.expect("search");

    assert!(passages.is_empty());
}

#[tokio::test]
async fn server_error_is_retried_once() {
    let server = MockServer::start().await;
    mount_embeddings(&server).await;

    Mock::given(method("POST"))
        .and(path(search_path()))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(search_path()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(search_body(&[("Barolo, 96pts", 0.88)])),
        )
        .mount(&server)
        .await;

    let passages = client(&server).search("a Nebbiolo", 5).await.expect("search");

    assert_eq!(passages[0].content, "Barolo, 96pts");
}

#[tokio::test]
async fn persistent_server_errors_surface_as_unavailable() {
    let server = MockServer::start().await;
    mount_embeddings(&server).await;

    Mock::given(method("POST"))
        .and(path(search_path()))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let result = client(&server).search("a Nebbiolo", 5).await;

    assert!(matches!(
        result,
        Err(BarneyError::ServiceUnavailable {
            service: Upstream::Search,
            ..
        })
    ));
}

#[tokio::test]
async fn rejected_key_is_unavailable_without_retry() {
    let server = MockServer::start().await;
    mount_embeddings(&server).await;

    Mock::given(method("POST"))
        .and(path(search_path()))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server).search("a Nebbiolo", 5).await;

    assert!(matches!(
        result,
        Err(BarneyError::ServiceUnavailable {
            service: Upstream::Search,
            ..
        })
    ));
}

#[tokio::test]
async fn hits_without_content_are_a_contract_violation() {
    let server = MockServer::start().await;
    mount_embeddings(&server).await;

    Mock::given(method("POST"))
        .and(path(search_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{ "@search.score": 0.7, "description": "no content here" }]
        })))
        .mount(&server)
        .await;

    let result = client(&server).search("a Nebbiolo", 5).await;

    assert!(matches!(
        result,
        Err(BarneyError::UpstreamContractViolation {
            service: Upstream::Search,
            ..
        })
    ));
}

#[tokio::test]
async fn wrong_embedding_dimensions_fail_before_searching() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_body(1, DIMENSIONS + 1)))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(search_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&[])))
        .expect(0)
        .mount(&server)
        .await;

    let result = client(&server).search("a Nebbiolo", 5).await;

    assert!(matches!(
        result,
        Err(BarneyError::UpstreamContractViolation {
            service: Upstream::Embeddings,
            ..
        })
    ));
}

#[tokio::test]
async fn embedding_auth_failure_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server).search("a Nebbiolo", 5).await;

    assert!(matches!(
        result,
        Err(BarneyError::ServiceUnavailable {
            service: Upstream::Embeddings,
            ..
        })
    ));
}
