//! Integration tests for the Ollama generator
//!
//! A wiremock server stands in for Ollama, so no model server is needed.

use serde_json::json;
use std::sync::Arc;
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

use sdk::errors::SquadError;
use tripsquad_engine::conductor::{Conductor, WorkflowState};
use tripsquad_engine::config::OrchestratorConfig;
use tripsquad_engine::llm::{
    ollama::OllamaGenerator, Generation, GenerationOptions, LLMError, TextGenerator,
};
use tripsquad_engine::workers::TripRequest;

fn reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": "llama3.1:8b",
        "message": { "role": "assistant", "content": content },
        "done": true
    }))
}

#[tokio::test]
async fn test_plain_text_generation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({ "model": "llama3.1:8b", "stream": false })))
        .respond_with(reply("Seven days of temples, markets and ramen."))
        .expect(1)
        .mount(&server)
        .await;

    let generator = OllamaGenerator::new(server.uri(), "llama3.1:8b").unwrap();
    let output = generator
        .generate("You write travel overviews", "Tokyo, 7 days", &GenerationOptions::default())
        .await
        .unwrap();

    assert_eq!(
        output,
        Generation::Text("Seven days of temples, markets and ramen.".to_string())
    );
}

#[tokio::test]
async fn test_structured_generation_parses_fenced_json() {
    let server = MockServer::start().await;
    let schema = json!({ "type": "object" });
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({ "format": { "type": "object" } })))
        .respond_with(reply("Here you go:\n```json\n{\"days\": 7}\n```"))
        .mount(&server)
        .await;

    let generator = OllamaGenerator::new(server.uri(), "llama3.1:8b").unwrap();
    let output = generator
        .generate("s", "u", &GenerationOptions::structured(schema))
        .await
        .unwrap();

    assert_eq!(output, Generation::Structured(json!({ "days": 7 })));
}

#[tokio::test]
async fn test_structured_generation_rejects_prose() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(reply("I cannot answer that in JSON."))
        .mount(&server)
        .await;

    let generator = OllamaGenerator::new(server.uri(), "llama3.1:8b").unwrap();
    let err = generator
        .generate("s", "u", &GenerationOptions::structured(json!({})))
        .await
        .unwrap_err();

    assert!(matches!(err, LLMError::ParseError(_)));
}

#[tokio::test]
async fn test_http_errors_are_classified() {
    let cases = [
        (429, "quota"),
        (404, "invalid"),
        (401, "auth"),
        (500, "unavailable"),
    ];

    for (status, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&server)
            .await;

        let generator = OllamaGenerator::new(server.uri(), "llama3.1:8b").unwrap();
        let err = generator
            .generate("s", "u", &GenerationOptions::default())
            .await
            .unwrap_err();

        let matched = match expected {
            "quota" => matches!(err, LLMError::QuotaExceeded),
            "invalid" => matches!(err, LLMError::InvalidRequest(_)),
            "auth" => matches!(err, LLMError::AuthenticationFailed(_)),
            _ => matches!(err, LLMError::ProviderUnavailable(_)),
        };
        assert!(matched, "status {} gave {:?}", status, err);
    }
}

#[tokio::test]
async fn test_connection_error() {
    let generator = OllamaGenerator::new("http://127.0.0.1:1", "llama3.1:8b").unwrap();
    let err = generator
        .generate("s", "u", &GenerationOptions::default())
        .await
        .unwrap_err();

    match err {
        LLMError::ProviderUnavailable(msg) => assert!(msg.contains("Cannot connect to Ollama")),
        LLMError::NetworkError(_) => {}
        other => panic!("Expected ProviderUnavailable or NetworkError, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_plan_carries_generated_overview() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(reply("A week split between old Tokyo and the neon districts."))
        .mount(&server)
        .await;

    let generator = OllamaGenerator::new(server.uri(), "llama3.1:8b").unwrap();
    let conductor = Conductor::builder(OrchestratorConfig::default())
        .generator(Arc::new(generator))
        .build();

    let plan = conductor
        .plan_trip(TripRequest::new("Tokyo").duration(7))
        .await
        .unwrap();

    assert_eq!(
        plan.itinerary.overview.as_deref(),
        Some("A week split between old Tokyo and the neon districts.")
    );
    // Draft and refinement each ask for an overview.
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_generator_failure_fails_planning() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
        .mount(&server)
        .await;

    let generator = OllamaGenerator::new(server.uri(), "llama3.1:8b").unwrap();
    let conductor = Conductor::builder(OrchestratorConfig::default())
        .generator(Arc::new(generator))
        .build();

    let err = conductor
        .plan_trip(TripRequest::new("Tokyo"))
        .await
        .unwrap_err();
    assert!(matches!(err, SquadError::Generation(_)), "got {:?}", err);

    let project_id = conductor.bus().history().await[0]
        .body
        .project_id()
        .to_string();
    let project = conductor.project(&project_id).await.unwrap();
    assert_eq!(project.state, WorkflowState::Error);
    assert_eq!(
        project.failure.map(|f| f.phase),
        Some(WorkflowState::Planning.to_string())
    );
}
