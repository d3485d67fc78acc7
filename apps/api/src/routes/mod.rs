pub mod health;
pub mod models;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers as analysis;
use crate::assistant::handlers as assistant;
use crate::lookup::handlers as lookup;
use crate::review::handlers as review;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/health", get(health::health_handler))
        // Backend models
        .route("/api/v1/models", get(models::handle_list_models))
        .route("/api/v1/models/test", post(models::handle_test_model))
        // Document analysis
        .route("/api/v1/analyze", post(analysis::handle_analyze))
        .route("/api/v1/analyze/upload", post(analysis::handle_analyze_upload))
        .route("/api/v1/analyze/stream", post(analysis::handle_analyze_stream))
        // Resume review
        .route("/api/v1/resume/review", post(review::handle_review))
        // Employee lookup
        .route(
            "/api/v1/employees/search",
            post(lookup::handle_employee_search),
        )
        .route("/api/v1/employees/list", post(lookup::handle_employee_list))
        // Store assistant
        .route(
            "/api/v1/assistant/chat",
            post(assistant::handle_assistant_chat),
        )
        .layer(body_limit)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::inference::mock::ScriptedClient;
    use crate::inference::InferenceError;
    use crate::prompts::PromptRegistry;

    fn app(client: ScriptedClient) -> (Router, Arc<ScriptedClient>) {
        let client = Arc::new(client);
        let mut config = Config::from_vars(|_| None).unwrap();
        config.section_pause = Duration::ZERO;
        config.organization_name = "Northwind Ltd".to_string();
        let state = AppState::new(client.clone(), PromptRegistry::builtin(), config);
        (build_router(state), client)
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn post_json(router: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, text) = send(router, request).await;
        (status, serde_json::from_str(&text).unwrap())
    }

    async fn post_sse(router: Router, uri: &str, body: Value) -> (StatusCode, String) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(router, request).await
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, text) = send(router, request).await;
        (status, serde_json::from_str(&text).unwrap())
    }

    fn words(n: usize) -> String {
        (1..=n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = app(ScriptedClient::new());
        let (status, body) = get_json(router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_short_document_is_analyzed_in_one_call() {
        let (router, client) = app(ScriptedClient::new().reply("Normal blood panel."));
        let (status, body) = post_json(
            router,
            "/api/v1/analyze",
            json!({ "text": "Hemoglobin 14.2 g/dL. WBC 6.1." }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "single_shot");
        assert_eq!(body["model"], "mistral:latest");
        assert_eq!(body["use_case"], "medical_report");
        assert_eq!(body["text"], "Normal blood panel.");
        assert_eq!(body["status"]["state"], "complete");
        assert_eq!(client.calls(), 1);
        assert!(client.prompts()[0].contains("Hemoglobin 14.2 g/dL."));
    }

    #[tokio::test]
    async fn test_long_document_reports_partial_failure() {
        let (router, client) = app(
            ScriptedClient::new()
                .reply("first half")
                .fail(InferenceError::Backend {
                    status: 500,
                    message: "out of memory".into(),
                })
                .reply("Consolidated findings."),
        );
        let (status, body) = post_json(
            router,
            "/api/v1/analyze",
            json!({ "text": words(1000), "model": "llama3" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "chunked");
        assert_eq!(body["model"], "llama3");
        assert_eq!(body["status"]["state"], "partial_failure");
        assert_eq!(body["status"]["failed_sections"], json!([2]));
        assert_eq!(body["sections"][1]["outcome"], "failed");
        assert_eq!(body["text"], "Consolidated findings.");
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_request_can_override_chunk_settings() {
        let (router, client) = app(ScriptedClient::new());
        let (status, body) = post_json(
            router,
            "/api/v1/analyze",
            json!({ "text": words(30), "max_words": 10, "threshold": 20 }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sections"].as_array().unwrap().len(), 3);
        assert_eq!(client.calls(), 4);
    }

    #[tokio::test]
    async fn test_input_errors_are_rejected_without_backend_calls() {
        let (router, client) = app(ScriptedClient::new());
        let (status, body) =
            post_json(router.clone(), "/api/v1/analyze", json!({ "text": "  \n " })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, body) = post_json(
            router.clone(),
            "/api/v1/analyze",
            json!({ "text": "report", "use_case": "tax_return" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "UNKNOWN_USE_CASE");

        let (status, _) = post_json(
            router,
            "/api/v1/analyze",
            json!({ "text": "report", "options": { "temperature": 9.0 } }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_other_feature_templates_are_not_use_cases() {
        let (router, client) = app(ScriptedClient::new());
        for use_case in ["employee_lookup", "model_probe", "medical_report.consolidation"] {
            let (status, body) = post_json(
                router.clone(),
                "/api/v1/analyze",
                json!({ "text": "Patient has hypertension", "use_case": use_case }),
            )
            .await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{use_case}");
            assert_eq!(body["error"]["code"], "UNKNOWN_USE_CASE");
        }
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_backend_availability_errors_are_503() {
        let (router, _) = app(ScriptedClient::new().unreachable());
        let (status, body) =
            post_json(router, "/api/v1/analyze", json!({ "text": "report" })).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "BACKEND_UNREACHABLE");

        let (router, _) = app(ScriptedClient::new().models(&[]));
        let (status, body) =
            post_json(router, "/api/v1/analyze", json!({ "text": "report" })).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "NO_MODEL_AVAILABLE");
    }

    #[tokio::test]
    async fn test_total_failure_is_502() {
        let (router, _) = app(
            ScriptedClient::new()
                .fail(InferenceError::Timeout(300))
                .fail(InferenceError::Timeout(300)),
        );
        let (status, body) =
            post_json(router, "/api/v1/analyze", json!({ "text": words(1000) })).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "TOTAL_FAILURE");
    }

    #[tokio::test]
    async fn test_stream_endpoint_emits_sse_events() {
        let (router, _) = app(ScriptedClient::new().stream(&["Normal ", "panel."]));
        let (status, body) = post_sse(
            router,
            "/api/v1/analyze/stream",
            json!({ "text": "Hemoglobin 14.2 g/dL." }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("event: started"));
        assert!(body.contains("event: snapshot"));
        assert!(body.contains("Normal panel."));
        assert!(body.contains("event: done"));
        assert!(!body.contains("event: error"));
    }

    #[tokio::test]
    async fn test_upload_rejects_non_pdf() {
        let (router, client) = app(ScriptedClient::new());
        let body = "--XBOUNDARY\r\n\
                    Content-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\
                    Content-Type: text/plain\r\n\r\n\
                    just text\r\n\
                    --XBOUNDARY--\r\n";
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/analyze/upload")
            .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from(body))
            .unwrap();
        let (status, text) = send(router, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(text.contains("not a PDF"));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_upload_requires_file_field() {
        let (router, _) = app(ScriptedClient::new());
        let body = "--XBOUNDARY\r\n\
                    Content-Disposition: form-data; name=\"model\"\r\n\r\n\
                    mistral\r\n\
                    --XBOUNDARY--\r\n";
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/analyze/upload")
            .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from(body))
            .unwrap();
        let (status, text) = send(router, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(text.contains("missing 'file' field"));
    }

    #[tokio::test]
    async fn test_resume_review_returns_parsed_review() {
        let (router, _) = app(ScriptedClient::new().reply(
            r#"{"overall_rating": 9, "strengths": ["Clear impact"], "summary": "Strong"}"#,
        ));
        let (status, body) = post_json(
            router,
            "/api/v1/resume/review",
            json!({ "text": "Jane Doe, Staff Engineer" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["parsed"], true);
        assert_eq!(body["review"]["overall_rating"], 9.0);
        assert!(body["report_text"]
            .as_str()
            .unwrap()
            .contains("Overall Rating: 9/10"));
    }

    #[tokio::test]
    async fn test_resume_review_falls_back_on_prose() {
        let (router, _) = app(ScriptedClient::new().reply("A solid resume overall."));
        let (status, body) = post_json(
            router,
            "/api/v1/resume/review",
            json!({ "text": "Jane Doe, Staff Engineer" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["parsed"], false);
        assert_eq!(body["review"]["summary"], "A solid resume overall....");
    }

    #[tokio::test]
    async fn test_employee_search_uses_bounded_context() {
        let (router, client) = app(ScriptedClient::new().reply("Name: Asha Rao\nDepartment: Finance"));
        let report = format!("Name: Asha Rao Department: Finance {}", words(2000));
        let (status, body) = post_json(
            router,
            "/api/v1/employees/search",
            json!({ "text": report, "employee_name": "Asha Rao" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], "Name: Asha Rao\nDepartment: Finance");
        assert_eq!(body["context_truncated"], true);

        let prompt = &client.prompts()[0];
        assert!(prompt.contains("Northwind Ltd"));
        assert!(!prompt.contains("w2000"));
    }

    #[tokio::test]
    async fn test_employee_search_needs_a_name() {
        let (router, _) = app(ScriptedClient::new());
        let (status, _) = post_json(
            router,
            "/api/v1/employees/search",
            json!({ "text": "report", "employee_name": " " }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_employee_list() {
        let (router, client) = app(ScriptedClient::new().reply("EMPLOYEES FOUND:\n1. Asha Rao"));
        let (status, body) = post_json(
            router,
            "/api/v1/employees/list",
            json!({ "text": "Asha Rao, Finance", "organization": "Contoso" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], "EMPLOYEES FOUND:\n1. Asha Rao");
        assert!(client.prompts()[0].contains("Contoso"));
    }

    #[tokio::test]
    async fn test_assistant_chat_streams_reply() {
        let (router, client) = app(ScriptedClient::new().stream(&["We offer ", "tailoring."]));
        let (status, body) = post_sse(
            router,
            "/api/v1/assistant/chat",
            json!({
                "messages": [{ "role": "user", "content": "Do you tailor suits?" }],
                "context": "Bespoke suits since 1998"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("event: snapshot"));
        assert!(body.contains("event: done"));
        assert!(body.contains("We offer tailoring."));

        let transcript = &client.prompts()[0];
        assert!(transcript.contains("Bespoke suits since 1998"));
        assert!(transcript.ends_with("Do you tailor suits?"));
    }

    #[tokio::test]
    async fn test_assistant_chat_rejects_empty_history() {
        let (router, _) = app(ScriptedClient::new());
        let (status, body) =
            post_json(router, "/api/v1/assistant/chat", json!({ "messages": [] })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_models_listing() {
        let (router, _) = app(ScriptedClient::new().models(&["phi3:mini", "llama3:8b"]));
        let (status, body) = get_json(router, "/api/v1/models").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connected"], true);
        assert_eq!(body["models"], json!(["phi3:mini", "llama3:8b"]));
        assert_eq!(body["preferred"], json!(["llama3:8b"]));

        let (router, _) = app(ScriptedClient::new().unreachable());
        let (status, body) = get_json(router, "/api/v1/models").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connected"], false);
        assert_eq!(body["models"], json!([]));
    }

    #[tokio::test]
    async fn test_model_probe_reports_failure_in_body() {
        let (router, _) = app(ScriptedClient::new().fail(InferenceError::Backend {
            status: 404,
            message: "model 'ghost' not found".into(),
        }));
        let (status, body) =
            post_json(router, "/api/v1/models/test", json!({ "model": "ghost" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["working"], false);
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_model_probe_success() {
        let (router, client) = app(ScriptedClient::new().reply("Model is working"));
        let (status, body) =
            post_json(router, "/api/v1/models/test", json!({ "model": "mistral" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["working"], true);
        assert_eq!(body["reply"], "Model is working");
        assert_eq!(client.prompts(), vec!["Say 'Model is working'"]);
    }
}
