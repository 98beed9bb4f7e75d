use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/api/curriculum", get(handlers::get_curriculum))
        .route("/api/modules", get(handlers::list_modules))
        .route("/api/modules/:module_id", get(handlers::get_module))
        .route("/api/execute", post(handlers::execute_code))
        .route("/api/validate", post(handlers::validate_exercise))
        .route("/api/docs/pytorch/*symbol", get(handlers::get_pytorch_docs))
        .route("/api/docs/pytorch-cached", get(handlers::get_cached_symbols))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_state;
    use crate::docs::test_support::StubFetcher;
    use academy_common::config::Settings;
    use academy_common::content::ContentCatalog;
    use academy_common::types::{ExerciseSpec, Module, ModuleMetadata, Validation};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use std::collections::BTreeMap;
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    fn sample_module() -> Module {
        let exercise = ExerciseSpec {
            id: "ex-1".to_string(),
            starter_code: "x = ...".to_string(),
            hints: vec!["Add one and one".to_string()],
            validation: Validation::Assert {
                tests: vec!["assert x == 2".to_string()],
            },
            solution: "x = 1 + 1".to_string(),
            difficulty: "easy".to_string(),
        };
        Module {
            metadata: ModuleMetadata {
                id: "01-tensors".to_string(),
                title: "Tensors".to_string(),
                order: 1,
                prerequisites: Vec::new(),
                estimated_minutes: 45,
                pytorch_version: "2.2".to_string(),
                section: "fundamentals".to_string(),
                section_order: 1,
            },
            content: "# Tensors".to_string(),
            exercises: BTreeMap::from([("ex-1".to_string(), exercise)]),
        }
    }

    const TENSOR_PAGE: &str = r#"<dl><dt class="sig sig-object py" id="torch.tensor"><span class="sig-prename descclassname">torch.</span><span class="sig-name descname">tensor</span><span class="sig-paren">(</span><em class="sig-param">data</em><span class="sig-paren">)</span></dt>
<dd><p>Constructs a tensor with no autograd history.</p></dd></dl>"#;

    /// Router over a one-module catalog whose interpreter can never be launched.
    /// The docs fetcher knows a single page, `torch.tensor`.
    fn app(scratch: &TempDir) -> Router {
        let mut settings = Settings::default();
        settings.engine.python_bin = "/nonexistent/interpreter".to_string();
        settings.engine.scratch_dir = scratch.path().to_path_buf();

        let page_url = format!("{}/generated/torch.tensor.html", settings.docs.base_url);
        let fetcher = Arc::new(StubFetcher::with_page(&page_url, TENSOR_PAGE));
        let content = Arc::new(ContentCatalog::from_modules([sample_module()]));
        routes().with_state(Arc::new(build_state(settings, content, fetcher).unwrap()))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).method("GET").body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_root() {
        let dir = TempDir::new().unwrap();
        let (status, body) = send(app(&dir), get_request("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");
        assert_eq!(body["version"], "1.0.0");
        assert!(body["name"].is_string());
    }

    #[tokio::test]
    async fn test_health_check() {
        let dir = TempDir::new().unwrap();
        let (status, body) = send(app(&dir), get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "status": "healthy" }));
    }

    #[tokio::test]
    async fn test_curriculum() {
        let dir = TempDir::new().unwrap();
        let (status, body) = send(app(&dir), get_request("/api/curriculum")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_modules"], 1);
        assert_eq!(body["total_estimated_minutes"], 45);
        assert_eq!(body["sections"][0]["id"], "fundamentals");
        assert_eq!(body["sections"][0]["modules"][0]["id"], "01-tensors");
    }

    #[tokio::test]
    async fn test_list_modules() {
        let dir = TempDir::new().unwrap();
        let (status, body) = send(app(&dir), get_request("/api/modules")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!(["01-tensors"]));
    }

    #[tokio::test]
    async fn test_get_module() {
        let dir = TempDir::new().unwrap();
        let (status, body) = send(app(&dir), get_request("/api/modules/01-tensors")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metadata"]["title"], "Tensors");
        assert_eq!(body["exercises"]["ex-1"]["validation"]["type"], "assert");
    }

    #[tokio::test]
    async fn test_get_module_not_found() {
        let dir = TempDir::new().unwrap();
        let (status, body) = send(app(&dir), get_request("/api/modules/nonexistent-module")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Module 'nonexistent-module' not found");
    }

    #[tokio::test]
    async fn test_validate_unknown_module_is_ok_with_error_verdict() {
        let dir = TempDir::new().unwrap();
        let request = post_json(
            "/api/validate",
            serde_json::json!({ "module_id": "nonexistent", "exercise_id": "ex-1", "code": "x = 1" }),
        );
        let (status, body) = send(app(&dir), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], "error");
        assert!(body["error_message"].as_str().unwrap().to_lowercase().contains("not found"));
        assert_eq!(body["passed_tests"], 0);
    }

    #[tokio::test]
    async fn test_execute_reports_launch_failure() {
        let dir = TempDir::new().unwrap();
        let request = post_json("/api/execute", serde_json::json!({ "code": "print(1)" }));
        let (status, body) = send(app(&dir), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().starts_with("Execution error:"));
        assert!(body["execution_time"].is_number());
    }

    #[tokio::test]
    async fn test_execute_rejects_malformed_body() {
        let dir = TempDir::new().unwrap();
        let request = post_json("/api/execute", serde_json::json!({ "timeout": 5 }));
        let response = app(&dir).oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_metrics_exposes_counters() {
        let dir = TempDir::new().unwrap();
        let request = post_json(
            "/api/validate",
            serde_json::json!({ "module_id": "missing", "exercise_id": "ex-1", "code": "" }),
        );
        send(app(&dir), request).await;

        let response = app(&dir).oneshot(get_request("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("academy_validations_total"));
    }

    #[tokio::test]
    async fn test_docs_lookup() {
        let dir = TempDir::new().unwrap();
        let (status, body) = send(app(&dir), get_request("/api/docs/pytorch/torch.tensor")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "torch.tensor");
        assert_eq!(body["signature"], "torch.tensor(data)");
        assert_eq!(body["description"], "Constructs a tensor with no autograd history.");
        assert_eq!(body["url"], "https://pytorch.org/docs/stable/generated/torch.tensor.html");
    }

    #[tokio::test]
    async fn test_docs_unknown_symbol_not_found() {
        let dir = TempDir::new().unwrap();
        let (status, body) = send(app(&dir), get_request("/api/docs/pytorch/torch.nn.Nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Documentation for 'torch.nn.Nope' not found");
    }

    #[tokio::test]
    async fn test_docs_cached_symbols() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        let (_, before) = send(app.clone(), get_request("/api/docs/pytorch-cached")).await;
        assert_eq!(before, serde_json::json!({ "cached_symbols": [] }));

        send(app.clone(), get_request("/api/docs/pytorch/torch.tensor")).await;
        send(app.clone(), get_request("/api/docs/pytorch/torch.missing")).await;

        let (status, after) = send(app, get_request("/api/docs/pytorch-cached")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(after, serde_json::json!({ "cached_symbols": ["torch.tensor"] }));
    }
}
