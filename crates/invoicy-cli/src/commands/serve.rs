//! Serve command - HTTP endpoints for the web UI.
//!
//! Routes:
//! - `POST /processInvoice`  body `{"fileName": "..."}`, one document
//! - `POST /processInvoices` body `{"fileNames": [...]}`, a bounded batch
//! - `GET  /health`

use std::path::PathBuf;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use clap::Args;
use console::style;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use invoicy_core::{
    BatchCoordinator, DocumentRef, InvocationError, Presenter, coordinator_from_config,
};

use super::load_config;

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Uploads directory (overrides config)
    #[arg(short, long)]
    uploads_dir: Option<PathBuf>,
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: BatchCoordinator,
    pub presenter: Presenter,
}

pub async fn run(args: ServeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = args.uploads_dir {
        config.store.uploads_dir = dir;
    }
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());

    let state = AppState {
        coordinator: coordinator_from_config(&config)?,
        presenter: Presenter::new(&config.server.uploads_base_url),
    };

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    eprintln!(
        "{} Server is running on http://{}",
        style("✓").green(),
        listener.local_addr()?
    );
    info!(
        "Serving documents from {}",
        config.store.uploads_dir.display()
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Build the HTTP router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/processInvoice", post(process_invoice))
        .route("/processInvoices", post(process_invoices))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

type ApiResponse = (StatusCode, Json<Value>);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest {
    file_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequest {
    file_names: Vec<String>,
}

fn bad_request(message: impl Into<String>) -> ApiResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn process_invoice(State(state): State<AppState>, body: Bytes) -> ApiResponse {
    let request: ProcessRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return bad_request(format!("Invalid request body: {}", e)),
    };

    let Some(name) = request.file_name.filter(|n| !n.trim().is_empty()) else {
        return bad_request("File name is undefined");
    };

    info!("Processing file: {}", name);

    match state.coordinator.process_one(DocumentRef::new(name)).await {
        Err(e) => bad_request(e.to_string()),
        Ok(entry) => {
            let status = match entry.error() {
                None => StatusCode::OK,
                Some(InvocationError::DocumentNotFound { .. }) => StatusCode::NOT_FOUND,
                Some(error) => {
                    warn!("Processing {} failed: {}", entry.document, error);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            (status, Json(state.presenter.present_entry(&entry)))
        }
    }
}

async fn process_invoices(State(state): State<AppState>, body: Bytes) -> ApiResponse {
    let request: BatchRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return bad_request(format!("Invalid request body: {}", e)),
    };

    info!("Processing batch of {} files", request.file_names.len());

    let documents = request.file_names.into_iter().map(DocumentRef::new).collect();
    let limit = state.coordinator.concurrency_limit();
    match state.coordinator.process_batch(documents, limit).await {
        Ok(result) => (StatusCode::OK, Json(state.presenter.present_batch(&result))),
        Err(e) => bad_request(e.to_string()),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tower::ServiceExt;

    use invoicy_core::{FsDocumentStore, ProcessRunner};

    const SCRIPT: &str = r#"
name=$(basename "$1")
case "$name" in
  bad*) echo '{"error": "cannot read invoice"}' >&2; exit 1 ;;
esac
echo "Progress: Reading $name"
echo "output data: {\"invoice\": \"$name\", \"image_paths\": [\"out/$name.png\"]}"
"#;

    fn test_app(dir: &tempfile::TempDir) -> Router {
        let runner = ProcessRunner::new("sh").with_args(["-c", SCRIPT, "sh"]);
        let state = AppState {
            coordinator: BatchCoordinator::new(
                Arc::new(FsDocumentStore::new(dir.path())),
                Arc::new(runner),
                2,
            )
            .unwrap(),
            presenter: Presenter::new("http://localhost:5000/uploads"),
        };
        router(state)
    }

    fn uploads() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("bad.pdf"), b"%PDF").unwrap();
        dir
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = uploads();
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = test_app(&dir).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_process_invoice_success() {
        let dir = uploads();
        let response = test_app(&dir)
            .oneshot(post_json("/processInvoice", r#"{"fileName": "a.pdf"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["invoice"], "a.pdf");
        assert_eq!(
            body["imageUrls"],
            json!(["http://localhost:5000/uploads/a.pdf.png"])
        );
    }

    #[tokio::test]
    async fn test_process_invoice_missing_name() {
        let dir = uploads();

        for body in [r#"{}"#, r#"{"fileName": ""}"#, r#"{"fileName": null}"#] {
            let response = test_app(&dir)
                .oneshot(post_json("/processInvoice", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(
                body_json(response).await["error"],
                "File name is undefined"
            );
        }
    }

    #[tokio::test]
    async fn test_process_invoice_invalid_body() {
        let dir = uploads();
        let response = test_app(&dir)
            .oneshot(post_json("/processInvoice", "not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_process_invoice_traversal_rejected() {
        let dir = uploads();
        let response = test_app(&dir)
            .oneshot(post_json("/processInvoice", r#"{"fileName": "../a.pdf"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_process_invoice_not_found() {
        let dir = uploads();
        let response = test_app(&dir)
            .oneshot(post_json("/processInvoice", r#"{"fileName": "nope.pdf"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "document_not_found");
        assert_eq!(body["document"], "nope.pdf");
    }

    #[tokio::test]
    async fn test_process_invoice_extractor_failure() {
        let dir = uploads();
        let response = test_app(&dir)
            .oneshot(post_json("/processInvoice", r#"{"fileName": "bad.pdf"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "process_failure");
        assert!(
            body["details"]
                .as_str()
                .unwrap()
                .contains("cannot read invoice")
        );
    }

    #[tokio::test]
    async fn test_process_invoices_keeps_order() {
        let dir = uploads();
        let response = test_app(&dir)
            .oneshot(post_json(
                "/processInvoices",
                r#"{"fileNames": ["b.pdf", "missing.pdf", "bad.pdf", "a.pdf"]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0]["invoice"], "b.pdf");
        assert_eq!(entries[1]["error"], "document_not_found");
        assert_eq!(entries[2]["error"], "process_failure");
        assert_eq!(entries[3]["invoice"], "a.pdf");
    }

    #[tokio::test]
    async fn test_process_invoices_bad_request() {
        let dir = uploads();

        for body in [
            r#"{"fileNames": "a.pdf"}"#,
            r#"{}"#,
            r#"{"fileNames": ["a.pdf", "../etc/passwd"]}"#,
        ] {
            let response = test_app(&dir)
                .oneshot(post_json("/processInvoices", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        }
    }

    #[tokio::test]
    async fn test_process_invoices_empty() {
        let dir = uploads();
        let response = test_app(&dir)
            .oneshot(post_json("/processInvoices", r#"{"fileNames": []}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));
    }
}
