// Stones Inventory - Web Server
// REST API over one shared inventory controller

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stones_inventory::{
    logging, AppConfig, DatasetState, Error, InventoryController, InventoryRecord, ItemKind,
    RefreshOutcome, ScanMode, SelectionTotals,
};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
struct AppState {
    controller: Arc<InventoryController>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::error(message))).into_response()
}

fn status_for(e: &Error) -> StatusCode {
    match e {
        Error::InvalidQuantity(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::NotSignedIn => StatusCode::UNAUTHORIZED,
        Error::FileNotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Selection response
#[derive(Serialize)]
struct SelectionResponse {
    entries: Vec<InventoryRecord>,
    totals: SelectionTotals,
}

impl SelectionResponse {
    fn current(controller: &InventoryController) -> Self {
        let selection = controller.selection();
        Self {
            entries: selection.entries().to_vec(),
            totals: selection.totals(),
        }
    }
}

fn default_mode() -> ScanMode {
    ScanMode::Manual
}

fn default_kind() -> ItemKind {
    ItemKind::Slabs
}

/// Scan request body
#[derive(Deserialize)]
struct ScanRequest {
    code: String,
    #[serde(default = "default_mode")]
    mode: ScanMode,
    #[serde(default = "default_kind")]
    kind: ItemKind,
    #[serde(default)]
    quantity: String,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/dataset - Current dataset state
async fn get_dataset(State(state): State<AppState>) -> impl IntoResponse {
    let dataset: Arc<DatasetState> = state.controller.dataset();
    Json(ApiResponse::ok((*dataset).clone()))
}

/// GET /api/records - Records of the live dataset
async fn get_records(State(state): State<AppState>) -> impl IntoResponse {
    let records = state.controller.dataset().records();
    Json(ApiResponse::ok((*records).clone()))
}

/// POST /api/refresh - Reload from the drive
async fn refresh(State(state): State<AppState>) -> Response {
    let controller = state.controller.clone();

    match tokio::task::spawn_blocking(move || controller.refresh()).await {
        Ok(RefreshOutcome::Failed(message)) => failure(StatusCode::BAD_GATEWAY, message),
        Ok(RefreshOutcome::AlreadyInFlight) => (
            StatusCode::ACCEPTED,
            Json(ApiResponse::ok(RefreshOutcome::AlreadyInFlight)),
        )
            .into_response(),
        Ok(outcome) => (StatusCode::OK, Json(ApiResponse::ok(outcome))).into_response(),
        Err(e) => {
            error!(error = %e, "refresh task failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "refresh task failed")
        }
    }
}

/// GET /api/lookup/:code - Find a batch by code
async fn lookup(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    match state.controller.lookup(&code) {
        Some(record) => (StatusCode::OK, Json(ApiResponse::ok(record))).into_response(),
        None => failure(StatusCode::NOT_FOUND, format!("no match found for '{}'", code.trim())),
    }
}

/// GET /api/selection - Entries and totals
async fn get_selection(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(SelectionResponse::current(&state.controller)))
}

/// GET /api/selection/totals
async fn get_totals(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.controller.totals()))
}

/// POST /api/selection/scan - Look up a code and append per mode and item kind
async fn scan(State(state): State<AppState>, Json(request): Json<ScanRequest>) -> Response {
    match state
        .controller
        .scan(&request.code, request.mode, request.kind, &request.quantity)
    {
        Ok(outcome) => (StatusCode::OK, Json(ApiResponse::ok(outcome))).into_response(),
        Err(e) => failure(status_for(&e), e.to_string()),
    }
}

/// DELETE /api/selection/:index - Remove one entry
async fn remove_entry(State(state): State<AppState>, Path(index): Path<usize>) -> Response {
    if state.controller.remove_at(index) {
        (StatusCode::OK, Json(ApiResponse::ok(SelectionResponse::current(&state.controller)))).into_response()
    } else {
        failure(StatusCode::NOT_FOUND, format!("no selection entry at index {}", index))
    }
}

/// DELETE /api/selection - Empty the selection
async fn clear_selection(State(state): State<AppState>) -> impl IntoResponse {
    state.controller.clear_selection();
    state.controller.clear_last_match();
    Json(ApiResponse::ok(SelectionResponse::current(&state.controller)))
}

/// GET /api/export.csv - Download the selection summary
async fn export_csv(State(state): State<AppState>) -> Response {
    match state.controller.export_csv() {
        Ok(bytes) => {
            let name = stones_inventory::export_file_name(chrono::Local::now().naive_local(), &[]);
            let disposition = format!(
                "attachment; filename*=UTF-8''{}",
                urlencoding::encode(&name)
            );
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => failure(status_for(&e), e.to_string()),
    }
}

/// POST /api/export/upload - Write the summary and upload it to the drive
async fn export_upload(State(state): State<AppState>) -> Response {
    let controller = state.controller.clone();

    match tokio::task::spawn_blocking(move || controller.export_and_upload()).await {
        Ok(Ok(receipt)) => (StatusCode::OK, Json(ApiResponse::ok(receipt))).into_response(),
        Ok(Err(e)) => failure(status_for(&e), e.to_string()),
        Err(e) => {
            error!(error = %e, "upload task failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "upload task failed")
        }
    }
}

fn build_router(state: AppState) -> Router {
    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/dataset", get(get_dataset))
        .route("/records", get(get_records))
        .route("/refresh", post(refresh))
        .route("/lookup/:code", get(lookup))
        .route("/selection", get(get_selection).delete(clear_selection))
        .route("/selection/totals", get(get_totals))
        .route("/selection/scan", post(scan))
        .route("/selection/:index", delete(remove_entry))
        .route("/export.csv", get(export_csv))
        .route("/export/upload", post(export_upload))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    println!("🌐 Stones Inventory - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = AppConfig::load()?;
    let addr = config.server_addr.clone();
    println!("✓ Drive root: {:?}", config.drive_root);
    println!("✓ Cache: {:?}", config.database_path);

    let controller = Arc::new(InventoryController::local(config)?);

    // Initial load runs in the background; /api/dataset reports progress
    let loader = controller.clone();
    tokio::task::spawn_blocking(move || {
        let outcome = loader.load();
        info!(?outcome, "initial load finished");
    });

    let app = build_router(AppState { controller });

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/selection", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;
    Ok(())
}
