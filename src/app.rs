#![cfg(not(tarpaulin_include))]

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::config::ServerConfig;
use crate::downloader::{export_pdf, to_csv, to_xlsx};
use crate::error::{GridError, Result};
use crate::grid::{GridPayload, SaveRequest, project};
use crate::layout::LayoutOptions;
use crate::saving::{DocumentId, DocumentStore};

/// Shared, read-only request context. Every request reopens its document
/// from the store.
pub struct AppState {
    pub store: DocumentStore,
    pub rows_per_page: usize,
}

impl AppState {
    pub fn new(store: DocumentStore, rows_per_page: usize) -> Self {
        AppState {
            store,
            rows_per_page: rows_per_page.max(1),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SaveResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SaveResponse {
    fn ok() -> Self {
        SaveResponse {
            status: "ok".to_string(),
            id: None,
            kind: None,
            message: None,
        }
    }

    fn error(err: &GridError) -> Self {
        SaveResponse {
            status: "error".to_string(),
            id: None,
            kind: Some(err.kind().to_string()),
            message: Some(err.to_string()),
        }
    }
}

impl IntoResponse for GridError {
    fn into_response(self) -> Response {
        let status = match &self {
            GridError::NotFound(_) => StatusCode::NOT_FOUND,
            GridError::Format(_) => StatusCode::BAD_REQUEST,
            GridError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GridError::Storage(_) | GridError::Export(_) | GridError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!("{}", self);
        } else {
            warn!("rejected request: {}", self);
        }
        (status, Json(SaveResponse::error(&self))).into_response()
    }
}

#[derive(Deserialize)]
struct DownloadQuery {
    format: Option<String>,
}

/// Runs file work off the async executor.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| GridError::Storage(format!("worker failed: {}", e)))?
}

pub fn router(state: Arc<AppState>, static_dir: &std::path::Path, max_upload: usize) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/upload", post(upload))
        .route("/data/:id", get(get_data))
        .route("/save/:id", post(save_data))
        .route("/export/:id", get(export))
        .route("/download/:id", get(download))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(max_upload))
        .with_state(state)
}

pub async fn run(config: ServerConfig) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let store = DocumentStore::new(&config.upload_dir)?;
    let state = Arc::new(AppState::new(store, config.rows_per_page));
    let app = router(state, &config.static_dir, config.max_upload_bytes());

    let addr = config.addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!(
        "Listening on http://{} (uploads in {})",
        addr,
        config.upload_dir.display()
    );
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_index() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<SaveResponse>> {
    let bad_upload = |e: axum::extract::multipart::MultipartError| {
        GridError::Format(format!("malformed upload: {}", e))
    };

    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_upload)? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload.xlsx").to_string();
        let bytes = field.bytes().await.map_err(bad_upload)?;
        file = Some((name, bytes));
    }

    let (name, bytes) =
        file.ok_or_else(|| GridError::Format("upload has no 'file' field".to_string()))?;
    if bytes.is_empty() {
        return Err(GridError::Format(format!("'{}' is empty", name)));
    }

    let id = blocking(move || state.store.store_upload(&name, &bytes)).await?;
    Ok(Json(SaveResponse {
        id: Some(id.to_string()),
        ..SaveResponse::ok()
    }))
}

async fn get_data(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<GridPayload>> {
    let id: DocumentId = id.parse()?;
    let payload = blocking(move || Ok(project(&state.store.open(&id)?))).await?;
    Ok(Json(payload))
}

async fn save_data(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SaveResponse>> {
    let id: DocumentId = id.parse()?;
    let request: SaveRequest = serde_json::from_slice(&body)
        .map_err(|e| GridError::Format(format!("expected {{data, mergedCells?}}: {}", e)))?;
    blocking(move || state.store.save_grid(&id, &request)).await?;
    Ok(Json(SaveResponse::ok()))
}

fn attachment(content_type: &str, filename: String, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}

fn stem(id: &DocumentId) -> &str {
    id.as_str()
        .rsplit_once('.')
        .map_or(id.as_str(), |(stem, _)| stem)
}

async fn export(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Result<Response> {
    let id: DocumentId = id.parse()?;
    let filename = format!("{}.pdf", stem(&id));
    let bytes = blocking(move || {
        let sheet = state.store.open(&id)?;
        let options = LayoutOptions {
            rows_per_page: state.rows_per_page,
            title: format!("Spreadsheet Export: {}", sheet.name),
            ..LayoutOptions::default()
        };
        export_pdf(&project(&sheet).data, &options)
    })
    .await?;
    Ok(attachment("application/pdf", filename, bytes))
}

async fn download(
    Path(id): Path<String>,
    Query(query): Query<DownloadQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response> {
    let id: DocumentId = id.parse()?;
    let format = query.format.unwrap_or_else(|| "csv".to_string());
    let filename = format!("{}.{}", stem(&id), format);

    let (content_type, bytes) = blocking(move || {
        let payload = project(&state.store.open(&id)?);
        match format.as_str() {
            "csv" => Ok(("text/csv", to_csv(&payload.data)?.into_bytes())),
            "xlsx" => {
                let merges = payload.merged_cells.unwrap_or_default();
                Ok((
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                    to_xlsx(&payload.data, &merges)?,
                ))
            }
            other => Err(GridError::Format(format!(
                "unsupported download format '{}'",
                other
            ))),
        }
    })
    .await?;
    Ok(attachment(content_type, filename, bytes))
}
