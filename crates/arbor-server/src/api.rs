use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::BytesRejection,
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use arbor_store::{Tree, TreePatch, TreeSummary, DEFAULT_TREE_NAME};

use crate::config::ServerConfig;
use crate::db::TreeDb;
use crate::error::ServerError;
use crate::upload_store::{content_type_for, UploadStore};

/// Room for multipart framing on top of the largest accepted file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: TreeDb,
    pub uploads: Arc<UploadStore>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Open the database (running migrations) and the upload root.
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let db = TreeDb::open(config.database_path.clone())?;
        let uploads = UploadStore::new(
            config.upload_root.clone(),
            config.max_upload_size,
            config.verify_image_content,
        )
        .await?;

        Ok(Self {
            db,
            uploads: Arc::new(uploads),
            config: Arc::new(config),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let api = Router::new()
        .route("/trees", get(list_trees).post(create_tree))
        .route(
            "/trees/:id",
            get(get_tree).put(update_tree).delete(delete_tree),
        )
        .route("/trees/:id/upload", post(upload_file));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .route("/uploads/:tree_id/:filename", get(serve_upload))
        .layer(DefaultBodyLimit::max(
            state.config.max_upload_size + MULTIPART_OVERHEAD,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct OkResponse {
    ok: bool,
}

#[derive(Serialize)]
struct UploadResponse {
    url: String,
}

#[derive(Default, Deserialize)]
struct CreateTreeRequest {
    #[serde(default)]
    name: Option<String>,
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ServerError> {
    serde_json::from_slice(body)
        .map_err(|e| ServerError::BadRequest(format!("Invalid JSON body: {e}")))
}

fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

/// Turn a failed body read into a JSON error, keeping 413 for bodies over
/// the configured limit.
fn read_body(
    body: Result<Bytes, BytesRejection>,
    config: &ServerConfig,
) -> Result<Bytes, ServerError> {
    body.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::BodyTooLarge {
                max: config.max_upload_size,
            }
        } else {
            ServerError::BadRequest(e.body_text())
        }
    })
}

fn multipart_error(e: MultipartError, config: &ServerConfig) -> ServerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::BodyTooLarge {
            max: config.max_upload_size,
        }
    } else {
        ServerError::BadRequest(format!("Multipart error: {}", e))
    }
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn create_tree(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<Tree>), ServerError> {
    let body = read_body(body, &state.config)?;
    // The body is optional; a missing one means "all defaults".
    let req: CreateTreeRequest = if is_blank(&body) {
        CreateTreeRequest::default()
    } else {
        parse_json(&body)?
    };
    let name = req.name.unwrap_or_else(|| DEFAULT_TREE_NAME.to_string());
    let id = Uuid::new_v4().to_string();

    let tree = state.db.run(move |db| db.create_tree(&id, &name)).await?;

    info!(id = %tree.id, name = %tree.name, "Tree created");
    Ok((StatusCode::CREATED, Json(tree)))
}

async fn list_trees(State(state): State<AppState>) -> Result<Json<Vec<TreeSummary>>, ServerError> {
    let trees = state.db.run(|db| db.list_tree_summaries()).await?;
    Ok(Json(trees))
}

async fn get_tree(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Tree>, ServerError> {
    let tree = state.db.run(move |db| db.get_tree(&id)).await?;
    Ok(Json(tree))
}

async fn update_tree(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<OkResponse>, ServerError> {
    let body = read_body(body, &state.config)?;
    if is_blank(&body) {
        return Err(ServerError::BadRequest("Missing JSON body".to_string()));
    }
    let patch: TreePatch = parse_json(&body)?;
    let touch_only = patch.is_empty();

    let tree = state
        .db
        .run(move |db| db.update_tree(&id, &patch))
        .await?;

    debug!(
        id = %tree.id,
        updated_at = %tree.updated_at,
        touch_only,
        "Tree updated"
    );
    Ok(Json(OkResponse { ok: true }))
}

async fn delete_tree(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ServerError> {
    let target = id.clone();
    if !state.db.run(move |db| db.delete_tree(&target)).await? {
        return Err(ServerError::TreeNotFound);
    }

    // The row is already gone, so a failed purge only leaves orphaned files.
    if state.config.purge_uploads_on_delete {
        if let Err(e) = state.uploads.purge_tree(&id).await {
            warn!(id = %id, error = %e, "Tree deleted but its uploads could not be purged");
        }
    }

    info!(id = %id, "Tree deleted");
    Ok(Json(OkResponse { ok: true }))
}

async fn upload_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ServerError> {
    // A missing tree wins over a malformed form.
    let target = id.clone();
    state.db.run(move |db| db.get_tree(&target)).await?;

    let mut multipart =
        multipart.map_err(|_| ServerError::BadRequest("No file part".to_string()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, &state.config))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(ServerError::BadRequest("No selected file".to_string()));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, &state.config))?;

        let url = state.uploads.store(&id, &file_name, &data).await?;
        return Ok(Json(UploadResponse { url }));
    }

    Err(ServerError::BadRequest("No file part".to_string()))
}

async fn serve_upload(
    State(state): State<AppState>,
    Path((tree_id, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServerError> {
    let data = state.uploads.read(&tree_id, &filename).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&filename))], data))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
