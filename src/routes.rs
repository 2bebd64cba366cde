use axum::{
    Json, Router,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use std::{collections::HashMap, sync::{Arc, atomic::{AtomicBool, Ordering}}};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use tower_http::cors::{Any, CorsLayer};

use crate::{
    config::{AppConfig, MIN_GENERATION_COUNT},
    download::{download_filename, download_set, image_bytes, DownloadScope},
    error::AppError,
    gemini::GeminiClient,
    models::{AspectRatio, GenerateImageRequest, GenerationStyle, StyleOptionSet, TranslateRequest, UploadedImage},
    orchestrator::{GenerationJob, GenerationOrchestrator},
    session::{GenerationSession, SessionHandle},
    storage::{CredentialStore, DownloadHistory},
    transport::ImageGenerator,
    upload::{UploadInput, UploadList},
};

/// One editing session: its reference images and its generation state.
pub struct SessionEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub session: SessionHandle,
    pub uploads: RwLock<UploadList>,
    run_pending: AtomicBool,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<HashMap<Uuid, Arc<SessionEntry>>>>,
    pub gemini: Arc<GeminiClient>,
    pub orchestrator: Arc<GenerationOrchestrator<Arc<dyn ImageGenerator>>>,
    pub credentials: Arc<CredentialStore>,
    pub downloads: Arc<DownloadHistory>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Generation runs go straight to Gemini in-process.
    pub fn new(config: AppConfig) -> Self {
        let gemini = Arc::new(GeminiClient::new(&config));
        Self::with_generator(config, gemini.clone(), gemini)
    }

    pub fn with_generator(config: AppConfig, gemini: Arc<GeminiClient>, generator: Arc<dyn ImageGenerator>) -> Self {
        let data_dir = config.data_dir.as_deref();
        Self {
            store: Arc::default(),
            credentials: Arc::new(CredentialStore::new(data_dir)),
            downloads: Arc::new(DownloadHistory::new(data_dir)),
            orchestrator: Arc::new(GenerationOrchestrator::new(generator)),
            gemini,
            config: Arc::new(config),
        }
    }

    fn session(&self, id: Uuid) -> Result<Arc<SessionEntry>, AppError> {
        self.store.read().get(&id).cloned().ok_or(AppError::SessionNotFound)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/generate-image", post(generate_image))
        .route("/api/translate", post(translate))
        .route("/api/credential", get(credential_status).put(save_credential).delete(remove_credential))
        .route("/api/downloads", get(list_downloads).delete(clear_downloads))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/uploads", post(add_upload).delete(clear_uploads))
        .route("/api/sessions/:id/uploads/:upload_id", delete(remove_upload))
        .route("/api/sessions/:id/generate", post(start_generation))
        .route("/api/sessions/:id/results", delete(clear_results))
        .route("/api/sessions/:id/results/downloaded", post(mark_downloaded))
        .route("/api/sessions/:id/results/download", post(download_many))
        .route("/api/sessions/:id/results/:result_id/toggle", post(toggle_selection))
        .route("/api/sessions/:id/results/:result_id/download", get(download_one))
        .route("/api/sessions/:id/error", delete(clear_error))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

// --- Upstream-facing endpoints ---

pub async fn generate_image(State(state): State<AppState>, Json(body): Json<GenerateImageRequest>) -> Response {
    tracing::info!("🎨 Generate request: style={:?} mime={}", body.style, body.mime_type);
    let (status, response) = state.gemini.respond_generate_image(&body).await;
    (status_code(status), Json(response)).into_response()
}

pub async fn translate(State(state): State<AppState>, Json(body): Json<TranslateRequest>) -> Response {
    let (status, response) = state.gemini.respond_translate(&body).await;
    (status_code(status), Json(response)).into_response()
}

// --- Credential ---

#[derive(Debug, Serialize)]
pub struct CredentialStatus {
    pub exists: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveCredential {
    pub api_key: String,
}

pub async fn credential_status(State(state): State<AppState>) -> Json<CredentialStatus> {
    Json(CredentialStatus { exists: state.credentials.exists() })
}

pub async fn save_credential(State(state): State<AppState>, Json(body): Json<SaveCredential>) -> Result<StatusCode, AppError> {
    state.credentials.save(body.api_key.trim())?;
    tracing::info!("🔑 API key saved");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_credential(State(state): State<AppState>) -> StatusCode {
    state.credentials.remove();
    tracing::info!("🔑 API key removed");
    StatusCode::NO_CONTENT
}

// --- Download history ---

#[derive(Debug, Serialize)]
pub struct DownloadedIds {
    pub ids: Vec<String>,
}

pub async fn list_downloads(State(state): State<AppState>) -> Json<DownloadedIds> {
    Json(DownloadedIds { ids: state.downloads.list_downloaded_ids() })
}

pub async fn clear_downloads(State(state): State<AppState>) -> StatusCode {
    state.downloads.clear();
    StatusCode::NO_CONTENT
}

// --- Sessions ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

impl From<&UploadedImage> for UploadSummary {
    fn from(img: &UploadedImage) -> Self {
        Self { id: img.id.clone(), name: img.name.clone(), mime_type: img.mime_type.clone(), size_bytes: img.size_bytes }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub state: GenerationSession,
    pub uploads: Vec<UploadSummary>,
    pub can_add_more: bool,
}

impl SessionView {
    fn of(entry: &SessionEntry) -> Self {
        let uploads = entry.uploads.read();
        Self {
            id: entry.id,
            created_at: entry.created_at,
            state: entry.session.snapshot(),
            uploads: uploads.images().iter().map(UploadSummary::from).collect(),
            can_add_more: uploads.can_add_more(),
        }
    }
}

pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let entry = Arc::new(SessionEntry {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        session: SessionHandle::new(),
        uploads: RwLock::new(UploadList::new(state.config.max_upload_images)),
        run_pending: AtomicBool::new(false),
    });
    state.store.write().insert(entry.id, entry.clone());
    tracing::info!("🆕 Created session {}", entry.id);
    (StatusCode::CREATED, Json(SessionView::of(&entry)))
}

pub async fn get_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, AppError> {
    let entry = state.session(id)?;
    Ok(Json(SessionView::of(&entry)))
}

/// Drops the session with its uploads and results. Refused while a run is in flight.
pub async fn delete_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<StatusCode, AppError> {
    let entry = state.session(id)?;
    // Claiming the run slot keeps a generate request from starting on the removed entry.
    if entry.run_pending.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
        return Err(AppError::AlreadyGenerating);
    }
    state.store.write().remove(&id);
    tracing::info!("🗑️ Removed session {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_upload(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<UploadInput>,
) -> Result<(StatusCode, Json<UploadSummary>), AppError> {
    let entry = state.session(id)?;
    let image = UploadedImage::from_input(&body)?;
    let mut uploads = entry.uploads.write();
    let added = uploads.add(image)?;
    Ok((StatusCode::CREATED, Json(UploadSummary::from(added))))
}

pub async fn remove_upload(
    Path((id, upload_id)): Path<(Uuid, String)>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let entry = state.session(id)?;
    if entry.uploads.write().remove(&upload_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::ImageNotFound)
    }
}

pub async fn clear_uploads(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.session(id)?.uploads.write().clear();
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGeneration {
    /// Falls back to the stored credential when absent.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub style: GenerationStyle,
    #[serde(default = "one")]
    pub count: u32,
    #[serde(default)]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(default)]
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub translated_prompt: Option<String>,
    /// Hold the response until the run has finished.
    #[serde(default)]
    pub wait: bool,
    #[serde(flatten)]
    pub options: StyleOptionSet,
}

fn one() -> u32 {
    1
}

/// Releases the session's run slot however the run ends.
struct PendingRun(Arc<SessionEntry>);

impl Drop for PendingRun {
    fn drop(&mut self) {
        self.0.run_pending.store(false, Ordering::Release);
    }
}

pub async fn start_generation(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<StartGeneration>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let entry = state.session(id)?;

    let max = state.config.max_generation_count;
    if !(MIN_GENERATION_COUNT..=max).contains(&body.count) {
        return Err(AppError::InvalidCount { min: MIN_GENERATION_COUNT, max });
    }

    let job = GenerationJob {
        credential: body.api_key
            .filter(|k| !k.is_empty())
            .or_else(|| state.credentials.get())
            .unwrap_or_default(),
        uploaded_images: entry.uploads.read().images().to_vec(),
        style: body.style,
        count: body.count,
        aspect_ratio: body.aspect_ratio,
        custom_prompt: body.custom_prompt,
        translated_prompt: body.translated_prompt,
        options: body.options,
    };

    if entry.run_pending.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
        return Err(AppError::AlreadyGenerating);
    }

    let run = {
        let (entry, orchestrator) = (entry.clone(), state.orchestrator.clone());
        async move {
            let _pending = PendingRun(entry.clone());
            orchestrator.generate(&entry.session, &job).await;
        }
    };

    if body.wait {
        run.await;
        Ok((StatusCode::OK, Json(SessionView::of(&entry))))
    } else {
        tokio::spawn(run);
        Ok((StatusCode::ACCEPTED, Json(SessionView::of(&entry))))
    }
}

pub async fn toggle_selection(
    Path((id, result_id)): Path<(Uuid, String)>,
    State(state): State<AppState>,
) -> Result<Json<SessionView>, AppError> {
    let entry = state.session(id)?;
    if !entry.session.toggle_selection(&result_id) {
        return Err(AppError::ImageNotFound);
    }
    Ok(Json(SessionView::of(&entry)))
}

#[derive(Debug, Deserialize)]
pub struct MarkDownloaded {
    pub ids: Vec<String>,
}

pub async fn mark_downloaded(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<MarkDownloaded>,
) -> Result<Json<SessionView>, AppError> {
    let entry = state.session(id)?;
    entry.session.mark_downloaded(body.ids.iter().map(String::as_str));
    for result in entry.session.results().iter().filter(|r| body.ids.contains(&r.id)) {
        state.downloads.mark_downloaded(&result.id);
    }
    Ok(Json(SessionView::of(&entry)))
}

pub async fn download_one(
    Path((id, result_id)): Path<(Uuid, String)>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let entry = state.session(id)?;
    let image = entry.session.snapshot().find(&result_id).cloned().ok_or(AppError::ImageNotFound)?;
    let bytes = image_bytes(&image).map_err(|e| AppError::Other(format!("corrupt image data: {e}")))?;
    let filename = download_filename(&image);

    entry.session.mark_downloaded([image.id.as_str()]);
    state.downloads.mark_downloaded(&image.id);
    tracing::info!("⬇️ Download {} as {}", image.id, filename);

    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        bytes,
    ).into_response())
}

#[derive(Debug, Deserialize)]
pub struct DownloadMany {
    pub scope: DownloadScope,
}

#[derive(Debug, Serialize)]
pub struct DownloadItem {
    pub id: String,
    pub filename: String,
    pub base64: String,
}

pub async fn download_many(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<DownloadMany>,
) -> Result<Json<Vec<DownloadItem>>, AppError> {
    let entry = state.session(id)?;
    let snapshot = entry.session.snapshot();
    let items: Vec<DownloadItem> = download_set(&snapshot, body.scope)
        .into_iter()
        .map(|img| DownloadItem { id: img.id.clone(), filename: download_filename(img), base64: img.base64.clone() })
        .collect();

    entry.session.mark_downloaded(items.iter().map(|i| i.id.as_str()));
    for item in &items {
        state.downloads.mark_downloaded(&item.id);
    }
    tracing::info!("⬇️ Bulk download of {} image(s) ({:?})", items.len(), body.scope);
    Ok(Json(items))
}

pub async fn clear_results(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, AppError> {
    let entry = state.session(id)?;
    entry.session.clear_results();
    Ok(Json(SessionView::of(&entry)))
}

pub async fn clear_error(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, AppError> {
    let entry = state.session(id)?;
    entry.session.clear_error();
    Ok(Json(SessionView::of(&entry)))
}
