//! HTTP surface for promptdesk.
//!
//! This module exposes a compact Axum router:
//!
//! - `GET /capability` – Report whether the text-generation capability is usable.
//! - `POST /extract` – Run the address extraction pipeline over the supplied records (or the
//!   bundled sample customers) and return the updated records with a run report.
//! - `POST /posts` – Generate LinkedIn, Twitter and Instagram posts for a topic.
//! - `GET /notes` – List stored notes.
//! - `POST /notes` – Create or update a note.
//! - `DELETE /notes/:id` – Delete a note.
//! - `GET /metrics` – Pipeline counters.
//! - `GET /commands` – Machine-readable command catalog.

use crate::{
    capability::{LanguageModel, ModelError, UNAVAILABLE_MESSAGE, get_language_model},
    config::Config,
    extraction::{ExtractionPipeline, ExtractionReport, Record, sample_records},
    generation::{GenerationError, PostGenerator, SocialPosts},
    metrics::{MetricsSnapshot, PipelineMetrics},
    notes::{FileStorage, Note, NoteStore, StorageError},
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Shared state behind every route.
pub struct AppState {
    model: Arc<dyn LanguageModel>,
    extraction: ExtractionPipeline,
    extraction_run: Mutex<()>,
    generator: PostGenerator,
    notes: Mutex<NoteStore>,
    metrics: PipelineMetrics,
}

impl AppState {
    /// Assemble state from an explicit model and note store.
    pub fn new(model: Arc<dyn LanguageModel>, notes: NoteStore, throttle: Duration) -> Self {
        Self {
            extraction: ExtractionPipeline::new(model.clone()).with_throttle(throttle),
            extraction_run: Mutex::new(()),
            generator: PostGenerator::new(model.clone()),
            model,
            notes: Mutex::new(notes),
            metrics: PipelineMetrics::new(),
        }
    }

    /// Assemble state from runtime configuration.
    pub fn from_config(config: &Config) -> Result<Self, ModelError> {
        let model = get_language_model(config)?;
        let notes = NoteStore::new(FileStorage::new(&config.notes_dir));
        Ok(Self::new(
            model,
            notes,
            Duration::from_millis(config.extraction_throttle_ms),
        ))
    }
}

/// Build the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/capability", get(get_capability))
        .route("/extract", post(extract_addresses))
        .route("/posts", post(generate_posts))
        .route("/notes", get(list_notes).post(save_note))
        .route("/notes/:id", delete(delete_note))
        .route("/metrics", get(get_metrics))
        .route("/commands", get(get_commands))
        .with_state(state)
}

/// Response body for `GET /capability`.
#[derive(Serialize)]
struct CapabilityResponse {
    available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

async fn get_capability(State(state): State<Arc<AppState>>) -> Json<CapabilityResponse> {
    let available = state.model.is_available();
    Json(CapabilityResponse {
        available,
        message: (!available).then_some(UNAVAILABLE_MESSAGE),
    })
}

/// Request body for `POST /extract`.
#[derive(Deserialize)]
struct ExtractRequest {
    /// Records to process; the sample customers are used when omitted.
    #[serde(default)]
    records: Option<Vec<Record>>,
}

/// Response body for `POST /extract`.
#[derive(Serialize)]
struct ExtractResponse {
    records: Vec<Record>,
    report: ExtractionReport,
}

/// Run extraction over the supplied records.
///
/// Per-record failures do not fail the request; they are reported in `report.last_error`
/// while the remaining records are still processed. Concurrent requests queue so only one
/// run talks to the model at a time.
async fn extract_addresses(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExtractRequest>,
) -> Result<Json<ExtractResponse>, AppError> {
    let mut records = request.records.unwrap_or_else(sample_records);
    let _run = state.extraction_run.lock().await;
    let report = state.extraction.run(&mut records).await?;
    state.metrics.record_extraction(&report);
    Ok(Json(ExtractResponse { records, report }))
}

/// Request body for `POST /posts`.
#[derive(Deserialize)]
struct PostsRequest {
    topic: String,
}

async fn generate_posts(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PostsRequest>,
) -> Result<Json<SocialPosts>, AppError> {
    match state.generator.generate(&request.topic).await {
        Ok(posts) => {
            state.metrics.record_generation(true);
            Ok(Json(posts))
        }
        Err(GenerationError::EmptyTopic) => Err(AppError::from(GenerationError::EmptyTopic)),
        Err(error) => {
            state.metrics.record_generation(false);
            Err(error.into())
        }
    }
}

/// Response body for `GET /notes`: the stored array as-is.
#[derive(Serialize)]
struct NotesResponse {
    notes: Vec<Value>,
}

/// Run a note store operation on the blocking pool; storage does synchronous file I/O.
async fn with_notes<T, F>(state: &Arc<AppState>, op: F) -> Result<T, AppError>
where
    F: FnOnce(&NoteStore) -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    let result = tokio::task::spawn_blocking(move || {
        let store = state.notes.blocking_lock();
        op(&*store)
    })
    .await
    .map_err(|error| AppError::Internal(format!("note storage task failed: {error}")))?;
    Ok(result?)
}

async fn list_notes(State(state): State<Arc<AppState>>) -> Result<Json<NotesResponse>, AppError> {
    let notes = with_notes(&state, NoteStore::list_raw).await?;
    Ok(Json(NotesResponse { notes }))
}

async fn save_note(
    State(state): State<Arc<AppState>>,
    Json(note): Json<Note>,
) -> Result<Json<Note>, AppError> {
    if note.is_blank() {
        return Err(AppError::BadRequest(
            "A note needs a title or content".into(),
        ));
    }
    let saved = with_notes(&state, move |store| store.upsert(note)).await?;
    tracing::info!(id = ?saved.id, "Note saved");
    Ok(Json(saved))
}

async fn delete_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let target = id.clone();
    with_notes(&state, move |store| store.delete(&target)).await?;
    tracing::info!(id = %id, "Note deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "capability",
                method: "GET",
                path: "/capability",
                description: "Report whether text generation is available in this environment.",
                request_example: None,
            },
            CommandDescriptor {
                name: "extract",
                method: "POST",
                path: "/extract",
                description: "Extract city, state and PIN code from each record's address, one record at a time. Omit `records` to process the sample customers.",
                request_example: Some(json!({
                    "records": [{
                        "id": "1",
                        "firstName": "Rajesh",
                        "lastName": "Kumar",
                        "address": "Flat 302, Sunrise Apartments, Sector 5, Noida, Uttar Pradesh 201301"
                    }]
                })),
            },
            CommandDescriptor {
                name: "posts",
                method: "POST",
                path: "/posts",
                description: "Generate LinkedIn, Twitter and Instagram posts for a topic. Empty fields mean the section was not produced.",
                request_example: Some(json!({ "topic": "Our AI workshop next week" })),
            },
            CommandDescriptor {
                name: "list_notes",
                method: "GET",
                path: "/notes",
                description: "List stored notes.",
                request_example: None,
            },
            CommandDescriptor {
                name: "save_note",
                method: "POST",
                path: "/notes",
                description: "Create a note (omit `id`) or update one (include its `id`).",
                request_example: Some(json!({ "title": "Standup", "content": "Shipped the parser" })),
            },
            CommandDescriptor {
                name: "delete_note",
                method: "DELETE",
                path: "/notes/{id}",
                description: "Delete a note by id; unknown ids are ignored.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return pipeline counters.",
                request_example: None,
            },
        ],
    })
}

enum AppError {
    Model(ModelError),
    Generation(GenerationError),
    Storage(StorageError),
    BadRequest(String),
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Generation(GenerationError::EmptyTopic) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Model(ModelError::Unavailable)
            | AppError::Generation(GenerationError::Model(ModelError::Unavailable)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Model(_) | AppError::Generation(_) => StatusCode::BAD_GATEWAY,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Model(error) => error.to_string(),
            AppError::Generation(error) => error.to_string(),
            AppError::Storage(error) => error.to_string(),
            AppError::BadRequest(message) | AppError::Internal(message) => message.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            tracing::warn!(status = %status, error = %message, "Request failed");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ModelError> for AppError {
    fn from(inner: ModelError) -> Self {
        Self::Model(inner)
    }
}

impl From<GenerationError> for AppError {
    fn from(inner: GenerationError) -> Self {
        Self::Generation(inner)
    }
}

impl From<StorageError> for AppError {
    fn from(inner: StorageError) -> Self {
        Self::Storage(inner)
    }
}
