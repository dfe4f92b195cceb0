//! API route handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::AppError;
use super::AppContext;
use crate::error::Error;
use crate::queue::registry::{Task, TaskState};
use crate::validate;

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub source_key: String,
}

/// POST /api/videos/process — validate and enqueue a conversion.
pub async fn process_video(
    State(ctx): State<AppContext>,
    Json(req): Json<ProcessRequest>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    validate::validate_source_key(&req.source_key)?;

    let task = ctx.registry.insert(&req.source_key);
    ctx.admission.on_enqueue();

    if let Err(e) = ctx.workers.submit(task.id) {
        ctx.registry.update(task.id, |t| {
            t.state = TaskState::Failed;
            t.message = "Queue is full, try again later".into();
        });
        return Err(e.into());
    }

    tracing::info!(source_key = req.source_key, task_id = %task.id, "task enqueued");

    // Re-read so the response carries the freshly computed queue position.
    let task = ctx.registry.get(task.id).unwrap_or(task);
    Ok((StatusCode::ACCEPTED, Json(task)))
}

/// GET /api/videos/status/{id} — look up one task.
pub async fn task_status(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, AppError> {
    ctx.registry
        .get(id)
        .map(Json)
        .ok_or_else(|| Error::not_found("task", id).into())
}

#[derive(Debug, Deserialize)]
pub struct ByKeyParams {
    pub key: String,
}

/// GET /api/videos/by-key?key=… — most recent task for a source key.
pub async fn task_by_source_key(
    State(ctx): State<AppContext>,
    Query(params): Query<ByKeyParams>,
) -> Result<Json<Task>, AppError> {
    ctx.registry
        .get_by_source_key(&params.key)
        .map(Json)
        .ok_or_else(|| Error::not_found("task", &params.key).into())
}

#[derive(Debug, Serialize)]
pub struct QueueStatusResponse {
    pub active: usize,
    pub capacity: usize,
    pub queued: usize,
    pub tasks: Vec<Task>,
}

/// GET /api/videos/queue — slot usage and all known tasks, newest first.
pub async fn queue_status(State(ctx): State<AppContext>) -> Json<QueueStatusResponse> {
    Json(QueueStatusResponse {
        active: ctx.admission.active(),
        capacity: ctx.admission.capacity(),
        queued: ctx.registry.queued_count(),
        tasks: ctx.registry.snapshot(),
    })
}

#[derive(Debug, Serialize)]
pub struct FormatsResponse {
    pub supported_extensions: Vec<&'static str>,
}

/// GET /api/videos/formats — container formats accepted for submission.
pub async fn supported_formats() -> Json<FormatsResponse> {
    Json(FormatsResponse {
        supported_extensions: validate::SUPPORTED_EXTENSIONS.to_vec(),
    })
}
