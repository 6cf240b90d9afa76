//! HTTP handlers.
//!
//! Handlers translate store/pipeline errors into status codes via the
//! errors' own `status_code()` mappings and return JSON bodies throughout.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use listmill_core::GroupStatus;
use listmill_ingest::{enqueue_ingestion, IngestError};

use crate::groups::{CreateGroup, GroupStore, GroupStoreError};
use crate::state::AppState;

fn error_response(status: u16, message: String) -> Response {
    let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, Json(json!({ "error": message }))).into_response()
}

fn group_error(e: GroupStoreError) -> Response {
    error_response(e.status_code(), e.to_string())
}

fn ingest_error(e: IngestError) -> Response {
    let status = match &e {
        IngestError::Store(s) => s.status_code(),
        IngestError::Queue(_) => 503,
    };
    error_response(status, e.to_string())
}

// ── Health ───────────────────────────────────────────────────────────

pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let database = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .is_ok();

    let queue = state.consumer.health_check().await.ok();
    let dead_letter_depth = state
        .consumer
        .dead_letter_depth()
        .await
        .ok()
        .flatten();

    let healthy = database && queue.as_ref().map(|q| q.connected).unwrap_or(false);
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "ok" } else { "degraded" },
            "database": database,
            "queue": queue,
            "dead_letter_depth": dead_letter_depth,
        })),
    )
        .into_response()
}

// ── Group CRUD ───────────────────────────────────────────────────────

/// Request body for creating a group. An initial `raw_emails` list starts
/// ingestion immediately, saving the client a second request.
#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub region: String,
    pub mail_merge_data: Option<serde_json::Value>,
    pub raw_emails: Option<Vec<String>>,
}

pub async fn create_group(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateGroupRequest>,
) -> Response {
    let raw_emails = req.raw_emails;
    let group = match GroupStore::create(
        &state.pool,
        CreateGroup {
            name: req.name,
            region: req.region,
            mail_merge_data: req.mail_merge_data,
        },
    )
    .await
    {
        Ok(group) => group,
        Err(e) => return group_error(e),
    };

    if let Some(raw) = raw_emails.filter(|r| !r.is_empty()) {
        if let Err(e) = enqueue_ingestion(
            state.producer.as_ref(),
            state.group_status.as_ref(),
            &state.progress,
            group.id,
            raw,
        )
        .await
        {
            return ingest_error(e);
        }
        // Re-read so the response carries the `waiting` status.
        let group = GroupStore::get(&state.pool, group.id).await.unwrap_or(group);
        return (StatusCode::CREATED, Json(group)).into_response();
    }

    (StatusCode::CREATED, Json(group)).into_response()
}

pub async fn list_groups(State(state): State<Arc<AppState>>) -> Response {
    match GroupStore::list(&state.pool).await {
        Ok(groups) => Json(groups).into_response(),
        Err(e) => group_error(e),
    }
}

pub async fn get_group(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match GroupStore::get(&state.pool, id).await {
        Ok(group) => Json(group).into_response(),
        Err(e) => group_error(e),
    }
}

pub async fn delete_group(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match GroupStore::delete(&state.pool, id).await {
        Ok(()) => {
            // Keep the progress map bounded by live groups.
            state.progress.clear(id);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => group_error(e),
    }
}

// ── Ingestion ────────────────────────────────────────────────────────

/// Request body for the "add emails" endpoint: the raw candidate list as
/// extracted from the uploaded file, untouched.
#[derive(Debug, Deserialize)]
pub struct AddEmails {
    pub raw_emails: Vec<String>,
}

pub async fn add_emails(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddEmails>,
) -> Response {
    let submitted = req.raw_emails.len();
    match enqueue_ingestion(
        state.producer.as_ref(),
        state.group_status.as_ref(),
        &state.progress,
        id,
        req.raw_emails,
    )
    .await
    {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "group_id": id,
                "status": GroupStatus::Waiting,
                "submitted": submitted,
            })),
        )
            .into_response(),
        Err(e) => ingest_error(e),
    }
}

pub async fn group_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    let group = match GroupStore::get(&state.pool, id).await {
        Ok(group) => group,
        Err(e) => return group_error(e),
    };

    // A completed group is 100% regardless of what was last reported; the
    // in-memory map starts over empty on restart.
    let percent = match group.status() {
        GroupStatus::Completed => 100,
        _ => state.progress.get(id),
    };

    Json(json!({
        "group_id": id,
        "status": group.status(),
        "progress": percent,
        "address_count": group.address_count,
    }))
    .into_response()
}
