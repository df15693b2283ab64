use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::approval::{self, ApprovalError, EntityKind, ModeratedRow};
use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::models::ContentStatus;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ApproveAllResponse {
    count: usize,
    message: String,
}

/// `POST /admin/{clubs,events}/approve-all`
pub async fn approve_all_handler(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    Extension(AdminUser(admin)): Extension<AdminUser>,
) -> Result<Json<ApproveAllResponse>, ApiError> {
    let count = state
        .database
        .run(move |connection| approval::approve_all(connection, kind))
        .await
        .map_err(|e| ApiError::internal("Failed to approve items.", e))?;

    log::info!("{} approved {} pending {}.", admin.email, count, kind.plural());

    let message = if count == 0 {
        format!("No pending {} to approve.", kind.plural())
    } else {
        format!("Approved {} {}.", count, kind.plural())
    };

    Ok(Json(ApproveAllResponse { count, message }))
}

#[derive(Deserialize)]
pub struct SetStatusInput {
    status: String,
}

#[derive(Serialize)]
pub struct SetStatusResponse {
    item: ModeratedRow,
}

/// `PATCH /admin/{clubs,events}/:id/status`
pub async fn set_status_handler(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    Extension(AdminUser(admin)): Extension<AdminUser>,
    id: Result<Path<i32>, PathRejection>,
    input: Result<Json<SetStatusInput>, JsonRejection>,
) -> Result<Json<SetStatusResponse>, ApiError> {
    let Path(id) = id.map_err(|_| ApiError::BadRequest("id must be an integer.".into()))?;
    let Json(SetStatusInput { status }) =
        input.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let item = state
        .database
        .run(move |connection| approval::set_status(connection, kind, id, &status))
        .await
        .map_err(|err| match err {
            ApprovalError::InvalidStatus(_) => ApiError::BadRequest(err.to_string()),
            ApprovalError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            ApprovalError::Store(e) => ApiError::internal("Failed to update status.", e),
        })?;

    log::info!("{} set {} {} to {}.", admin.email, kind, id, item.status());

    Ok(Json(SetStatusResponse { item }))
}

#[derive(Serialize)]
pub struct ListItemsResponse {
    items: Vec<ModeratedRow>,
}

/// `GET /admin/{clubs,events}/pending`
pub async fn pending_handler(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
) -> Result<Json<ListItemsResponse>, ApiError> {
    list_items(&state, kind, ContentStatus::Pending).await
}

/// `GET /clubs` and `GET /events`. Only approved rows are public.
pub async fn list_approved_handler(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
) -> Result<Json<ListItemsResponse>, ApiError> {
    list_items(&state, kind, ContentStatus::Approved).await
}

async fn list_items(
    state: &AppState,
    kind: EntityKind,
    status: ContentStatus,
) -> Result<Json<ListItemsResponse>, ApiError> {
    let items = state
        .database
        .run(move |connection| approval::list_with_status(connection, kind, status))
        .await
        .map_err(|e| ApiError::internal("Failed to fetch items.", e))?;

    Ok(Json(ListItemsResponse { items }))
}
