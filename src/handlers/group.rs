//! Group handlers
//!
//! JSON endpoints under /items. Status codes are decided by [`AppError`].

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;

use crate::entity::group;
use crate::error::AppResult;
use crate::service::{GroupId, GroupInput};
use crate::state::AppState;

/// Delete confirmation
#[derive(Debug, Serialize)]
pub struct DeleteGroupResponse {
    pub message: String,
    pub group: group::Model,
}

/// GET /items
pub async fn list_groups(State(state): State<AppState>) -> AppResult<Json<Vec<group::Model>>> {
    let groups = state.groups.list().await?;
    Ok(Json(groups))
}

/// GET /items/:id
pub async fn get_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<group::Model>> {
    let group = state.groups.get(&GroupId::new(id)).await?;
    Ok(Json(group))
}

/// POST /items
pub async fn create_group(
    State(state): State<AppState>,
    payload: Result<Json<GroupInput>, JsonRejection>,
) -> AppResult<(StatusCode, Json<group::Model>)> {
    let Json(input) = payload?;
    let group = state.groups.create(input).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// PUT /items/:id
pub async fn update_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<GroupInput>, JsonRejection>,
) -> AppResult<Json<group::Model>> {
    let Json(input) = payload?;
    let group = state.groups.update(&GroupId::new(id), input).await?;
    Ok(Json(group))
}

/// DELETE /items/:id
pub async fn delete_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DeleteGroupResponse>> {
    let group = state.groups.delete(&GroupId::new(id)).await?;
    Ok(Json(DeleteGroupResponse {
        message: "Group deleted successfully".to_string(),
        group,
    }))
}
