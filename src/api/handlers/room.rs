//! Read-only room inspection handlers: list, detail, history.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{
    MessageDto, PaginationParams, RoomDetailResponse, RoomListResponse, RoomMessagesResponse,
    RoomSummaryDto,
};
use crate::app_state::AppState;
use crate::domain::{Room, RoomId};
use crate::error::{ErrorResponse, RelayError};

/// `GET /rooms` — List live rooms with pagination.
///
/// # Errors
///
/// Returns [`RelayError`] on internal failures.
#[utoipa::path(
    get,
    path = "/api/v1/rooms",
    tag = "Rooms",
    summary = "List rooms",
    description = "Returns a paginated list of live rooms ordered by id.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated room list", body = RoomListResponse),
    )
)]
pub async fn list_rooms(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, RelayError> {
    let rooms = state.registry.list().await;
    let (page, pagination) = params.paginate(rooms);

    let mut data = Vec::with_capacity(page.len());
    for room in page {
        data.push(RoomSummaryDto {
            room_id: room.id().to_string(),
            member_count: room.member_count().await,
            last_seq: room.last_seq().await,
            created_at: room.created_at(),
        });
    }

    Ok(Json(RoomListResponse { data, pagination }))
}

/// `GET /rooms/{room_id}` — Room members and sequencing state.
///
/// # Errors
///
/// Returns [`RelayError::Join`] for a malformed id and
/// [`RelayError::RoomNotFound`] if no such room is live.
#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}",
    tag = "Rooms",
    summary = "Get room details",
    description = "Returns the member list, capacity and latest sequence number of a live room.",
    params(
        ("room_id" = String, Path, description = "Room identifier"),
    ),
    responses(
        (status = 200, description = "Room details", body = RoomDetailResponse),
        (status = 400, description = "Malformed room id", body = ErrorResponse),
        (status = 404, description = "Room not found", body = ErrorResponse),
    )
)]
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, RelayError> {
    let room = lookup(&state, &room_id).await?;
    let snapshot = room.snapshot().await;
    Ok(Json(RoomDetailResponse::from(&snapshot)))
}

/// `GET /rooms/{room_id}/messages` — Replay buffer of a room.
///
/// # Errors
///
/// Same as [`get_room`].
#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}/messages",
    tag = "Rooms",
    summary = "Get room history",
    description = "Returns the messages a late joiner would be replayed, oldest first.",
    params(
        ("room_id" = String, Path, description = "Room identifier"),
    ),
    responses(
        (status = 200, description = "Room history", body = RoomMessagesResponse),
        (status = 400, description = "Malformed room id", body = ErrorResponse),
        (status = 404, description = "Room not found", body = ErrorResponse),
    )
)]
pub async fn get_room_messages(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, RelayError> {
    let room = lookup(&state, &room_id).await?;
    let snapshot = room.snapshot().await;
    Ok(Json(RoomMessagesResponse {
        room_id: snapshot.room_id.to_string(),
        data: snapshot
            .history
            .iter()
            .map(|msg| MessageDto::from(msg.as_ref()))
            .collect(),
    }))
}

async fn lookup(state: &AppState, raw: &str) -> Result<Arc<Room>, RelayError> {
    let room_id = RoomId::parse(raw)?;
    state
        .registry
        .get(&room_id)
        .await
        .ok_or_else(|| RelayError::RoomNotFound(room_id.to_string()))
}

/// Room routes, mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/rooms/{room_id}", get(get_room))
        .route("/rooms/{room_id}/messages", get(get_room_messages))
}
