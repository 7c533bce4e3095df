//! REST API layer: route handlers, DTOs, OpenAPI document and router
//! composition.
//!
//! Inspection endpoints are mounted under `/api/v1`; `/health` sits at the
//! root.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "chat-relay",
        description = "Inspection API of the chat relay. Chat traffic itself flows over `GET /ws`."
    ),
    paths(
        handlers::system::health_handler,
        handlers::room::list_rooms,
        handlers::room::get_room,
        handlers::room::get_room_messages,
    ),
    components(schemas(
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
        dto::PaginationMeta,
        dto::RoomSummaryDto,
        dto::RoomListResponse,
        dto::MemberDto,
        dto::RoomDetailResponse,
        dto::MessageDto,
        dto::RoomMessagesResponse,
        handlers::system::HealthResponse,
    )),
    tags(
        (name = "System", description = "Service health"),
        (name = "Rooms", description = "Read-only room inspection"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/v1/rooms",
            "/api/v1/rooms/{room_id}",
            "/api/v1/rooms/{room_id}/messages",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
