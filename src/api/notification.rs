// src/api/notification.rs
use std::convert::Infallible;

use axum::{
    extract::Extension,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use sqlx::PgPool;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::api::auth::Claims;
use crate::db::queries::notification::*;
use crate::utils::api_response::ApiResponse;
use crate::utils::events::EventBus;

pub fn notification_routes() -> Router<PgPool> {
    Router::new()
        .route("/notifications", get(get_notifications))
        .route("/notifications/count", get(get_notification_count))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/stream", get(notification_stream))
        .route(
            "/notifications/{id}",
            axum::routing::patch(update_notification).delete(delete_notification),
        )
}

/// Server-sent change feed. Streams the caller's own events (new
/// notifications, role changes) so the client can refetch instead of
/// polling. Events for other users are filtered out server-side.
async fn notification_stream(
    Extension(claims): Extension<Claims>,
    Extension(event_bus): Extension<EventBus>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiResponse<()>> {
    let user_id = claims.user_id()?;
    debug!(%user_id, "change feed subscriber connected");

    let stream = BroadcastStream::new(event_bus.subscribe()).filter_map(move |event| {
        // Lagged receivers just drop the missed events; the client's next
        // refetch catches it up.
        let event = event.ok()?;
        if event.user_id != user_id {
            return None;
        }
        let data = serde_json::to_string(&event).ok()?;
        Some(Ok(Event::default().event("change").data(data)))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
