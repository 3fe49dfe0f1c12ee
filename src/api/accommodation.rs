// src/api/accommodation.rs
use axum::{
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;

use crate::db::queries::accommodation::*;

pub fn accommodation_routes() -> Router<PgPool> {
    Router::new()
        .route(
            "/accommodation-requests",
            post(create_accommodation_request).get(get_my_accommodation_requests),
        )
        .route(
            "/accommodation-requests/pending",
            get(get_pending_accommodation_requests),
        )
        .route(
            "/accommodation-requests/{request_id}",
            get(get_accommodation_request),
        )
        .route(
            "/accommodation-requests/{request_id}/decision",
            patch(decide_accommodation_request),
        )
}
