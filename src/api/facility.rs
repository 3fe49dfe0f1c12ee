// src/api/facility.rs
use axum::{
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;

use crate::db::queries::facility::*;

pub fn facility_routes() -> Router<PgPool> {
    Router::new()
        .route(
            "/facility-bookings",
            post(create_facility_booking).get(get_my_facility_bookings),
        )
        .route(
            "/facility-bookings/pending",
            get(get_pending_facility_bookings),
        )
        .route(
            "/facility-bookings/{booking_id}/decision",
            patch(decide_facility_booking),
        )
}
