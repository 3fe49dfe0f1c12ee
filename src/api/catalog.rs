// src/api/catalog.rs
use axum::{
    routing::{get, put},
    Router,
};
use sqlx::PgPool;

use crate::db::queries::catalog::*;

pub fn catalog_routes() -> Router<PgPool> {
    Router::new()
        .route("/accommodations", get(get_accommodations).post(create_accommodation))
        .route(
            "/accommodations/{id}",
            axum::routing::patch(update_accommodation).delete(delete_accommodation),
        )
        .route(
            "/accommodations/{id}/availability",
            put(set_accommodation_availability),
        )
        .route("/facilities", get(get_facilities).post(create_facility))
        .route(
            "/facilities/{id}",
            axum::routing::patch(update_facility).delete(delete_facility),
        )
        .route("/menu-items", get(get_menu_items).post(create_menu_item))
        .route(
            "/menu-items/{id}",
            axum::routing::patch(update_menu_item).delete(delete_menu_item),
        )
}
