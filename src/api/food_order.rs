// src/api/food_order.rs
use axum::{
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;

use crate::db::queries::food_order::*;

pub fn food_order_routes() -> Router<PgPool> {
    Router::new()
        .route("/food-orders", post(create_food_order).get(get_my_food_orders))
        .route("/food-orders/pending", get(get_pending_food_orders))
        .route("/food-orders/{order_id}/decision", patch(decide_food_order))
        .route("/food-orders/{order_id}/status", patch(update_order_status))
}
