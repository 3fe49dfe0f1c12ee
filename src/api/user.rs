// src/api/user.rs
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use sqlx::PgPool;

use crate::db::queries::user::*;

pub fn user_routes() -> Router<PgPool> {
    Router::new()
        .route("/users", get(get_all_users))
        .route("/users/me", get(get_me))
        .route("/users/me", put(update_me))
        .route("/users/pending", get(get_pending_accounts))
        .route("/roles", get(get_available_roles))
        .route("/users/{user_id}/account-decision", post(decide_account))
        .route("/users/{user_id}/roles", get(get_user_roles))
        .route("/users/{user_id}/role", post(assign_role))
        .route("/users/{user_id}/roles/{role}", delete(remove_role))
}
