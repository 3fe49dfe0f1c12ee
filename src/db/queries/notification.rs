// src/db/queries/notification.rs
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::api::auth::Claims;
use crate::db::models::notification::{
    Notification, NotificationCountResponse, NotificationFilter, UpdateNotification,
};
use crate::utils::api_response::ApiResponse;

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 200;

fn db_error(e: sqlx::Error) -> ApiResponse<()> {
    ApiResponse::<()>::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Database query failed",
        Some(json!({ "error": e.to_string() })),
    )
}

#[utoipa::path(
    get,
    path = "/notifications",
    params(NotificationFilter),
    responses((status = 200, description = "Caller's notifications, newest first", body = Vec<Notification>)),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn get_notifications(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<NotificationFilter>,
) -> Result<ApiResponse<Vec<Notification>>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let limit = filter.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = filter.offset.unwrap_or(0);
    let unread_only = filter.unread_only.unwrap_or(false);

    let notifications: Vec<Notification> = sqlx::query_as(
        r#"
        SELECT * FROM notifications
        WHERE user_id = $1 AND (NOT $2 OR is_read = FALSE)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(user_id)
    .bind(unread_only)
    .bind(i64::from(limit))
    .bind(i64::from(offset))
    .fetch_all(&pool)
    .await
    .map_err(db_error)?;

    Ok(ApiResponse::success(StatusCode::OK, "Notifications", notifications))
}

#[utoipa::path(
    get,
    path = "/notifications/count",
    responses((status = 200, description = "Total and unread counts", body = NotificationCountResponse)),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn get_notification_count(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<NotificationCountResponse>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let (total, unread): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COUNT(*) FILTER (WHERE is_read = FALSE)
        FROM notifications
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(&pool)
    .await
    .map_err(db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Notification counts",
        NotificationCountResponse { total, unread },
    ))
}

#[utoipa::path(
    patch,
    path = "/notifications/{id}",
    params(("id" = Uuid, Path, description = "Notification ID")),
    request_body = UpdateNotification,
    responses(
        (status = 200, description = "Notification updated", body = Notification),
        (status = 404, description = "Notification not found")
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn update_notification(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateNotification>,
) -> Result<ApiResponse<Notification>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    // Ownership is part of the predicate: another user's notification
    // reads as missing, not forbidden.
    let notification: Notification = sqlx::query_as(
        "UPDATE notifications SET is_read = $1 WHERE id = $2 AND user_id = $3 RETURNING *",
    )
    .bind(payload.is_read)
    .bind(id)
    .bind(user_id)
    .fetch_optional(&pool)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Notification not found", None))?;

    Ok(ApiResponse::success(StatusCode::OK, "Notification updated", notification))
}

#[utoipa::path(
    post,
    path = "/notifications/read-all",
    responses((status = 200, description = "All notifications marked read")),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn mark_all_read(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<u64>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let result =
        sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE")
            .bind(user_id)
            .execute(&pool)
            .await
            .map_err(db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "All notifications marked read",
        result.rows_affected(),
    ))
}

#[utoipa::path(
    delete,
    path = "/notifications/{id}",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification deleted"),
        (status = 404, description = "Notification not found")
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn delete_notification(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(&pool)
        .await
        .map_err(db_error)?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "Notification not found",
            None,
        ));
    }

    Ok(ApiResponse::success(StatusCode::OK, "Notification deleted", ()))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        get_notifications,
        get_notification_count,
        update_notification,
        mark_all_read,
        delete_notification
    ),
    components(schemas(Notification, UpdateNotification, NotificationCountResponse)),
    tags(
        (name = "Notifications", description = "Per-user notification feed")
    )
)]
pub struct NotificationDoc;
