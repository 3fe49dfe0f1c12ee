// src/db/queries/accommodation.rs
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::api::auth::Claims;
use crate::db::models::accommodation::{AccommodationRequest, NewAccommodationRequest};
use crate::db::models::approval::{ApprovalDecision, ApprovalStatus};
use crate::middleware::permissions::UserPermissions;
use crate::utils::api_response::ApiResponse;
use crate::utils::events::{ChangeEvent, EventBus};
use crate::utils::notification;

#[utoipa::path(
    post,
    path = "/accommodation-requests",
    request_body = NewAccommodationRequest,
    responses(
        (status = 201, description = "Accommodation request submitted", body = AccommodationRequest),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Failed to insert accommodation request")
    ),
    tag = "Accommodation",
    security(("bearerAuth" = []))
)]
pub async fn create_accommodation_request(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(event_bus): Extension<EventBus>,
    Json(payload): Json<NewAccommodationRequest>,
) -> Result<ApiResponse<AccommodationRequest>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    payload
        .validate(Utc::now().date_naive())
        .map_err(|errors| {
            ApiResponse::<()>::error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation failed",
                Some(errors.to_json()),
            )
        })?;

    let mut tx = pool.begin().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to start transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let request: AccommodationRequest = sqlx::query_as(
        r#"
        INSERT INTO accommodation_requests (
            user_id, guest_name, guest_address, check_in_date, check_in_time,
            check_out_date, check_out_time, purpose_of_visit, guests,
            billing_to, room_type_preference, special_requests
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&payload.guest_name)
    .bind(&payload.guest_address)
    .bind(payload.check_in_date)
    .bind(payload.check_in_time)
    .bind(payload.check_out_date)
    .bind(payload.check_out_time)
    .bind(&payload.purpose_of_visit)
    .bind(payload.guests)
    .bind(payload.billing_to)
    .bind(&payload.room_type_preference)
    .bind(&payload.special_requests)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to insert accommodation request",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    // Confirmation lands in the same transaction as the insert.
    let notification_id = notification::booking_submitted(user_id, "accommodation", "/bookings")
        .send_tx(&mut tx)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create notification",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    tx.commit().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to commit transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    event_bus.publish(ChangeEvent::notification_created(user_id, notification_id));

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Accommodation request submitted",
        request,
    ))
}

#[utoipa::path(
    get,
    path = "/accommodation-requests",
    responses(
        (status = 200, description = "Requester's own accommodation requests", body = Vec<AccommodationRequest>),
        (status = 500, description = "Failed to retrieve requests")
    ),
    tag = "Accommodation",
    security(("bearerAuth" = []))
)]
pub async fn get_my_accommodation_requests(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<Vec<AccommodationRequest>>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let requests: Vec<AccommodationRequest> = sqlx::query_as(
        "SELECT * FROM accommodation_requests WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve requests",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Accommodation requests",
        requests,
    ))
}

/// The pending queue is just the live set of undecided rows, recomputed on
/// each fetch.
#[utoipa::path(
    get,
    path = "/accommodation-requests/pending",
    responses(
        (status = 200, description = "Pending accommodation requests", body = Vec<AccommodationRequest>),
        (status = 403, description = "Caller may not approve accommodation requests"),
        (status = 500, description = "Failed to retrieve requests")
    ),
    tag = "Accommodation",
    security(("bearerAuth" = []))
)]
pub async fn get_pending_accommodation_requests(
    State(pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
) -> Result<ApiResponse<Vec<AccommodationRequest>>, ApiResponse<()>> {
    if !user_permissions.can_approve_guest_rooms() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to review accommodation requests",
            None,
        ));
    }

    let requests: Vec<AccommodationRequest> = sqlx::query_as(
        "SELECT * FROM accommodation_requests WHERE status = 'pending' ORDER BY created_at DESC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve requests",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Pending accommodation requests",
        requests,
    ))
}

#[utoipa::path(
    get,
    path = "/accommodation-requests/{request_id}",
    params(("request_id" = Uuid, Path, description = "Accommodation request ID")),
    responses(
        (status = 200, description = "Accommodation request retrieved", body = AccommodationRequest),
        (status = 403, description = "Not the requester or an approver"),
        (status = 404, description = "Accommodation request not found")
    ),
    tag = "Accommodation",
    security(("bearerAuth" = []))
)]
pub async fn get_accommodation_request(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(user_permissions): Extension<UserPermissions>,
    Path(request_id): Path<Uuid>,
) -> Result<ApiResponse<AccommodationRequest>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let request: AccommodationRequest =
        sqlx::query_as("SELECT * FROM accommodation_requests WHERE id = $1")
            .bind(request_id)
            .fetch_optional(&pool)
            .await
            .map_err(|e| {
                ApiResponse::<()>::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database query failed",
                    Some(json!({ "error": e.to_string() })),
                )
            })?
            .ok_or_else(|| {
                ApiResponse::<()>::error(
                    StatusCode::NOT_FOUND,
                    "Accommodation request not found",
                    None,
                )
            })?;

    if request.user_id != user_id && !user_permissions.can_approve_guest_rooms() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to view this request",
            None,
        ));
    }

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Accommodation request retrieved",
        request,
    ))
}

#[utoipa::path(
    patch,
    path = "/accommodation-requests/{request_id}/decision",
    params(("request_id" = Uuid, Path, description = "Accommodation request ID")),
    request_body = ApprovalDecision,
    responses(
        (status = 200, description = "Decision recorded", body = AccommodationRequest),
        (status = 403, description = "Caller may not approve accommodation requests"),
        (status = 404, description = "Accommodation request not found"),
        (status = 409, description = "Request was already decided"),
        (status = 422, description = "Invalid decision payload")
    ),
    tag = "Accommodation",
    security(("bearerAuth" = []))
)]
pub async fn decide_accommodation_request(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(user_permissions): Extension<UserPermissions>,
    Extension(event_bus): Extension<EventBus>,
    Path(request_id): Path<Uuid>,
    Json(decision): Json<ApprovalDecision>,
) -> Result<ApiResponse<AccommodationRequest>, ApiResponse<()>> {
    let approver_id = claims.user_id()?;

    decision.validate().map_err(|msg| {
        ApiResponse::<()>::error(StatusCode::UNPROCESSABLE_ENTITY, msg, None)
    })?;

    if !user_permissions.can_approve_guest_rooms() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to approve accommodation requests",
            None,
        ));
    }

    let mut tx = pool.begin().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to start transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    // Conditional update: only a still-pending row transitions, so racing
    // approvers produce exactly one final status and one notification.
    let updated: Option<AccommodationRequest> = sqlx::query_as(
        r#"
        UPDATE accommodation_requests
        SET status = $1, hr_approval = $1, approved_by = $2,
            approval_notes = $3, updated_at = NOW()
        WHERE id = $4 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(decision.decision)
    .bind(approver_id)
    .bind(&decision.notes)
    .bind(request_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update accommodation request",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let Some(request) = updated else {
        return Err(already_decided_or_missing(&pool, request_id).await);
    };

    let notification_id = notification::booking_decided(
        request.user_id,
        "accommodation",
        decision.decision,
        decision.notes.as_deref(),
        "/bookings",
    )
    .send_tx(&mut tx)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create notification",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    tx.commit().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to commit transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    event_bus.publish(ChangeEvent::notification_created(
        request.user_id,
        notification_id,
    ));

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Decision recorded",
        request,
    ))
}

/// Distinguish "never existed" from "someone decided it first".
async fn already_decided_or_missing(pool: &PgPool, request_id: Uuid) -> ApiResponse<()> {
    let lookup = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM accommodation_requests WHERE id = $1)",
    )
    .bind(request_id)
    .fetch_one(pool)
    .await;
    classify_decision_miss(lookup)
}

fn classify_decision_miss(lookup: Result<bool, sqlx::Error>) -> ApiResponse<()> {
    match lookup {
        Ok(true) => ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Accommodation request was already decided",
            None,
        ),
        Ok(false) => {
            ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Accommodation request not found", None)
        }
        // A failed lookup is a storage error, not a missing row.
        Err(e) => ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database query failed",
            Some(json!({ "error": e.to_string() })),
        ),
    }
}

use crate::db::models::accommodation::BillingTarget;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        create_accommodation_request,
        get_my_accommodation_requests,
        get_pending_accommodation_requests,
        get_accommodation_request,
        decide_accommodation_request
    ),
    components(schemas(
        AccommodationRequest,
        NewAccommodationRequest,
        ApprovalDecision,
        ApprovalStatus,
        BillingTarget
    )),
    tags(
        (name = "Accommodation", description = "Accommodation request workflow")
    )
)]
pub struct AccommodationDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_miss_maps_to_conflict_missing_or_storage_error() {
        assert_eq!(
            classify_decision_miss(Ok(true)).status_code,
            StatusCode::CONFLICT.as_u16()
        );
        assert_eq!(
            classify_decision_miss(Ok(false)).status_code,
            StatusCode::NOT_FOUND.as_u16()
        );
        assert_eq!(
            classify_decision_miss(Err(sqlx::Error::PoolTimedOut)).status_code,
            StatusCode::INTERNAL_SERVER_ERROR.as_u16()
        );
    }
}
