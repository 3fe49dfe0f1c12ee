// src/db/queries/facility.rs
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
use crate::db::models::approval::{ApprovalDecision, ApprovalStatus};
use crate::db::models::facility::{FacilityBooking, NewFacilityBooking};
use crate::middleware::permissions::UserPermissions;
use crate::utils::api_response::ApiResponse;
use crate::utils::events::{ChangeEvent, EventBus};
use crate::utils::notification;

#[utoipa::path(
    post,
    path = "/facility-bookings",
    request_body = NewFacilityBooking,
    responses(
        (status = 201, description = "Facility booking submitted", body = FacilityBooking),
        (status = 404, description = "Facility not found or unavailable"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Failed to insert facility booking")
    ),
    tag = "Facilities",
    security(("bearerAuth" = []))
)]
pub async fn create_facility_booking(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(event_bus): Extension<EventBus>,
    Json(payload): Json<NewFacilityBooking>,
) -> Result<ApiResponse<FacilityBooking>, ApiResponse<()>> {
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

    let facility_available: Option<bool> =
        sqlx::query_scalar("SELECT is_available FROM facilities WHERE id = $1")
            .bind(payload.facility_id)
            .fetch_optional(&pool)
            .await
            .map_err(|e| {
                ApiResponse::<()>::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database query failed",
                    Some(json!({ "error": e.to_string() })),
                )
            })?;

    match facility_available {
        Some(true) => {}
        Some(false) => {
            return Err(ApiResponse::<()>::error(
                StatusCode::NOT_FOUND,
                "Facility is not available for booking",
                None,
            ))
        }
        None => {
            return Err(ApiResponse::<()>::error(
                StatusCode::NOT_FOUND,
                "Facility not found",
                None,
            ))
        }
    }

    let mut tx = pool.begin().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to start transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let booking: FacilityBooking = sqlx::query_as(
        r#"
        INSERT INTO facility_bookings (
            user_id, facility_id, booking_date, start_time, end_time, purpose, attendees
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(payload.facility_id)
    .bind(payload.booking_date)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(&payload.purpose)
    .bind(payload.attendees)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to insert facility booking",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let notification_id = notification::booking_submitted(user_id, "facility", "/bookings")
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
        "Facility booking submitted",
        booking,
    ))
}

#[utoipa::path(
    get,
    path = "/facility-bookings",
    responses(
        (status = 200, description = "Requester's own facility bookings", body = Vec<FacilityBooking>),
        (status = 500, description = "Failed to retrieve bookings")
    ),
    tag = "Facilities",
    security(("bearerAuth" = []))
)]
pub async fn get_my_facility_bookings(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<Vec<FacilityBooking>>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let bookings: Vec<FacilityBooking> = sqlx::query_as(
        "SELECT * FROM facility_bookings WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve bookings",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(StatusCode::OK, "Facility bookings", bookings))
}

#[utoipa::path(
    get,
    path = "/facility-bookings/pending",
    responses(
        (status = 200, description = "Pending facility bookings", body = Vec<FacilityBooking>),
        (status = 403, description = "Caller may not approve facility bookings"),
        (status = 500, description = "Failed to retrieve bookings")
    ),
    tag = "Facilities",
    security(("bearerAuth" = []))
)]
pub async fn get_pending_facility_bookings(
    State(pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
) -> Result<ApiResponse<Vec<FacilityBooking>>, ApiResponse<()>> {
    if !user_permissions.can_approve_facilities() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to review facility bookings",
            None,
        ));
    }

    let bookings: Vec<FacilityBooking> = sqlx::query_as(
        "SELECT * FROM facility_bookings WHERE status = 'pending' ORDER BY created_at DESC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve bookings",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Pending facility bookings",
        bookings,
    ))
}

#[utoipa::path(
    patch,
    path = "/facility-bookings/{booking_id}/decision",
    params(("booking_id" = Uuid, Path, description = "Facility booking ID")),
    request_body = ApprovalDecision,
    responses(
        (status = 200, description = "Decision recorded", body = FacilityBooking),
        (status = 403, description = "Caller may not approve facility bookings"),
        (status = 404, description = "Facility booking not found"),
        (status = 409, description = "Booking was already decided"),
        (status = 422, description = "Invalid decision payload")
    ),
    tag = "Facilities",
    security(("bearerAuth" = []))
)]
pub async fn decide_facility_booking(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(user_permissions): Extension<UserPermissions>,
    Extension(event_bus): Extension<EventBus>,
    Path(booking_id): Path<Uuid>,
    Json(decision): Json<ApprovalDecision>,
) -> Result<ApiResponse<FacilityBooking>, ApiResponse<()>> {
    let approver_id = claims.user_id()?;

    decision
        .validate()
        .map_err(|msg| ApiResponse::<()>::error(StatusCode::UNPROCESSABLE_ENTITY, msg, None))?;

    if !user_permissions.can_approve_facilities() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to approve facility bookings",
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

    let updated: Option<FacilityBooking> = sqlx::query_as(
        r#"
        UPDATE facility_bookings
        SET status = $1, club_manager_approval = $1, approved_by = $2,
            approval_notes = $3, updated_at = NOW()
        WHERE id = $4 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(decision.decision)
    .bind(approver_id)
    .bind(&decision.notes)
    .bind(booking_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update facility booking",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let Some(booking) = updated else {
        return Err(already_decided_or_missing(&pool, booking_id).await);
    };

    let notification_id = notification::booking_decided(
        booking.user_id,
        "facility",
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
        booking.user_id,
        notification_id,
    ));

    Ok(ApiResponse::success(StatusCode::OK, "Decision recorded", booking))
}

async fn already_decided_or_missing(pool: &PgPool, booking_id: Uuid) -> ApiResponse<()> {
    let lookup = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM facility_bookings WHERE id = $1)")
        .bind(booking_id)
        .fetch_one(pool)
        .await;
    classify_decision_miss(lookup)
}

fn classify_decision_miss(lookup: Result<bool, sqlx::Error>) -> ApiResponse<()> {
    match lookup {
        Ok(true) => ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Facility booking was already decided",
            None,
        ),
        Ok(false) => {
            ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Facility booking not found", None)
        }
        // A failed lookup is a storage error, not a missing row.
        Err(e) => ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database query failed",
            Some(json!({ "error": e.to_string() })),
        ),
    }
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        create_facility_booking,
        get_my_facility_bookings,
        get_pending_facility_bookings,
        decide_facility_booking
    ),
    components(schemas(FacilityBooking, NewFacilityBooking, ApprovalDecision, ApprovalStatus)),
    tags(
        (name = "Facilities", description = "Facility booking workflow")
    )
)]
pub struct FacilityBookingDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_existence_lookup_is_not_reported_as_missing() {
        assert_eq!(
            classify_decision_miss(Err(sqlx::Error::PoolTimedOut)).status_code,
            StatusCode::INTERNAL_SERVER_ERROR.as_u16()
        );
        assert_eq!(
            classify_decision_miss(Ok(true)).status_code,
            StatusCode::CONFLICT.as_u16()
        );
    }
}
