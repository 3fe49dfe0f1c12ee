// src/db/queries/food_order.rs
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
use crate::db::models::food_order::{
    FoodOrder, FoodOrderItem, FoodOrderWithItems, MealType, NewFoodOrder, OrderStatus,
    OrderStatusUpdate,
};
use crate::middleware::permissions::UserPermissions;
use crate::utils::api_response::ApiResponse;
use crate::utils::events::{ChangeEvent, EventBus};
use crate::utils::notification;

#[utoipa::path(
    post,
    path = "/food-orders",
    request_body = NewFoodOrder,
    responses(
        (status = 201, description = "Food order submitted", body = FoodOrderWithItems),
        (status = 404, description = "Menu item not found or unavailable"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Failed to insert food order")
    ),
    tag = "Food Orders",
    security(("bearerAuth" = []))
)]
pub async fn create_food_order(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(event_bus): Extension<EventBus>,
    Json(payload): Json<NewFoodOrder>,
) -> Result<ApiResponse<FoodOrderWithItems>, ApiResponse<()>> {
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

    // Unit prices come from the menu, never from the client.
    let mut priced_items: Vec<(Uuid, i32, f64, Option<String>)> = Vec::new();
    for item in &payload.items {
        let price: Option<f64> = sqlx::query_scalar(
            "SELECT price FROM menu_items WHERE id = $1 AND is_available = TRUE",
        )
        .bind(item.menu_item_id)
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database query failed",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

        let price = price.ok_or_else(|| {
            ApiResponse::<()>::error(
                StatusCode::NOT_FOUND,
                "Menu item not found or unavailable",
                Some(json!({ "menu_item_id": item.menu_item_id })),
            )
        })?;

        priced_items.push((item.menu_item_id, item.quantity, price, item.notes.clone()));
    }

    let total_amount: f64 = priced_items
        .iter()
        .map(|(_, quantity, price, _)| *price * f64::from(*quantity))
        .sum();

    let mut tx = pool.begin().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to start transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let order: FoodOrder = sqlx::query_as(
        r#"
        INSERT INTO food_orders (
            user_id, order_date, delivery_time, meal_type, total_amount, special_requests
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(payload.order_date)
    .bind(payload.delivery_time)
    .bind(payload.meal_type)
    .bind(total_amount)
    .bind(&payload.special_requests)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to insert food order",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let mut items = Vec::with_capacity(priced_items.len());
    for (menu_item_id, quantity, price, notes) in priced_items {
        let item: FoodOrderItem = sqlx::query_as(
            r#"
            INSERT INTO food_order_items (order_id, menu_item_id, quantity, price, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(order.id)
        .bind(menu_item_id)
        .bind(quantity)
        .bind(price)
        .bind(&notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to insert order item",
                Some(json!({ "error": e.to_string() })),
            )
        })?;
        items.push(item);
    }

    let notification_id = notification::booking_submitted(user_id, "food order", "/orders")
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
        "Food order submitted",
        FoodOrderWithItems { order, items },
    ))
}

#[utoipa::path(
    get,
    path = "/food-orders",
    responses(
        (status = 200, description = "Requester's own food orders", body = Vec<FoodOrder>),
        (status = 500, description = "Failed to retrieve orders")
    ),
    tag = "Food Orders",
    security(("bearerAuth" = []))
)]
pub async fn get_my_food_orders(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<Vec<FoodOrder>>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let orders: Vec<FoodOrder> =
        sqlx::query_as("SELECT * FROM food_orders WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(&pool)
            .await
            .map_err(|e| {
                ApiResponse::<()>::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to retrieve orders",
                    Some(json!({ "error": e.to_string() })),
                )
            })?;

    Ok(ApiResponse::success(StatusCode::OK, "Food orders", orders))
}

#[utoipa::path(
    get,
    path = "/food-orders/pending",
    responses(
        (status = 200, description = "Pending food orders", body = Vec<FoodOrder>),
        (status = 403, description = "Caller may not approve food orders"),
        (status = 500, description = "Failed to retrieve orders")
    ),
    tag = "Food Orders",
    security(("bearerAuth" = []))
)]
pub async fn get_pending_food_orders(
    State(pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
) -> Result<ApiResponse<Vec<FoodOrder>>, ApiResponse<()>> {
    if !user_permissions.can_update_menu() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to review food orders",
            None,
        ));
    }

    let orders: Vec<FoodOrder> = sqlx::query_as(
        "SELECT * FROM food_orders WHERE admin_approval = 'pending' ORDER BY created_at DESC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve orders",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(StatusCode::OK, "Pending food orders", orders))
}

#[utoipa::path(
    patch,
    path = "/food-orders/{order_id}/decision",
    params(("order_id" = Uuid, Path, description = "Food order ID")),
    request_body = ApprovalDecision,
    responses(
        (status = 200, description = "Decision recorded", body = FoodOrder),
        (status = 403, description = "Caller may not approve food orders"),
        (status = 404, description = "Food order not found"),
        (status = 409, description = "Order was already decided"),
        (status = 422, description = "Invalid decision payload")
    ),
    tag = "Food Orders",
    security(("bearerAuth" = []))
)]
pub async fn decide_food_order(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(user_permissions): Extension<UserPermissions>,
    Extension(event_bus): Extension<EventBus>,
    Path(order_id): Path<Uuid>,
    Json(decision): Json<ApprovalDecision>,
) -> Result<ApiResponse<FoodOrder>, ApiResponse<()>> {
    let approver_id = claims.user_id()?;

    decision
        .validate()
        .map_err(|msg| ApiResponse::<()>::error(StatusCode::UNPROCESSABLE_ENTITY, msg, None))?;

    if !user_permissions.can_update_menu() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to approve food orders",
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

    let updated: Option<FoodOrder> = sqlx::query_as(
        r#"
        UPDATE food_orders
        SET admin_approval = $1, approved_by = $2, approval_notes = $3, updated_at = NOW()
        WHERE id = $4 AND admin_approval = 'pending'
        RETURNING *
        "#,
    )
    .bind(decision.decision)
    .bind(approver_id)
    .bind(&decision.notes)
    .bind(order_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update food order",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let Some(order) = updated else {
        return Err(already_decided_or_missing(&pool, order_id).await);
    };

    let notification_id = notification::booking_decided(
        order.user_id,
        "food order",
        decision.decision,
        decision.notes.as_deref(),
        "/orders",
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

    event_bus.publish(ChangeEvent::notification_created(order.user_id, notification_id));

    Ok(ApiResponse::success(StatusCode::OK, "Decision recorded", order))
}

#[utoipa::path(
    patch,
    path = "/food-orders/{order_id}/status",
    params(("order_id" = Uuid, Path, description = "Food order ID")),
    request_body = OrderStatusUpdate,
    responses(
        (status = 200, description = "Order status updated", body = FoodOrder),
        (status = 403, description = "Caller may not fulfil food orders"),
        (status = 404, description = "Food order not found"),
        (status = 409, description = "Transition not allowed from the current status")
    ),
    tag = "Food Orders",
    security(("bearerAuth" = []))
)]
pub async fn update_order_status(
    State(pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Extension(event_bus): Extension<EventBus>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<OrderStatusUpdate>,
) -> Result<ApiResponse<FoodOrder>, ApiResponse<()>> {
    if !user_permissions.can_update_menu() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to fulfil food orders",
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

    // Row lock serializes concurrent fulfillment updates on the same order.
    let current: Option<(OrderStatus, ApprovalStatus)> = sqlx::query_as(
        "SELECT status, admin_approval FROM food_orders WHERE id = $1 FOR UPDATE",
    )
    .bind(order_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database query failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let Some((current, approval)) = current else {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "Food order not found",
            None,
        ));
    };

    if approval != ApprovalStatus::Approved {
        return Err(ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Only approved orders enter fulfillment",
            None,
        ));
    }

    if !current.can_advance_to(payload.status) {
        return Err(ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Order cannot move to the requested status",
            Some(json!({ "from": current, "to": payload.status })),
        ));
    }

    let order: FoodOrder = sqlx::query_as(
        "UPDATE food_orders SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(payload.status)
    .bind(order_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update food order",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let notification_id = notification::order_status_changed(order.user_id, payload.status)
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

    event_bus.publish(ChangeEvent::notification_created(order.user_id, notification_id));

    Ok(ApiResponse::success(StatusCode::OK, "Order status updated", order))
}

async fn already_decided_or_missing(pool: &PgPool, order_id: Uuid) -> ApiResponse<()> {
    let lookup = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM food_orders WHERE id = $1)")
        .bind(order_id)
        .fetch_one(pool)
        .await;
    classify_decision_miss(lookup)
}

fn classify_decision_miss(lookup: Result<bool, sqlx::Error>) -> ApiResponse<()> {
    match lookup {
        Ok(true) => {
            ApiResponse::<()>::error(StatusCode::CONFLICT, "Food order was already decided", None)
        }
        Ok(false) => ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Food order not found", None),
        // A failed lookup is a storage error, not a missing row.
        Err(e) => ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database query failed",
            Some(json!({ "error": e.to_string() })),
        ),
    }
}

use crate::db::models::food_order::NewFoodOrderItem;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        create_food_order,
        get_my_food_orders,
        get_pending_food_orders,
        decide_food_order,
        update_order_status
    ),
    components(schemas(
        FoodOrder,
        FoodOrderItem,
        FoodOrderWithItems,
        NewFoodOrder,
        NewFoodOrderItem,
        MealType,
        OrderStatus,
        OrderStatusUpdate,
        ApprovalDecision,
        ApprovalStatus
    )),
    tags(
        (name = "Food Orders", description = "Food order workflow")
    )
)]
pub struct FoodOrderDoc;

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
            classify_decision_miss(Ok(false)).status_code,
            StatusCode::NOT_FOUND.as_u16()
        );
    }
}
