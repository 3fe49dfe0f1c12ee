// src/db/queries/catalog.rs
//
// Bookable inventory: guest rooms, facilities and the food menu. Listings
// are open to any authenticated user; mutations are gated per catalog.
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::catalog::{
    Accommodation, MenuItem, NewAccommodation, NewMenuItem, SetAvailability, UpdateAccommodation,
    UpdateMenuItem,
};
use crate::db::models::facility::{Facility, NewFacility, UpdateFacility};
use crate::middleware::permissions::UserPermissions;
use crate::utils::api_response::ApiResponse;
use crate::utils::validation::{require_non_empty, require_positive_bounded, ValidationErrors};

fn db_error(e: sqlx::Error) -> ApiResponse<()> {
    ApiResponse::<()>::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Database query failed",
        Some(json!({ "error": e.to_string() })),
    )
}

fn forbidden(what: &str) -> ApiResponse<()> {
    ApiResponse::<()>::error(
        StatusCode::FORBIDDEN,
        format!("You don't have permission to manage {what}"),
        None,
    )
}

fn validation_failed(errors: ValidationErrors) -> ApiResponse<()> {
    ApiResponse::<()>::error(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Validation failed",
        Some(errors.to_json()),
    )
}

// ---------------------------------------------------------------------------
// Guest rooms
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/accommodations",
    responses((status = 200, description = "Guest room catalog", body = Vec<Accommodation>)),
    tag = "Catalog",
    security(("bearerAuth" = []))
)]
pub async fn get_accommodations(
    State(pool): State<PgPool>,
) -> Result<ApiResponse<Vec<Accommodation>>, ApiResponse<()>> {
    let rooms: Vec<Accommodation> =
        sqlx::query_as("SELECT * FROM accommodations ORDER BY name")
            .fetch_all(&pool)
            .await
            .map_err(db_error)?;

    Ok(ApiResponse::success(StatusCode::OK, "Accommodations", rooms))
}

#[utoipa::path(
    post,
    path = "/accommodations",
    request_body = NewAccommodation,
    responses(
        (status = 201, description = "Guest room created", body = Accommodation),
        (status = 403, description = "Caller may not manage accommodations"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Catalog",
    security(("bearerAuth" = []))
)]
pub async fn create_accommodation(
    State(pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Json(payload): Json<NewAccommodation>,
) -> Result<ApiResponse<Accommodation>, ApiResponse<()>> {
    if !user_permissions.can_manage_accommodations() {
        return Err(forbidden("accommodations"));
    }

    let mut errors = ValidationErrors::new();
    require_non_empty(&mut errors, "name", &payload.name);
    require_non_empty(&mut errors, "room_type", &payload.room_type);
    require_positive_bounded(&mut errors, "capacity", payload.capacity, 100);
    if payload.price_per_night < 0.0 {
        errors.push("price_per_night", "must not be negative");
    }
    errors.into_result().map_err(validation_failed)?;

    let room: Accommodation = sqlx::query_as(
        r#"
        INSERT INTO accommodations (name, description, room_type, capacity, price_per_night)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(&payload.room_type)
    .bind(payload.capacity)
    .bind(payload.price_per_night)
    .fetch_one(&pool)
    .await
    .map_err(db_error)?;

    Ok(ApiResponse::success(StatusCode::CREATED, "Accommodation created", room))
}

#[utoipa::path(
    patch,
    path = "/accommodations/{id}",
    params(("id" = Uuid, Path, description = "Guest room ID")),
    request_body = UpdateAccommodation,
    responses(
        (status = 200, description = "Guest room updated", body = Accommodation),
        (status = 403, description = "Caller may not manage accommodations"),
        (status = 404, description = "Guest room not found")
    ),
    tag = "Catalog",
    security(("bearerAuth" = []))
)]
pub async fn update_accommodation(
    State(pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAccommodation>,
) -> Result<ApiResponse<Accommodation>, ApiResponse<()>> {
    if !user_permissions.can_manage_accommodations() {
        return Err(forbidden("accommodations"));
    }

    // Availability toggles are a separate, lower-privilege concern.
    if payload.is_available.is_some() && !user_permissions.can_manage_room_availability() {
        return Err(forbidden("room availability"));
    }

    let room: Accommodation = sqlx::query_as(
        r#"
        UPDATE accommodations
        SET name = COALESCE($1, name),
            description = COALESCE($2, description),
            room_type = COALESCE($3, room_type),
            capacity = COALESCE($4, capacity),
            price_per_night = COALESCE($5, price_per_night),
            is_available = COALESCE($6, is_available),
            updated_at = NOW()
        WHERE id = $7
        RETURNING *
        "#,
    )
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(&payload.room_type)
    .bind(payload.capacity)
    .bind(payload.price_per_night)
    .bind(payload.is_available)
    .bind(id)
    .fetch_optional(&pool)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Accommodation not found", None))?;

    Ok(ApiResponse::success(StatusCode::OK, "Accommodation updated", room))
}

#[utoipa::path(
    put,
    path = "/accommodations/{id}/availability",
    params(("id" = Uuid, Path, description = "Guest room ID")),
    request_body = SetAvailability,
    responses(
        (status = 200, description = "Availability updated", body = Accommodation),
        (status = 403, description = "Caller may not manage room availability"),
        (status = 404, description = "Guest room not found")
    ),
    tag = "Catalog",
    security(("bearerAuth" = []))
)]
pub async fn set_accommodation_availability(
    State(pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetAvailability>,
) -> Result<ApiResponse<Accommodation>, ApiResponse<()>> {
    if !user_permissions.can_manage_room_availability() {
        return Err(forbidden("room availability"));
    }

    let room: Accommodation = sqlx::query_as(
        "UPDATE accommodations SET is_available = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(payload.is_available)
    .bind(id)
    .fetch_optional(&pool)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Accommodation not found", None))?;

    Ok(ApiResponse::success(StatusCode::OK, "Availability updated", room))
}

#[utoipa::path(
    delete,
    path = "/accommodations/{id}",
    params(("id" = Uuid, Path, description = "Guest room ID")),
    responses(
        (status = 200, description = "Guest room deleted"),
        (status = 403, description = "Caller may not manage accommodations"),
        (status = 404, description = "Guest room not found")
    ),
    tag = "Catalog",
    security(("bearerAuth" = []))
)]
pub async fn delete_accommodation(
    State(pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if !user_permissions.can_manage_accommodations() {
        return Err(forbidden("accommodations"));
    }

    let result = sqlx::query("DELETE FROM accommodations WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(db_error)?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "Accommodation not found",
            None,
        ));
    }

    Ok(ApiResponse::success(StatusCode::OK, "Accommodation deleted", ()))
}

// ---------------------------------------------------------------------------
// Facilities
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/facilities",
    responses((status = 200, description = "Facility catalog", body = Vec<Facility>)),
    tag = "Catalog",
    security(("bearerAuth" = []))
)]
pub async fn get_facilities(
    State(pool): State<PgPool>,
) -> Result<ApiResponse<Vec<Facility>>, ApiResponse<()>> {
    let facilities: Vec<Facility> = sqlx::query_as("SELECT * FROM facilities ORDER BY name")
        .fetch_all(&pool)
        .await
        .map_err(db_error)?;

    Ok(ApiResponse::success(StatusCode::OK, "Facilities", facilities))
}

#[utoipa::path(
    post,
    path = "/facilities",
    request_body = NewFacility,
    responses(
        (status = 201, description = "Facility created", body = Facility),
        (status = 403, description = "Caller may not manage facilities"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Catalog",
    security(("bearerAuth" = []))
)]
pub async fn create_facility(
    State(pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Json(payload): Json<NewFacility>,
) -> Result<ApiResponse<Facility>, ApiResponse<()>> {
    if !user_permissions.can_manage_facilities() {
        return Err(forbidden("facilities"));
    }

    let mut errors = ValidationErrors::new();
    require_non_empty(&mut errors, "name", &payload.name);
    require_non_empty(&mut errors, "facility_type", &payload.facility_type);
    if let Some(capacity) = payload.capacity {
        require_positive_bounded(&mut errors, "capacity", capacity, 10_000);
    }
    if payload.hourly_rate < 0.0 {
        errors.push("hourly_rate", "must not be negative");
    }
    errors.into_result().map_err(validation_failed)?;

    let facility: Facility = sqlx::query_as(
        r#"
        INSERT INTO facilities (
            name, description, facility_type, capacity, hourly_rate, requires_approval
        )
        VALUES ($1, $2, $3, $4, $5, COALESCE($6, TRUE))
        RETURNING *
        "#,
    )
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(&payload.facility_type)
    .bind(payload.capacity)
    .bind(payload.hourly_rate)
    .bind(payload.requires_approval)
    .fetch_one(&pool)
    .await
    .map_err(db_error)?;

    Ok(ApiResponse::success(StatusCode::CREATED, "Facility created", facility))
}

#[utoipa::path(
    patch,
    path = "/facilities/{id}",
    params(("id" = Uuid, Path, description = "Facility ID")),
    request_body = UpdateFacility,
    responses(
        (status = 200, description = "Facility updated", body = Facility),
        (status = 403, description = "Caller may not manage facilities"),
        (status = 404, description = "Facility not found")
    ),
    tag = "Catalog",
    security(("bearerAuth" = []))
)]
pub async fn update_facility(
    State(pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateFacility>,
) -> Result<ApiResponse<Facility>, ApiResponse<()>> {
    if !user_permissions.can_manage_facilities() {
        return Err(forbidden("facilities"));
    }

    let facility: Facility = sqlx::query_as(
        r#"
        UPDATE facilities
        SET name = COALESCE($1, name),
            description = COALESCE($2, description),
            facility_type = COALESCE($3, facility_type),
            capacity = COALESCE($4, capacity),
            hourly_rate = COALESCE($5, hourly_rate),
            requires_approval = COALESCE($6, requires_approval),
            is_available = COALESCE($7, is_available),
            updated_at = NOW()
        WHERE id = $8
        RETURNING *
        "#,
    )
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(&payload.facility_type)
    .bind(payload.capacity)
    .bind(payload.hourly_rate)
    .bind(payload.requires_approval)
    .bind(payload.is_available)
    .bind(id)
    .fetch_optional(&pool)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Facility not found", None))?;

    Ok(ApiResponse::success(StatusCode::OK, "Facility updated", facility))
}

#[utoipa::path(
    delete,
    path = "/facilities/{id}",
    params(("id" = Uuid, Path, description = "Facility ID")),
    responses(
        (status = 200, description = "Facility deleted"),
        (status = 403, description = "Caller may not manage facilities"),
        (status = 404, description = "Facility not found")
    ),
    tag = "Catalog",
    security(("bearerAuth" = []))
)]
pub async fn delete_facility(
    State(pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if !user_permissions.can_manage_facilities() {
        return Err(forbidden("facilities"));
    }

    let result = sqlx::query("DELETE FROM facilities WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(db_error)?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "Facility not found",
            None,
        ));
    }

    Ok(ApiResponse::success(StatusCode::OK, "Facility deleted", ()))
}

// ---------------------------------------------------------------------------
// Menu
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/menu-items",
    responses((status = 200, description = "Menu catalog", body = Vec<MenuItem>)),
    tag = "Catalog",
    security(("bearerAuth" = []))
)]
pub async fn get_menu_items(
    State(pool): State<PgPool>,
) -> Result<ApiResponse<Vec<MenuItem>>, ApiResponse<()>> {
    let items: Vec<MenuItem> =
        sqlx::query_as("SELECT * FROM menu_items ORDER BY meal_type, name")
            .fetch_all(&pool)
            .await
            .map_err(db_error)?;

    Ok(ApiResponse::success(StatusCode::OK, "Menu items", items))
}

#[utoipa::path(
    post,
    path = "/menu-items",
    request_body = NewMenuItem,
    responses(
        (status = 201, description = "Menu item created", body = MenuItem),
        (status = 403, description = "Caller may not manage the menu"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Catalog",
    security(("bearerAuth" = []))
)]
pub async fn create_menu_item(
    State(pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Json(payload): Json<NewMenuItem>,
) -> Result<ApiResponse<MenuItem>, ApiResponse<()>> {
    if !user_permissions.can_update_menu() {
        return Err(forbidden("the menu"));
    }

    let mut errors = ValidationErrors::new();
    require_non_empty(&mut errors, "name", &payload.name);
    if payload.price < 0.0 {
        errors.push("price", "must not be negative");
    }
    errors.into_result().map_err(validation_failed)?;

    let item: MenuItem = sqlx::query_as(
        r#"
        INSERT INTO menu_items (name, description, meal_type, price, is_vegetarian, is_vegan)
        VALUES ($1, $2, $3, $4, COALESCE($5, FALSE), COALESCE($6, FALSE))
        RETURNING *
        "#,
    )
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(payload.meal_type)
    .bind(payload.price)
    .bind(payload.is_vegetarian)
    .bind(payload.is_vegan)
    .fetch_one(&pool)
    .await
    .map_err(db_error)?;

    Ok(ApiResponse::success(StatusCode::CREATED, "Menu item created", item))
}

#[utoipa::path(
    patch,
    path = "/menu-items/{id}",
    params(("id" = Uuid, Path, description = "Menu item ID")),
    request_body = UpdateMenuItem,
    responses(
        (status = 200, description = "Menu item updated", body = MenuItem),
        (status = 403, description = "Caller may not manage the menu"),
        (status = 404, description = "Menu item not found")
    ),
    tag = "Catalog",
    security(("bearerAuth" = []))
)]
pub async fn update_menu_item(
    State(pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMenuItem>,
) -> Result<ApiResponse<MenuItem>, ApiResponse<()>> {
    if !user_permissions.can_update_menu() {
        return Err(forbidden("the menu"));
    }

    let item: MenuItem = sqlx::query_as(
        r#"
        UPDATE menu_items
        SET name = COALESCE($1, name),
            description = COALESCE($2, description),
            meal_type = COALESCE($3, meal_type),
            price = COALESCE($4, price),
            is_vegetarian = COALESCE($5, is_vegetarian),
            is_vegan = COALESCE($6, is_vegan),
            is_available = COALESCE($7, is_available),
            updated_at = NOW()
        WHERE id = $8
        RETURNING *
        "#,
    )
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(payload.meal_type)
    .bind(payload.price)
    .bind(payload.is_vegetarian)
    .bind(payload.is_vegan)
    .bind(payload.is_available)
    .bind(id)
    .fetch_optional(&pool)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Menu item not found", None))?;

    Ok(ApiResponse::success(StatusCode::OK, "Menu item updated", item))
}

#[utoipa::path(
    delete,
    path = "/menu-items/{id}",
    params(("id" = Uuid, Path, description = "Menu item ID")),
    responses(
        (status = 200, description = "Menu item deleted"),
        (status = 403, description = "Caller may not manage the menu"),
        (status = 404, description = "Menu item not found")
    ),
    tag = "Catalog",
    security(("bearerAuth" = []))
)]
pub async fn delete_menu_item(
    State(pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if !user_permissions.can_update_menu() {
        return Err(forbidden("the menu"));
    }

    let result = sqlx::query("DELETE FROM menu_items WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(db_error)?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "Menu item not found",
            None,
        ));
    }

    Ok(ApiResponse::success(StatusCode::OK, "Menu item deleted", ()))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        get_accommodations,
        create_accommodation,
        update_accommodation,
        set_accommodation_availability,
        delete_accommodation,
        get_facilities,
        create_facility,
        update_facility,
        delete_facility,
        get_menu_items,
        create_menu_item,
        update_menu_item,
        delete_menu_item
    ),
    components(schemas(
        Accommodation,
        NewAccommodation,
        UpdateAccommodation,
        SetAvailability,
        Facility,
        NewFacility,
        UpdateFacility,
        MenuItem,
        NewMenuItem,
        UpdateMenuItem
    )),
    tags(
        (name = "Catalog", description = "Rooms, facilities and menu inventory")
    )
)]
pub struct CatalogDoc;
