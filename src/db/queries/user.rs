// src/db/queries/user.rs
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::auth::Claims;
use crate::db::models::user::{
    AssignRoleRequest, Profile, ProfileWithRoles, Role, UpdateProfile, ALL_ROLES,
};
use crate::middleware::auth::PermissionCache;
use crate::middleware::permissions::{RolePermissions, UserPermissions};
use crate::utils::api_response::ApiResponse;
use crate::utils::events::{ChangeEvent, EventBus};
use crate::utils::notification;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AccountDecision {
    pub approved: bool,
}

#[derive(Debug, serde::Serialize, ToSchema)]
pub struct MeResponse {
    #[serde(flatten)]
    pub profile: Profile,
    pub roles: Vec<Role>,
    pub capabilities: RolePermissions,
}

async fn fetch_roles(pool: &PgPool, user_id: Uuid) -> Result<Vec<Role>, sqlx::Error> {
    sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = $1 ORDER BY created_at")
        .bind(user_id)
        .fetch_all(pool)
        .await
}

#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Current user's profile, roles and capabilities", body = MeResponse),
        (status = 404, description = "Profile not found")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(user_permissions): Extension<UserPermissions>,
) -> Result<ApiResponse<MeResponse>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let profile: Profile = sqlx::query_as("SELECT * FROM profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database query failed",
                Some(json!({ "error": e.to_string() })),
            )
        })?
        .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Profile not found", None))?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Current user",
        MeResponse {
            profile,
            roles: user_permissions.roles.clone(),
            capabilities: user_permissions.capabilities,
        },
    ))
}

#[utoipa::path(
    put,
    path = "/users/me",
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = Profile),
        (status = 404, description = "Profile not found")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn update_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfile>,
) -> Result<ApiResponse<Profile>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let profile: Profile = sqlx::query_as(
        r#"
        UPDATE profiles
        SET email = COALESCE($1, email),
            full_name = COALESCE($2, full_name),
            phone = COALESCE($3, phone),
            department = COALESCE($4, department),
            employee_id = COALESCE($5, employee_id),
            updated_at = NOW()
        WHERE user_id = $6
        RETURNING *
        "#,
    )
    .bind(&payload.email)
    .bind(&payload.full_name)
    .bind(&payload.phone)
    .bind(&payload.department)
    .bind(&payload.employee_id)
    .bind(user_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update profile",
            Some(json!({ "error": e.to_string() })),
        )
    })?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Profile not found", None))?;

    Ok(ApiResponse::success(StatusCode::OK, "Profile updated", profile))
}

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "Approved user profiles with their roles", body = Vec<ProfileWithRoles>),
        (status = 403, description = "Caller may not manage users")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn get_all_users(
    State(pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
) -> Result<ApiResponse<Vec<ProfileWithRoles>>, ApiResponse<()>> {
    if !user_permissions.can_approve_users() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to list users",
            None,
        ));
    }

    let profiles: Vec<Profile> = sqlx::query_as(
        "SELECT * FROM profiles WHERE account_approved = TRUE ORDER BY full_name",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve users",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let mut users = Vec::with_capacity(profiles.len());
    for profile in profiles {
        let roles = fetch_roles(&pool, profile.user_id).await.map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to retrieve roles",
                Some(json!({ "error": e.to_string() })),
            )
        })?;
        users.push(ProfileWithRoles { profile, roles });
    }

    Ok(ApiResponse::success(StatusCode::OK, "Users", users))
}

#[utoipa::path(
    get,
    path = "/users/pending",
    responses(
        (status = 200, description = "Registrations awaiting account approval", body = Vec<Profile>),
        (status = 403, description = "Caller may not approve users")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn get_pending_accounts(
    State(pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
) -> Result<ApiResponse<Vec<Profile>>, ApiResponse<()>> {
    if !user_permissions.can_approve_users() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to approve users",
            None,
        ));
    }

    let profiles: Vec<Profile> = sqlx::query_as(
        "SELECT * FROM profiles WHERE account_approved = FALSE ORDER BY created_at",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve pending accounts",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(StatusCode::OK, "Pending accounts", profiles))
}

/// Decide a pending registration. Approval flips the gate and assigns the
/// default role from the profile (third-party flag → third_party, otherwise
/// employee), so no code path ever needs to recognize a person by name.
#[utoipa::path(
    post,
    path = "/users/{user_id}/account-decision",
    params(("user_id" = Uuid, Path, description = "Target user ID")),
    request_body = AccountDecision,
    responses(
        (status = 200, description = "Account decision recorded", body = Profile),
        (status = 403, description = "Caller may not approve this account"),
        (status = 404, description = "Profile not found"),
        (status = 409, description = "Account was already approved")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn decide_account(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(user_permissions): Extension<UserPermissions>,
    Extension(event_bus): Extension<EventBus>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<AccountDecision>,
) -> Result<ApiResponse<Profile>, ApiResponse<()>> {
    let approver_id = claims.user_id()?;

    if !user_permissions.can_approve_users() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to approve users",
            None,
        ));
    }

    let profile: Profile = sqlx::query_as("SELECT * FROM profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database query failed",
                Some(json!({ "error": e.to_string() })),
            )
        })?
        .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Profile not found", None))?;

    if profile.account_approved {
        return Err(ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Account was already approved",
            None,
        ));
    }

    if profile.is_third_party && !user_permissions.can_approve_third_party() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to approve third-party accounts",
            None,
        ));
    }

    if !payload.approved {
        let notification_id = notification::account_reviewed(user_id, false)
            .send(&pool)
            .await
            .map_err(|e| {
                ApiResponse::<()>::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to create notification",
                    Some(json!({ "error": e.to_string() })),
                )
            })?;
        event_bus.publish(ChangeEvent::notification_created(user_id, notification_id));
        return Ok(ApiResponse::success(
            StatusCode::OK,
            "Registration declined",
            profile,
        ));
    }

    let default_role = if profile.is_third_party {
        Role::ThirdParty
    } else {
        Role::Employee
    };

    let mut tx = pool.begin().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to start transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    // The flag in the predicate makes the first approver win when two race;
    // the pre-read above is only a fast path.
    let updated: Option<Profile> = sqlx::query_as(
        r#"
        UPDATE profiles
        SET account_approved = TRUE, updated_at = NOW()
        WHERE user_id = $1 AND account_approved = FALSE
        RETURNING *
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to approve account",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let profile = claim_approval(updated)?;

    sqlx::query(
        r#"
        INSERT INTO user_roles (user_id, role, assigned_by)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, role) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(default_role)
    .bind(approver_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to assign default role",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let notification_id = notification::account_reviewed(user_id, true)
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

    Ok(ApiResponse::success(StatusCode::OK, "Account approved", profile))
}

/// Outcome of the conditional approval update. No matched row means another
/// approver already flipped the flag.
fn claim_approval(updated: Option<Profile>) -> Result<Profile, ApiResponse<()>> {
    updated.ok_or_else(|| {
        ApiResponse::<()>::error(StatusCode::CONFLICT, "Account was already approved", None)
    })
}

/// Roles available for assignment, in seniority-display order. Drives the
/// role dropdown in the admin panel.
#[utoipa::path(
    get,
    path = "/roles",
    responses((status = 200, description = "Assignable roles", body = Vec<Role>)),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn get_available_roles() -> ApiResponse<Vec<Role>> {
    ApiResponse::success(StatusCode::OK, "Available roles", ALL_ROLES.to_vec())
}

#[utoipa::path(
    get,
    path = "/users/{user_id}/roles",
    params(("user_id" = Uuid, Path, description = "Target user ID")),
    responses(
        (status = 200, description = "Roles held by the user", body = Vec<Role>),
        (status = 403, description = "Caller may not view other users' roles")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn get_user_roles(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(user_permissions): Extension<UserPermissions>,
    Path(user_id): Path<Uuid>,
) -> Result<ApiResponse<Vec<Role>>, ApiResponse<()>> {
    let caller_id = claims.user_id()?;
    if caller_id != user_id && !user_permissions.can_approve_users() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to view this user's roles",
            None,
        ));
    }

    let roles = fetch_roles(&pool, user_id).await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve roles",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(StatusCode::OK, "User roles", roles))
}

/// Assignment is exclusive: the target ends up holding exactly the new role.
/// The target's cached permissions are invalidated after commit, so the
/// change is visible on their next request without a new login.
#[utoipa::path(
    post,
    path = "/users/{user_id}/role",
    params(("user_id" = Uuid, Path, description = "Target user ID")),
    request_body = AssignRoleRequest,
    responses(
        (status = 200, description = "Role assigned", body = Vec<Role>),
        (status = 403, description = "Caller may not assign this role"),
        (status = 404, description = "Target user not found")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn assign_role(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(user_permissions): Extension<UserPermissions>,
    Extension(permission_cache): Extension<PermissionCache>,
    Extension(event_bus): Extension<EventBus>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<AssignRoleRequest>,
) -> Result<ApiResponse<Vec<Role>>, ApiResponse<()>> {
    let assigner_id = claims.user_id()?;

    if !user_permissions.can_assign_role(payload.role) {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to assign this role",
            None,
        ));
    }

    let target_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database query failed",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    if !target_exists {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "Target user not found",
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

    sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to clear existing roles",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    sqlx::query("INSERT INTO user_roles (user_id, role, assigned_by) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(payload.role)
        .bind(assigner_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to assign role",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    let notification_id = notification::role_assigned(user_id, payload.role.as_str())
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

    permission_cache.invalidate(&user_id);
    event_bus.publish(ChangeEvent::roles_changed(user_id));
    event_bus.publish(ChangeEvent::notification_created(user_id, notification_id));

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Role assigned",
        vec![payload.role],
    ))
}

#[utoipa::path(
    delete,
    path = "/users/{user_id}/roles/{role}",
    params(
        ("user_id" = Uuid, Path, description = "Target user ID"),
        ("role" = Role, Path, description = "Role to remove")
    ),
    responses(
        (status = 200, description = "Role removed", body = Vec<Role>),
        (status = 403, description = "Caller may not remove this role"),
        (status = 404, description = "User does not hold this role")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn remove_role(
    State(pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Extension(permission_cache): Extension<PermissionCache>,
    Extension(event_bus): Extension<EventBus>,
    Path((user_id, role)): Path<(Uuid, Role)>,
) -> Result<ApiResponse<Vec<Role>>, ApiResponse<()>> {
    if !user_permissions.can_assign_role(role) {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to remove this role",
            None,
        ));
    }

    let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role = $2")
        .bind(user_id)
        .bind(role)
        .execute(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to remove role",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "User does not hold this role",
            None,
        ));
    }

    permission_cache.invalidate(&user_id);
    event_bus.publish(ChangeEvent::roles_changed(user_id));

    let roles = fetch_roles(&pool, user_id).await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve roles",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(StatusCode::OK, "Role removed", roles))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        get_me,
        update_me,
        get_all_users,
        get_pending_accounts,
        decide_account,
        get_available_roles,
        get_user_roles,
        assign_role,
        remove_role
    ),
    components(schemas(
        Profile,
        ProfileWithRoles,
        UpdateProfile,
        AccountDecision,
        AssignRoleRequest,
        Role,
        MeResponse
    )),
    tags(
        (name = "Users", description = "User, account-approval and role management")
    )
)]
pub struct UserDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn approved_profile(user_id: Uuid) -> Profile {
        let ts = NaiveDate::from_ymd_opt(2025, 8, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        Profile {
            id: Uuid::new_v4(),
            user_id,
            email: "guest@example.com".into(),
            full_name: "Guest User".into(),
            phone: None,
            department: None,
            employee_id: None,
            is_third_party: false,
            account_approved: true,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn approval_update_that_matched_a_row_passes_through() {
        let user_id = Uuid::new_v4();
        let profile = claim_approval(Some(approved_profile(user_id))).unwrap();
        assert_eq!(profile.user_id, user_id);
        assert!(profile.account_approved);
    }

    #[test]
    fn losing_the_approval_race_reads_as_conflict() {
        let err = claim_approval(None).unwrap_err();
        assert_eq!(err.status_code, StatusCode::CONFLICT.as_u16());
    }
}
