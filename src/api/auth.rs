// src/api/auth.rs
use axum::{
    extract::{Extension, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Config;
use crate::db::models::user::{Role, User};
use crate::middleware::permissions::UserPermissions;
use crate::utils::api_response::ApiResponse;
use crate::utils::validation::{require_non_empty, ValidationErrors};

const TOKEN_LIFETIME_SECS: i64 = 36_000; // 10 hours

/// JWT claims. `role` is the primary (first-assigned) role and is display
/// metadata only: authorization always re-resolves the role set from the
/// database via the RBAC layer, so a stale claim cannot widen access.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject - user ID
    pub sub: String,
    pub username: String,
    pub role: String,
    /// Expiration (UNIX time)
    pub exp: usize,
}

impl Claims {
    /// Parses `sub` back into a user ID, or returns a descriptive error.
    pub fn user_id(&self) -> Result<Uuid, ApiResponse<()>> {
        self.sub.parse::<Uuid>().map_err(|_| {
            ApiResponse::error(
                StatusCode::BAD_REQUEST,
                "Invalid user ID format in token",
                None,
            )
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub employee_id: Option<String>,
    /// Set for external/contractor registrations. Decides the default role
    /// granted when the account is approved.
    #[serde(default)]
    pub is_third_party: bool,
}

impl RegisterRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_non_empty(&mut errors, "username", &self.username);
        require_non_empty(&mut errors, "email", &self.email);
        require_non_empty(&mut errors, "full_name", &self.full_name);
        if self.password.len() < 8 {
            errors.push("password", "must be at least 8 characters");
        }
        errors.into_result()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub role: String,
}

/// Registers a new account. The account stays unable to log in until
/// someone with user-approval rights accepts the registration.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    tag = "Authentication",
    responses(
        (status = 201, description = "Registration submitted", body = RegisterResponse),
        (status = 409, description = "Username already taken"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register(
    State(pool): State<PgPool>,
    Json(payload): Json<RegisterRequest>,
) -> Result<ApiResponse<RegisterResponse>, ApiResponse<()>> {
    payload.validate().map_err(|errors| {
        ApiResponse::<()>::error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Validation failed",
            Some(errors.to_json()),
        )
    })?;

    let password_hash = hash(&payload.password, DEFAULT_COST).map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password hashing failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let mut tx = pool.begin().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to start transaction",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let user_id: Uuid = sqlx::query_scalar(
        "INSERT INTO users (username, password_hash) VALUES ($1, $2) RETURNING id",
    )
    .bind(&payload.username)
    .bind(&password_hash)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if let Some(db_err) = e.as_database_error() {
            if db_err.code().map(|code| code == "23505").unwrap_or(false) {
                return ApiResponse::<()>::error(
                    StatusCode::CONFLICT,
                    "Username already taken",
                    None,
                );
            }
        }
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create user",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    sqlx::query(
        r#"
        INSERT INTO profiles (user_id, email, full_name, phone, department, employee_id, is_third_party)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(user_id)
    .bind(&payload.email)
    .bind(&payload.full_name)
    .bind(&payload.phone)
    .bind(&payload.department)
    .bind(&payload.employee_id)
    .bind(payload.is_third_party)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create profile",
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

    info!(username = %payload.username, "registration submitted, awaiting approval");

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Registration submitted",
        RegisterResponse {
            message: "Registration submitted. An administrator will review your account.".into(),
        },
    ))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Successful login", body = LoginResponse),
        (status = 401, description = "Invalid username or password"),
        (status = 403, description = "Account locked or not yet approved"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login(
    State(pool): State<PgPool>,
    Json(payload): Json<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>, ApiResponse<()>> {
    let config = Config::get();

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(&payload.username)
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database query failed",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    let Some(user) = user else {
        warn!(username = %payload.username, "login attempt for non-existent user");
        return Err(ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid username or password",
            None,
        ));
    };

    if user.account_locked {
        warn!(username = %user.username, "login attempt for locked account");
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Account is locked. Contact your administrator.",
            None,
        ));
    }

    let password_ok = verify(&payload.password, &user.password_hash).map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password verification error",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    if !password_ok {
        warn!(username = %user.username, "invalid password attempt");
        return Err(ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid username or password",
            None,
        ));
    }

    let account_approved: Option<bool> =
        sqlx::query_scalar("SELECT account_approved FROM profiles WHERE user_id = $1")
            .bind(user.id)
            .fetch_optional(&pool)
            .await
            .map_err(|e| {
                ApiResponse::<()>::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database query failed",
                    Some(json!({ "error": e.to_string() })),
                )
            })?;

    if !account_approved.unwrap_or(false) {
        warn!(username = %user.username, "login attempt before account approval");
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Account is awaiting approval.",
            None,
        ));
    }

    let primary_role: Option<Role> = sqlx::query_scalar(
        "SELECT role FROM user_roles WHERE user_id = $1 ORDER BY created_at LIMIT 1",
    )
    .bind(user.id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database query failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let role = primary_role.map(|r| r.as_str().to_string()).unwrap_or_default();

    let claims = Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        role: role.clone(),
        exp: (chrono::Utc::now().timestamp() + TOKEN_LIFETIME_SECS) as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Token generation failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    info!(username = %user.username, "login successful");
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Login successful",
        LoginResponse { token, role },
    ))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Changes the caller's own password. The current password must verify first.
#[utoipa::path(
    post,
    path = "/auth/change_password",
    tag = "Authentication",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password updated successfully"),
        (status = 401, description = "Old password incorrect"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn change_password(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let password_hash: Option<String> =
        sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&pool)
            .await
            .map_err(|e| {
                ApiResponse::<()>::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database query failed",
                    Some(json!({ "error": e.to_string() })),
                )
            })?;

    let Some(password_hash) = password_hash else {
        return Err(ApiResponse::<()>::error(StatusCode::NOT_FOUND, "User not found", None));
    };

    let is_valid = verify(&payload.old_password, &password_hash).unwrap_or(false);
    if !is_valid {
        return Err(ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Incorrect old password",
            None,
        ));
    }

    let new_password_hash = hash(&payload.new_password, DEFAULT_COST).map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password hashing failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
        .bind(&new_password_hash)
        .bind(user_id)
        .execute(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update password",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    Ok(ApiResponse::success(StatusCode::OK, "Password updated successfully", ()))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub user_id: Uuid,
    pub new_password: String,
}

/// Admin-initiated password reset. No old password required.
#[utoipa::path(
    post,
    path = "/auth/reset_password",
    tag = "Authentication",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset successfully"),
        (status = 403, description = "Caller may not reset passwords"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn reset_password(
    State(pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if !user_permissions.can_approve_users() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to reset passwords",
            None,
        ));
    }

    let new_password_hash = hash(&payload.new_password, DEFAULT_COST).map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password hashing failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let result = sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
        .bind(&new_password_hash)
        .bind(payload.user_id)
        .execute(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to reset password",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::<()>::error(StatusCode::NOT_FOUND, "User not found", None));
    }

    Ok(ApiResponse::success(StatusCode::OK, "Password reset successfully", ()))
}

/// Public authentication routes (no token required).
pub fn auth_routes() -> Router<PgPool> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Authentication routes that require a valid token.
pub fn secure_auth_routes() -> Router<PgPool> {
    Router::new()
        .route("/auth/change_password", post(change_password))
        .route("/auth/reset_password", post(reset_password))
}

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::openapi::Components;
use utoipa::Modify;
use utoipa::OpenApi;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut components = openapi.components.clone().unwrap_or(Components::default());
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
        openapi.components = Some(components);
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(login, register, change_password, reset_password),
    components(schemas(
        LoginRequest,
        LoginResponse,
        RegisterRequest,
        RegisterResponse,
        ChangePasswordRequest,
        ResetPasswordRequest
    )),
    tags(
        (name = "Authentication", description = "Registration, login and password management")
    ),
    modifiers(&SecurityAddon)
)]
pub struct AuthDoc;

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegisterRequest {
        RegisterRequest {
            username: "jdoe".into(),
            password: "long-enough-pass".into(),
            email: "jdoe@example.com".into(),
            full_name: "J. Doe".into(),
            phone: None,
            department: Some("Operations".into()),
            employee_id: Some("EMP-042".into()),
            is_third_party: false,
        }
    }

    #[test]
    fn valid_registration_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn short_password_is_rejected() {
        let mut req = request();
        req.password = "short".into();
        assert!(req.validate().unwrap_err().has_field("password"));
    }

    #[test]
    fn blank_identity_fields_are_rejected() {
        let mut req = request();
        req.username = "  ".into();
        req.full_name = String::new();
        let errors = req.validate().unwrap_err();
        assert!(errors.has_field("username"));
        assert!(errors.has_field("full_name"));
    }

    #[test]
    fn claims_round_trip_user_id() {
        let id = Uuid::new_v4();
        let claims = Claims {
            sub: id.to_string(),
            username: "jdoe".into(),
            role: "employee".into(),
            exp: 0,
        };
        assert_eq!(claims.user_id().ok(), Some(id));
    }

    #[test]
    fn malformed_subject_is_rejected() {
        let claims = Claims {
            sub: "not-a-uuid".into(),
            username: "jdoe".into(),
            role: "employee".into(),
            exp: 0,
        };
        assert!(claims.user_id().is_err());
    }
}
