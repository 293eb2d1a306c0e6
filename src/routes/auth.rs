use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::app::AppState;
use crate::authz::Role;
use crate::db;
use crate::errors::{AppError, AppResult, FieldErrors};
use crate::extract::JsonBody;
use crate::jwt::AuthUser;
use crate::models::user::{AuthResponse, LoginRequest, RegisterRequest, UserEnvelope};
use crate::models::MessageResponse;
use crate::utils::{filled, hash_password, MIN_PASSWORD_LENGTH};

const MAX_NAME_LENGTH: usize = 255;
const MAX_EMAIL_LENGTH: usize = 255;

#[utoipa::path(
    post,
    path = "/api/v1/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let mut errors = FieldErrors::new();

    let name = match filled(payload.name.as_deref()) {
        None => {
            errors.add("name", "the name field is required");
            None
        }
        Some(name) if name.chars().count() > MAX_NAME_LENGTH => {
            errors.add("name", format!("the name may not be greater than {MAX_NAME_LENGTH} characters"));
            None
        }
        Some(name) => Some(name.to_string()),
    };

    let email = match filled(payload.email.as_deref()) {
        None => {
            errors.add("email", "the email field is required");
            None
        }
        Some(email) if !email.contains('@') || email.chars().count() > MAX_EMAIL_LENGTH => {
            errors.add("email", "the email must be a valid email address");
            None
        }
        Some(email) => {
            if db::users::email_taken(&state.pool, email).await? {
                errors.add("email", "the email has already been taken");
                None
            } else {
                Some(email.to_string())
            }
        }
    };

    let password = match payload.password.as_deref() {
        None | Some("") => {
            errors.add("password", "the password field is required");
            None
        }
        Some(password) if password.chars().count() < MIN_PASSWORD_LENGTH => {
            errors.add(
                "password",
                format!("the password must be at least {MIN_PASSWORD_LENGTH} characters"),
            );
            None
        }
        Some(password) if payload.password_confirmation.as_deref() != Some(password) => {
            errors.add("password", "the password confirmation does not match");
            None
        }
        Some(password) => Some(password),
    };

    let department_id = match payload.department_id {
        None => {
            errors.add("department_id", "the department_id field is required");
            None
        }
        Some(id) if !db::departments::department_exists(&state.pool, id).await? => {
            errors.add("department_id", "the selected department_id is invalid");
            None
        }
        Some(id) => Some(id),
    };

    let (Some(name), Some(email), Some(password), Some(department_id)) = (name, email, password, department_id) else {
        return Err(AppError::Validation(errors));
    };

    let password_hash = hash_password(password)?;
    let user_id = db::users::create_user(
        &state.pool,
        db::users::NewUser {
            name: &name,
            email: &email,
            password_hash: &password_hash,
            department_id,
        },
        &[Role::Employee],
    )
    .await?;

    let token = state.sessions.issue_token(user_id).await?;
    let user = db::users::load_user(&state.pool, user_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "Registration successful".to_string(),
            user,
            token,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let mut errors = FieldErrors::new();
    let email = filled(payload.email.as_deref());
    let password = payload.password.as_deref().filter(|p| !p.is_empty());
    if email.is_none() {
        errors.add("email", "the email field is required");
    }
    if password.is_none() {
        errors.add("password", "the password field is required");
    }
    let (Some(email), Some(password)) = (email, password) else {
        return Err(AppError::Validation(errors));
    };

    let user_id = state.sessions.authenticate(email, password).await?;
    let token = state.sessions.rotate_tokens(user_id).await?;
    let user = db::users::load_user(&state.pool, user_id).await?;

    tracing::info!(user_id, "user logged in");

    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        user,
        token,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/logout",
    tag = "Auth",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Token revoked", body = MessageResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<MessageResponse>> {
    state.sessions.revoke_token(&auth.token_id).await?;
    tracing::info!(user_id = auth.principal.user_id, "user logged out");
    Ok(Json(MessageResponse::new("Logged out successfully")))
}

#[utoipa::path(
    get,
    path = "/api/v1/user",
    tag = "Auth",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserEnvelope),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<UserEnvelope>> {
    let user = db::users::load_user(&state.pool, auth.principal.user_id).await?;
    Ok(Json(UserEnvelope { user }))
}
