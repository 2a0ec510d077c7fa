use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use circleup_auth::{NewProfile, ProfileUpdate, User};
use serde::{Deserialize, Serialize};

use crate::util::{clear_refresh_cookie, refresh_cookie, require_bearer, set_refresh_cookie};
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Explicit allow-list of mutable profile fields.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub interests: Option<Vec<String>>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: String,
    pub user: User,
}

#[utoipa::path(
    post,
    path = "/api/v1/users/register",
    tag = "Users",
    responses(
        (status = 201, description = "User registered"),
        (status = 400, description = "Missing or malformed fields"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("a valid email is required"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::bad_request(
            "password must be at least 8 characters",
        ));
    }

    let user = state
        .authenticator()
        .register_with_password(
            &email,
            &req.password,
            NewProfile {
                display_name: req.display_name,
                city: req.city,
                interests: req.interests,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse { user })).into_response())
}

#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    tag = "Users",
    responses(
        (status = 200, description = "Access token issued, refresh token set as http-only cookie"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let email = req.email.trim().to_lowercase();
    let session = state
        .authenticator()
        .login_with_password(&email, &req.password)
        .await?;
    let user = state.authenticator().user_profile(session.user_id).await?;

    let max_age = (session.refresh_expires_at - chrono::Utc::now()).num_seconds();
    let cookie = set_refresh_cookie(&session.refresh_token, max_age);

    let body = Json(SessionResponse {
        token: session.token,
        expires_at: session.expires_at.to_rfc3339(),
        user,
    });

    Ok(([(SET_COOKIE, cookie)], body).into_response())
}

#[utoipa::path(
    post,
    path = "/api/v1/users/refresh",
    tag = "Users",
    responses(
        (status = 200, description = "New access token issued from the refresh cookie"),
        (status = 401, description = "Missing, unknown or expired refresh token")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    let refresh_token = refresh_cookie(&headers)?;
    let session = state.authenticator().refresh_session(&refresh_token).await?;
    let user = state.authenticator().user_profile(session.user_id).await?;

    Ok(Json(SessionResponse {
        token: session.token,
        expires_at: session.expires_at.to_rfc3339(),
        user,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/logout",
    tag = "Users",
    responses((status = 200, description = "Session dropped and refresh cookie cleared"))
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Ok(refresh_token) = refresh_cookie(&headers) {
        state.authenticator().logout(&refresh_token).await?;
    }

    let body = Json(serde_json::json!({ "message": "logged out" }));
    Ok(([(SET_COOKIE, clear_refresh_cookie())], body).into_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "Users",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "The authenticated user's profile"),
        (status = 401, description = "Authentication required")
    )
)]
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let (user, _) = state.authenticate(&token).await?;

    Ok(Json(UserResponse { user }))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/me",
    tag = "Users",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Profile updated"),
        (status = 401, description = "Authentication required")
    )
)]
pub async fn update_me(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let (user, _) = state.authenticate(&token).await?;

    let updated = state
        .authenticator()
        .update_profile(
            user.id,
            ProfileUpdate {
                display_name: req.display_name,
                city: req.city,
                interests: req.interests,
                lat: req.lat,
                lng: req.lng,
            },
        )
        .await?;

    Ok(Json(UserResponse { user: updated }))
}
