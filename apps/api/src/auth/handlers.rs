use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::accounts;
use crate::auth::extract::CurrentUser;
use crate::auth::session::SessionData;
use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub user: User,
    /// Also usable as `Authorization: Bearer <token>`.
    pub token: String,
}

async fn start_session(state: &AppState, user: User) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions.create(SessionData::for_user(user.id)).await?;
    let cookie = state.sessions.cookie(&session.token);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            user,
            token: session.token,
        }),
    ))
}

/// POST /api/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = accounts::register(&state.db, &req.username, req.email.as_deref(), &req.password).await?;
    let response = start_session(&state, user).await?;
    Ok((StatusCode::CREATED, response))
}

/// POST /api/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = accounts::authenticate(&state.db, &req.username, &req.password).await?;
    start_session(&state, user).await
}

/// POST /api/auth/logout
pub async fn handle_logout(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    state.sessions.destroy(&current.session.token).await?;
    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, state.sessions.expired_cookie())],
    ))
}

/// GET /api/auth/me
pub async fn handle_me(current: CurrentUser) -> Json<User> {
    Json(current.user)
}
