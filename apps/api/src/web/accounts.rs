use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::accounts;
use crate::auth::extract::{safe_next, MaybeUser};
use crate::auth::session::{token_from_headers, SessionData};
use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;
use crate::web::templates::{home_page, login_page, register_page};
use crate::web::PageError;

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Opens a session for `user` and sends the browser on to `target`.
async fn sign_in(state: &AppState, user: &User, target: &str) -> Result<Response, PageError> {
    let session = state.sessions.create(SessionData::for_user(user.id)).await?;
    let cookie = state.sessions.cookie(&session.token);
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to(target)).into_response())
}

/// GET /
pub async fn home(MaybeUser(current): MaybeUser) -> Html<String> {
    home_page(current.as_ref().map(|c| &c.user))
}

/// GET /login/
pub async fn login_form(Query(query): Query<NextQuery>) -> Html<String> {
    login_page(safe_next(query.next.as_deref()), "", None)
}

/// POST /login/
pub async fn login_submit(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Result<Response, PageError> {
    let next = safe_next(form.next.as_deref());
    match accounts::authenticate(&state.db, &form.username, &form.password).await {
        Ok(user) => {
            info!(user_id = user.id, "User logged in");
            sign_in(&state, &user, next).await
        }
        Err(AppError::InvalidCredentials) => {
            warn!(username = %form.username.trim(), "Failed login");
            Ok(login_page(
                next,
                &form.username,
                Some("Please enter a correct username and password."),
            )
            .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /register/
pub async fn register_form() -> Html<String> {
    register_page("", "", None)
}

/// POST /register/
pub async fn register_submit(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, PageError> {
    let email = Some(form.email.as_str()).filter(|e| !e.trim().is_empty());
    match accounts::register(&state.db, &form.username, email, &form.password).await {
        Ok(user) => sign_in(&state, &user, "/cvs/").await,
        Err(AppError::Validation(message)) => {
            Ok(register_page(&form.username, &form.email, Some(&message)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /logout/
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = token_from_headers(&headers) {
        if let Err(e) = state.sessions.destroy(&token).await {
            warn!("Could not destroy session on logout: {e}");
        }
    }
    (
        [(header::SET_COOKIE, state.sessions.expired_cookie())],
        Redirect::to("/"),
    )
        .into_response()
}
