use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};

use crate::auth::accounts::find_user;
use crate::auth::session::{token_from_headers, Session};
use crate::errors::AppError;
use crate::logs::middleware::RequestUserSlot;
use crate::models::user::User;
use crate::state::AppState;
use crate::web::PageError;

/// Authenticated caller of the JSON API. Missing or stale sessions → 401.
pub struct CurrentUser {
    pub user: User,
    pub session: Session,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }
}

/// Resolves the session token to a user and records the user for the audit log.
async fn authenticate(parts: &mut Parts, state: &AppState) -> Result<Option<CurrentUser>, AppError> {
    let Some(token) = token_from_headers(&parts.headers) else {
        return Ok(None);
    };
    let Some(session) = state.sessions.load(&token).await? else {
        return Ok(None);
    };
    let Some(user_id) = session.data.user_id else {
        return Ok(None);
    };
    let Some(user) = find_user(&state.db, user_id).await? else {
        return Ok(None);
    };

    if let Some(slot) = parts.extensions.get::<RequestUserSlot>() {
        slot.set(user.id);
    }

    Ok(Some(CurrentUser { user, session }))
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await?.ok_or(AppError::Unauthorized)
    }
}

/// Staff or superuser. Authenticated non-admins get 403.
pub struct AdminUser(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        if !current.is_admin() {
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(current))
    }
}

/// Logged-in user for HTML pages. Anonymous visitors are redirected to the login page
/// with a `next` parameter pointing back at the requested URL.
pub struct PageUser(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for PageUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match authenticate(parts, state).await {
            Ok(Some(current)) => Ok(PageUser(current)),
            Ok(None) => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                Err(Redirect::to(&login_redirect(next)).into_response())
            }
            Err(e) => Err(PageError(e).into_response()),
        }
    }
}

/// Optional user, for pages that render for everyone.
pub struct MaybeUser(pub Option<CurrentUser>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(parts, state)
            .await
            .map(MaybeUser)
            .map_err(|e| PageError(e).into_response())
    }
}

pub fn login_redirect(next: &str) -> String {
    format!("/login/?next={}", urlencoding::encode(next))
}

/// Only same-site absolute paths are honoured as post-login targets.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(n) if n.starts_with('/') && !n.starts_with("//") && !n.contains('\\') => n,
        _ => "/cvs/",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_redirect_encodes_next() {
        assert_eq!(login_redirect("/cvs/"), "/login/?next=%2Fcvs%2F");
        assert_eq!(
            login_redirect("/cvs/?q=ada&sort=lastname"),
            "/login/?next=%2Fcvs%2F%3Fq%3Dada%26sort%3Dlastname"
        );
    }

    #[test]
    fn test_safe_next_rejects_offsite_targets() {
        assert_eq!(safe_next(Some("/cv/3/")), "/cv/3/");
        assert_eq!(safe_next(Some("//evil.example")), "/cvs/");
        assert_eq!(safe_next(Some("https://evil.example")), "/cvs/");
        assert_eq!(safe_next(None), "/cvs/");
    }
}
