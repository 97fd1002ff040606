//! HTML pages. Forms post back and redirect (post/redirect/get); one-shot messages
//! and background task ids travel in the Redis session.

pub mod accounts;
pub mod cvs;
pub mod detail;
pub mod templates;

use axum::response::{IntoResponse, Response};

use crate::auth::session::Session;
use crate::errors::AppError;
use crate::state::AppState;

/// `AppError` rendered as an HTML error page instead of a JSON body.
#[derive(Debug)]
pub struct PageError(pub AppError);

impl<E> From<E> for PageError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        PageError(err.into())
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let (status, _code, message) = self.0.parts();
        (status, templates::error_page(status.as_u16(), &message)).into_response()
    }
}

pub(crate) async fn save_session(state: &AppState, session: &Session) -> Result<(), PageError> {
    state.sessions.save(session).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_page_error_renders_html() {
        let response = PageError(AppError::NotFound("CV 9 not found".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Error 404"));
        assert!(html.contains("CV 9 not found"));
    }
}
