//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

use crate::web::state::AppState;

/// Middleware that resolves the caller's identity and extracts the user_id.
///
/// The session id comes from the `session` cookie, or from an
/// `Authorization: Bearer <session-id>` header for cookie-less API clients.
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_session_id =
        session_id_from_headers(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id = state
        .db
        .validate_auth_session(&auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to validate auth session: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?;

    req.extensions_mut().insert(user_id);
    Ok(next.run(req).await)
}

fn session_id_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(cookie_header) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
        if let Some(session_id) = cookie_header
            .split(';')
            .find_map(|c| c.trim().strip_prefix("session="))
        {
            if !session_id.is_empty() {
                return Some(session_id.to_string());
            }
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn cookie_session_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc-123; lang=ru"),
        );
        assert_eq!(session_id_from_headers(&headers), Some("abc-123".to_string()));
    }

    #[test]
    fn bearer_token_is_a_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc-123"),
        );
        assert_eq!(session_id_from_headers(&headers), Some("abc-123".to_string()));
    }

    #[test]
    fn missing_credentials_yield_none() {
        assert_eq!(session_id_from_headers(&HeaderMap::new()), None);
    }
}
