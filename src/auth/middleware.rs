//! Authentication middleware
//!
//! Protects the admin and metrics routes with the configured bearer token.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::{HeaderMap, Request, request::Parts},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::AppState;
use crate::error::AppError;

fn extract_token_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Compare digests so the comparison time does not depend on where the
/// presented token first differs
fn token_matches(presented: &str, expected: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());

    presented
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<(), AppError> {
    let token = extract_token_from_headers(headers).ok_or(AppError::Unauthorized)?;
    if token_matches(token, &state.config.admin.token) {
        Ok(())
    } else {
        tracing::warn!("Rejected admin request with invalid token");
        Err(AppError::Unauthorized)
    }
}

/// Middleware to require the admin token
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/admin/...", ...)
///     .layer(middleware::from_fn_with_state(state, require_admin));
/// ```
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    authenticate(request.headers(), &state)?;
    request.extensions_mut().insert(AdminUser);

    Ok(next.run(request).await)
}

/// Proof that the request carried the admin token
///
/// Handlers take this as an argument to stay protected even if mounted
/// outside the middleware.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser;

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if parts.extensions.get::<AdminUser>().is_some() {
            return Ok(AdminUser);
        }

        let state = AppState::from_ref(state);
        authenticate(&parts.headers, &state)?;
        parts.extensions.insert(AdminUser);

        Ok(AdminUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_token_from_headers(&headers), Some("abc"));
    }

    #[test]
    fn other_schemes_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_token_from_headers(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_token_from_headers(&headers), None);
    }

    #[test]
    fn token_comparison() {
        assert!(token_matches("secret-token-0123", "secret-token-0123"));
        assert!(!token_matches("secret-token-0124", "secret-token-0123"));
        assert!(!token_matches("", "secret-token-0123"));
    }
}
