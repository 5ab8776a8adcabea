use axum::extract::Request;
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use rand_core::{OsRng, RngCore};

use crate::auth::token::{cookie_value, SESSION_COOKIE};
use crate::errors::AppError;

/// Readable (non-HttpOnly) cookie the SPA echoes back in this header on
/// state-changing requests. Double-submit scheme: the header must match the
/// cookie. Bearer-authenticated requests are exempt since a cross-site form
/// cannot set the Authorization header.
pub const CSRF_COOKIE: &str = "bo_csrf";
pub const CSRF_HEADER: &str = "x-csrf-token";

pub fn issue_token() -> String {
    let mut bytes = [0u8; 24];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

pub async fn csrf_middleware(req: Request, next: Next) -> Result<Response, AppError> {
    let headers = req.headers();

    let cookie_authenticated = cookie_value(headers, SESSION_COOKIE).is_some()
        && !headers.contains_key(axum::http::header::AUTHORIZATION);

    if cookie_authenticated && is_state_changing(req.method()) {
        let cookie_token = cookie_value(headers, CSRF_COOKIE).map(String::from);
        let header_token = headers
            .get(CSRF_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(String::from);

        match (cookie_token, header_token) {
            (Some(cookie), Some(header)) if cookie == header => {}
            _ => return Err(AppError::forbidden("CSRF token missing or mismatched")),
        }
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_are_hex_and_unique() {
        let a = issue_token();
        let b = issue_token();
        assert_eq!(a.len(), 48);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn safe_methods_are_not_state_changing() {
        assert!(!is_state_changing(&Method::GET));
        assert!(!is_state_changing(&Method::HEAD));
        assert!(is_state_changing(&Method::POST));
        assert!(is_state_changing(&Method::DELETE));
    }
}
