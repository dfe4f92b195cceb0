//! Authentication middleware.
//!
//! Validates `Authorization: Bearer <key>` against the configured API key.
//! Only attached to the router when auth is enabled in config.

use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::config::AuthConfig;
use crate::server::AppContext;

/// Check a raw Authorization header value against the configured key.
fn check_auth(auth_config: &AuthConfig, authorization: Option<&str>) -> bool {
    if !auth_config.enabled {
        return true;
    }

    let Some(ref api_key) = auth_config.api_key else {
        // Enabled but no key configured: nothing can authenticate.
        return false;
    };

    authorization
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == api_key)
}

/// Bearer-token authentication middleware. Applied to API routes only.
pub async fn auth_middleware(
    State(ctx): State<AppContext>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_owned());

    if check_auth(&ctx.config.auth, authorization.as_deref()) {
        Ok(next.run(request).await)
    } else {
        Err((StatusCode::UNAUTHORIZED, "Authentication required").into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enabled: bool, api_key: Option<&str>) -> AuthConfig {
        AuthConfig {
            enabled,
            api_key: api_key.map(String::from),
            rate_limit_per_minute: 300,
        }
    }

    #[test]
    fn disabled_auth_allows_everything() {
        assert!(check_auth(&config(false, None), None));
        assert!(check_auth(&config(false, None), Some("Bearer junk")));
    }

    #[test]
    fn valid_bearer_token_passes() {
        let cfg = config(true, Some("secret"));
        assert!(check_auth(&cfg, Some("Bearer secret")));
    }

    #[test]
    fn wrong_or_missing_token_fails() {
        let cfg = config(true, Some("secret"));
        assert!(!check_auth(&cfg, Some("Bearer wrong")));
        assert!(!check_auth(&cfg, Some("secret")));
        assert!(!check_auth(&cfg, None));
    }

    #[test]
    fn enabled_without_key_rejects_all() {
        let cfg = config(true, None);
        assert!(!check_auth(&cfg, Some("Bearer anything")));
    }
}
