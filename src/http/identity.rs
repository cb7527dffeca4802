use super::state::AppState;
use crate::config::Environment;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::fmt;
use tracing::debug;

pub const USER_ID_COOKIE: &str = "userID";
pub const USER_ID_HEADER: &str = "x-user-id";

const COOKIE_MAX_AGE_HOURS: i64 = 24;
const MAX_USER_ID_LEN: usize = 64;

/// Stable per-client identifier, available to handlers as an extension
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-supplied IDs end up in file names, so only `[A-Za-z0-9_-]` passes
pub fn is_valid_user_id(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= MAX_USER_ID_LEN
        && candidate
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Resolve the user ID from the cookie, then the header, else issue a new one
/// and set it as a cookie on the response.
pub async fn resolve_identity(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let supplied = jar
        .get(USER_ID_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|id| is_valid_user_id(id))
        .or_else(|| {
            request
                .headers()
                .get(USER_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|id| is_valid_user_id(id))
                .map(str::to_string)
        });

    if let Some(user_id) = supplied {
        request.extensions_mut().insert(UserId(user_id));
        return next.run(request).await;
    }

    let user_id = uuid::Uuid::new_v4().to_string();
    debug!("Issuing new user ID {}", user_id);

    let cookie = identity_cookie(user_id.clone(), state.config.service.environment);
    request.extensions_mut().insert(UserId(user_id));
    let response = next.run(request).await;

    (jar.add(cookie), response).into_response()
}

/// HttpOnly cookie valid for 24 hours; `Secure` + `SameSite=Strict` in production
pub fn identity_cookie(user_id: String, environment: Environment) -> Cookie<'static> {
    let production = environment.is_production();

    Cookie::build((USER_ID_COOKIE, user_id))
        .path("/")
        .http_only(true)
        .secure(production)
        .same_site(if production {
            SameSite::Strict
        } else {
            SameSite::Lax
        })
        .max_age(time::Duration::hours(COOKIE_MAX_AGE_HOURS))
        .build()
}
