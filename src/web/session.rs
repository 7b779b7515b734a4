//! Session-cookie plumbing for the routing layer.
//!
//! The request's session state is a single cookie holding an opaque token;
//! everything the token means is decided by the Sessioning concept.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// The raw session token presented by the request, if any. Carrying no
/// token (or a stale one) is a valid unauthenticated state, so extraction
/// never fails.
#[derive(Debug, Clone)]
pub struct SessionToken(pub Option<String>);

impl SessionToken {
    #[must_use]
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("cookie")
            .and_then(|h| h.to_str().ok())
            .and_then(|cookies| {
                cookies.split(';').find_map(|cookie| {
                    let cookie = cookie.trim();
                    cookie.strip_prefix(&format!("{SESSION_COOKIE}="))
                })
            })
            .map(String::from);

        Ok(Self(token))
    }
}

/// `Set-Cookie` value establishing a session.
#[must_use]
pub fn set_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax")
}

/// `Set-Cookie` value clearing the session cookie.
#[must_use]
pub fn clear_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
