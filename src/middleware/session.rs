//! Session cookie handling.
//!
//! A session is an HS256 JWT stored in the `vp_session` cookie. Its claims
//! carry everything the access rules need (role, admin flag, onboarding
//! state), so route middleware never has to query the database.
//!
//! This middleware runs on every request:
//! 1. Read the session cookie, if any
//! 2. Verify signature and expiry
//! 3. Insert [`MaybeSession`] (always) and [`Session`] (when valid) into
//!    the request extensions
//!
//! Invalid or expired cookies are treated as "no session"; rejecting
//! requests is left to the access middleware.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::user::{Role, User},
    state::AppState,
};

pub const SESSION_COOKIE: &str = "vp_session";

/// Claims of an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// User id
    pub sub: Uuid,
    pub role: Option<Role>,
    pub is_admin: bool,
    pub onboarded: bool,
    pub iat: i64,
    pub exp: i64,
}

impl Session {
    pub fn user_id(&self) -> Uuid {
        self.sub
    }

    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        if !self.onboarded {
            return Err(AppError::OnboardingRequired);
        }
        if self.role == Some(role) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    /// Brands and admins may report campaign metrics.
    pub fn require_brand_or_admin(&self) -> Result<(), AppError> {
        if self.is_admin {
            return Ok(());
        }
        self.require_role(Role::Brand)
    }
}

/// Session lookup result for routes that work with or without a login.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Session>);

/// Signing keys and lifetime for session tokens.
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Issue a session reflecting the user's current flags.
    pub fn issue(&self, user: &User) -> Result<(Session, String), AppError> {
        let now = Utc::now();
        let session = Session {
            sub: user.id,
            role: user.role,
            is_admin: user.is_admin,
            onboarded: user.onboarding_complete,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &session, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign session: {}", e)))?;

        Ok((session, token))
    }

    /// Decode and validate a token. `None` for anything invalid or expired.
    pub fn decode(&self, token: &str) -> Option<Session> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        match jsonwebtoken::decode::<Session>(token, &self.decoding, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = %e, "rejected session cookie");
                None
            }
        }
    }
}

/// Build the session cookie for a freshly issued token.
///
/// The cookie itself has no expiry; the token's `exp` claim bounds the session.
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Expired, empty cookie that clears the session on logout.
pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    cookie.make_removal();
    cookie
}

/// Session decoding middleware.
///
/// # Arguments
///
/// * `State(state)` - Application state holding the signing keys
/// * `request` - Incoming HTTP request (mutable to add extensions)
/// * `next` - Next middleware/handler in the chain
pub async fn session_layer(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let jar = CookieJar::from_headers(request.headers());
    let session = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value())
        .filter(|v| !v.is_empty())
        .and_then(|token| state.sessions.decode(token));

    if let Some(ref session) = session {
        request.extensions_mut().insert(session.clone());
    }
    request.extensions_mut().insert(MaybeSession(session));

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Option<Role>, is_admin: bool, onboarded: bool) -> User {
        User {
            id: Uuid::new_v4(),
            email: "ana@example.com".into(),
            password_hash: String::new(),
            name: "Ana".into(),
            role,
            is_admin,
            onboarding_complete: onboarded,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn issued_token_round_trips() {
        let keys = SessionKeys::new("secret", 1);
        let (session, token) = keys.issue(&user(Some(Role::Brand), false, true)).unwrap();

        let decoded = keys.decode(&token).unwrap();
        assert_eq!(decoded, session);
        assert_eq!(decoded.role, Some(Role::Brand));
        assert!(decoded.onboarded);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let (_, token) = SessionKeys::new("secret-a", 1)
            .issue(&user(None, false, false))
            .unwrap();
        assert!(SessionKeys::new("secret-b", 1).decode(&token).is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = SessionKeys::new("secret", -1);
        let (_, token) = keys.issue(&user(None, false, false)).unwrap();
        assert!(keys.decode(&token).is_none());
    }

    #[test]
    fn role_guards() {
        let keys = SessionKeys::new("secret", 1);
        let (creator, _) = keys.issue(&user(Some(Role::Creator), false, true)).unwrap();
        assert!(creator.require_role(Role::Creator).is_ok());
        assert!(matches!(creator.require_role(Role::Brand), Err(AppError::Forbidden)));
        assert!(matches!(creator.require_admin(), Err(AppError::Forbidden)));

        let (fresh, _) = keys.issue(&user(None, false, false)).unwrap();
        assert!(matches!(
            fresh.require_role(Role::Creator),
            Err(AppError::OnboardingRequired)
        ));

        let (admin, _) = keys.issue(&user(None, true, false)).unwrap();
        assert!(admin.require_brand_or_admin().is_ok());
    }

    #[test]
    fn cookie_attributes() {
        let cookie = session_cookie("tok".into(), true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
    }
}
