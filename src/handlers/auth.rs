//! Authentication endpoints under `/api/auth`.
//!
//! Successful register and login calls set the `vp_session` cookie.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use serde_json::json;

use crate::{
    error::AppError,
    middleware::session::{self, MaybeSession, Session},
    models::user::{LoginRequest, RegisterRequest, User, UserResponse},
    services::auth_service,
    state::AppState,
};

/// Body returned by register and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub session: Session,
    /// Where the client should go next
    pub redirect_to: &'static str,
}

/// Issue a session for `user` and attach the cookie to `jar`.
pub fn sign_in(state: &AppState, jar: CookieJar, user: User) -> Result<(CookieJar, AuthResponse), AppError> {
    let (session, token) = state.sessions.issue(&user)?;
    let jar = jar.add(session::session_cookie(token, state.config.cookie_secure));
    let redirect_to = crate::middleware::access::home_path(&session);

    Ok((
        jar,
        AuthResponse {
            user: user.into(),
            session,
            redirect_to,
        },
    ))
}

/// Create an account.
///
/// # Request Body
///
/// ```json
/// { "email": "ana@example.com", "password": "correct horse", "name": "Ana" }
/// ```
///
/// # Response
///
/// 201 Created with the user and its session; the new user still has to
/// complete onboarding, so `redirect_to` is `/onboarding` (or the admin
/// dashboard for emails listed in `ADMIN_EMAILS`).
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = auth_service::register(&state.pool, &state.config, request).await?;
    let (jar, body) = sign_in(&state, jar, user)?;

    Ok((StatusCode::CREATED, jar, Json(body)))
}

/// Sign in with email and password. Wrong credentials give 401.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = auth_service::login(&state.pool, &request.email, &request.password).await?;
    tracing::info!(user_id = %user.id, "user signed in");

    let (jar, body) = sign_in(&state, jar, user)?;
    Ok((jar, Json(body)))
}

/// Clear the session cookie.
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.add(session::removal_cookie()),
        StatusCode::NO_CONTENT,
    )
}

/// Current session claims, or 401 without a valid cookie.
pub async fn current_session(
    Extension(session): Extension<MaybeSession>,
) -> Result<Json<Session>, AppError> {
    session.0.map(Json).ok_or(AppError::Unauthorized)
}

/// `GET /login` and `GET /register`: signed-in users go home, everyone
/// else gets the endpoints to post credentials to.
pub async fn sign_in_page(Extension(session): Extension<MaybeSession>) -> Response {
    match session.0 {
        Some(session) => Redirect::to(crate::middleware::access::home_path(&session)).into_response(),
        None => Json(json!({
            "login": "/api/auth/login",
            "register": "/api/auth/register",
        }))
        .into_response(),
    }
}

/// `GET /`
pub async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "service": "viral-payouts",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
