//! Onboarding: choosing a role and filling in its profile.

use axum::{Extension, Json, extract::State, response::IntoResponse};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;

use crate::{
    error::AppError,
    handlers::auth::sign_in,
    middleware::session::Session,
    models::user::{OnboardingRequest, UserResponse},
    services::auth_service::{self, Profile},
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct OnboardingResponse {
    pub user: UserResponse,
    pub profile: Profile,
    pub redirect_to: &'static str,
}

/// `POST /api/rpc/onboarding.complete`
///
/// ```json
/// {
///   "role": "CREATOR",
///   "profile": { "display_name": "Ana Makes", "niche": "fitness", "payout_account": "acct_123" }
/// }
/// ```
///
/// Creates the profile and wallet, then re-issues the session cookie with
/// `onboarded = true`.
pub async fn complete(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    jar: CookieJar,
    Json(request): Json<OnboardingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (user, profile) =
        auth_service::complete_onboarding(&state.pool, &state.config, session.user_id(), request)
            .await?;

    let (jar, auth) = sign_in(&state, jar, user)?;

    Ok((
        jar,
        Json(OnboardingResponse {
            user: auth.user,
            profile,
            redirect_to: auth.redirect_to,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct OnboardingStatus {
    pub onboarding_complete: bool,
    pub roles: [&'static str; 2],
}

/// `GET /onboarding` and `GET /api/rpc/onboarding.status`
///
/// Only reachable before onboarding; the access layer sends onboarded
/// users to their dashboard.
pub async fn status(Extension(session): Extension<Session>) -> Json<OnboardingStatus> {
    Json(OnboardingStatus {
        onboarding_complete: session.onboarded,
        roles: ["BRAND", "CREATOR"],
    })
}
