//! Route access rules.
//!
//! Decides, from the request path and the session flags alone, whether a
//! request may continue. Page-style routes (`/dashboard`, `/brand/...`,
//! `/creator/...`, `/admin/...`, `/onboarding`) answer a denial with a
//! redirect to the right place. API routes answer with a JSON error.

use axum::{
    extract::Request,
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    middleware::session::{MaybeSession, Session},
    models::user::Role,
};

pub const LOGIN_PATH: &str = "/login";
pub const ONBOARDING_PATH: &str = "/onboarding";

/// Why a request was not allowed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// No valid session
    Unauthenticated,
    /// Signed in but onboarding is not finished
    OnboardingRequired,
    /// Onboarding pages after onboarding is done
    AlreadyOnboarded,
    /// Area reserved for another role or for admins
    WrongArea,
    /// `/dashboard` always forwards to the role's own dashboard
    Dispatch,
}

impl Denial {
    /// Where a page request should be sent instead.
    pub fn redirect_target(self, session: Option<&Session>) -> &'static str {
        match (self, session) {
            (Denial::Unauthenticated, _) | (_, None) => LOGIN_PATH,
            (Denial::OnboardingRequired, Some(_)) => ONBOARDING_PATH,
            (_, Some(session)) => home_path(session),
        }
    }

    fn into_api_error(self) -> AppError {
        match self {
            Denial::Unauthenticated => AppError::Unauthorized,
            Denial::OnboardingRequired => AppError::OnboardingRequired,
            Denial::AlreadyOnboarded => {
                AppError::InvalidState("Onboarding already completed".to_string())
            }
            Denial::WrongArea | Denial::Dispatch => AppError::Forbidden,
        }
    }
}

/// Landing page for a signed-in user.
pub fn home_path(session: &Session) -> &'static str {
    if session.is_admin {
        return "/admin/dashboard";
    }
    match (session.onboarded, session.role) {
        (true, Some(Role::Brand)) => "/brand/dashboard",
        (true, Some(Role::Creator)) => "/creator/dashboard",
        _ => ONBOARDING_PATH,
    }
}

/// `path` equals `prefix` or lies below it.
fn under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn is_public(path: &str) -> bool {
    path == "/"
        || path == "/health"
        || path == LOGIN_PATH
        || path == "/register"
        || under(path, "/api/auth")
        || under(path, "/api/webhooks")
        || under(path, "/r")
}

fn is_onboarding(path: &str) -> bool {
    under(path, ONBOARDING_PATH) || path.starts_with("/api/rpc/onboarding.")
}

fn is_api(path: &str) -> bool {
    under(path, "/api")
}

/// Apply the access rules to a path.
pub fn check(path: &str, session: Option<&Session>) -> Result<(), Denial> {
    if is_public(path) {
        return Ok(());
    }

    let Some(session) = session else {
        return Err(Denial::Unauthenticated);
    };

    // Admins are provisioned by configuration and skip onboarding
    let onboarded = session.onboarded || session.is_admin;

    if is_onboarding(path) {
        return if onboarded {
            Err(Denial::AlreadyOnboarded)
        } else {
            Ok(())
        };
    }

    if !onboarded {
        return Err(Denial::OnboardingRequired);
    }

    if path == "/dashboard" {
        return Err(Denial::Dispatch);
    }

    let allowed = if under(path, "/admin") {
        session.is_admin
    } else if under(path, "/brand") {
        session.role == Some(Role::Brand)
    } else if under(path, "/creator") {
        session.role == Some(Role::Creator)
    } else {
        true
    };

    if allowed { Ok(()) } else { Err(Denial::WrongArea) }
}

/// Access middleware. Must run after [`super::session::session_layer`].
pub async fn access_layer(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let session = request
        .extensions()
        .get::<MaybeSession>()
        .and_then(|s| s.0.clone());

    match check(&path, session.as_ref()) {
        Ok(()) => next.run(request).await,
        Err(denial) if is_api(&path) => denial.into_api_error().into_response(),
        Err(denial) => {
            let target = denial.redirect_target(session.as_ref());
            tracing::debug!(%path, ?denial, target, "redirecting");
            (StatusCode::SEE_OTHER, [(header::LOCATION, target)]).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn session(role: Option<Role>, is_admin: bool, onboarded: bool) -> Session {
        Session {
            sub: Uuid::new_v4(),
            role,
            is_admin,
            onboarded,
            iat: 0,
            exp: i64::MAX,
        }
    }

    #[test]
    fn public_paths_need_no_session() {
        for path in ["/", "/health", "/api/auth/login", "/api/webhooks/gateway", "/r/abc123"] {
            assert_eq!(check(path, None), Ok(()), "{path}");
        }
    }

    #[test]
    fn unauthenticated_users_go_to_login() {
        for path in ["/dashboard", "/brand/dashboard", "/admin/dashboard", "/api/rpc/wallet.get"] {
            assert_eq!(check(path, None), Err(Denial::Unauthenticated));
        }
        assert_eq!(Denial::Unauthenticated.redirect_target(None), "/login");
    }

    #[test]
    fn prefixes_match_whole_segments() {
        // "/rules" is not under "/r", "/brandx" is not under "/brand"
        assert_eq!(check("/rules", None), Err(Denial::Unauthenticated));
        let creator = session(Some(Role::Creator), false, true);
        assert_eq!(check("/brandx", Some(&creator)), Ok(()));
    }

    #[test]
    fn users_without_onboarding_are_sent_to_onboarding() {
        let fresh = session(None, false, false);
        assert_eq!(check("/creator/dashboard", Some(&fresh)), Err(Denial::OnboardingRequired));
        assert_eq!(check("/api/rpc/campaign.list", Some(&fresh)), Err(Denial::OnboardingRequired));
        assert_eq!(Denial::OnboardingRequired.redirect_target(Some(&fresh)), "/onboarding");

        assert_eq!(check("/onboarding", Some(&fresh)), Ok(()));
        assert_eq!(check("/api/rpc/onboarding.complete", Some(&fresh)), Ok(()));
    }

    #[test]
    fn onboarded_users_leave_onboarding() {
        let brand = session(Some(Role::Brand), false, true);
        assert_eq!(check("/onboarding", Some(&brand)), Err(Denial::AlreadyOnboarded));
        assert_eq!(
            Denial::AlreadyOnboarded.redirect_target(Some(&brand)),
            "/brand/dashboard"
        );
    }

    #[test]
    fn roles_are_confined_to_their_area() {
        let brand = session(Some(Role::Brand), false, true);
        let creator = session(Some(Role::Creator), false, true);

        assert_eq!(check("/brand/dashboard", Some(&brand)), Ok(()));
        assert_eq!(check("/creator/dashboard", Some(&brand)), Err(Denial::WrongArea));
        assert_eq!(check("/brand/campaigns", Some(&creator)), Err(Denial::WrongArea));
        assert_eq!(check("/admin/dashboard", Some(&creator)), Err(Denial::WrongArea));

        assert_eq!(Denial::WrongArea.redirect_target(Some(&creator)), "/creator/dashboard");
    }

    #[test]
    fn admins_reach_admin_area_without_onboarding() {
        let admin = session(None, true, false);
        assert_eq!(check("/admin/dashboard", Some(&admin)), Ok(()));
        assert_eq!(check("/api/rpc/payout.approve", Some(&admin)), Ok(()));
        assert_eq!(home_path(&admin), "/admin/dashboard");
    }

    #[test]
    fn dashboard_dispatches_by_role() {
        let creator = session(Some(Role::Creator), false, true);
        assert_eq!(check("/dashboard", Some(&creator)), Err(Denial::Dispatch));
        assert_eq!(Denial::Dispatch.redirect_target(Some(&creator)), "/creator/dashboard");
    }
}
