//! HTTP router.
//!
//! # Layout
//!
//! - Pages: `/`, `/login`, `/register`, `/onboarding`, `/dashboard`,
//!   `/brand/dashboard`, `/creator/dashboard`, `/admin/dashboard`
//! - Auth: `/api/auth/{register,login,logout,session}`
//! - Procedures: `/api/rpc/{area}.{procedure}`, GET for queries and POST
//!   for mutations
//! - Payments: `POST /api/payments/create-order`,
//!   `POST /api/webhooks/gateway`
//! - Tracking: `GET /r/{code}`
//! - `GET /health`
//!
//! Every request passes the session layer (outermost) and then the access
//! layer before reaching a handler.

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{
        auth, campaigns, dashboard, fraud, health, marketplace, onboarding, payouts, wallet,
        webhooks,
    },
    middleware::{access, session},
    state::AppState,
};

/// `/api/rpc/...` path for a procedure.
macro_rules! rpc {
    ($name:literal) => {
        concat!("/api/rpc/", $name)
    };
}

pub fn build_router(state: AppState) -> Router {
    let pages = Router::new()
        .route("/", get(auth::index))
        .route("/login", get(auth::sign_in_page))
        .route("/register", get(auth::sign_in_page))
        .route("/onboarding", get(onboarding::status))
        .route("/dashboard", get(dashboard::dispatch))
        .route("/brand/dashboard", get(dashboard::brand_dashboard))
        .route("/creator/dashboard", get(dashboard::creator_dashboard))
        .route("/admin/dashboard", get(dashboard::admin_dashboard));

    let auth_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/session", get(auth::current_session));

    let rpc = Router::new()
        // Onboarding
        .route(rpc!("onboarding.status"), get(onboarding::status))
        .route(rpc!("onboarding.complete"), post(onboarding::complete))
        .route(rpc!("creator.updatePayoutAccount"), post(payouts::update_payout_account))
        // Campaigns
        .route(rpc!("campaign.list"), get(campaigns::list))
        .route(rpc!("campaign.get"), get(campaigns::get))
        .route(rpc!("campaign.create"), post(campaigns::create))
        .route(rpc!("campaign.update"), post(campaigns::update))
        .route(rpc!("campaign.publish"), post(campaigns::publish))
        .route(rpc!("campaign.pause"), post(campaigns::pause))
        .route(rpc!("campaign.resume"), post(campaigns::resume))
        .route(rpc!("campaign.complete"), post(campaigns::complete))
        .route(rpc!("campaign.cancel"), post(campaigns::cancel))
        .route(rpc!("campaign.applications"), get(campaigns::applications))
        .route(rpc!("campaign.reviewApplication"), post(campaigns::review_application))
        .route(rpc!("campaign.recordMetrics"), post(campaigns::record_metrics))
        // Marketplace
        .route(rpc!("marketplace.browse"), get(marketplace::browse))
        .route(rpc!("marketplace.apply"), post(marketplace::apply))
        .route(rpc!("marketplace.myParticipations"), get(marketplace::my_participations))
        // Wallet
        .route(rpc!("wallet.get"), get(wallet::get))
        .route(rpc!("wallet.transactions"), get(wallet::transactions))
        .route(rpc!("wallet.reconcile"), get(wallet::reconcile))
        // Payouts
        .route(rpc!("payout.request"), post(payouts::request))
        .route(rpc!("payout.list"), get(payouts::list))
        .route(rpc!("payout.approve"), post(payouts::approve))
        .route(rpc!("payout.reject"), post(payouts::reject))
        // Fraud review
        .route(rpc!("fraud.list"), get(fraud::list))
        .route(rpc!("fraud.get"), get(fraud::get))
        .route(rpc!("fraud.create"), post(fraud::create))
        .route(rpc!("fraud.startReview"), post(fraud::start_review))
        .route(rpc!("fraud.resolve"), post(fraud::resolve))
        .route(rpc!("fraud.dismiss"), post(fraud::dismiss))
        // Analytics
        .route(rpc!("analytics.platform"), get(dashboard::platform))
        .route(rpc!("analytics.brand"), get(dashboard::brand))
        .route(rpc!("analytics.creator"), get(dashboard::creator));

    let payments = Router::new()
        .route("/api/payments/create-order", post(wallet::create_order))
        .route("/api/webhooks/gateway", post(webhooks::gateway_webhook))
        .route("/r/{code}", get(marketplace::track_click))
        .route("/health", get(health::health_check));

    Router::new()
        .merge(pages)
        .merge(auth_routes)
        .merge(rpc)
        .merge(payments)
        // Added first, so it runs after the session layer
        .layer(axum_middleware::from_fn(access::access_layer))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            session::session_layer,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
        response::Response,
    };
    use chrono::Utc;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::{
        middleware::session::SESSION_COOKIE,
        models::user::{Role, User},
        services::gateway_client::generate_signature,
    };

    fn cookie_for(state: &AppState, role: Option<Role>, is_admin: bool, onboarded: bool) -> String {
        let user = User {
            id: Uuid::new_v4(),
            email: "ana@example.com".into(),
            password_hash: String::new(),
            name: "Ana".into(),
            role,
            is_admin,
            onboarding_complete: onboarded,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let (_, token) = state.sessions.issue(&user).unwrap();
        format!("{}={}", SESSION_COOKIE, token)
    }

    async fn send(state: &AppState, request: Request<Body>) -> Response {
        build_router(state.clone()).oneshot(request).await.unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn pages_redirect_anonymous_visitors_to_login() {
        let state = AppState::for_tests();
        for path in ["/dashboard", "/brand/dashboard", "/admin/dashboard", "/onboarding"] {
            let response = send(&state, get(path, None)).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
            assert_eq!(location(&response), "/login");
        }
    }

    #[tokio::test]
    async fn api_calls_without_session_get_401() {
        let state = AppState::for_tests();
        let response = send(&state, get("/api/rpc/wallet.get", None)).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"]["code"], "unauthorized");
    }

    #[tokio::test]
    async fn tampered_cookie_counts_as_anonymous() {
        let state = AppState::for_tests();
        let cookie = format!("{}=not.a.jwt", SESSION_COOKIE);
        let response = send(&state, get("/creator/dashboard", Some(&cookie))).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn wrong_role_is_sent_home() {
        let state = AppState::for_tests();
        let creator = cookie_for(&state, Some(Role::Creator), false, true);

        let response = send(&state, get("/brand/dashboard", Some(&creator))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/creator/dashboard");

        let response = send(&state, get("/admin/dashboard", Some(&creator))).await;
        assert_eq!(location(&response), "/creator/dashboard");
    }

    #[tokio::test]
    async fn dashboard_forwards_by_role() {
        let state = AppState::for_tests();
        let brand = cookie_for(&state, Some(Role::Brand), false, true);

        let response = send(&state, get("/dashboard", Some(&brand))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/brand/dashboard");
    }

    #[tokio::test]
    async fn onboarding_gate() {
        let state = AppState::for_tests();
        let fresh = cookie_for(&state, None, false, false);

        let response = send(&state, get("/creator/dashboard", Some(&fresh))).await;
        assert_eq!(location(&response), "/onboarding");

        let response = send(&state, get("/api/rpc/campaign.list", Some(&fresh))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["error"]["code"], "onboarding_required");

        let response = send(&state, get("/onboarding", Some(&fresh))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["onboarding_complete"], false);

        let onboarded = cookie_for(&state, Some(Role::Brand), false, true);
        let response = send(&state, get("/onboarding", Some(&onboarded))).await;
        assert_eq!(location(&response), "/brand/dashboard");
    }

    #[tokio::test]
    async fn session_endpoint_reflects_cookie() {
        let state = AppState::for_tests();

        let response = send(&state, get("/api/auth/session", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let admin = cookie_for(&state, None, true, false);
        let response = send(&state, get("/api/auth/session", Some(&admin))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["is_admin"], true);
    }

    #[tokio::test]
    async fn signed_in_users_skip_the_login_page() {
        let state = AppState::for_tests();
        let admin = cookie_for(&state, None, true, false);

        let response = send(&state, get("/login", Some(&admin))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin/dashboard");

        let response = send(&state, get("/login", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn logout_clears_the_cookie() {
        let state = AppState::for_tests();
        let request = Request::builder()
            .method("POST")
            .uri("/api/auth/logout")
            .body(Body::empty())
            .unwrap();
        let response = send(&state, request).await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with(&format!("{}=", SESSION_COOKIE)));
    }

    #[tokio::test]
    async fn webhook_with_bad_signature_is_rejected() {
        let state = AppState::for_tests();
        let body = r#"{"event":"payment.captured","payload":{}}"#;

        let request = Request::builder()
            .method("POST")
            .uri("/api/webhooks/gateway")
            .header("X-Gateway-Signature", generate_signature("wrong-secret", body.as_bytes()))
            .body(Body::from(body))
            .unwrap();
        let response = send(&state, request).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"]["code"], "invalid_signature");
    }

    #[tokio::test]
    async fn signed_but_malformed_webhook_is_a_bad_request() {
        let state = AppState::for_tests();
        let body = r#"{"event":"payment.captured","payload":{}}"#;

        let request = Request::builder()
            .method("POST")
            .uri("/api/webhooks/gateway")
            .header("X-Gateway-Signature", generate_signature("whsec_test", body.as_bytes()))
            .body(Body::from(body))
            .unwrap();
        let response = send(&state, request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn admin_procedures_refuse_other_roles() {
        let state = AppState::for_tests();
        let creator = cookie_for(&state, Some(Role::Creator), false, true);

        let request = Request::builder()
            .method("POST")
            .uri("/api/rpc/payout.approve")
            .header(header::COOKIE, creator)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(format!(r#"{{"id":"{}"}}"#, Uuid::new_v4())))
            .unwrap();
        let response = send(&state, request).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
