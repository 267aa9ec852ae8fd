//! Analytics procedures and the role dashboards.
//!
//! Page routes return JSON overviews; rendering them is up to the client.

use axum::{
    Extension, Json,
    extract::State,
    response::Redirect,
};
use serde::Serialize;

use crate::{
    error::AppError,
    middleware::{access, session::Session},
    models::{
        campaign::Participation,
        payout::{Payout, PayoutStatus},
        user::Role,
        webhook::GatewayEventRecord,
    },
    services::{
        analytics_service::{self, BrandOverview, CreatorOverview, PlatformOverview},
        marketplace_service, payout_service, webhook_service,
    },
    state::AppState,
};

/// `GET analytics.platform` (admin)
pub async fn platform(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<PlatformOverview>, AppError> {
    session.require_admin()?;
    Ok(Json(analytics_service::platform_overview(&state.pool).await?))
}

/// `GET analytics.brand`
pub async fn brand(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<BrandOverview>, AppError> {
    session.require_role(Role::Brand)?;
    Ok(Json(
        analytics_service::brand_overview(&state.pool, session.user_id()).await?,
    ))
}

/// `GET analytics.creator`
pub async fn creator(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<CreatorOverview>, AppError> {
    session.require_role(Role::Creator)?;
    Ok(Json(
        analytics_service::creator_overview(&state.pool, session.user_id()).await?,
    ))
}

/// `GET /brand/dashboard`
pub async fn brand_dashboard(
    state: State<AppState>,
    session: Extension<Session>,
) -> Result<Json<BrandOverview>, AppError> {
    brand(state, session).await
}

#[derive(Debug, Serialize)]
pub struct CreatorDashboard {
    pub overview: CreatorOverview,
    pub participations: Vec<Participation>,
}

/// `GET /creator/dashboard`
pub async fn creator_dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<CreatorDashboard>, AppError> {
    session.require_role(Role::Creator)?;
    let overview = analytics_service::creator_overview(&state.pool, session.user_id()).await?;
    let participations =
        marketplace_service::my_participations(&state.pool, session.user_id()).await?;

    Ok(Json(CreatorDashboard {
        overview,
        participations,
    }))
}

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub overview: PlatformOverview,
    pub pending_payouts: Vec<Payout>,
    pub recent_gateway_events: Vec<GatewayEventRecord>,
}

/// `GET /admin/dashboard`
pub async fn admin_dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<AdminDashboard>, AppError> {
    session.require_admin()?;
    let overview = analytics_service::platform_overview(&state.pool).await?;
    let pending_payouts =
        payout_service::list_payouts(&state.pool, &session, Some(PayoutStatus::PendingApproval))
            .await?;
    let recent_gateway_events = webhook_service::recent_events(&state.pool, 20).await?;

    Ok(Json(AdminDashboard {
        overview,
        pending_payouts,
        recent_gateway_events,
    }))
}

/// `GET /dashboard`: forward to the role's own dashboard.
pub async fn dispatch(Extension(session): Extension<Session>) -> Redirect {
    Redirect::to(access::home_path(&session))
}
