//! Payout procedures (`/api/rpc/payout.*`) and the creator payout account.

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    middleware::session::Session,
    models::{
        campaign::IdRequest,
        payout::{Payout, PayoutListQuery, PayoutRequest, RejectPayoutRequest},
        user::{CreatorProfile, Role, UpdatePayoutAccountRequest},
    },
    services::{auth_service, payout_service},
    state::AppState,
};

/// `POST payout.request`
///
/// ```json
/// { "amount_cents": 15000 }
/// ```
///
/// Holds the amount immediately; 422 when the balance is too low.
pub async fn request(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<PayoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    session.require_role(Role::Creator)?;
    let payout = payout_service::request_payout(
        &state.pool,
        &state.config,
        session.user_id(),
        request.amount_cents,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(payout)))
}

/// `GET payout.list[?status=PENDING_APPROVAL]`
pub async fn list(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<PayoutListQuery>,
) -> Result<Json<Vec<Payout>>, AppError> {
    if !session.is_admin {
        session.require_role(Role::Creator)?;
    }
    let payouts = payout_service::list_payouts(&state.pool, &session, query.status).await?;
    Ok(Json(payouts))
}

/// `POST payout.approve` (admin)
///
/// A payout that is no longer PENDING_APPROVAL answers 409. A gateway
/// error marks the payout FAILED, refunds it and answers 502.
pub async fn approve(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<IdRequest>,
) -> Result<Json<Payout>, AppError> {
    session.require_admin()?;
    let payout = payout_service::approve_payout(
        &state.pool,
        &state.gateway,
        &state.config,
        session.user_id(),
        request.id,
    )
    .await?;
    Ok(Json(payout))
}

/// `POST payout.reject` (admin)
///
/// ```json
/// { "id": "…", "reason": "Payout account does not match the creator" }
/// ```
pub async fn reject(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<RejectPayoutRequest>,
) -> Result<Json<Payout>, AppError> {
    session.require_admin()?;
    let payout =
        payout_service::reject_payout(&state.pool, session.user_id(), request.id, &request.reason)
            .await?;
    Ok(Json(payout))
}

/// `POST creator.updatePayoutAccount`
pub async fn update_payout_account(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<UpdatePayoutAccountRequest>,
) -> Result<Json<CreatorProfile>, AppError> {
    session.require_role(Role::Creator)?;
    let profile =
        auth_service::update_payout_account(&state.pool, session.user_id(), &request.payout_account)
            .await?;
    Ok(Json(profile))
}
