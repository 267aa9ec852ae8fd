//! Brand campaign procedures (`/api/rpc/campaign.*`).
//!
//! Queries take their input from the query string, mutations from a JSON body.
//! Every procedure except `recordMetrics` is brand-only; `recordMetrics` is
//! also open to admins.

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
        campaign::{
            Campaign, CampaignListQuery, CreateCampaignRequest, IdRequest, Participation,
            RecordMetricsRequest, ReviewApplicationRequest, UpdateCampaignRequest,
        },
        user::Role,
    },
    services::campaign_service::{self, SettlementResult},
    state::AppState,
};

/// `GET campaign.list?status=ACTIVE`
pub async fn list(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<CampaignListQuery>,
) -> Result<Json<Vec<Campaign>>, AppError> {
    session.require_role(Role::Brand)?;
    let campaigns =
        campaign_service::list_campaigns(&state.pool, session.user_id(), query.status).await?;
    Ok(Json(campaigns))
}

/// `GET campaign.get?id=...`
pub async fn get(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<IdRequest>,
) -> Result<Json<Campaign>, AppError> {
    session.require_brand_or_admin()?;
    let campaign = campaign_service::get_campaign(&state.pool, &session, query.id).await?;
    Ok(Json(campaign))
}

/// `POST campaign.create`
///
/// # Request Body
///
/// ```json
/// {
///   "title": "Summer drop",
///   "landing_url": "https://acme.example/summer",
///   "payout_type": "CPC",
///   "payout_rate_cents": 25,
///   "budget_cents": 500000
/// }
/// ```
///
/// Returns 201 Created with the DRAFT campaign.
pub async fn create(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<CreateCampaignRequest>,
) -> Result<impl IntoResponse, AppError> {
    session.require_role(Role::Brand)?;
    let campaign =
        campaign_service::create_campaign(&state.pool, session.user_id(), request).await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// `POST campaign.update`
pub async fn update(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<UpdateCampaignRequest>,
) -> Result<Json<Campaign>, AppError> {
    session.require_role(Role::Brand)?;
    let campaign =
        campaign_service::update_campaign(&state.pool, session.user_id(), request).await?;
    Ok(Json(campaign))
}

/// `POST campaign.publish`. Locks the budget in escrow; 422 if the balance
/// does not cover it.
pub async fn publish(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<IdRequest>,
) -> Result<Json<Campaign>, AppError> {
    session.require_role(Role::Brand)?;
    let campaign =
        campaign_service::publish_campaign(&state.pool, session.user_id(), request.id).await?;
    Ok(Json(campaign))
}

pub async fn pause(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<IdRequest>,
) -> Result<Json<Campaign>, AppError> {
    session.require_role(Role::Brand)?;
    let campaign =
        campaign_service::pause_campaign(&state.pool, session.user_id(), request.id).await?;
    Ok(Json(campaign))
}

pub async fn resume(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<IdRequest>,
) -> Result<Json<Campaign>, AppError> {
    session.require_role(Role::Brand)?;
    let campaign =
        campaign_service::resume_campaign(&state.pool, session.user_id(), request.id).await?;
    Ok(Json(campaign))
}

pub async fn complete(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<IdRequest>,
) -> Result<Json<Campaign>, AppError> {
    session.require_role(Role::Brand)?;
    let campaign =
        campaign_service::complete_campaign(&state.pool, session.user_id(), request.id).await?;
    Ok(Json(campaign))
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<IdRequest>,
) -> Result<Json<Campaign>, AppError> {
    session.require_role(Role::Brand)?;
    let campaign =
        campaign_service::cancel_campaign(&state.pool, session.user_id(), request.id).await?;
    Ok(Json(campaign))
}

/// `GET campaign.applications?id=<campaign id>`
pub async fn applications(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<IdRequest>,
) -> Result<Json<Vec<Participation>>, AppError> {
    session.require_role(Role::Brand)?;
    let participations =
        campaign_service::list_applications(&state.pool, session.user_id(), query.id).await?;
    Ok(Json(participations))
}

/// `POST campaign.reviewApplication`
///
/// ```json
/// { "participation_id": "…", "decision": "approve" }
/// ```
pub async fn review_application(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<ReviewApplicationRequest>,
) -> Result<Json<Participation>, AppError> {
    session.require_role(Role::Brand)?;
    let participation = campaign_service::review_application(
        &state.pool,
        session.user_id(),
        request.participation_id,
        request.decision,
    )
    .await?;
    Ok(Json(participation))
}

/// `POST campaign.recordMetrics`
///
/// ```json
/// { "participation_id": "…", "views": 120000, "conversions": 40 }
/// ```
///
/// Returns the updated participation, the amount settled by this report
/// and any fraud flags it raised.
pub async fn record_metrics(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<RecordMetricsRequest>,
) -> Result<Json<SettlementResult>, AppError> {
    session.require_brand_or_admin()?;
    let result = campaign_service::record_metrics(&state.pool, &session, request).await?;
    Ok(Json(result))
}
