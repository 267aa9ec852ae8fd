//! Creator marketplace procedures and the public click tracker.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
};

use crate::{
    error::AppError,
    middleware::session::Session,
    models::{
        campaign::{ApplyRequest, BrowseQuery, Campaign, Participation},
        user::Role,
    },
    services::{campaign_service, marketplace_service},
    state::AppState,
};

/// `GET marketplace.browse?payout_type=CPC&search=summer&limit=20&offset=0`
pub async fn browse(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<Vec<Campaign>>, AppError> {
    session.require_role(Role::Creator)?;
    let campaigns = marketplace_service::browse(&state.pool, query).await?;
    Ok(Json(campaigns))
}

/// `POST marketplace.apply`
///
/// ```json
/// { "campaign_id": "…", "pitch": "My audience loves summer gear" }
/// ```
///
/// 201 Created with the APPLIED participation; 409 on a second application.
pub async fn apply(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<ApplyRequest>,
) -> Result<impl IntoResponse, AppError> {
    session.require_role(Role::Creator)?;
    let participation = marketplace_service::apply(
        &state.pool,
        session.user_id(),
        request.campaign_id,
        request.pitch,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(participation)))
}

/// `GET marketplace.myParticipations`
pub async fn my_participations(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<Participation>>, AppError> {
    session.require_role(Role::Creator)?;
    let participations =
        marketplace_service::my_participations(&state.pool, session.user_id()).await?;
    Ok(Json(participations))
}

/// `GET /r/{tracking_code}`: count the click and send the visitor on (307).
pub async fn track_click(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Redirect, AppError> {
    let landing_url = campaign_service::record_click(&state.pool, &code).await?;
    Ok(Redirect::temporary(&landing_url))
}
