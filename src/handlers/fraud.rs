//! Admin fraud review procedures (`/api/rpc/fraud.*`).

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
        fraud_flag::{
            CreateFraudFlagRequest, DismissFraudFlagRequest, FraudFlag, FraudListQuery,
            FraudStatus, ResolveFraudFlagRequest,
        },
    },
    services::fraud_service,
    state::AppState,
};

/// `GET fraud.list?status=OPEN&severity=HIGH`
pub async fn list(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<FraudListQuery>,
) -> Result<Json<Vec<FraudFlag>>, AppError> {
    session.require_admin()?;
    Ok(Json(fraud_service::list_flags(&state.pool, query).await?))
}

/// `GET fraud.get?id=…`
pub async fn get(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<IdRequest>,
) -> Result<Json<FraudFlag>, AppError> {
    session.require_admin()?;
    Ok(Json(fraud_service::get_flag(&state.pool, query.id).await?))
}

/// `POST fraud.create`
///
/// ```json
/// {
///   "campaign_id": "…",
///   "participation_id": "…",
///   "reason": "SUSPICIOUS_TRAFFIC",
///   "severity": "MEDIUM",
///   "details": "Traffic spike from a single ASN"
/// }
/// ```
pub async fn create(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<CreateFraudFlagRequest>,
) -> Result<impl IntoResponse, AppError> {
    session.require_admin()?;
    let flag = fraud_service::create_flag(&state.pool, request).await?;
    Ok((StatusCode::CREATED, Json(flag)))
}

/// `POST fraud.startReview`
pub async fn start_review(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<IdRequest>,
) -> Result<Json<FraudFlag>, AppError> {
    session.require_admin()?;
    let flag = fraud_service::start_review(&state.pool, session.user_id(), request.id).await?;
    Ok(Json(flag))
}

/// `POST fraud.resolve`
///
/// ```json
/// { "id": "…", "notes": "Confirmed bot traffic", "suspend_participation": true }
/// ```
pub async fn resolve(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<ResolveFraudFlagRequest>,
) -> Result<Json<FraudFlag>, AppError> {
    session.require_admin()?;
    let flag = fraud_service::close_flag(
        &state.pool,
        session.user_id(),
        request.id,
        FraudStatus::Resolved,
        Some(request.notes),
        request.suspend_participation,
    )
    .await?;
    Ok(Json(flag))
}

/// `POST fraud.dismiss`
pub async fn dismiss(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<DismissFraudFlagRequest>,
) -> Result<Json<FraudFlag>, AppError> {
    session.require_admin()?;
    let flag = fraud_service::close_flag(
        &state.pool,
        session.user_id(),
        request.id,
        FraudStatus::Dismissed,
        request.notes,
        false,
    )
    .await?;
    Ok(Json(flag))
}
