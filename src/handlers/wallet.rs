//! Wallet procedures and the funding order endpoint.

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
        transaction::{PageQuery, Transaction},
        user::Role,
        wallet::{CreateOrderRequest, ReconcileQuery, ReconciliationReport, Wallet},
    },
    services::wallet_service,
    state::AppState,
};

/// `GET wallet.get`
///
/// ```json
/// {
///   "id": "…",
///   "user_id": "…",
///   "balance_cents": 250000,
///   "escrow_cents": 500000,
///   "currency": "USD"
/// }
/// ```
pub async fn get(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Wallet>, AppError> {
    let wallet = wallet_service::get_wallet_for_user(&state.pool, session.user_id()).await?;
    Ok(Json(wallet))
}

/// `GET wallet.transactions?limit=50&offset=0`
pub async fn transactions(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let wallet = wallet_service::get_wallet_for_user(&state.pool, session.user_id()).await?;
    let (limit, offset) = page.normalized();
    let transactions =
        wallet_service::list_transactions(&state.pool, wallet.id, limit, offset).await?;
    Ok(Json(transactions))
}

/// `GET wallet.reconcile[?wallet_id=…]`
///
/// Users reconcile their own wallet; admins may pass any `wallet_id`.
pub async fn reconcile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<ReconcileQuery>,
) -> Result<Json<ReconciliationReport>, AppError> {
    let wallet_id = match query.wallet_id {
        Some(id) if session.is_admin => id,
        requested => {
            let own = wallet_service::get_wallet_for_user(&state.pool, session.user_id()).await?;
            if requested.is_some_and(|id| id != own.id) {
                return Err(AppError::Forbidden);
            }
            own.id
        }
    };

    let report = wallet_service::reconcile(&state.pool, wallet_id).await?;
    Ok(Json(report))
}

/// `POST /api/payments/create-order`
///
/// # Request Body
///
/// ```json
/// { "amount_cents": 500000 }
/// ```
///
/// # Response (201 Created)
///
/// ```json
/// {
///   "order_id": "order_9A33XWu170gUtm",
///   "transaction_id": "…",
///   "amount_cents": 500000,
///   "currency": "USD",
///   "key_id": "key_live_…"
/// }
/// ```
///
/// The wallet is credited once the gateway reports the payment captured.
pub async fn create_order(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    session.require_role(Role::Brand)?;
    let order = wallet_service::create_funding_order(
        &state.pool,
        &state.gateway,
        session.user_id(),
        request.amount_cents,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(order)))
}
