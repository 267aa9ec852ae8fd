//! Payment gateway webhook receiver.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};

use crate::{
    error::AppError,
    models::webhook::{EVENT_ID_HEADER, SIGNATURE_HEADER},
    services::webhook_service::{self, WebhookAck},
    state::AppState,
};

/// `POST /api/webhooks/gateway`
///
/// # Headers
///
/// - `X-Gateway-Signature`: hex HMAC-SHA256 of the raw body (required)
/// - `X-Gateway-Event-Id`: delivery id used for deduplication (optional)
///
/// # Response
///
/// 200 OK for processed, ignored and duplicate deliveries alike, so the
/// gateway stops retrying:
///
/// ```json
/// { "event_id": "evt_1", "event": "payment.captured", "status": "processed" }
/// ```
///
/// 401 when the signature does not match.
pub async fn gateway_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let ack = webhook_service::process_delivery(
        &state.pool,
        &state.gateway,
        header(EVENT_ID_HEADER),
        header(SIGNATURE_HEADER),
        &body,
    )
    .await?;

    Ok(Json(ack))
}
