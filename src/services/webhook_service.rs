//! Inbound payment gateway webhooks.
//!
//! # Process
//!
//! 1. Verify the HMAC signature over the raw body
//! 2. Parse the event
//! 3. Record the delivery in `gateway_events`; a delivery already recorded
//!    is acknowledged without being applied again
//! 4. Apply the event (deposit credit, payout completion or failure)
//!
//! Steps 3 and 4 share one database transaction, so an event that fails
//! to apply is not marked as seen and the gateway's retry gets another try.

use serde::Serialize;

use crate::{
    db::DbPool,
    error::AppError,
    models::webhook::{GatewayEvent, GatewayEventRecord},
    services::{
        gateway_client::{self, GatewayClient},
        payout_service::{self, PayoutEventOutcome},
        wallet_service::{self, DepositOutcome},
    },
};

/// What happened to a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Processed,
    Duplicate,
    Ignored,
}

/// Acknowledgement returned to the gateway.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub event_id: String,
    pub event: String,
    pub status: DeliveryStatus,
}

/// Verify, deduplicate and apply one gateway delivery.
pub async fn process_delivery(
    pool: &DbPool,
    gateway: &GatewayClient,
    event_id: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
) -> Result<WebhookAck, AppError> {
    gateway.verify_webhook(body, signature)?;

    let (name, event) = GatewayEvent::parse(body)
        .map_err(|e| AppError::InvalidRequest(format!("Malformed webhook body: {}", e)))?;
    let payload: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidRequest(format!("Malformed webhook body: {}", e)))?;

    let event_id = event_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| gateway_client::body_fingerprint(body));

    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO gateway_events (event_id, event_type, payload)
        VALUES ($1, $2, $3)
        ON CONFLICT (event_id) DO NOTHING
        "#,
    )
    .bind(&event_id)
    .bind(&name)
    .bind(payload)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if inserted == 0 {
        tx.rollback().await?;
        tracing::info!(%event_id, event = %name, "duplicate webhook delivery acknowledged");
        return Ok(WebhookAck {
            event_id,
            event: name,
            status: DeliveryStatus::Duplicate,
        });
    }

    let status = match event {
        GatewayEvent::PaymentCaptured {
            payment_id,
            order_id,
            amount_cents,
        } => {
            let outcome =
                wallet_service::complete_deposit(&mut tx, &order_id, &payment_id, amount_cents)
                    .await?;
            match outcome {
                DepositOutcome::Credited => DeliveryStatus::Processed,
                _ => DeliveryStatus::Ignored,
            }
        }
        GatewayEvent::PayoutProcessed {
            gateway_payout_id,
            payout_id,
        } => payout_status(
            payout_service::mark_processed(&mut tx, payout_id, &gateway_payout_id).await?,
        ),
        GatewayEvent::PayoutFailed {
            gateway_payout_id,
            payout_id,
            reason,
        } => payout_status(
            payout_service::mark_failed(&mut tx, payout_id, &gateway_payout_id, &reason).await?,
        ),
        GatewayEvent::Ignored(_) => DeliveryStatus::Ignored,
    };

    tx.commit().await?;

    tracing::info!(%event_id, event = %name, ?status, "webhook delivery handled");

    Ok(WebhookAck {
        event_id,
        event: name,
        status,
    })
}

fn payout_status(outcome: PayoutEventOutcome) -> DeliveryStatus {
    match outcome {
        PayoutEventOutcome::Applied => DeliveryStatus::Processed,
        PayoutEventOutcome::AlreadyFinal | PayoutEventOutcome::UnknownPayout => {
            DeliveryStatus::Ignored
        }
    }
}

/// Latest recorded deliveries, newest first.
pub async fn recent_events(pool: &DbPool, limit: i64) -> Result<Vec<GatewayEventRecord>, AppError> {
    let events = sqlx::query_as::<_, GatewayEventRecord>(
        "SELECT * FROM gateway_events ORDER BY received_at DESC LIMIT $1",
    )
    .bind(limit.clamp(1, 100))
    .fetch_all(pool)
    .await?;

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_applied_payout_events_count_as_processed() {
        assert_eq!(payout_status(PayoutEventOutcome::Applied), DeliveryStatus::Processed);
        assert_eq!(payout_status(PayoutEventOutcome::AlreadyFinal), DeliveryStatus::Ignored);
        assert_eq!(payout_status(PayoutEventOutcome::UnknownPayout), DeliveryStatus::Ignored);
    }

    #[test]
    fn ack_serializes_status_in_snake_case() {
        let ack = WebhookAck {
            event_id: "evt_1".into(),
            event: "payment.captured".into(),
            status: DeliveryStatus::Duplicate,
        };
        assert_eq!(
            serde_json::to_value(ack).unwrap()["status"],
            serde_json::json!("duplicate")
        );
    }
}
