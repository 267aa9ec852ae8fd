//! Payment gateway webhook models.
//!
//! The gateway POSTs JSON events to `/api/webhooks/gateway`. Every event
//! has the same envelope; the entity inside `payload` depends on the event:
//!
//! ```json
//! {
//!   "event": "payment.captured",
//!   "payload": {
//!     "payment": {
//!       "entity": { "id": "pay_29QQoUBi66xm2f", "order_id": "order_9A33XWu170gUtm", "amount": 500000 }
//!     }
//!   }
//! }
//! ```
//!
//! ```json
//! {
//!   "event": "payout.failed",
//!   "payload": {
//!     "payout": {
//!       "entity": { "id": "pout_00000000000001", "reference_id": "7d4b…", "failure_reason": "Beneficiary bank offline" }
//!     }
//!   }
//! }
//! ```
//!
//! # Signature Verification
//!
//! The request carries `X-Gateway-Signature: <hex>` where the value is
//! HMAC-SHA256(webhook_secret, raw_body). `X-Gateway-Event-Id` identifies
//! the delivery so retries can be recognised.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

pub const SIGNATURE_HEADER: &str = "X-Gateway-Signature";
pub const EVENT_ID_HEADER: &str = "X-Gateway-Event-Id";

/// A processed delivery, stored to make webhook handling idempotent.
///
/// # Database Table
///
/// Maps to the `gateway_events` table; `event_id` is the primary key.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct GatewayEventRecord {
    pub event_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

/// Event envelope shared by every delivery.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Wrapped<T> {
    entity: T,
}

#[derive(Debug, Deserialize)]
struct PaymentPayload {
    payment: Wrapped<PaymentEntity>,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    order_id: String,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct PayoutPayload {
    payout: Wrapped<PayoutEntity>,
}

#[derive(Debug, Deserialize)]
struct PayoutEntity {
    id: String,
    reference_id: Option<String>,
    failure_reason: Option<String>,
}

/// Gateway events this service acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// A brand's checkout payment was captured for one of our orders.
    PaymentCaptured {
        payment_id: String,
        order_id: String,
        amount_cents: i64,
    },

    /// Money reached the creator.
    PayoutProcessed {
        gateway_payout_id: String,
        payout_id: Option<Uuid>,
    },

    /// The gateway gave up on the transfer.
    PayoutFailed {
        gateway_payout_id: String,
        payout_id: Option<Uuid>,
        reason: String,
    },

    /// Anything else; acknowledged and ignored.
    Ignored(String),
}

impl GatewayEvent {
    /// Parse a raw webhook body.
    ///
    /// Returns the event name together with the typed event. Known event
    /// names with a malformed payload are errors; unknown names are not.
    pub fn parse(body: &[u8]) -> Result<(String, GatewayEvent), serde_json::Error> {
        let envelope: Envelope = serde_json::from_slice(body)?;

        let event = match envelope.event.as_str() {
            "payment.captured" => {
                let p: PaymentPayload = entity(envelope.payload)?;
                GatewayEvent::PaymentCaptured {
                    payment_id: p.payment.entity.id,
                    order_id: p.payment.entity.order_id,
                    amount_cents: p.payment.entity.amount,
                }
            }
            "payout.processed" => {
                let p: PayoutPayload = entity(envelope.payload)?;
                GatewayEvent::PayoutProcessed {
                    payout_id: parse_reference(p.payout.entity.reference_id.as_deref()),
                    gateway_payout_id: p.payout.entity.id,
                }
            }
            "payout.failed" | "payout.reversed" => {
                let p: PayoutPayload = entity(envelope.payload)?;
                GatewayEvent::PayoutFailed {
                    payout_id: parse_reference(p.payout.entity.reference_id.as_deref()),
                    reason: p
                        .payout
                        .entity
                        .failure_reason
                        .unwrap_or_else(|| envelope.event.clone()),
                    gateway_payout_id: p.payout.entity.id,
                }
            }
            other => GatewayEvent::Ignored(other.to_string()),
        };

        Ok((envelope.event, event))
    }
}

fn entity<T: DeserializeOwned>(payload: serde_json::Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(payload)
}

/// Our payout id travels to the gateway as `reference_id`.
fn parse_reference(reference: Option<&str>) -> Option<Uuid> {
    reference.and_then(|r| Uuid::parse_str(r).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_payment_captured() {
        let body = br#"{"event":"payment.captured","payload":{"payment":{"entity":{"id":"pay_1","order_id":"order_1","amount":500000,"currency":"USD"}}}}"#;
        let (name, event) = GatewayEvent::parse(body).unwrap();

        assert_eq!(name, "payment.captured");
        assert_eq!(
            event,
            GatewayEvent::PaymentCaptured {
                payment_id: "pay_1".into(),
                order_id: "order_1".into(),
                amount_cents: 500000,
            }
        );
    }

    #[test]
    fn parses_payout_failed_with_reference() {
        let payout_id = Uuid::new_v4();
        let body = format!(
            r#"{{"event":"payout.failed","payload":{{"payout":{{"entity":{{"id":"pout_1","reference_id":"{payout_id}","failure_reason":"Beneficiary bank offline"}}}}}}}}"#
        );
        let (_, event) = GatewayEvent::parse(body.as_bytes()).unwrap();

        assert_eq!(
            event,
            GatewayEvent::PayoutFailed {
                gateway_payout_id: "pout_1".into(),
                payout_id: Some(payout_id),
                reason: "Beneficiary bank offline".into(),
            }
        );
    }

    #[test]
    fn failure_reason_defaults_to_event_name() {
        let body = br#"{"event":"payout.reversed","payload":{"payout":{"entity":{"id":"pout_2"}}}}"#;
        let (_, event) = GatewayEvent::parse(body).unwrap();

        assert!(matches!(
            event,
            GatewayEvent::PayoutFailed { ref reason, payout_id: None, .. } if reason == "payout.reversed"
        ));
    }

    #[test]
    fn unknown_events_are_ignored() {
        let (_, event) = GatewayEvent::parse(br#"{"event":"order.paid","payload":{}}"#).unwrap();
        assert_eq!(event, GatewayEvent::Ignored("order.paid".into()));
    }

    #[test]
    fn malformed_known_event_is_an_error() {
        assert!(GatewayEvent::parse(br#"{"event":"payment.captured","payload":{}}"#).is_err());
        assert!(GatewayEvent::parse(b"not json").is_err());
    }
}
