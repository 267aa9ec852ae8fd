//! Payment gateway client and webhook signature checks.
//!
//! Outbound calls (orders for brand top-ups, payouts to creators) use HTTP
//! basic auth with the key id/secret pair. Inbound webhooks are signed
//! with HMAC-SHA256 over the raw body using a separate webhook secret.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{config::Config, error::AppError};

type HmacSha256 = Hmac<Sha256>;

/// Order object returned by `POST /orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
}

/// Payout object returned by `POST /payouts`.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayPayout {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Debug, Serialize)]
struct CreatePayoutBody<'a> {
    account: &'a str,
    amount: i64,
    currency: &'a str,
    reference_id: String,
    purpose: &'a str,
}

/// Thin client over the gateway REST API.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
    webhook_secret: String,
}

impl GatewayClient {
    /// Build a client from configuration.
    ///
    /// # Timeout
    ///
    /// 10 seconds per call, so a slow gateway cannot hold a request open.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.gateway_base_url.trim_end_matches('/').to_string(),
            key_id: config.gateway_key_id.clone(),
            key_secret: config.gateway_key_secret.clone(),
            webhook_secret: config.gateway_webhook_secret.clone(),
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Create a checkout order for `amount_cents`.
    pub async fn create_order(
        &self,
        amount_cents: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, AppError> {
        let body = CreateOrderBody {
            amount: amount_cents,
            currency,
            receipt,
        };
        self.post("orders", &body).await
    }

    /// Send money to a creator. `payout_id` is echoed back in webhooks as `reference_id`.
    pub async fn create_payout(
        &self,
        payout_id: Uuid,
        destination: &str,
        amount_cents: i64,
        currency: &str,
    ) -> Result<GatewayPayout, AppError> {
        let body = CreatePayoutBody {
            account: destination,
            amount: amount_cents,
            currency,
            reference_id: payout_id.to_string(),
            purpose: "payout",
        };
        self.post("payouts", &body).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(%url, error = %e, "gateway request failed");
                AppError::Gateway(format!("Request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(%url, status = status.as_u16(), body = %text, "gateway returned an error");
            return Err(AppError::Gateway(format!("Gateway returned {}", status)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::Gateway(format!("Malformed gateway response: {}", e)))
    }

    /// Check a webhook signature header against the raw body.
    pub fn verify_webhook(&self, body: &[u8], signature: Option<&str>) -> Result<(), AppError> {
        verify_signature(&self.webhook_secret, body, signature.ok_or(AppError::InvalidSignature)?)
    }
}

/// Hex-encoded HMAC-SHA256 of `payload`, as the gateway computes it.
#[cfg(test)]
pub fn generate_signature(secret: &str, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex HMAC-SHA256 signature in constant time.
///
/// A `sha256=` prefix on the header value is accepted and ignored.
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> Result<(), AppError> {
    let signature = signature.trim();
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
    let expected = hex::decode(signature).map_err(|_| AppError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid");
    mac.update(payload);
    mac.verify_slice(&expected).map_err(|_| AppError::InvalidSignature)
}

/// Stable id for deliveries that arrive without an event id header.
pub fn body_fingerprint(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    #[test]
    fn accepts_valid_signature() {
        let body = br#"{"event":"payment.captured"}"#;
        let signature = generate_signature(SECRET, body);
        assert!(verify_signature(SECRET, body, &signature).is_ok());
        assert!(verify_signature(SECRET, body, &format!("sha256={signature}")).is_ok());
    }

    #[test]
    fn rejects_tampered_body() {
        let signature = generate_signature(SECRET, br#"{"amount":100}"#);
        assert!(matches!(
            verify_signature(SECRET, br#"{"amount":999}"#, &signature),
            Err(AppError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_wrong_secret_and_garbage() {
        let body = b"{}";
        let signature = generate_signature("other-secret", body);
        assert!(verify_signature(SECRET, body, &signature).is_err());
        assert!(verify_signature(SECRET, body, "not-hex").is_err());
        assert!(verify_signature(SECRET, body, "").is_err());
    }

    #[test]
    fn missing_header_is_rejected() {
        let client = GatewayClient::from_config(&Config::for_tests()).unwrap();
        assert!(matches!(
            client.verify_webhook(b"{}", None),
            Err(AppError::InvalidSignature)
        ));
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(body_fingerprint(b"abc"), body_fingerprint(b"abc"));
        assert_ne!(body_fingerprint(b"abc"), body_fingerprint(b"abd"));
    }
}
