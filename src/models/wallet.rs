//! Wallet data models and API request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a wallet record from the database.
///
/// # Database Table
///
/// Maps to the `wallets` table. Every onboarded user owns exactly one wallet.
///
/// # Balance Storage
///
/// Amounts are stored as `i64` minor units to avoid floating-point errors.
/// `balance_cents` is spendable money; `escrow_cents` is brand money reserved
/// against running campaigns and is not part of the balance.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,

    /// Must be >= 0 (CHECK constraint)
    pub balance_cents: i64,

    /// Must be >= 0 (CHECK constraint)
    pub escrow_cents: i64,

    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of comparing a wallet balance with its completed ledger entries.
#[derive(Debug, Serialize)]
pub struct ReconciliationReport {
    pub wallet_id: Uuid,
    pub balance_cents: i64,
    pub ledger_sum_cents: i64,
    pub consistent: bool,
}

/// Query string for `wallet.reconcile`. Admins may name any wallet.
#[derive(Debug, Deserialize)]
pub struct ReconcileQuery {
    pub wallet_id: Option<Uuid>,
}

/// Request body for `POST /api/payments/create-order`.
///
/// ```json
/// { "amount_cents": 500000 }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub amount_cents: i64,
}

/// What the browser needs to open the gateway checkout.
#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub transaction_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,

    /// Public gateway key id used by the checkout widget
    pub key_id: String,
}
