//! Ledger transaction models.
//!
//! Every movement of money touching a wallet is recorded as one row in
//! `transactions`. Credits carry a positive `amount_cents`, debits a
//! negative one, so a wallet's balance is the sum of its COMPLETED rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What caused a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Brand funding through the payment gateway
    Deposit,
    /// Campaign budget moved from balance into escrow
    EscrowLock,
    /// Unspent campaign budget returned to balance
    EscrowRelease,
    /// Creator earnings from a campaign
    Earning,
    /// Funds held for a payout request
    Payout,
    /// Payout funds returned after rejection or gateway failure
    Refund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// Represents a transaction record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub kind: TransactionKind,

    /// Signed amount in cents: credits > 0, debits < 0
    pub amount_cents: i64,

    pub status: TransactionStatus,
    pub campaign_id: Option<Uuid>,
    pub payout_id: Option<Uuid>,

    /// Gateway order backing a DEPOSIT
    pub gateway_order_id: Option<String>,

    /// Gateway payment that captured the order
    pub gateway_payment_id: Option<String>,

    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pagination for history listings.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,

    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

impl PageQuery {
    /// Clamp limit into 1..=100 and offset to >= 0.
    pub fn normalized(&self) -> (i64, i64) {
        (self.limit.clamp(1, 100), self.offset.max(0))
    }
}

/// Sum of all COMPLETED entries.
pub fn completed_sum(transactions: &[Transaction]) -> i64 {
    transactions
        .iter()
        .filter(|t| t.status == TransactionStatus::Completed)
        .map(|t| t.amount_cents)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(amount_cents: i64, status: TransactionStatus) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            wallet_id: Uuid::nil(),
            kind: TransactionKind::Deposit,
            amount_cents,
            status,
            campaign_id: None,
            payout_id: None,
            gateway_order_id: None,
            gateway_payment_id: None,
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn pending_and_failed_entries_do_not_count() {
        let entries = vec![
            entry(10_000, TransactionStatus::Completed),
            entry(5_000, TransactionStatus::Pending),
            entry(-2_500, TransactionStatus::Completed),
            entry(-7_000, TransactionStatus::Failed),
        ];
        assert_eq!(completed_sum(&entries), 7_500);
    }

    #[test]
    fn page_query_is_clamped() {
        let q = PageQuery { limit: 10_000, offset: -3 };
        assert_eq!(q.normalized(), (100, 0));
    }
}
