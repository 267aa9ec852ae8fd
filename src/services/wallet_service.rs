//! Wallet service: balance updates, ledger history and funding orders.
//!
//! # Atomicity Guarantees
//!
//! Every balance change locks the wallet row with `SELECT ... FOR UPDATE`,
//! computes the new balances through [`ledger::post`] and writes the wallet
//! update and the ledger entry on the same connection. Callers pass the
//! connection of an open database transaction, so the change commits or
//! rolls back together with whatever status update triggered it.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        transaction::{Transaction, TransactionStatus},
        wallet::{CreateOrderResponse, ReconciliationReport, Wallet},
    },
    services::{
        gateway_client::GatewayClient,
        ledger::{self, Balances, Posting},
    },
};

/// References stored on the ledger entry written by a posting.
#[derive(Debug, Default, Clone)]
pub struct EntryContext {
    pub campaign_id: Option<Uuid>,
    pub payout_id: Option<Uuid>,
    pub description: Option<String>,
}

impl EntryContext {
    pub fn campaign(campaign_id: Uuid, description: impl Into<String>) -> Self {
        Self {
            campaign_id: Some(campaign_id),
            payout_id: None,
            description: Some(description.into()),
        }
    }

    pub fn payout(payout_id: Uuid, description: impl Into<String>) -> Self {
        Self {
            campaign_id: None,
            payout_id: Some(payout_id),
            description: Some(description.into()),
        }
    }
}

/// Create the wallet of a freshly onboarded user.
pub async fn create_wallet(
    conn: &mut PgConnection,
    user_id: Uuid,
    currency: &str,
) -> Result<Wallet, AppError> {
    let wallet = sqlx::query_as::<_, Wallet>(
        "INSERT INTO wallets (user_id, currency) VALUES ($1, $2) RETURNING *",
    )
    .bind(user_id)
    .bind(currency)
    .fetch_one(conn)
    .await?;

    Ok(wallet)
}

/// Lock a user's wallet for the rest of the current transaction.
pub async fn lock_wallet_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Wallet, AppError> {
    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(conn)
        .await?
        .ok_or(AppError::NotFound("Wallet"))
}

pub async fn lock_wallet(conn: &mut PgConnection, wallet_id: Uuid) -> Result<Wallet, AppError> {
    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE id = $1 FOR UPDATE")
        .bind(wallet_id)
        .fetch_optional(conn)
        .await?
        .ok_or(AppError::NotFound("Wallet"))
}

/// Apply a posting to a wallet locked by the caller.
///
/// Returns the updated wallet and the COMPLETED ledger entry, if the
/// posting writes one.
pub async fn apply_posting(
    conn: &mut PgConnection,
    wallet: &Wallet,
    posting: Posting,
    context: EntryContext,
) -> Result<(Wallet, Option<Transaction>), AppError> {
    let current = Balances {
        balance_cents: wallet.balance_cents,
        escrow_cents: wallet.escrow_cents,
    };
    let (next, entry) = ledger::post(current, posting)?;

    let updated = sqlx::query_as::<_, Wallet>(
        r#"
        UPDATE wallets
        SET balance_cents = $1,
            escrow_cents = $2,
            updated_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(next.balance_cents)
    .bind(next.escrow_cents)
    .bind(wallet.id)
    .fetch_one(&mut *conn)
    .await?;

    let transaction = match entry {
        Some(entry) => Some(
            sqlx::query_as::<_, Transaction>(
                r#"
                INSERT INTO transactions (
                    wallet_id, kind, amount_cents, status, campaign_id, payout_id, description
                )
                VALUES ($1, $2, $3, 'COMPLETED', $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(wallet.id)
            .bind(entry.kind)
            .bind(entry.amount_cents)
            .bind(context.campaign_id)
            .bind(context.payout_id)
            .bind(context.description)
            .fetch_one(&mut *conn)
            .await?,
        ),
        None => None,
    };

    tracing::debug!(
        wallet_id = %wallet.id,
        ?posting,
        balance_cents = updated.balance_cents,
        escrow_cents = updated.escrow_cents,
        "posting applied"
    );

    Ok((updated, transaction))
}

/// Get the wallet owned by a user.
pub async fn get_wallet_for_user(pool: &DbPool, user_id: Uuid) -> Result<Wallet, AppError> {
    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Wallet"))
}

/// Entries sharing a `created_at` come from one database transaction and
/// fall back to insertion order.
const LIST_TRANSACTIONS: &str = r#"
    SELECT * FROM transactions
    WHERE wallet_id = $1
    ORDER BY created_at DESC, seq DESC
    LIMIT $2 OFFSET $3
"#;

/// Ledger history, newest first.
pub async fn list_transactions(
    pool: &DbPool,
    wallet_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<Transaction>, AppError> {
    let transactions = sqlx::query_as::<_, Transaction>(LIST_TRANSACTIONS)
    .bind(wallet_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(transactions)
}

/// Compare a wallet balance with the sum of its completed ledger entries.
pub async fn reconcile(pool: &DbPool, wallet_id: Uuid) -> Result<ReconciliationReport, AppError> {
    let balance_cents: i64 = sqlx::query_scalar("SELECT balance_cents FROM wallets WHERE id = $1")
        .bind(wallet_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Wallet"))?;

    let ledger_sum_cents: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(amount_cents), 0)::BIGINT
        FROM transactions
        WHERE wallet_id = $1 AND status = 'COMPLETED'
        "#,
    )
    .bind(wallet_id)
    .fetch_one(pool)
    .await?;

    let consistent = balance_cents == ledger_sum_cents;
    if !consistent {
        tracing::warn!(%wallet_id, balance_cents, ledger_sum_cents, "wallet out of balance with ledger");
    }

    Ok(ReconciliationReport {
        wallet_id,
        balance_cents,
        ledger_sum_cents,
        consistent,
    })
}

/// Open a gateway order for a brand top-up and record it as a PENDING deposit.
///
/// The wallet is credited only when the gateway reports the payment as
/// captured (see [`complete_deposit`]).
pub async fn create_funding_order(
    pool: &DbPool,
    gateway: &GatewayClient,
    user_id: Uuid,
    amount_cents: i64,
) -> Result<CreateOrderResponse, AppError> {
    if amount_cents <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }

    let wallet = get_wallet_for_user(pool, user_id).await?;

    // The receipt ties the gateway order back to the wallet in their dashboard
    let receipt = format!("wallet_{}", wallet.id.simple());
    let order = gateway
        .create_order(amount_cents, &wallet.currency, &receipt)
        .await?;

    if order.amount != amount_cents {
        return Err(AppError::Gateway(format!(
            "Order {} created for {} instead of {}",
            order.id, order.amount, amount_cents
        )));
    }

    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (wallet_id, kind, amount_cents, status, gateway_order_id, description)
        VALUES ($1, 'DEPOSIT', $2, 'PENDING', $3, 'Wallet top-up')
        RETURNING *
        "#,
    )
    .bind(wallet.id)
    .bind(amount_cents)
    .bind(&order.id)
    .fetch_one(pool)
    .await?;

    tracing::info!(wallet_id = %wallet.id, order_id = %order.id, amount_cents, "funding order created");

    Ok(CreateOrderResponse {
        order_id: order.id,
        transaction_id: transaction.id,
        amount_cents,
        currency: wallet.currency,
        key_id: gateway.key_id().to_string(),
    })
}

/// Outcome of applying a captured payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositOutcome {
    Credited,
    AlreadyApplied,
    AmountMismatch,
    UnknownOrder,
}

/// Settle a PENDING deposit after the gateway captured its payment.
///
/// Runs on the caller's transaction. A deposit that is no longer PENDING is
/// left alone, so replayed events do not credit twice.
pub async fn complete_deposit(
    conn: &mut PgConnection,
    order_id: &str,
    payment_id: &str,
    captured_cents: i64,
) -> Result<DepositOutcome, AppError> {
    let Some(deposit) = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE gateway_order_id = $1 AND kind = 'DEPOSIT' FOR UPDATE",
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?
    else {
        tracing::warn!(order_id, "captured payment for unknown order");
        return Ok(DepositOutcome::UnknownOrder);
    };

    if deposit.status != TransactionStatus::Pending {
        return Ok(DepositOutcome::AlreadyApplied);
    }

    if deposit.amount_cents != captured_cents {
        tracing::error!(
            order_id,
            expected = deposit.amount_cents,
            captured = captured_cents,
            "captured amount does not match order"
        );
        sqlx::query(
            "UPDATE transactions SET status = 'FAILED', gateway_payment_id = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(payment_id)
        .bind(deposit.id)
        .execute(&mut *conn)
        .await?;
        return Ok(DepositOutcome::AmountMismatch);
    }

    let wallet = lock_wallet(&mut *conn, deposit.wallet_id).await?;
    let (next, _) = ledger::post(
        Balances {
            balance_cents: wallet.balance_cents,
            escrow_cents: wallet.escrow_cents,
        },
        Posting::Deposit(deposit.amount_cents),
    )?;

    // The PENDING row becomes the ledger entry, so no new row is written
    sqlx::query("UPDATE wallets SET balance_cents = $1, updated_at = NOW() WHERE id = $2")
        .bind(next.balance_cents)
        .bind(wallet.id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        UPDATE transactions
        SET status = 'COMPLETED', gateway_payment_id = $1, updated_at = NOW()
        WHERE id = $2
        "#,
    )
    .bind(payment_id)
    .bind(deposit.id)
    .execute(&mut *conn)
    .await?;

    tracing::info!(wallet_id = %wallet.id, order_id, amount_cents = deposit.amount_cents, "deposit credited");

    Ok(DepositOutcome::Credited)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_breaks_timestamp_ties_by_insertion_order() {
        let order_by = LIST_TRANSACTIONS
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with("ORDER BY"))
            .unwrap();
        assert_eq!(order_by, "ORDER BY created_at DESC, seq DESC");
    }
}
