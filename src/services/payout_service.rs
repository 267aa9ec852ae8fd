//! Payout service: creator withdrawals with admin approval.
//!
//! Funds leave the creator balance when the payout is requested (a
//! COMPLETED `PAYOUT` entry), so the balance always reflects what can still
//! be withdrawn. Rejection and gateway failure put the money back with a
//! `REFUND` entry.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    middleware::session::Session,
    models::payout::{Payout, PayoutStatus},
    services::{
        gateway_client::GatewayClient,
        ledger::Posting,
        wallet_service::{self, EntryContext},
    },
};

/// Request a withdrawal of `amount_cents` from the creator's balance.
pub async fn request_payout(
    pool: &DbPool,
    config: &Config,
    creator_id: Uuid,
    amount_cents: i64,
) -> Result<Payout, AppError> {
    if amount_cents < config.min_payout_cents {
        return Err(AppError::InvalidRequest(format!(
            "Minimum payout is {} cents",
            config.min_payout_cents
        )));
    }

    let mut tx = pool.begin().await?;

    let destination: Option<String> =
        sqlx::query_scalar("SELECT payout_account FROM creator_profiles WHERE user_id = $1")
            .bind(creator_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("Creator profile"))?;

    let destination = destination
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| {
            AppError::InvalidRequest("Add a payout account before requesting a payout".to_string())
        })?;

    let wallet = wallet_service::lock_wallet_for_user(&mut tx, creator_id).await?;
    if wallet.balance_cents < amount_cents {
        return Err(AppError::InsufficientBalance);
    }

    let payout = sqlx::query_as::<_, Payout>(
        r#"
        INSERT INTO payouts (creator_id, wallet_id, amount_cents, destination)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(creator_id)
    .bind(wallet.id)
    .bind(amount_cents)
    .bind(destination)
    .fetch_one(&mut *tx)
    .await?;

    wallet_service::apply_posting(
        &mut tx,
        &wallet,
        Posting::PayoutHold(amount_cents),
        EntryContext::payout(payout.id, "Payout requested"),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(payout_id = %payout.id, %creator_id, amount_cents, "payout requested");
    Ok(payout)
}

/// Creators see their own payouts; admins see everyone's.
pub async fn list_payouts(
    pool: &DbPool,
    session: &Session,
    status: Option<PayoutStatus>,
) -> Result<Vec<Payout>, AppError> {
    let creator_filter = if session.is_admin {
        None
    } else {
        Some(session.user_id())
    };

    let payouts = sqlx::query_as::<_, Payout>(
        r#"
        SELECT * FROM payouts
        WHERE ($1::uuid IS NULL OR creator_id = $1)
          AND ($2::payout_status IS NULL OR status = $2)
        ORDER BY created_at DESC
        "#,
    )
    .bind(creator_filter)
    .bind(status)
    .fetch_all(pool)
    .await?;

    Ok(payouts)
}

async fn lock_payout(conn: &mut PgConnection, id: Uuid) -> Result<Payout, AppError> {
    sqlx::query_as::<_, Payout>("SELECT * FROM payouts WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(AppError::NotFound("Payout"))
}

/// Approve a pending payout and hand it to the gateway.
///
/// # Process
///
/// 1. PENDING_APPROVAL -> APPROVED under a row lock, committed on its own
///    so a second approval sees the new status and gets a 409
/// 2. Ask the gateway to send the money
/// 3. On success, APPROVED -> PROCESSING with the gateway payout id
/// 4. On failure, APPROVED -> FAILED and the hold is refunded; the gateway
///    error is returned to the caller
pub async fn approve_payout(
    pool: &DbPool,
    gateway: &GatewayClient,
    config: &Config,
    reviewer_id: Uuid,
    id: Uuid,
) -> Result<Payout, AppError> {
    let mut tx = pool.begin().await?;
    let pending = lock_payout(&mut tx, id).await?;
    ensure_transition(&pending, PayoutStatus::Approved)?;

    let payout = sqlx::query_as::<_, Payout>(
        r#"
        UPDATE payouts
        SET status = 'APPROVED', reviewed_by = $1, reviewed_at = NOW(), updated_at = NOW()
        WHERE id = $2
        RETURNING *
        "#,
    )
    .bind(reviewer_id)
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(payout_id = %id, %reviewer_id, "payout approved");

    match gateway
        .create_payout(payout.id, &payout.destination, payout.amount_cents, &config.currency)
        .await
    {
        Ok(remote) => {
            // A webhook may already have settled it; only move forward from APPROVED
            let processing = sqlx::query_as::<_, Payout>(
                r#"
                UPDATE payouts
                SET status = 'PROCESSING', gateway_payout_id = $1, updated_at = NOW()
                WHERE id = $2 AND status = 'APPROVED'
                RETURNING *
                "#,
            )
            .bind(&remote.id)
            .bind(id)
            .fetch_optional(pool)
            .await?;

            match processing {
                Some(payout) => {
                    tracing::info!(payout_id = %id, gateway_payout_id = %remote.id, "payout processing");
                    Ok(payout)
                }
                None => get_payout(pool, id).await,
            }
        }
        Err(e) => {
            let reason = e.to_string();
            let mut tx = pool.begin().await?;
            let payout = lock_payout(&mut tx, id).await?;
            fail_payout(&mut tx, &payout, &reason).await?;
            tx.commit().await?;

            tracing::error!(payout_id = %id, error = %reason, "gateway rejected payout, funds refunded");
            Err(e)
        }
    }
}

/// Reject a pending payout and refund the hold.
pub async fn reject_payout(
    pool: &DbPool,
    reviewer_id: Uuid,
    id: Uuid,
    reason: &str,
) -> Result<Payout, AppError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::InvalidRequest("A rejection reason is required".to_string()));
    }

    let mut tx = pool.begin().await?;
    let payout = lock_payout(&mut tx, id).await?;
    ensure_transition(&payout, PayoutStatus::Rejected)?;

    let rejected = sqlx::query_as::<_, Payout>(
        r#"
        UPDATE payouts
        SET status = 'REJECTED', rejection_reason = $1, reviewed_by = $2,
            reviewed_at = NOW(), updated_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(reason)
    .bind(reviewer_id)
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    refund(&mut tx, &payout, "Payout rejected").await?;
    tx.commit().await?;

    tracing::info!(payout_id = %id, %reviewer_id, "payout rejected, funds refunded");
    Ok(rejected)
}

pub async fn get_payout(pool: &DbPool, id: Uuid) -> Result<Payout, AppError> {
    sqlx::query_as::<_, Payout>("SELECT * FROM payouts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Payout"))
}

/// Reject moves the state machine does not allow with a 409.
fn ensure_transition(payout: &Payout, next: PayoutStatus) -> Result<(), AppError> {
    if payout.status.can_transition_to(next) {
        Ok(())
    } else if payout.status.is_terminal() {
        Err(AppError::InvalidState(format!(
            "Payout is already {:?}",
            payout.status
        )))
    } else {
        Err(AppError::InvalidState(format!(
            "Payout is {:?} and cannot become {:?}",
            payout.status, next
        )))
    }
}

async fn refund(conn: &mut PgConnection, payout: &Payout, description: &str) -> Result<(), AppError> {
    let wallet = wallet_service::lock_wallet(&mut *conn, payout.wallet_id).await?;
    wallet_service::apply_posting(
        &mut *conn,
        &wallet,
        Posting::Refund(payout.amount_cents),
        EntryContext::payout(payout.id, description),
    )
    .await?;
    Ok(())
}

/// Mark a locked payout FAILED and refund it. No-op if it already finished.
async fn fail_payout(conn: &mut PgConnection, payout: &Payout, reason: &str) -> Result<bool, AppError> {
    if !payout.status.refunds_on(PayoutStatus::Failed) {
        return Ok(false);
    }

    sqlx::query(
        "UPDATE payouts SET status = 'FAILED', failure_reason = $1, updated_at = NOW() WHERE id = $2",
    )
    .bind(reason)
    .bind(payout.id)
    .execute(&mut *conn)
    .await?;

    refund(conn, payout, "Payout failed").await?;
    Ok(true)
}

/// Result of applying a gateway payout event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutEventOutcome {
    Applied,
    AlreadyFinal,
    UnknownPayout,
}

async fn find_for_event(
    conn: &mut PgConnection,
    payout_id: Option<Uuid>,
    gateway_payout_id: &str,
) -> Result<Option<Payout>, AppError> {
    let payout = match payout_id {
        Some(id) => {
            sqlx::query_as::<_, Payout>("SELECT * FROM payouts WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?
        }
        None => {
            sqlx::query_as::<_, Payout>(
                "SELECT * FROM payouts WHERE gateway_payout_id = $1 FOR UPDATE",
            )
            .bind(gateway_payout_id)
            .fetch_optional(&mut *conn)
            .await?
        }
    };
    Ok(payout)
}

/// The gateway confirmed the transfer: APPROVED/PROCESSING -> COMPLETED.
pub async fn mark_processed(
    conn: &mut PgConnection,
    payout_id: Option<Uuid>,
    gateway_payout_id: &str,
) -> Result<PayoutEventOutcome, AppError> {
    let Some(payout) = find_for_event(&mut *conn, payout_id, gateway_payout_id).await? else {
        tracing::warn!(gateway_payout_id, "processed event for unknown payout");
        return Ok(PayoutEventOutcome::UnknownPayout);
    };

    if !payout.status.can_transition_to(PayoutStatus::Completed) {
        return Ok(PayoutEventOutcome::AlreadyFinal);
    }

    sqlx::query(
        r#"
        UPDATE payouts
        SET status = 'COMPLETED', gateway_payout_id = COALESCE(gateway_payout_id, $1), updated_at = NOW()
        WHERE id = $2
        "#,
    )
    .bind(gateway_payout_id)
    .bind(payout.id)
    .execute(&mut *conn)
    .await?;

    tracing::info!(payout_id = %payout.id, gateway_payout_id, "payout completed");
    Ok(PayoutEventOutcome::Applied)
}

/// The gateway gave up: APPROVED/PROCESSING -> FAILED with a refund.
pub async fn mark_failed(
    conn: &mut PgConnection,
    payout_id: Option<Uuid>,
    gateway_payout_id: &str,
    reason: &str,
) -> Result<PayoutEventOutcome, AppError> {
    let Some(payout) = find_for_event(&mut *conn, payout_id, gateway_payout_id).await? else {
        tracing::warn!(gateway_payout_id, "failure event for unknown payout");
        return Ok(PayoutEventOutcome::UnknownPayout);
    };

    if fail_payout(&mut *conn, &payout, reason).await? {
        tracing::warn!(payout_id = %payout.id, reason, "payout failed, funds refunded");
        Ok(PayoutEventOutcome::Applied)
    } else {
        Ok(PayoutEventOutcome::AlreadyFinal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn payout(status: PayoutStatus) -> Payout {
        Payout {
            id: Uuid::new_v4(),
            creator_id: Uuid::new_v4(),
            wallet_id: Uuid::new_v4(),
            amount_cents: 5_000,
            status,
            destination: "acct_1".to_string(),
            gateway_payout_id: None,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            failure_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn pending_payouts_can_be_approved_or_rejected() {
        let pending = payout(PayoutStatus::PendingApproval);
        assert!(ensure_transition(&pending, PayoutStatus::Approved).is_ok());
        assert!(ensure_transition(&pending, PayoutStatus::Rejected).is_ok());
    }

    #[test]
    fn a_payout_cannot_be_approved_twice() {
        for status in [
            PayoutStatus::Approved,
            PayoutStatus::Processing,
            PayoutStatus::Completed,
            PayoutStatus::Rejected,
            PayoutStatus::Failed,
        ] {
            let err = ensure_transition(&payout(status), PayoutStatus::Approved).unwrap_err();
            assert!(matches!(err, AppError::InvalidState(_)), "{status:?}");
        }
    }

    #[test]
    fn settled_payouts_report_their_final_state() {
        let err = ensure_transition(&payout(PayoutStatus::Rejected), PayoutStatus::Rejected)
            .unwrap_err();
        assert!(err.to_string().contains("already Rejected"), "{err}");
    }
}
