//! Read-only aggregates behind the dashboards.

use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::campaign::{CampaignStatus, ParticipationStatus},
    services::wallet_service,
};

/// Row count for one enum value.
#[derive(Debug, Clone, Serialize)]
pub struct StatusCount<S> {
    pub status: S,
    pub count: i64,
}

impl<S> From<(S, i64)> for StatusCount<S> {
    fn from((status, count): (S, i64)) -> Self {
        Self { status, count }
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserCounts {
    pub brands: i64,
    pub creators: i64,
    pub admins: i64,
    pub pending_onboarding: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct MoneyTotals {
    pub total_balance_cents: i64,
    pub total_escrow_cents: i64,
    pub total_paid_out_cents: i64,
    pub pending_payout_count: i64,
    pub pending_payout_cents: i64,
}

/// Platform-wide overview for admins.
#[derive(Debug, Serialize)]
pub struct PlatformOverview {
    pub users: UserCounts,
    pub campaigns: Vec<StatusCount<CampaignStatus>>,
    pub money: MoneyTotals,
    pub open_fraud_flags: i64,
}

pub async fn platform_overview(pool: &DbPool) -> Result<PlatformOverview, AppError> {
    let users = sqlx::query_as::<_, UserCounts>(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE role = 'BRAND') AS brands,
            COUNT(*) FILTER (WHERE role = 'CREATOR') AS creators,
            COUNT(*) FILTER (WHERE is_admin) AS admins,
            COUNT(*) FILTER (WHERE NOT onboarding_complete AND NOT is_admin) AS pending_onboarding
        FROM users
        "#,
    )
    .fetch_one(pool)
    .await?;

    let campaigns = sqlx::query_as::<_, (CampaignStatus, i64)>(
        "SELECT status, COUNT(*) FROM campaigns GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(StatusCount::from)
    .collect();

    let money = sqlx::query_as::<_, MoneyTotals>(
        r#"
        SELECT
            (SELECT COALESCE(SUM(balance_cents), 0)::BIGINT FROM wallets) AS total_balance_cents,
            (SELECT COALESCE(SUM(escrow_cents), 0)::BIGINT FROM wallets) AS total_escrow_cents,
            (SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM payouts
                WHERE status = 'COMPLETED') AS total_paid_out_cents,
            (SELECT COUNT(*) FROM payouts
                WHERE status = 'PENDING_APPROVAL') AS pending_payout_count,
            (SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM payouts
                WHERE status = 'PENDING_APPROVAL') AS pending_payout_cents
        "#,
    )
    .fetch_one(pool)
    .await?;

    let open_fraud_flags: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM fraud_flags WHERE status IN ('OPEN', 'UNDER_REVIEW')",
    )
    .fetch_one(pool)
    .await?;

    Ok(PlatformOverview {
        users,
        campaigns,
        money,
        open_fraud_flags,
    })
}

/// Performance of one campaign.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CampaignPerformance {
    pub campaign_id: Uuid,
    pub title: String,
    pub status: CampaignStatus,
    pub budget_cents: i64,
    pub spent_cents: i64,
    pub views: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub participants: i64,
    pub pending_applications: i64,
}

#[derive(Debug, Serialize)]
pub struct BrandOverview {
    pub balance_cents: i64,
    pub escrow_cents: i64,
    pub currency: String,
    pub total_spent_cents: i64,
    pub campaigns: Vec<CampaignPerformance>,
}

pub async fn brand_overview(pool: &DbPool, brand_id: Uuid) -> Result<BrandOverview, AppError> {
    let wallet = wallet_service::get_wallet_for_user(pool, brand_id).await?;

    let campaigns = sqlx::query_as::<_, CampaignPerformance>(
        r#"
        SELECT
            c.id AS campaign_id,
            c.title,
            c.status,
            c.budget_cents,
            c.spent_cents,
            COALESCE(SUM(p.views), 0)::BIGINT AS views,
            COALESCE(SUM(p.clicks), 0)::BIGINT AS clicks,
            COALESCE(SUM(p.conversions), 0)::BIGINT AS conversions,
            COUNT(p.id) FILTER (WHERE p.status = 'APPROVED') AS participants,
            COUNT(p.id) FILTER (WHERE p.status = 'APPLIED') AS pending_applications
        FROM campaigns c
        LEFT JOIN participations p ON p.campaign_id = c.id
        WHERE c.brand_id = $1
        GROUP BY c.id
        ORDER BY c.created_at DESC
        "#,
    )
    .bind(brand_id)
    .fetch_all(pool)
    .await?;

    let total_spent_cents = campaigns.iter().map(|c| c.spent_cents).sum();

    Ok(BrandOverview {
        balance_cents: wallet.balance_cents,
        escrow_cents: wallet.escrow_cents,
        currency: wallet.currency,
        total_spent_cents,
        campaigns,
    })
}

#[derive(Debug, Serialize)]
pub struct CreatorOverview {
    pub balance_cents: i64,
    pub currency: String,
    pub total_earned_cents: i64,
    pub pending_payout_count: i64,
    pub pending_payout_cents: i64,
    pub participations: Vec<StatusCount<ParticipationStatus>>,
}

pub async fn creator_overview(pool: &DbPool, creator_id: Uuid) -> Result<CreatorOverview, AppError> {
    let wallet = wallet_service::get_wallet_for_user(pool, creator_id).await?;

    let total_earned_cents: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(earned_cents), 0)::BIGINT FROM participations WHERE creator_id = $1",
    )
    .bind(creator_id)
    .fetch_one(pool)
    .await?;

    // Requested but not yet paid or returned
    let (pending_payout_count, pending_payout_cents): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(amount_cents), 0)::BIGINT
        FROM payouts
        WHERE creator_id = $1 AND status IN ('PENDING_APPROVAL', 'APPROVED', 'PROCESSING')
        "#,
    )
    .bind(creator_id)
    .fetch_one(pool)
    .await?;

    let participations = sqlx::query_as::<_, (ParticipationStatus, i64)>(
        r#"
        SELECT status, COUNT(*)
        FROM participations
        WHERE creator_id = $1
        GROUP BY status
        ORDER BY status
        "#,
    )
    .bind(creator_id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(StatusCount::from)
    .collect();

    Ok(CreatorOverview {
        balance_cents: wallet.balance_cents,
        currency: wallet.currency,
        total_earned_cents,
        pending_payout_count,
        pending_payout_cents,
        participations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_counts_serialize_flat() {
        let count = StatusCount::from((CampaignStatus::Active, 3));
        assert_eq!(
            serde_json::to_value(count).unwrap(),
            serde_json::json!({ "status": "ACTIVE", "count": 3 })
        );
    }
}
