//! Campaign service: brand-side campaign lifecycle, application review and
//! performance settlement.
//!
//! # Lock Order
//!
//! Paths that touch several rows lock them in one order: campaign, then
//! participation, then the brand wallet, then the creator wallet. Payout
//! paths only ever lock a creator wallet, so no cycle is possible.

use chrono::Utc;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::session::Session,
    models::{
        campaign::{
            ApplicationDecision, Campaign, CampaignStatus, CreateCampaignRequest, Metrics,
            Participation, ParticipationStatus, RecordMetricsRequest, UpdateCampaignRequest,
        },
        fraud_flag::{FraudFlag, FraudSeverity},
    },
    services::{
        fraud_service::{self, RuleHit},
        ledger::{self, Posting},
        wallet_service::{self, EntryContext},
    },
};

/// Validate a campaign landing URL.
///
/// # Rules
///
/// - Must be a valid URL, at most 2048 characters
/// - Must be HTTPS (HTTP localhost allowed for development)
pub fn validate_landing_url(url: &str) -> Result<(), AppError> {
    if url.len() > 2048 {
        return Err(AppError::InvalidRequest(
            "Landing URL exceeds 2048 characters".to_string(),
        ));
    }

    let parsed = url::Url::parse(url)
        .map_err(|_| AppError::InvalidRequest("Invalid landing URL".to_string()))?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" if matches!(parsed.host_str(), Some("localhost") | Some("127.0.0.1")) => Ok(()),
        "http" => Err(AppError::InvalidRequest(
            "Landing URL must use HTTPS".to_string(),
        )),
        _ => Err(AppError::InvalidRequest(
            "Landing URL must use HTTP or HTTPS".to_string(),
        )),
    }
}

fn validate_terms(rate_cents: i64, budget_cents: i64) -> Result<(), AppError> {
    if rate_cents <= 0 {
        return Err(AppError::InvalidRequest("Payout rate must be positive".to_string()));
    }
    if budget_cents <= 0 {
        return Err(AppError::InvalidRequest("Budget must be positive".to_string()));
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<(), AppError> {
    let len = title.trim().chars().count();
    if len == 0 || len > 200 {
        return Err(AppError::InvalidRequest(
            "Title must be between 1 and 200 characters".to_string(),
        ));
    }
    Ok(())
}

/// Create a DRAFT campaign. Nothing is reserved until it is published.
pub async fn create_campaign(
    pool: &DbPool,
    brand_id: Uuid,
    request: CreateCampaignRequest,
) -> Result<Campaign, AppError> {
    validate_title(&request.title)?;
    validate_landing_url(&request.landing_url)?;
    validate_terms(request.payout_rate_cents, request.budget_cents)?;
    if let (Some(starts), Some(ends)) = (request.starts_at, request.ends_at) {
        if ends <= starts {
            return Err(AppError::InvalidRequest(
                "Campaign must end after it starts".to_string(),
            ));
        }
    }

    let campaign = sqlx::query_as::<_, Campaign>(
        r#"
        INSERT INTO campaigns (
            brand_id, title, description, landing_url, payout_type,
            payout_rate_cents, budget_cents, starts_at, ends_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(brand_id)
    .bind(request.title.trim())
    .bind(request.description)
    .bind(request.landing_url)
    .bind(request.payout_type)
    .bind(request.payout_rate_cents)
    .bind(request.budget_cents)
    .bind(request.starts_at)
    .bind(request.ends_at)
    .fetch_one(pool)
    .await?;

    tracing::info!(campaign_id = %campaign.id, %brand_id, "campaign created");
    Ok(campaign)
}

/// Campaigns owned by a brand, newest first.
pub async fn list_campaigns(
    pool: &DbPool,
    brand_id: Uuid,
    status: Option<CampaignStatus>,
) -> Result<Vec<Campaign>, AppError> {
    let campaigns = sqlx::query_as::<_, Campaign>(
        r#"
        SELECT * FROM campaigns
        WHERE brand_id = $1 AND ($2::campaign_status IS NULL OR status = $2)
        ORDER BY created_at DESC
        "#,
    )
    .bind(brand_id)
    .bind(status)
    .fetch_all(pool)
    .await?;

    Ok(campaigns)
}

/// Fetch a campaign visible to the session: its brand, or any admin.
pub async fn get_campaign(pool: &DbPool, session: &Session, id: Uuid) -> Result<Campaign, AppError> {
    let campaign = sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Campaign"))?;

    if campaign.brand_id != session.user_id() && !session.is_admin {
        return Err(AppError::NotFound("Campaign"));
    }
    Ok(campaign)
}

/// Lock a campaign owned by `brand_id`.
async fn lock_owned_campaign(
    conn: &mut PgConnection,
    brand_id: Uuid,
    id: Uuid,
) -> Result<Campaign, AppError> {
    sqlx::query_as::<_, Campaign>(
        "SELECT * FROM campaigns WHERE id = $1 AND brand_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(brand_id)
    .fetch_optional(conn)
    .await?
    .ok_or(AppError::NotFound("Campaign"))
}

async fn set_status(
    conn: &mut PgConnection,
    id: Uuid,
    status: CampaignStatus,
) -> Result<Campaign, AppError> {
    let campaign = sqlx::query_as::<_, Campaign>(
        "UPDATE campaigns SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(status)
    .bind(id)
    .fetch_one(conn)
    .await?;

    Ok(campaign)
}

fn ensure_transition(campaign: &Campaign, next: CampaignStatus) -> Result<(), AppError> {
    if campaign.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(AppError::InvalidState(format!(
            "Campaign cannot move from {:?} to {:?}",
            campaign.status, next
        )))
    }
}

/// Edit a campaign. Economic terms can only change while it is a draft.
pub async fn update_campaign(
    pool: &DbPool,
    brand_id: Uuid,
    request: UpdateCampaignRequest,
) -> Result<Campaign, AppError> {
    if let Some(ref title) = request.title {
        validate_title(title)?;
    }
    if let Some(ref url) = request.landing_url {
        validate_landing_url(url)?;
    }

    let mut tx = pool.begin().await?;
    let current = lock_owned_campaign(&mut tx, brand_id, request.id).await?;

    if current.status.is_terminal() {
        return Err(AppError::InvalidState(
            "Finished campaigns cannot be edited".to_string(),
        ));
    }
    if request.changes_terms() && current.status != CampaignStatus::Draft {
        return Err(AppError::InvalidState(
            "Payout terms can only change while the campaign is a draft".to_string(),
        ));
    }

    validate_terms(
        request.payout_rate_cents.unwrap_or(current.payout_rate_cents),
        request.budget_cents.unwrap_or(current.budget_cents),
    )?;
    if let (Some(starts), Some(ends)) = (current.starts_at, request.ends_at) {
        if ends <= starts {
            return Err(AppError::InvalidRequest(
                "Campaign must end after it starts".to_string(),
            ));
        }
    }

    let campaign = sqlx::query_as::<_, Campaign>(
        r#"
        UPDATE campaigns
        SET title = COALESCE($1, title),
            description = COALESCE($2, description),
            landing_url = COALESCE($3, landing_url),
            ends_at = COALESCE($4, ends_at),
            payout_type = COALESCE($5, payout_type),
            payout_rate_cents = COALESCE($6, payout_rate_cents),
            budget_cents = COALESCE($7, budget_cents),
            updated_at = NOW()
        WHERE id = $8
        RETURNING *
        "#,
    )
    .bind(request.title.as_deref().map(str::trim))
    .bind(request.description)
    .bind(request.landing_url)
    .bind(request.ends_at)
    .bind(request.payout_type)
    .bind(request.payout_rate_cents)
    .bind(request.budget_cents)
    .bind(request.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(campaign)
}

/// DRAFT -> ACTIVE. Moves the whole budget from the brand balance into escrow.
pub async fn publish_campaign(pool: &DbPool, brand_id: Uuid, id: Uuid) -> Result<Campaign, AppError> {
    let mut tx = pool.begin().await?;
    let campaign = lock_owned_campaign(&mut tx, brand_id, id).await?;

    if campaign.status != CampaignStatus::Draft {
        return Err(AppError::InvalidState(
            "Only draft campaigns can be published".to_string(),
        ));
    }
    if campaign.ends_at.is_some_and(|ends| ends <= Utc::now()) {
        return Err(AppError::InvalidRequest(
            "Campaign end date has already passed".to_string(),
        ));
    }

    let wallet = wallet_service::lock_wallet_for_user(&mut tx, brand_id).await?;
    wallet_service::apply_posting(
        &mut tx,
        &wallet,
        Posting::EscrowLock(campaign.budget_cents),
        EntryContext::campaign(campaign.id, format!("Escrow for \"{}\"", campaign.title)),
    )
    .await?;

    let campaign = sqlx::query_as::<_, Campaign>(
        r#"
        UPDATE campaigns
        SET status = 'ACTIVE', starts_at = COALESCE(starts_at, NOW()), updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(campaign_id = %id, budget_cents = campaign.budget_cents, "campaign published, escrow locked");
    Ok(campaign)
}

/// ACTIVE -> PAUSED. Escrow stays locked.
pub async fn pause_campaign(pool: &DbPool, brand_id: Uuid, id: Uuid) -> Result<Campaign, AppError> {
    toggle(pool, brand_id, id, CampaignStatus::Active, CampaignStatus::Paused).await
}

/// PAUSED -> ACTIVE.
pub async fn resume_campaign(pool: &DbPool, brand_id: Uuid, id: Uuid) -> Result<Campaign, AppError> {
    toggle(pool, brand_id, id, CampaignStatus::Paused, CampaignStatus::Active).await
}

async fn toggle(
    pool: &DbPool,
    brand_id: Uuid,
    id: Uuid,
    from: CampaignStatus,
    to: CampaignStatus,
) -> Result<Campaign, AppError> {
    let mut tx = pool.begin().await?;
    let campaign = lock_owned_campaign(&mut tx, brand_id, id).await?;
    if campaign.status != from {
        return Err(AppError::InvalidState(format!(
            "Campaign is {:?}, expected {:?}",
            campaign.status, from
        )));
    }
    let campaign = set_status(&mut tx, id, to).await?;
    tx.commit().await?;

    tracing::info!(campaign_id = %id, status = ?to, "campaign status changed");
    Ok(campaign)
}

/// Finish a campaign as COMPLETED.
pub async fn complete_campaign(pool: &DbPool, brand_id: Uuid, id: Uuid) -> Result<Campaign, AppError> {
    close_campaign(pool, brand_id, id, CampaignStatus::Completed).await
}

/// Finish a campaign as CANCELLED.
pub async fn cancel_campaign(pool: &DbPool, brand_id: Uuid, id: Uuid) -> Result<Campaign, AppError> {
    close_campaign(pool, brand_id, id, CampaignStatus::Cancelled).await
}

/// Move to a terminal state, returning unspent escrow to the brand balance.
async fn close_campaign(
    pool: &DbPool,
    brand_id: Uuid,
    id: Uuid,
    next: CampaignStatus,
) -> Result<Campaign, AppError> {
    let mut tx = pool.begin().await?;
    let campaign = lock_owned_campaign(&mut tx, brand_id, id).await?;
    ensure_transition(&campaign, next)?;

    let remaining = campaign.remaining_cents();
    if campaign.status.holds_escrow() && remaining > 0 {
        let wallet = wallet_service::lock_wallet_for_user(&mut tx, brand_id).await?;
        wallet_service::apply_posting(
            &mut tx,
            &wallet,
            Posting::EscrowRelease(remaining),
            EntryContext::campaign(id, format!("Unspent budget of \"{}\"", campaign.title)),
        )
        .await?;
    }

    let campaign = set_status(&mut tx, id, next).await?;
    tx.commit().await?;

    tracing::info!(campaign_id = %id, status = ?next, released_cents = remaining, "campaign closed");
    Ok(campaign)
}

/// Applications and members of a brand's campaign.
pub async fn list_applications(
    pool: &DbPool,
    brand_id: Uuid,
    campaign_id: Uuid,
) -> Result<Vec<Participation>, AppError> {
    let participations = sqlx::query_as::<_, Participation>(
        r#"
        SELECT p.* FROM participations p
        JOIN campaigns c ON c.id = p.campaign_id
        WHERE p.campaign_id = $1 AND c.brand_id = $2
        ORDER BY p.created_at ASC
        "#,
    )
    .bind(campaign_id)
    .bind(brand_id)
    .fetch_all(pool)
    .await?;

    Ok(participations)
}

/// Approve or reject an APPLIED participation.
pub async fn review_application(
    pool: &DbPool,
    brand_id: Uuid,
    participation_id: Uuid,
    decision: ApplicationDecision,
) -> Result<Participation, AppError> {
    let next = match decision {
        ApplicationDecision::Approve => ParticipationStatus::Approved,
        ApplicationDecision::Reject => ParticipationStatus::Rejected,
    };

    let updated = sqlx::query_as::<_, Participation>(
        r#"
        UPDATE participations p
        SET status = $1, updated_at = NOW()
        FROM campaigns c
        WHERE p.id = $2
          AND c.id = p.campaign_id
          AND c.brand_id = $3
          AND p.status = 'APPLIED'
        RETURNING p.*
        "#,
    )
    .bind(next)
    .bind(participation_id)
    .bind(brand_id)
    .fetch_optional(pool)
    .await?;

    match updated {
        Some(p) => {
            tracing::info!(participation_id = %p.id, status = ?p.status, "application reviewed");
            Ok(p)
        }
        None => {
            // Distinguish "not yours / missing" from "already reviewed"
            let exists: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM participations p JOIN campaigns c ON c.id = p.campaign_id
                    WHERE p.id = $1 AND c.brand_id = $2
                )
                "#,
            )
            .bind(participation_id)
            .bind(brand_id)
            .fetch_one(pool)
            .await?;

            if exists {
                Err(AppError::InvalidState(
                    "Application has already been reviewed".to_string(),
                ))
            } else {
                Err(AppError::NotFound("Application"))
            }
        }
    }
}

/// Outcome of a metrics report or a tracked click.
#[derive(Debug, serde::Serialize)]
pub struct SettlementResult {
    pub participation: Participation,
    pub settled_cents: i64,
    pub campaign_status: CampaignStatus,
    pub flags_raised: Vec<FraudFlag>,
}

/// Check that reported counters only grow.
pub fn merge_metrics(
    current: Metrics,
    views: Option<i64>,
    clicks: Option<i64>,
    conversions: Option<i64>,
) -> Result<Metrics, AppError> {
    let next = Metrics {
        views: views.unwrap_or(current.views),
        clicks: clicks.unwrap_or(current.clicks),
        conversions: conversions.unwrap_or(current.conversions),
    };

    if next.views < current.views
        || next.clicks < current.clicks
        || next.conversions < current.conversions
    {
        return Err(AppError::InvalidRequest(
            "Metrics are cumulative and cannot decrease".to_string(),
        ));
    }
    Ok(next)
}

/// Record cumulative views/conversions reported by the brand (or an admin).
pub async fn record_metrics(
    pool: &DbPool,
    session: &Session,
    request: RecordMetricsRequest,
) -> Result<SettlementResult, AppError> {
    let mut tx = pool.begin().await?;

    let campaign_id: Uuid =
        sqlx::query_scalar("SELECT campaign_id FROM participations WHERE id = $1")
            .bind(request.participation_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("Participation"))?;

    let campaign = lock_campaign(&mut tx, campaign_id).await?;
    if campaign.brand_id != session.user_id() && !session.is_admin {
        return Err(AppError::NotFound("Participation"));
    }

    let participation = lock_participation(&mut tx, request.participation_id).await?;
    ensure_earning(&campaign, &participation)?;

    let next = merge_metrics(
        Metrics::from(&participation),
        request.views,
        None,
        request.conversions,
    )?;

    let result = apply_metrics(&mut tx, &campaign, &participation, next).await?;
    tx.commit().await?;
    Ok(result)
}

/// Count a click from a tracking link and return where to send the visitor.
///
/// Clicks on links of campaigns that are not running, or of participations
/// that are not approved, still redirect but are not counted.
pub async fn record_click(pool: &DbPool, tracking_code: &str) -> Result<String, AppError> {
    let mut tx = pool.begin().await?;

    let (participation_id, campaign_id): (Uuid, Uuid) = sqlx::query_as(
        "SELECT id, campaign_id FROM participations WHERE tracking_code = $1",
    )
    .bind(tracking_code)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Tracking link"))?;

    let campaign = lock_campaign(&mut tx, campaign_id).await?;
    let participation = lock_participation(&mut tx, participation_id).await?;

    if ensure_earning(&campaign, &participation).is_ok() {
        let mut next = Metrics::from(&participation);
        next.clicks += 1;
        let result = apply_metrics(&mut tx, &campaign, &participation, next).await?;
        tracing::debug!(%participation_id, settled_cents = result.settled_cents, "click recorded");
    }

    tx.commit().await?;
    Ok(campaign.landing_url)
}

async fn lock_campaign(conn: &mut PgConnection, id: Uuid) -> Result<Campaign, AppError> {
    sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(AppError::NotFound("Campaign"))
}

async fn lock_participation(conn: &mut PgConnection, id: Uuid) -> Result<Participation, AppError> {
    sqlx::query_as::<_, Participation>("SELECT * FROM participations WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(AppError::NotFound("Participation"))
}

fn ensure_earning(campaign: &Campaign, participation: &Participation) -> Result<(), AppError> {
    if campaign.status != CampaignStatus::Active {
        return Err(AppError::InvalidState("Campaign is not active".to_string()));
    }
    if participation.status != ParticipationStatus::Approved {
        return Err(AppError::InvalidState(
            "Participation is not approved".to_string(),
        ));
    }
    Ok(())
}

/// Outcome of a metrics report for the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementDecision {
    Settle(i64),
    Withhold,
}

impl SettlementDecision {
    pub fn amount(self) -> i64 {
        match self {
            SettlementDecision::Settle(amount) => amount,
            SettlementDecision::Withhold => 0,
        }
    }
}

/// Decide what a report pays out.
///
/// Nothing settles while a HIGH severity hit from this report, or a HIGH
/// flag still open or under review, holds the participation. Once the
/// flags are closed the next report settles everything owed up to the
/// remaining budget.
pub fn settlement_decision(
    hits: &[RuleHit],
    held_by_flag: bool,
    target_cents: i64,
    earned_cents: i64,
    remaining_cents: i64,
) -> SettlementDecision {
    if held_by_flag || hits.iter().any(|h| h.severity == FraudSeverity::High) {
        return SettlementDecision::Withhold;
    }
    SettlementDecision::Settle(ledger::settlement_amount(
        target_cents,
        earned_cents,
        remaining_cents,
    ))
}

/// Store new counters, run fraud rules and settle earnings.
///
/// Withheld reports still store their counters so a reviewer sees what
/// was reported.
async fn apply_metrics(
    conn: &mut PgConnection,
    campaign: &Campaign,
    participation: &Participation,
    next: Metrics,
) -> Result<SettlementResult, AppError> {
    let before = Metrics::from(participation);

    let hits = fraud_service::evaluate_rules(before, next);
    let flags_raised =
        fraud_service::raise_rule_flags(&mut *conn, campaign.id, participation.id, &hits).await?;
    let held_by_flag = fraud_service::settlement_held(&mut *conn, participation.id).await?;

    let target = ledger::earnings_target(
        campaign.payout_type,
        campaign.payout_rate_cents,
        next.views,
        next.clicks,
        next.conversions,
    );
    let decision = settlement_decision(
        &hits,
        held_by_flag,
        target,
        participation.earned_cents,
        campaign.remaining_cents(),
    );
    let amount = decision.amount();

    if amount > 0 {
        let brand_wallet = wallet_service::lock_wallet_for_user(&mut *conn, campaign.brand_id).await?;
        wallet_service::apply_posting(
            &mut *conn,
            &brand_wallet,
            Posting::EscrowSettle(amount),
            EntryContext::default(),
        )
        .await?;

        let creator_wallet =
            wallet_service::lock_wallet_for_user(&mut *conn, participation.creator_id).await?;
        wallet_service::apply_posting(
            &mut *conn,
            &creator_wallet,
            Posting::Earning(amount),
            EntryContext::campaign(campaign.id, format!("Earnings from \"{}\"", campaign.title)),
        )
        .await?;
    } else if decision == SettlementDecision::Withhold {
        tracing::warn!(participation_id = %participation.id, "settlement withheld pending fraud review");
    }

    let participation = sqlx::query_as::<_, Participation>(
        r#"
        UPDATE participations
        SET views = $1, clicks = $2, conversions = $3,
            earned_cents = earned_cents + $4, updated_at = NOW()
        WHERE id = $5
        RETURNING *
        "#,
    )
    .bind(next.views)
    .bind(next.clicks)
    .bind(next.conversions)
    .bind(amount)
    .bind(participation.id)
    .fetch_one(&mut *conn)
    .await?;

    let mut campaign_status = campaign.status;
    if amount > 0 {
        let exhausted = campaign.spent_cents + amount >= campaign.budget_cents;
        campaign_status = if exhausted {
            CampaignStatus::Completed
        } else {
            campaign.status
        };

        sqlx::query(
            r#"
            UPDATE campaigns
            SET spent_cents = spent_cents + $1, status = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(amount)
        .bind(campaign_status)
        .bind(campaign.id)
        .execute(&mut *conn)
        .await?;

        if exhausted {
            tracing::info!(campaign_id = %campaign.id, "budget exhausted, campaign completed");
        }
    }

    Ok(SettlementResult {
        participation,
        settled_cents: amount,
        campaign_status,
        flags_raised,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::campaign::PayoutType;

    #[test]
    fn landing_url_rules() {
        assert!(validate_landing_url("https://acme.example/summer").is_ok());
        assert!(validate_landing_url("http://localhost:3000/promo").is_ok());
        assert!(validate_landing_url("http://acme.example").is_err());
        assert!(validate_landing_url("ftp://acme.example").is_err());
        assert!(validate_landing_url("not a url").is_err());

        let long = format!("https://acme.example/{}", "a".repeat(2048));
        assert!(validate_landing_url(&long).is_err());
    }

    #[test]
    fn terms_must_be_positive() {
        assert!(validate_terms(25, 10_000).is_ok());
        assert!(validate_terms(0, 10_000).is_err());
        assert!(validate_terms(25, -1).is_err());
    }

    #[test]
    fn metrics_only_grow() {
        let current = Metrics { views: 100, clicks: 10, conversions: 1 };

        let next = merge_metrics(current, Some(250), None, None).unwrap();
        assert_eq!(next, Metrics { views: 250, clicks: 10, conversions: 1 });

        assert!(merge_metrics(current, Some(99), None, None).is_err());
        assert!(merge_metrics(current, None, None, Some(0)).is_err());
    }

    /// Replays reports against one participation, tracking earnings and the
    /// flags a reviewer has not closed yet.
    struct Reports {
        payout_type: PayoutType,
        rate_cents: i64,
        metrics: Metrics,
        earned_cents: i64,
        remaining_cents: i64,
        open_high_flags: usize,
    }

    impl Reports {
        fn new(payout_type: PayoutType, rate_cents: i64) -> Self {
            Reports {
                payout_type,
                rate_cents,
                metrics: Metrics { views: 0, clicks: 0, conversions: 0 },
                earned_cents: 0,
                remaining_cents: 10_000_000,
                open_high_flags: 0,
            }
        }

        fn report(&mut self, next: Metrics) -> SettlementDecision {
            let hits = fraud_service::evaluate_rules(self.metrics, next);
            self.open_high_flags += hits
                .iter()
                .filter(|h| h.severity == FraudSeverity::High)
                .count();

            let target = ledger::earnings_target(
                self.payout_type,
                self.rate_cents,
                next.views,
                next.clicks,
                next.conversions,
            );
            let decision = settlement_decision(
                &hits,
                self.open_high_flags > 0,
                target,
                self.earned_cents,
                self.remaining_cents,
            );

            self.metrics = next;
            self.earned_cents += decision.amount();
            self.remaining_cents -= decision.amount();
            decision
        }

        fn close_flags(&mut self) {
            self.open_high_flags = 0;
        }
    }

    #[test]
    fn view_burst_holds_settlement_until_reviewed() {
        let mut reports = Reports::new(PayoutType::Cpv, 1_000);

        let burst = Metrics { views: 150_000, clicks: 0, conversions: 0 };
        assert_eq!(reports.report(burst), SettlementDecision::Withhold);

        // A quiet follow-up report does not release the hold
        let quiet = Metrics { views: 150_001, clicks: 0, conversions: 0 };
        assert_eq!(reports.report(quiet), SettlementDecision::Withhold);

        reports.close_flags();
        let after_review = Metrics { views: 150_002, clicks: 0, conversions: 0 };
        assert_eq!(reports.report(after_review), SettlementDecision::Settle(150_002));
        assert_eq!(reports.earned_cents, 150_002);
    }

    #[test]
    fn dismissed_conversion_flag_releases_settlement() {
        let mut reports = Reports::new(PayoutType::Cpa, 500);

        let unclicked = Metrics { views: 0, clicks: 0, conversions: 5 };
        assert_eq!(reports.report(unclicked), SettlementDecision::Withhold);

        reports.close_flags();
        let next = Metrics { views: 0, clicks: 0, conversions: 6 };
        assert_eq!(reports.report(next), SettlementDecision::Settle(3_000));
        assert_eq!(reports.open_high_flags, 0);
    }

    #[test]
    fn medium_hits_do_not_withhold() {
        let hits = fraud_service::evaluate_rules(
            Metrics { views: 0, clicks: 0, conversions: 0 },
            Metrics { views: 100, clicks: 150, conversions: 0 },
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(
            settlement_decision(&hits, false, 3_750, 1_000, 100_000),
            SettlementDecision::Settle(2_750)
        );
        assert_eq!(
            settlement_decision(&hits, false, 3_750, 1_000, 500),
            SettlementDecision::Settle(500)
        );
    }

    #[test]
    fn titles_are_bounded() {
        assert!(validate_title("Summer drop").is_ok());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(201)).is_err());
    }
}
