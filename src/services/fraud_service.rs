//! Fraud detection rules and the admin review queue.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        campaign::Metrics,
        fraud_flag::{
            CreateFraudFlagRequest, FraudFlag, FraudListQuery, FraudReason, FraudSeverity,
            FraudSource, FraudStatus,
        },
    },
};

/// Minimum views before click-through rules apply.
pub const CLICK_SPAM_MIN_VIEWS: i64 = 100;

/// Largest view increase accepted in one report before it looks automated.
pub const VIEW_BURST_LIMIT: i64 = 100_000;

/// A rule that fired for a metrics update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleHit {
    pub reason: FraudReason,
    pub severity: FraudSeverity,
    pub details: String,
}

fn conversions_exceed_clicks(m: Metrics) -> bool {
    m.conversions > m.clicks
}

fn clicks_exceed_views(m: Metrics) -> bool {
    m.views >= CLICK_SPAM_MIN_VIEWS && m.clicks > m.views
}

/// Evaluate the automatic rules against a counter update.
///
/// Rules on cumulative ratios fire when an update moves the counters into
/// the suspicious range, not on every later report that leaves them there.
/// A dismissed flag therefore stays dismissed until the counters recover
/// and cross the line again.
pub fn evaluate_rules(before: Metrics, after: Metrics) -> Vec<RuleHit> {
    let mut hits = Vec::new();

    if conversions_exceed_clicks(after) && !conversions_exceed_clicks(before) {
        hits.push(RuleHit {
            reason: FraudReason::DuplicateConversions,
            severity: FraudSeverity::High,
            details: format!(
                "{} conversions reported against {} clicks",
                after.conversions, after.clicks
            ),
        });
    }

    if clicks_exceed_views(after) && !clicks_exceed_views(before) {
        hits.push(RuleHit {
            reason: FraudReason::ClickSpam,
            severity: FraudSeverity::Medium,
            details: format!("{} clicks on {} views", after.clicks, after.views),
        });
    }

    let burst = after.views - before.views;
    if burst > VIEW_BURST_LIMIT {
        hits.push(RuleHit {
            reason: FraudReason::ViewBotting,
            severity: FraudSeverity::High,
            details: format!("{} views added in a single report", burst),
        });
    }

    hits
}

/// Whether an OPEN or UNDER_REVIEW HIGH severity flag holds the
/// participation's settlements.
pub async fn settlement_held(conn: &mut PgConnection, participation_id: Uuid) -> Result<bool, AppError> {
    let held = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM fraud_flags
            WHERE participation_id = $1
              AND severity = 'HIGH'
              AND status IN ('OPEN', 'UNDER_REVIEW')
        )
        "#,
    )
    .bind(participation_id)
    .fetch_one(conn)
    .await?;

    Ok(held)
}

/// Store rule hits as flags, skipping reasons that already have an
/// OPEN or UNDER_REVIEW flag on the same participation.
pub async fn raise_rule_flags(
    conn: &mut PgConnection,
    campaign_id: Uuid,
    participation_id: Uuid,
    hits: &[RuleHit],
) -> Result<Vec<FraudFlag>, AppError> {
    let mut raised = Vec::new();

    for hit in hits {
        let flag = sqlx::query_as::<_, FraudFlag>(
            r#"
            INSERT INTO fraud_flags (campaign_id, participation_id, reason, severity, source, details)
            SELECT $1, $2, $3, $4, 'RULE', $5
            WHERE NOT EXISTS (
                SELECT 1 FROM fraud_flags
                WHERE participation_id = $2
                  AND reason = $3
                  AND status IN ('OPEN', 'UNDER_REVIEW')
            )
            RETURNING *
            "#,
        )
        .bind(campaign_id)
        .bind(participation_id)
        .bind(hit.reason)
        .bind(hit.severity)
        .bind(&hit.details)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(flag) = flag {
            tracing::warn!(
                flag_id = %flag.id,
                %participation_id,
                reason = ?flag.reason,
                severity = ?flag.severity,
                "fraud rule fired"
            );
            raised.push(flag);
        }
    }

    Ok(raised)
}

/// Flags for the review queue, most severe and newest first.
pub async fn list_flags(pool: &DbPool, query: FraudListQuery) -> Result<Vec<FraudFlag>, AppError> {
    let flags = sqlx::query_as::<_, FraudFlag>(
        r#"
        SELECT * FROM fraud_flags
        WHERE ($1::fraud_status IS NULL OR status = $1)
          AND ($2::fraud_severity IS NULL OR severity = $2)
          AND ($3::uuid IS NULL OR campaign_id = $3)
        ORDER BY severity DESC, created_at DESC
        "#,
    )
    .bind(query.status)
    .bind(query.severity)
    .bind(query.campaign_id)
    .fetch_all(pool)
    .await?;

    Ok(flags)
}

pub async fn get_flag(pool: &DbPool, id: Uuid) -> Result<FraudFlag, AppError> {
    sqlx::query_as::<_, FraudFlag>("SELECT * FROM fraud_flags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Fraud flag"))
}

/// Open a flag by hand.
pub async fn create_flag(
    pool: &DbPool,
    request: CreateFraudFlagRequest,
) -> Result<FraudFlag, AppError> {
    if let Some(participation_id) = request.participation_id {
        let belongs: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM participations WHERE id = $1 AND campaign_id = $2)",
        )
        .bind(participation_id)
        .bind(request.campaign_id)
        .fetch_one(pool)
        .await?;
        if !belongs {
            return Err(AppError::NotFound("Participation"));
        }
    }

    let flag = sqlx::query_as::<_, FraudFlag>(
        r#"
        INSERT INTO fraud_flags (campaign_id, participation_id, reason, severity, source, details)
        SELECT id, $2, $3, $4, $5, $6 FROM campaigns WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(request.campaign_id)
    .bind(request.participation_id)
    .bind(request.reason)
    .bind(request.severity)
    .bind(FraudSource::Manual)
    .bind(request.details)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Campaign"))?;

    tracing::info!(flag_id = %flag.id, campaign_id = %flag.campaign_id, "fraud flag opened");
    Ok(flag)
}

async fn lock_flag(conn: &mut PgConnection, id: Uuid) -> Result<FraudFlag, AppError> {
    sqlx::query_as::<_, FraudFlag>("SELECT * FROM fraud_flags WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(AppError::NotFound("Fraud flag"))
}

fn ensure_transition(flag: &FraudFlag, next: FraudStatus) -> Result<(), AppError> {
    if flag.status.can_transition_to(next) {
        Ok(())
    } else if flag.status.is_terminal() {
        Err(AppError::InvalidState(format!(
            "Fraud flag is already {:?}",
            flag.status
        )))
    } else {
        Err(AppError::InvalidState(format!(
            "Fraud flag is {:?} and cannot become {:?}",
            flag.status, next
        )))
    }
}

/// OPEN -> UNDER_REVIEW.
pub async fn start_review(pool: &DbPool, reviewer_id: Uuid, id: Uuid) -> Result<FraudFlag, AppError> {
    let mut tx = pool.begin().await?;
    let flag = lock_flag(&mut tx, id).await?;
    ensure_transition(&flag, FraudStatus::UnderReview)?;

    let flag = sqlx::query_as::<_, FraudFlag>(
        r#"
        UPDATE fraud_flags
        SET status = 'UNDER_REVIEW', reviewed_by = $1, updated_at = NOW()
        WHERE id = $2
        RETURNING *
        "#,
    )
    .bind(reviewer_id)
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(flag)
}

/// Close a flag as RESOLVED (fraud confirmed) or DISMISSED (false alarm).
///
/// Resolving may also suspend the flagged participation, which stops it
/// from earning on later reports.
pub async fn close_flag(
    pool: &DbPool,
    reviewer_id: Uuid,
    id: Uuid,
    next: FraudStatus,
    notes: Option<String>,
    suspend_participation: bool,
) -> Result<FraudFlag, AppError> {
    let mut tx = pool.begin().await?;
    let flag = lock_flag(&mut tx, id).await?;
    ensure_transition(&flag, next)?;

    if next == FraudStatus::Resolved
        && notes.as_deref().map(str::trim).unwrap_or_default().is_empty()
    {
        return Err(AppError::InvalidRequest(
            "Resolution notes are required".to_string(),
        ));
    }

    let flag = sqlx::query_as::<_, FraudFlag>(
        r#"
        UPDATE fraud_flags
        SET status = $1, resolution_notes = $2, reviewed_by = $3,
            resolved_at = NOW(), updated_at = NOW()
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(next)
    .bind(notes)
    .bind(reviewer_id)
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    if suspend_participation && next == FraudStatus::Resolved {
        if let Some(participation_id) = flag.participation_id {
            sqlx::query(
                "UPDATE participations SET status = 'SUSPENDED', updated_at = NOW() WHERE id = $1",
            )
            .bind(participation_id)
            .execute(&mut *tx)
            .await?;
            tracing::warn!(%participation_id, flag_id = %id, "participation suspended");
        }
    }

    tx.commit().await?;

    tracing::info!(flag_id = %id, status = ?next, %reviewer_id, "fraud flag closed");
    Ok(flag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(views: i64, clicks: i64, conversions: i64) -> Metrics {
        Metrics { views, clicks, conversions }
    }

    fn flag(status: FraudStatus) -> FraudFlag {
        FraudFlag {
            id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            participation_id: Some(Uuid::new_v4()),
            reason: FraudReason::ViewBotting,
            severity: FraudSeverity::High,
            status,
            source: FraudSource::Rule,
            details: "150000 views added in a single report".to_string(),
            resolution_notes: None,
            reviewed_by: None,
            resolved_at: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn closed_flags_reject_every_transition() {
        for status in [FraudStatus::Resolved, FraudStatus::Dismissed] {
            let err = ensure_transition(&flag(status), FraudStatus::Resolved).unwrap_err();
            assert!(matches!(err, AppError::InvalidState(_)));
            assert!(err.to_string().contains("already"), "{err}");
        }
        assert!(ensure_transition(&flag(FraudStatus::Open), FraudStatus::UnderReview).is_ok());
        assert!(ensure_transition(&flag(FraudStatus::UnderReview), FraudStatus::Dismissed).is_ok());
    }

    #[test]
    fn healthy_traffic_raises_nothing() {
        assert!(evaluate_rules(m(1_000, 50, 5), m(2_000, 80, 9)).is_empty());
    }

    #[test]
    fn conversions_above_clicks_is_high_severity() {
        let hits = evaluate_rules(m(0, 0, 0), m(500, 10, 11));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].reason, FraudReason::DuplicateConversions);
        assert_eq!(hits[0].severity, FraudSeverity::High);
    }

    #[test]
    fn click_spam_needs_enough_views() {
        assert!(evaluate_rules(m(0, 0, 0), m(50, 60, 0)).is_empty());

        let hits = evaluate_rules(m(0, 0, 0), m(100, 101, 0));
        assert_eq!(hits[0].reason, FraudReason::ClickSpam);
        assert_eq!(hits[0].severity, FraudSeverity::Medium);
    }

    #[test]
    fn view_bursts_are_measured_per_report() {
        // Large totals are fine when they arrive gradually
        assert!(evaluate_rules(m(950_000, 0, 0), m(1_000_000, 0, 0)).is_empty());

        let hits = evaluate_rules(m(10, 0, 0), m(10 + VIEW_BURST_LIMIT + 1, 0, 0));
        assert_eq!(hits[0].reason, FraudReason::ViewBotting);
    }

    #[test]
    fn ratio_rules_fire_when_the_line_is_crossed() {
        // Already over the line: a dismissed flag is not raised again
        assert!(evaluate_rules(m(0, 0, 5), m(0, 0, 6)).is_empty());
        assert!(evaluate_rules(m(150, 200, 0), m(160, 210, 0)).is_empty());

        // Recovered, then crossed again
        let hits = evaluate_rules(m(500, 10, 10), m(500, 10, 11));
        assert_eq!(hits[0].reason, FraudReason::DuplicateConversions);
    }

    #[test]
    fn bursts_fire_on_every_report() {
        let first = evaluate_rules(m(0, 0, 0), m(150_000, 0, 0));
        let second = evaluate_rules(m(150_000, 0, 0), m(300_001, 0, 0));
        assert_eq!(first[0].reason, FraudReason::ViewBotting);
        assert_eq!(second[0].reason, FraudReason::ViewBotting);
    }

    #[test]
    fn several_rules_can_fire_together() {
        let hits = evaluate_rules(m(0, 0, 0), m(200_000, 300_000, 300_001));
        let reasons: Vec<_> = hits.iter().map(|h| h.reason).collect();
        assert_eq!(
            reasons,
            vec![
                FraudReason::DuplicateConversions,
                FraudReason::ClickSpam,
                FraudReason::ViewBotting
            ]
        );
    }
}
