//! Campaign and participation models.
//!
//! A brand creates a campaign in DRAFT, publishes it (which locks the budget
//! in escrow) and creators apply to it from the marketplace. An approved
//! participation earns money from reported views, clicks or conversions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unit a campaign pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payout_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PayoutType {
    /// Cost per view, rate is per 1000 views
    Cpv,
    /// Cost per click
    Cpc,
    /// Cost per acquisition (conversion)
    Cpa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "campaign_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl CampaignStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Cancelled)
    }

    /// Whether budget is currently held in escrow for a campaign in this state.
    pub fn holds_escrow(self) -> bool {
        matches!(self, CampaignStatus::Active | CampaignStatus::Paused)
    }

    pub fn can_transition_to(self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, next),
            (Draft, Active)
                | (Draft, Cancelled)
                | (Active, Paused)
                | (Paused, Active)
                | (Active, Completed)
                | (Paused, Completed)
                | (Active, Cancelled)
                | (Paused, Cancelled)
        )
    }
}

/// Represents a campaign record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Campaign {
    pub id: Uuid,

    /// Owning brand user
    pub brand_id: Uuid,

    pub title: String,
    pub description: String,

    /// Where the click tracker sends visitors
    pub landing_url: String,

    pub payout_type: PayoutType,

    /// Per unit (CPC/CPA) or per 1000 views (CPV)
    pub payout_rate_cents: i64,

    pub budget_cents: i64,

    /// Paid out to creators so far, never above budget
    pub spent_cents: i64,

    pub status: CampaignStatus,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Budget still held in escrow.
    pub fn remaining_cents(&self) -> i64 {
        self.budget_cents - self.spent_cents
    }
}

/// Request body for `campaign.create`.
///
/// ```json
/// {
///   "title": "Summer drop",
///   "description": "Short-form videos featuring the new line",
///   "landing_url": "https://acme.example/summer",
///   "payout_type": "CPC",
///   "payout_rate_cents": 25,
///   "budget_cents": 500000
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub landing_url: String,
    pub payout_type: PayoutType,
    pub payout_rate_cents: i64,
    pub budget_cents: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

/// Request body for `campaign.update`. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCampaignRequest {
    pub id: Uuid,
    pub title: Option<String>,
    pub description: Option<String>,
    pub landing_url: Option<String>,
    pub ends_at: Option<DateTime<Utc>>,

    // Economic terms, DRAFT only
    pub payout_type: Option<PayoutType>,
    pub payout_rate_cents: Option<i64>,
    pub budget_cents: Option<i64>,
}

impl UpdateCampaignRequest {
    pub fn changes_terms(&self) -> bool {
        self.payout_type.is_some() || self.payout_rate_cents.is_some() || self.budget_cents.is_some()
    }
}

/// Body carrying only a record id, used by lifecycle procedures.
#[derive(Debug, Deserialize)]
pub struct IdRequest {
    pub id: Uuid,
}

/// Query string for `campaign.list`.
#[derive(Debug, Default, Deserialize)]
pub struct CampaignListQuery {
    pub status: Option<CampaignStatus>,
}

/// Query string for `marketplace.browse`.
#[derive(Debug, Default, Deserialize)]
pub struct BrowseQuery {
    pub payout_type: Option<PayoutType>,
    pub search: Option<String>,
    #[serde(default = "default_browse_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_browse_limit() -> i64 {
    20
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "participation_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipationStatus {
    Applied,
    Approved,
    Rejected,
    Suspended,
}

/// A creator's membership in a campaign.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Participation {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub creator_id: Uuid,
    pub status: ParticipationStatus,
    pub pitch: Option<String>,

    /// Code embedded in the creator's tracking link (`/r/{code}`)
    pub tracking_code: String,

    pub views: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub earned_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cumulative performance counters for a participation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub views: i64,
    pub clicks: i64,
    pub conversions: i64,
}

impl From<&Participation> for Metrics {
    fn from(p: &Participation) -> Self {
        Self {
            views: p.views,
            clicks: p.clicks,
            conversions: p.conversions,
        }
    }
}

/// Request body for `marketplace.apply`.
#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub campaign_id: Uuid,
    pub pitch: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationDecision {
    Approve,
    Reject,
}

/// Request body for `campaign.reviewApplication`.
#[derive(Debug, Deserialize)]
pub struct ReviewApplicationRequest {
    pub participation_id: Uuid,
    pub decision: ApplicationDecision,
}

/// Request body for `campaign.recordMetrics`.
///
/// Values are cumulative totals reported by the brand's analytics. Counters
/// left out keep their current value. Clicks come from the tracking link.
#[derive(Debug, Deserialize)]
pub struct RecordMetricsRequest {
    pub participation_id: Uuid,
    pub views: Option<i64>,
    pub conversions: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions() {
        use CampaignStatus::*;
        assert!(Draft.can_transition_to(Active));
        assert!(Active.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Active));
        assert!(Paused.can_transition_to(Completed));
        assert!(!Draft.can_transition_to(Paused));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Cancelled.can_transition_to(Active));
    }

    #[test]
    fn escrow_is_held_only_while_running() {
        assert!(CampaignStatus::Active.holds_escrow());
        assert!(CampaignStatus::Paused.holds_escrow());
        assert!(!CampaignStatus::Draft.holds_escrow());
        assert!(!CampaignStatus::Completed.holds_escrow());
    }

    #[test]
    fn payout_type_uses_uppercase_wire_names() {
        let t: PayoutType = serde_json::from_str(r#""CPV""#).unwrap();
        assert_eq!(t, PayoutType::Cpv);
        assert_eq!(serde_json::to_string(&PayoutType::Cpa).unwrap(), r#""CPA""#);
    }
}
