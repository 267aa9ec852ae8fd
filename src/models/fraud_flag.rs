//! Fraud flag models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "fraud_reason", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FraudReason {
    ClickSpam,
    ViewBotting,
    DuplicateConversions,
    SuspiciousTraffic,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "fraud_severity", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FraudSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "fraud_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FraudStatus {
    Open,
    UnderReview,
    Resolved,
    Dismissed,
}

impl FraudStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, FraudStatus::Resolved | FraudStatus::Dismissed)
    }

    pub fn can_transition_to(self, next: FraudStatus) -> bool {
        use FraudStatus::*;
        matches!(
            (self, next),
            (Open, UnderReview)
                | (Open, Resolved)
                | (Open, Dismissed)
                | (UnderReview, Resolved)
                | (UnderReview, Dismissed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "fraud_source", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FraudSource {
    Manual,
    Rule,
}

/// Represents a fraud flag record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct FraudFlag {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub participation_id: Option<Uuid>,
    pub reason: FraudReason,
    pub severity: FraudSeverity,
    pub status: FraudStatus,
    pub source: FraudSource,
    pub details: String,
    pub resolution_notes: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for `fraud.create`.
#[derive(Debug, Deserialize)]
pub struct CreateFraudFlagRequest {
    pub campaign_id: Uuid,
    pub participation_id: Option<Uuid>,
    pub reason: FraudReason,
    pub severity: FraudSeverity,
    #[serde(default)]
    pub details: String,
}

/// Request body for `fraud.resolve`.
#[derive(Debug, Deserialize)]
pub struct ResolveFraudFlagRequest {
    pub id: Uuid,
    pub notes: String,

    /// Suspend the flagged participation so it stops earning
    #[serde(default)]
    pub suspend_participation: bool,
}

/// Request body for `fraud.dismiss`.
#[derive(Debug, Deserialize)]
pub struct DismissFraudFlagRequest {
    pub id: Uuid,
    pub notes: Option<String>,
}

/// Query string for `fraud.list`.
#[derive(Debug, Default, Deserialize)]
pub struct FraudListQuery {
    pub status: Option<FraudStatus>,
    pub severity: Option<FraudSeverity>,
    pub campaign_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use FraudStatus::*;

    #[test]
    fn terminal_flags_cannot_move() {
        for from in [Resolved, Dismissed] {
            assert!(from.is_terminal());
            for to in [Open, UnderReview, Resolved, Dismissed] {
                assert!(!from.can_transition_to(to));
            }
        }
    }

    #[test]
    fn review_then_resolve() {
        assert!(Open.can_transition_to(UnderReview));
        assert!(UnderReview.can_transition_to(Resolved));
        assert!(!UnderReview.can_transition_to(Open));
    }
}
