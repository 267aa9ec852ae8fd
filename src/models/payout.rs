//! Creator payout models.
//!
//! # Lifecycle
//!
//! ```text
//! PENDING_APPROVAL -> APPROVED -> PROCESSING -> COMPLETED
//!        |               |            |
//!        v               v            v
//!     REJECTED         FAILED       FAILED
//! ```
//!
//! Funds are held when the request is made. REJECTED and FAILED refund them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payout_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    PendingApproval,
    Approved,
    Processing,
    Completed,
    Rejected,
    Failed,
}

impl PayoutStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PayoutStatus::Completed | PayoutStatus::Rejected | PayoutStatus::Failed
        )
    }

    pub fn can_transition_to(self, next: PayoutStatus) -> bool {
        use PayoutStatus::*;
        matches!(
            (self, next),
            (PendingApproval, Approved)
                | (PendingApproval, Rejected)
                | (Approved, Processing)
                | (Approved, Completed)
                | (Approved, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }

    /// Whether leaving this state for `next` returns the held funds.
    pub fn refunds_on(self, next: PayoutStatus) -> bool {
        self.can_transition_to(next) && matches!(next, PayoutStatus::Rejected | PayoutStatus::Failed)
    }
}

/// Represents a payout record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Payout {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub wallet_id: Uuid,
    pub amount_cents: i64,
    pub status: PayoutStatus,

    /// Creator payout account at the time of the request
    pub destination: String,

    pub gateway_payout_id: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for `payout.request`.
#[derive(Debug, Deserialize)]
pub struct PayoutRequest {
    pub amount_cents: i64,
}

/// Request body for `payout.reject`.
#[derive(Debug, Deserialize)]
pub struct RejectPayoutRequest {
    pub id: Uuid,
    pub reason: String,
}

/// Query string for `payout.list`.
#[derive(Debug, Default, Deserialize)]
pub struct PayoutListQuery {
    pub status: Option<PayoutStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use PayoutStatus::*;

    #[test]
    fn approval_only_from_pending() {
        assert!(PendingApproval.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Approved));
        assert!(!Processing.can_transition_to(Approved));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Completed.can_transition_to(Approved));
    }

    #[test]
    fn terminal_states_are_final() {
        for from in [Completed, Rejected, Failed] {
            assert!(from.is_terminal());
            for to in [PendingApproval, Approved, Processing, Completed, Rejected, Failed] {
                assert!(!from.can_transition_to(to), "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn refunds_follow_rejection_and_failure() {
        assert!(PendingApproval.refunds_on(Rejected));
        assert!(Processing.refunds_on(Failed));
        assert!(!Processing.refunds_on(Completed));
        assert!(!Failed.refunds_on(Failed));
    }
}
