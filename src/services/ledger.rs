//! Posting rules for wallet balances and escrow.
//!
//! Services load a wallet row `FOR UPDATE`, ask this module what the new
//! balances are and which ledger entry to write, then persist both inside
//! the same database transaction. Keeping the arithmetic here means every
//! code path moves money the same way, and the rules can be tested without
//! a database.
//!
//! # Invariant
//!
//! `balance_cents` always equals the sum of the wallet's COMPLETED ledger
//! entries. Postings that change the balance therefore produce exactly one
//! entry whose signed amount equals the balance change. Escrow settlement
//! moves money out of a brand's escrow into a creator's balance; the brand
//! side has no entry because the brand balance was already debited by the
//! escrow lock.

use crate::models::{campaign::PayoutType, transaction::TransactionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("amount must be positive")]
    NonPositiveAmount,
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("insufficient escrow")]
    InsufficientEscrow,
}

/// The two money columns of a wallet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balances {
    pub balance_cents: i64,
    pub escrow_cents: i64,
}

/// A single money movement against one wallet. Amounts are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Posting {
    Deposit(i64),
    EscrowLock(i64),
    EscrowRelease(i64),
    EscrowSettle(i64),
    Earning(i64),
    PayoutHold(i64),
    Refund(i64),
}

/// Ledger row to write alongside the balance update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub kind: TransactionKind,
    pub amount_cents: i64,
}

impl Posting {
    fn amount(self) -> i64 {
        match self {
            Posting::Deposit(a)
            | Posting::EscrowLock(a)
            | Posting::EscrowRelease(a)
            | Posting::EscrowSettle(a)
            | Posting::Earning(a)
            | Posting::PayoutHold(a)
            | Posting::Refund(a) => a,
        }
    }
}

/// Apply a posting, returning the new balances and the entry to record.
pub fn post(current: Balances, posting: Posting) -> Result<(Balances, Option<Entry>), LedgerError> {
    let amount = posting.amount();
    if amount <= 0 {
        return Err(LedgerError::NonPositiveAmount);
    }

    let mut next = current;
    let entry = match posting {
        Posting::Deposit(a) => {
            next.balance_cents += a;
            Some(Entry { kind: TransactionKind::Deposit, amount_cents: a })
        }
        Posting::EscrowLock(a) => {
            if current.balance_cents < a {
                return Err(LedgerError::InsufficientBalance);
            }
            next.balance_cents -= a;
            next.escrow_cents += a;
            Some(Entry { kind: TransactionKind::EscrowLock, amount_cents: -a })
        }
        Posting::EscrowRelease(a) => {
            if current.escrow_cents < a {
                return Err(LedgerError::InsufficientEscrow);
            }
            next.escrow_cents -= a;
            next.balance_cents += a;
            Some(Entry { kind: TransactionKind::EscrowRelease, amount_cents: a })
        }
        Posting::EscrowSettle(a) => {
            if current.escrow_cents < a {
                return Err(LedgerError::InsufficientEscrow);
            }
            next.escrow_cents -= a;
            None
        }
        Posting::Earning(a) => {
            next.balance_cents += a;
            Some(Entry { kind: TransactionKind::Earning, amount_cents: a })
        }
        Posting::PayoutHold(a) => {
            if current.balance_cents < a {
                return Err(LedgerError::InsufficientBalance);
            }
            next.balance_cents -= a;
            Some(Entry { kind: TransactionKind::Payout, amount_cents: -a })
        }
        Posting::Refund(a) => {
            next.balance_cents += a;
            Some(Entry { kind: TransactionKind::Refund, amount_cents: a })
        }
    };

    Ok((next, entry))
}

/// Total a participation has earned at the given cumulative counters.
///
/// CPV rates are per thousand views; partial thousands are paid pro rata
/// and rounded down to the cent.
pub fn earnings_target(
    payout_type: PayoutType,
    rate_cents: i64,
    views: i64,
    clicks: i64,
    conversions: i64,
) -> i64 {
    match payout_type {
        PayoutType::Cpv => views.saturating_mul(rate_cents) / 1000,
        PayoutType::Cpc => clicks.saturating_mul(rate_cents),
        PayoutType::Cpa => conversions.saturating_mul(rate_cents),
    }
}

/// Amount to settle now: what is owed beyond `already_earned`, capped by
/// the campaign budget that is still unspent.
pub fn settlement_amount(target: i64, already_earned: i64, remaining_budget: i64) -> i64 {
    (target - already_earned).min(remaining_budget).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays postings the way the services do, keeping the written entries.
    fn replay(postings: &[Posting]) -> (Balances, Vec<Entry>) {
        let mut balances = Balances::default();
        let mut entries = Vec::new();
        for &p in postings {
            if let Ok((next, entry)) = post(balances, p) {
                balances = next;
                entries.extend(entry);
            }
        }
        (balances, entries)
    }

    fn ledger_sum(entries: &[Entry]) -> i64 {
        entries.iter().map(|e| e.amount_cents).sum()
    }

    #[test]
    fn brand_funding_and_campaign_sequence_keeps_balance_equal_to_ledger() {
        let (balances, entries) = replay(&[
            Posting::Deposit(100_000),
            Posting::EscrowLock(60_000),
            Posting::EscrowSettle(12_500),
            Posting::EscrowSettle(7_500),
            Posting::EscrowRelease(40_000),
            Posting::Deposit(5_000),
        ]);

        assert_eq!(balances.balance_cents, 85_000);
        assert_eq!(balances.escrow_cents, 0);
        assert_eq!(ledger_sum(&entries), balances.balance_cents);
    }

    #[test]
    fn creator_payout_sequence_keeps_balance_equal_to_ledger() {
        let (balances, entries) = replay(&[
            Posting::Earning(20_000),
            Posting::PayoutHold(15_000),
            // Rejected by an admin
            Posting::Refund(15_000),
            Posting::PayoutHold(18_000),
            // Over-withdrawal is refused and leaves no entry
            Posting::PayoutHold(5_000),
            Posting::Earning(1_000),
        ]);

        assert_eq!(balances.balance_cents, 3_000);
        assert_eq!(entries.len(), 5);
        assert_eq!(ledger_sum(&entries), balances.balance_cents);
    }

    #[test]
    fn escrow_lock_needs_balance() {
        let start = Balances { balance_cents: 999, escrow_cents: 0 };
        assert_eq!(post(start, Posting::EscrowLock(1_000)), Err(LedgerError::InsufficientBalance));
    }

    #[test]
    fn release_and_settle_need_escrow() {
        let start = Balances { balance_cents: 10_000, escrow_cents: 100 };
        assert_eq!(post(start, Posting::EscrowRelease(101)), Err(LedgerError::InsufficientEscrow));
        assert_eq!(post(start, Posting::EscrowSettle(101)), Err(LedgerError::InsufficientEscrow));
    }

    #[test]
    fn zero_and_negative_amounts_are_rejected() {
        let start = Balances::default();
        assert_eq!(post(start, Posting::Deposit(0)), Err(LedgerError::NonPositiveAmount));
        assert_eq!(post(start, Posting::Refund(-5)), Err(LedgerError::NonPositiveAmount));
    }

    #[test]
    fn settle_writes_no_entry() {
        let start = Balances { balance_cents: 0, escrow_cents: 500 };
        let (next, entry) = post(start, Posting::EscrowSettle(200)).unwrap();
        assert_eq!(next.escrow_cents, 300);
        assert_eq!(entry, None);
    }

    #[test]
    fn cpv_rate_is_per_thousand_views() {
        assert_eq!(earnings_target(PayoutType::Cpv, 400, 2_500, 0, 0), 1_000);
        assert_eq!(earnings_target(PayoutType::Cpv, 400, 999, 0, 0), 399);
    }

    #[test]
    fn cpc_and_cpa_pay_per_unit() {
        assert_eq!(earnings_target(PayoutType::Cpc, 25, 0, 40, 3), 1_000);
        assert_eq!(earnings_target(PayoutType::Cpa, 500, 0, 40, 3), 1_500);
    }

    #[test]
    fn settlement_is_capped_by_remaining_budget() {
        assert_eq!(settlement_amount(10_000, 4_000, 100_000), 6_000);
        assert_eq!(settlement_amount(10_000, 4_000, 2_500), 2_500);
        assert_eq!(settlement_amount(3_000, 4_000, 100_000), 0);
        assert_eq!(settlement_amount(10_000, 4_000, 0), 0);
    }
}
