//! Data models representing database entities and API payloads.

/// Campaigns, participations and performance metrics
pub mod campaign;
/// Fraud review queue
pub mod fraud_flag;
/// Creator payouts
pub mod payout;
/// Ledger entries
pub mod transaction;
/// Users and onboarding profiles
pub mod user;
/// Wallets and funding orders
pub mod wallet;
/// Payment gateway webhook events
pub mod webhook;
