//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, query string, session)
//! 2. Checks the caller's role and calls into a service
//! 3. Returns HTTP response (JSON, status code, cookies or a redirect)

/// Register, login, logout and session lookup
pub mod auth;
/// Brand campaign procedures
pub mod campaigns;
/// Analytics procedures and dashboards
pub mod dashboard;
/// Admin fraud review
pub mod fraud;
/// Health check endpoint
pub mod health;
/// Creator marketplace and click tracking
pub mod marketplace;
/// Role selection and profile creation
pub mod onboarding;
/// Payout requests and approval
pub mod payouts;
/// Wallet, ledger history and funding orders
pub mod wallet;
/// Payment gateway webhook receiver
pub mod webhooks;
