//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, validation, and complex operations.

pub mod analytics_service;
pub mod auth_service;
pub mod campaign_service;
pub mod fraud_service;
pub mod gateway_client;
pub mod ledger;
pub mod marketplace_service;
pub mod payout_service;
pub mod wallet_service;
pub mod webhook_service;
