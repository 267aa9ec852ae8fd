//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers. Here they
//! decode the session cookie and enforce role-based access.

/// Path-based access rules
pub mod access;
/// Session cookie decoding
pub mod session;
