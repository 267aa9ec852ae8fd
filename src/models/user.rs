//! User accounts, onboarding profiles and auth request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Marketplace side a user picked during onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Brand,
    Creator,
}

/// Represents a user record from the database.
///
/// # Database Table
///
/// Maps to the `users` table. `role` stays NULL until onboarding completes.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Always stored lowercased
    pub email: String,

    /// Argon2id PHC string, never serialized
    pub password_hash: String,

    pub name: String,
    pub role: Option<Role>,
    pub is_admin: bool,
    pub onboarding_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of a user.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Option<Role>,
    pub is_admin: bool,
    pub onboarding_complete: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            is_admin: user.is_admin,
            onboarding_complete: user.onboarding_complete,
            created_at: user.created_at,
        }
    }
}

/// Request body for `POST /api/auth/register`.
///
/// ```json
/// { "email": "ana@example.com", "password": "correct horse", "name": "Ana" }
/// ```
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Request body for `POST /api/auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct BrandProfile {
    pub user_id: Uuid,
    pub company_name: String,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CreatorProfile {
    pub user_id: Uuid,
    pub display_name: String,
    pub bio: Option<String>,
    pub niche: Option<String>,
    pub social_handle: Option<String>,
    pub follower_count: i64,

    /// Where payouts are sent (bank or wallet reference understood by the gateway)
    pub payout_account: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Brand fields collected by onboarding.
#[derive(Debug, Deserialize)]
pub struct BrandProfileInput {
    pub company_name: String,
    pub website: Option<String>,
    pub industry: Option<String>,
}

/// Creator fields collected by onboarding.
#[derive(Debug, Deserialize)]
pub struct CreatorProfileInput {
    pub display_name: String,
    pub bio: Option<String>,
    pub niche: Option<String>,
    pub social_handle: Option<String>,
    #[serde(default)]
    pub follower_count: i64,
    pub payout_account: Option<String>,
}

/// Request body for `onboarding.complete`.
///
/// The `role` tag selects which profile shape is expected:
///
/// ```json
/// { "role": "BRAND", "profile": { "company_name": "Acme" } }
/// ```
#[derive(Debug, Deserialize)]
#[serde(tag = "role", content = "profile", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnboardingRequest {
    Brand(BrandProfileInput),
    Creator(CreatorProfileInput),
}

impl OnboardingRequest {
    pub fn role(&self) -> Role {
        match self {
            OnboardingRequest::Brand(_) => Role::Brand,
            OnboardingRequest::Creator(_) => Role::Creator,
        }
    }
}

/// Request body for `creator.updatePayoutAccount`.
#[derive(Debug, Deserialize)]
pub struct UpdatePayoutAccountRequest {
    pub payout_account: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn onboarding_request_is_tagged_by_role() {
        let req: OnboardingRequest = serde_json::from_str(
            r#"{"role":"CREATOR","profile":{"display_name":"ana.makes","payout_account":"acct_1"}}"#,
        )
        .unwrap();

        assert_eq!(req.role(), Role::Creator);
        match req {
            OnboardingRequest::Creator(p) => {
                assert_eq!(p.display_name, "ana.makes");
                assert_eq!(p.follower_count, 0);
            }
            OnboardingRequest::Brand(_) => panic!("expected creator profile"),
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        let res = serde_json::from_str::<OnboardingRequest>(
            r#"{"role":"ADMIN","profile":{"company_name":"x"}}"#,
        );
        assert!(res.is_err());
    }
}
