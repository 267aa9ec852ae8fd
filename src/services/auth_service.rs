//! Account registration, login and onboarding.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    models::user::{
        BrandProfile, CreatorProfile, OnboardingRequest, RegisterRequest, User,
    },
    services::wallet_service,
};

const MIN_PASSWORD_LEN: usize = 8;

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hash error: {}", e)))
}

/// Check a password against a stored PHC string.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Trim and lowercase an email, rejecting obviously malformed ones.
pub fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(email)
    } else {
        Err(AppError::InvalidRequest("Invalid email address".to_string()))
    }
}

/// Create a user. The admin flag comes from `ADMIN_EMAILS`.
pub async fn register(pool: &DbPool, config: &Config, request: RegisterRequest) -> Result<User, AppError> {
    let email = normalize_email(&request.email)?;
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidRequest("Name is required".to_string()));
    }

    let password_hash = hash_password(&request.password)?;
    let is_admin = config.is_admin_email(&email);

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, password_hash, name, is_admin)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(&email)
    .bind(password_hash)
    .bind(name)
    .bind(is_admin)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::Conflict("Email is already registered".to_string()))?;

    tracing::info!(user_id = %user.id, is_admin, "user registered");
    Ok(user)
}

/// Verify credentials. Unknown email and wrong password look the same.
pub async fn login(pool: &DbPool, email: &str, password: &str) -> Result<User, AppError> {
    let email = email.trim().to_lowercase();
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(pool)
        .await?;

    match user {
        Some(user) if verify_password(password, &user.password_hash) => Ok(user),
        _ => Err(AppError::Unauthorized),
    }
}

/// Profile created by onboarding.
#[derive(Debug, serde::Serialize)]
#[serde(untagged)]
pub enum Profile {
    Brand(BrandProfile),
    Creator(CreatorProfile),
}

/// Pick a role, create its profile and the user's wallet.
///
/// # Process
///
/// 1. Lock the user row and make sure onboarding has not happened yet
/// 2. Insert the brand or creator profile
/// 3. Create the wallet
/// 4. Store role and `onboarding_complete = true`
///
/// All four steps commit together.
pub async fn complete_onboarding(
    pool: &DbPool,
    config: &Config,
    user_id: Uuid,
    request: OnboardingRequest,
) -> Result<(User, Profile), AppError> {
    let mut tx = pool.begin().await?;

    let onboarded: bool =
        sqlx::query_scalar("SELECT onboarding_complete FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("User"))?;

    if onboarded {
        tx.rollback().await?;
        return Err(AppError::InvalidState(
            "Onboarding already completed".to_string(),
        ));
    }

    let role = request.role();
    let profile = match request {
        OnboardingRequest::Brand(input) => {
            if input.company_name.trim().is_empty() {
                return Err(AppError::InvalidRequest("Company name is required".to_string()));
            }
            let profile = sqlx::query_as::<_, BrandProfile>(
                r#"
                INSERT INTO brand_profiles (user_id, company_name, website, industry)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
            )
            .bind(user_id)
            .bind(input.company_name.trim())
            .bind(input.website)
            .bind(input.industry)
            .fetch_one(&mut *tx)
            .await?;
            Profile::Brand(profile)
        }
        OnboardingRequest::Creator(input) => {
            if input.display_name.trim().is_empty() {
                return Err(AppError::InvalidRequest("Display name is required".to_string()));
            }
            if input.follower_count < 0 {
                return Err(AppError::InvalidRequest(
                    "Follower count cannot be negative".to_string(),
                ));
            }
            let profile = sqlx::query_as::<_, CreatorProfile>(
                r#"
                INSERT INTO creator_profiles (
                    user_id, display_name, bio, niche, social_handle, follower_count, payout_account
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
                "#,
            )
            .bind(user_id)
            .bind(input.display_name.trim())
            .bind(input.bio)
            .bind(input.niche)
            .bind(input.social_handle)
            .bind(input.follower_count)
            .bind(input.payout_account)
            .fetch_one(&mut *tx)
            .await?;
            Profile::Creator(profile)
        }
    };

    wallet_service::create_wallet(&mut *tx, user_id, &config.currency).await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET role = $1, onboarding_complete = true, updated_at = NOW()
        WHERE id = $2
        RETURNING *
        "#,
    )
    .bind(role)
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(%user_id, ?role, "onboarding completed");
    Ok((user, profile))
}

/// Change where a creator's payouts go.
pub async fn update_payout_account(
    pool: &DbPool,
    user_id: Uuid,
    payout_account: &str,
) -> Result<CreatorProfile, AppError> {
    let payout_account = payout_account.trim();
    if payout_account.is_empty() {
        return Err(AppError::InvalidRequest("Payout account is required".to_string()));
    }

    sqlx::query_as::<_, CreatorProfile>(
        "UPDATE creator_profiles SET payout_account = $1 WHERE user_id = $2 RETURNING *",
    )
    .bind(payout_account)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Creator profile"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ana@Example.COM ").unwrap(), "ana@example.com");
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for email in ["", "ana", "@example.com", "ana@example", "ana@.com", "a na@example.com"] {
            assert!(normalize_email(email).is_err(), "{email}");
        }
    }
}
