//! Creator-facing marketplace: browsing live campaigns and applying to them.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::campaign::{BrowseQuery, Campaign, Participation},
};

/// Length in bytes of the random part of a tracking code.
const TRACKING_CODE_BYTES: usize = 8;

/// Random, URL-safe code for a creator's tracking link.
pub fn generate_tracking_code() -> String {
    let bytes: [u8; TRACKING_CODE_BYTES] = rand::random();
    hex::encode(bytes)
}

/// Escape `LIKE` wildcards so a search term matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// ACTIVE campaigns, newest first.
pub async fn browse(pool: &DbPool, query: BrowseQuery) -> Result<Vec<Campaign>, AppError> {
    let limit = query.limit.clamp(1, 100);
    let offset = query.offset.max(0);
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(like_pattern);

    let campaigns = sqlx::query_as::<_, Campaign>(
        r#"
        SELECT * FROM campaigns
        WHERE status = 'ACTIVE'
          AND ($1::payout_type IS NULL OR payout_type = $1)
          AND ($2::text IS NULL OR title ILIKE $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(query.payout_type)
    .bind(search)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(campaigns)
}

/// Apply to an ACTIVE campaign. One application per creator and campaign.
pub async fn apply(
    pool: &DbPool,
    creator_id: Uuid,
    campaign_id: Uuid,
    pitch: Option<String>,
) -> Result<Participation, AppError> {
    let status: Option<String> =
        sqlx::query_scalar("SELECT status::text FROM campaigns WHERE id = $1")
            .bind(campaign_id)
            .fetch_optional(pool)
            .await?;

    match status.as_deref() {
        None => return Err(AppError::NotFound("Campaign")),
        Some("ACTIVE") => {}
        Some(_) => {
            return Err(AppError::InvalidState(
                "Campaign is not accepting applications".to_string(),
            ));
        }
    }

    let pitch = pitch.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());

    let participation = sqlx::query_as::<_, Participation>(
        r#"
        INSERT INTO participations (campaign_id, creator_id, pitch, tracking_code)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (campaign_id, creator_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(campaign_id)
    .bind(creator_id)
    .bind(pitch)
    .bind(generate_tracking_code())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::Conflict("Already applied to this campaign".to_string()))?;

    tracing::info!(participation_id = %participation.id, %campaign_id, %creator_id, "creator applied");
    Ok(participation)
}

/// All participations of a creator, newest first.
pub async fn my_participations(
    pool: &DbPool,
    creator_id: Uuid,
) -> Result<Vec<Participation>, AppError> {
    let participations = sqlx::query_as::<_, Participation>(
        "SELECT * FROM participations WHERE creator_id = $1 ORDER BY created_at DESC",
    )
    .bind(creator_id)
    .fetch_all(pool)
    .await?;

    Ok(participations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_codes_are_hex_and_unique() {
        let a = generate_tracking_code();
        let b = generate_tracking_code();
        assert_eq!(a.len(), TRACKING_CODE_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn search_terms_match_literally() {
        assert_eq!(like_pattern("summer"), "%summer%");
        assert_eq!(like_pattern("100%_off"), "%100\\%\\_off%");
    }
}
