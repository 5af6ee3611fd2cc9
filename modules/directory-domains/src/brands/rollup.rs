//! Brand aggregate rollup. Always a full recomputation from member
//! locations, never an incremental adjustment.

use directory_core::Result;
use sqlx::{PgExecutor, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use super::models::BrandStats;

#[derive(Clone)]
pub struct BrandRollup {
    pool: PgPool,
}

impl BrandRollup {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Recompute and store count, mean rating, and review total for one
    /// brand. An unknown brand yields zeroed stats rather than an error.
    pub async fn refresh_brand_stats(&self, brand_id: Uuid) -> Result<BrandStats> {
        refresh_in(brand_id, &self.pool).await
    }

    pub async fn refresh_all(&self) -> Result<usize> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM brands ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        for id in &ids {
            refresh_in(*id, &self.pool).await?;
        }

        info!(brands = ids.len(), "Refreshed brand stats");
        Ok(ids.len())
    }
}

/// Single-statement rollup, usable inside a caller's transaction.
pub(crate) async fn refresh_in(brand_id: Uuid, executor: impl PgExecutor<'_>) -> Result<BrandStats> {
    let stats = sqlx::query_as::<_, BrandStats>(
        r#"
        WITH stats AS (
            SELECT COUNT(*)::INTEGER AS location_count,
                   AVG(rating) AS average_rating,
                   COALESCE(SUM(review_count), 0)::BIGINT AS total_reviews
            FROM locations
            WHERE brand_id = $1 AND is_active = TRUE
        )
        UPDATE brands b SET
            location_count = stats.location_count,
            average_rating = stats.average_rating,
            total_reviews = stats.total_reviews,
            stats_refreshed_at = NOW(),
            updated_at = NOW()
        FROM stats
        WHERE b.id = $1
        RETURNING b.location_count, b.average_rating, b.total_reviews
        "#,
    )
    .bind(brand_id)
    .fetch_optional(executor)
    .await?
    .unwrap_or_default();

    debug!(
        %brand_id,
        location_count = stats.location_count,
        total_reviews = stats.total_reviews,
        "Brand stats refreshed"
    );
    Ok(stats)
}
