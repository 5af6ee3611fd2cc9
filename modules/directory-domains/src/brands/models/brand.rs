use chrono::{DateTime, Utc};
use directory_core::{DirectoryError, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::locations::{slugify, Location};

/// A franchise or multi-location operator. The aggregate columns are a cache
/// owned by the brand rollup.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Brand {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub is_franchise: bool,
    pub location_count: i32,
    pub average_rating: Option<f64>,
    pub total_reviews: i64,
    pub stats_refreshed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derived brand aggregates over active member locations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BrandStats {
    pub location_count: i32,
    /// Mean over members that have a rating; `None` when none do.
    pub average_rating: Option<f64>,
    pub total_reviews: i64,
}

impl Brand {
    pub fn stats(&self) -> BrandStats {
        BrandStats {
            location_count: self.location_count,
            average_rating: self.average_rating,
            total_reviews: self.total_reviews,
        }
    }

    pub async fn create(
        name: &str,
        is_franchise: bool,
        executor: impl PgExecutor<'_>,
    ) -> Result<Self> {
        let name = name.trim();
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(DirectoryError::invalid(format!(
                "brand name {name:?} has no usable characters"
            )));
        }

        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO brands (name, slug, is_franchise)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(slug)
        .bind(is_franchise)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_id(id: Uuid, executor: impl PgExecutor<'_>) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM brands WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_slug(slug: &str, executor: impl PgExecutor<'_>) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM brands WHERE slug = $1")
            .bind(slug)
            .fetch_optional(executor)
            .await
            .map_err(Into::into)
    }

    /// Franchise brands with at least one active location, biggest first.
    pub async fn list_franchises(executor: impl PgExecutor<'_>) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM brands
            WHERE is_franchise = TRUE AND location_count > 0
            ORDER BY location_count DESC, name ASC
            "#,
        )
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }

    /// Active member locations, best rated first.
    pub async fn locations(brand_id: Uuid, executor: impl PgExecutor<'_>) -> Result<Vec<Location>> {
        sqlx::query_as::<_, Location>(
            r#"
            SELECT * FROM locations
            WHERE brand_id = $1 AND is_active = TRUE
            ORDER BY rating DESC NULLS LAST, review_count DESC, id ASC
            "#,
        )
        .bind(brand_id)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }
}
