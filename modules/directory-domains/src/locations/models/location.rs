use chrono::{DateTime, Utc};
use directory_core::{Coordinates, DirectoryError, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// A place of business. `id` and `slug` never change once assigned.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Location {
    pub id: Uuid,
    pub external_key: String,
    pub slug: String,
    pub name: String,
    pub city: String,
    pub address_street: Option<String>,
    pub zip: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub rating: Option<f64>,
    pub review_count: i32,
    pub details: serde_json::Value,
    pub brand_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mutable attributes carried by an ingestion.
///
/// `brand_id: None` leaves an existing membership untouched; unassigning a
/// brand goes through `Directory::assign_brand`.
#[derive(Debug, Clone, TypedBuilder)]
pub struct LocationAttributes {
    #[builder(default, setter(strip_option, into))]
    pub address_street: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub zip: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub phone: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub website: Option<String>,
    #[builder(default, setter(strip_option))]
    pub latitude: Option<f64>,
    #[builder(default, setter(strip_option))]
    pub longitude: Option<f64>,
    #[builder(default, setter(strip_option))]
    pub rating: Option<f64>,
    #[builder(default)]
    pub review_count: i32,
    #[builder(default = serde_json::json!({}))]
    pub details: serde_json::Value,
    #[builder(default, setter(strip_option))]
    pub brand_id: Option<Uuid>,
}

impl LocationAttributes {
    pub fn validate(&self) -> Result<()> {
        Coordinates::from_optional(self.latitude, self.longitude)?;
        if let Some(rating) = self.rating {
            if !rating.is_finite() || !(0.0..=5.0).contains(&rating) {
                return Err(DirectoryError::invalid(format!(
                    "rating must be between 0 and 5, got {rating}"
                )));
            }
        }
        if self.review_count < 0 {
            return Err(DirectoryError::invalid(format!(
                "review count must not be negative, got {}",
                self.review_count
            )));
        }
        if !self.details.is_object() {
            return Err(DirectoryError::invalid("details must be a JSON object"));
        }
        Ok(())
    }
}

impl Location {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }

    pub async fn find_by_id(id: Uuid, executor: impl PgExecutor<'_>) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM locations WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
            .map_err(Into::into)
    }

    /// Public lookup; inactive locations are hidden.
    pub async fn find_by_slug(slug: &str, executor: impl PgExecutor<'_>) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM locations WHERE slug = $1 AND is_active = TRUE")
            .bind(slug)
            .fetch_optional(executor)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_external_key(
        external_key: &str,
        executor: impl PgExecutor<'_>,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM locations WHERE external_key = $1")
            .bind(external_key)
            .fetch_optional(executor)
            .await
            .map_err(Into::into)
    }

    /// Flip the soft-delete flag. Returns `None` for an unknown id.
    pub async fn set_active(
        id: Uuid,
        active: bool,
        executor: impl PgExecutor<'_>,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "UPDATE locations SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(active)
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn set_brand(
        id: Uuid,
        brand_id: Option<Uuid>,
        executor: impl PgExecutor<'_>,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "UPDATE locations SET brand_id = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(brand_id)
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
    }
}
