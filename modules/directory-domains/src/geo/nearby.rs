use directory_core::file_config::ProximityConfig;
use directory_core::{require_positive_limit, require_positive_radius, Coordinates, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::debug;

use super::bounding_box::BoundingBox;
use super::distance::EARTH_RADIUS_MILES;
use crate::locations::Location;

/// A location paired with its great-circle distance from the query point.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NearbyLocation {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub location: Location,
    pub distance_miles: f64,
}

/// Radius search over active, geocoded locations.
#[derive(Clone)]
pub struct ProximityIndex {
    pool: PgPool,
    config: ProximityConfig,
}

impl ProximityIndex {
    pub fn new(pool: PgPool, config: ProximityConfig) -> Self {
        Self { pool, config }
    }

    /// Locations strictly closer than `radius_miles`, nearest first, at most
    /// `limit` of them. Equal distances fall back to id order.
    pub async fn find_nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_miles: f64,
        limit: i64,
    ) -> Result<Vec<NearbyLocation>> {
        let center = Coordinates::new(latitude, longitude)?;
        let radius_miles = require_positive_radius(radius_miles)?;
        let limit = require_positive_limit(limit)?.min(self.config.max_limit);

        let bbox = BoundingBox::around(center, radius_miles);
        let (min_lng, max_lng) = bbox.lng_range.unwrap_or((-180.0, 180.0));

        let rows = sqlx::query_as::<_, NearbyLocation>(
            r#"
            SELECT * FROM (
                SELECT l.*,
                       $7 * acos(LEAST(1.0, GREATEST(-1.0,
                           cos(radians($1)) * cos(radians(l.latitude))
                               * cos(radians(l.longitude) - radians($2))
                           + sin(radians($1)) * sin(radians(l.latitude))
                       ))) AS distance_miles
                FROM locations l
                WHERE l.is_active = TRUE
                  AND l.latitude IS NOT NULL
                  AND l.longitude IS NOT NULL
                  AND l.latitude BETWEEN $3 AND $4
                  AND l.longitude BETWEEN $5 AND $6
            ) nearby
            WHERE distance_miles < $8
            ORDER BY distance_miles ASC, id ASC
            LIMIT $9
            "#,
        )
        .bind(center.latitude)
        .bind(center.longitude)
        .bind(bbox.min_lat)
        .bind(bbox.max_lat)
        .bind(min_lng)
        .bind(max_lng)
        .bind(EARTH_RADIUS_MILES)
        .bind(radius_miles)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(
            latitude,
            longitude,
            radius_miles,
            limit,
            found = rows.len(),
            "Proximity query"
        );
        Ok(rows)
    }

    /// [`find_nearby`](Self::find_nearby) with the configured default radius and limit.
    pub async fn find_nearby_default(&self, latitude: f64, longitude: f64) -> Result<Vec<NearbyLocation>> {
        self.find_nearby(
            latitude,
            longitude,
            self.config.default_radius_miles,
            self.config.default_limit,
        )
        .await
    }
}
