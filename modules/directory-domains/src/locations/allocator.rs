//! Identity allocation: idempotent upsert of a location by its external key,
//! assigning a unique slug on first sight.
//!
//! Uniqueness is delegated to the `locations_slug_key` and
//! `locations_external_key_key` constraints. A probe that loses a race to a
//! concurrent insert surfaces as [`DirectoryError::UniqueSlugConflict`]; that
//! one error is retried exactly once with a disambiguated slug.
//!
//! The brands the location left and joined are rolled up in the same
//! transaction as the allocation.

use std::collections::{BTreeSet, HashSet};

use chrono::Utc;
use directory_core::{DirectoryError, Result};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::models::{Location, LocationAttributes};
use super::slug::{base_slug, disambiguated_slug, next_free_slug};
use crate::brands::rollup;

/// Outcome of one allocation.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub location: Location,
    /// `false` when an existing row for the external key was updated.
    pub created: bool,
    /// Brand membership before this call, when the row already existed.
    pub previous_brand_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlugStrategy {
    Probe,
    Disambiguated,
}

#[derive(Clone)]
pub struct IdentityAllocator {
    pool: PgPool,
    max_slug_probes: u32,
}

impl IdentityAllocator {
    pub fn new(pool: PgPool, max_slug_probes: u32) -> Self {
        Self {
            pool,
            max_slug_probes,
        }
    }

    /// Return the location for `external_key`, creating it with a fresh slug
    /// if this is the first time the key has been seen.
    pub async fn allocate(
        &self,
        external_key: &str,
        name: &str,
        city: &str,
        attributes: &LocationAttributes,
    ) -> Result<Location> {
        self.allocate_detailed(external_key, name, city, attributes)
            .await
            .map(|allocation| allocation.location)
    }

    pub async fn allocate_detailed(
        &self,
        external_key: &str,
        name: &str,
        city: &str,
        attributes: &LocationAttributes,
    ) -> Result<Allocation> {
        validate_identity(external_key, name)?;
        attributes.validate()?;

        let input = AllocationInput {
            external_key,
            name: name.trim(),
            city: city.trim(),
            attributes,
        };

        match self.try_allocate(&input, SlugStrategy::Probe).await {
            Err(DirectoryError::UniqueSlugConflict { slug }) => {
                warn!(
                    external_key,
                    slug = %slug,
                    "Slug taken by a concurrent allocation, retrying with disambiguated slug"
                );
                match self.try_allocate(&input, SlugStrategy::Disambiguated).await {
                    Err(DirectoryError::UniqueSlugConflict { slug }) => {
                        Err(DirectoryError::Conflict(format!(
                            "slug {slug} for external key {external_key} still taken after fallback"
                        )))
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    async fn try_allocate(
        &self,
        input: &AllocationInput<'_>,
        strategy: SlugStrategy,
    ) -> Result<Allocation> {
        let mut tx = self.pool.begin().await?;

        let allocation = match lock_by_external_key(input.external_key, &mut tx).await? {
            Some(existing) => reingest(existing, input, &mut tx).await?,
            None => {
                let base = base_slug(input.name, input.city);
                let slug = match strategy {
                    SlugStrategy::Probe => self.probe_slug(&base, &mut tx).await?,
                    SlugStrategy::Disambiguated => fallback_slug(&base, &mut tx).await?,
                };

                let inserted = insert_location(input, &slug, &mut tx)
                    .await
                    .map_err(|e| DirectoryError::from_slug_insert(e, &slug))?;

                match inserted {
                    Some(location) => {
                        info!(
                            external_key = input.external_key,
                            slug = %location.slug,
                            id = %location.id,
                            "Allocated new location"
                        );
                        Allocation {
                            location,
                            created: true,
                            previous_brand_id: None,
                        }
                    }
                    // A concurrent allocation of the same key committed first;
                    // its row is visible to the next statement.
                    None => {
                        let existing = lock_by_external_key(input.external_key, &mut tx)
                            .await?
                            .ok_or_else(|| {
                                DirectoryError::Conflict(format!(
                                    "external key {} conflicted but no row is visible",
                                    input.external_key
                                ))
                            })?;
                        reingest(existing, input, &mut tx).await?
                    }
                }
            }
        };

        // Brand aggregates commit with the membership they describe.
        let touched: BTreeSet<Uuid> = allocation
            .previous_brand_id
            .into_iter()
            .chain(allocation.location.brand_id)
            .collect();
        for brand_id in &touched {
            rollup::refresh_in(*brand_id, &mut *tx).await?;
        }

        tx.commit().await?;
        Ok(allocation)
    }

    async fn probe_slug(&self, base: &str, conn: &mut PgConnection) -> Result<String> {
        let taken = taken_slugs(base, conn).await?;
        match next_free_slug(base, &taken, self.max_slug_probes) {
            Some(slug) => Ok(slug),
            None => {
                warn!(
                    base,
                    max_probes = self.max_slug_probes,
                    "Slug probe ceiling reached, using disambiguated slug"
                );
                fallback_slug(base, conn).await
            }
        }
    }
}

struct AllocationInput<'a> {
    external_key: &'a str,
    name: &'a str,
    city: &'a str,
    attributes: &'a LocationAttributes,
}

fn validate_identity(external_key: &str, name: &str) -> Result<()> {
    if external_key.trim().is_empty() {
        return Err(DirectoryError::invalid("external key must not be empty"));
    }
    if name.trim().is_empty() {
        return Err(DirectoryError::invalid("name must not be empty"));
    }
    Ok(())
}

async fn lock_by_external_key(
    external_key: &str,
    conn: &mut PgConnection,
) -> Result<Option<Location>> {
    sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE external_key = $1 FOR UPDATE")
        .bind(external_key)
        .fetch_optional(conn)
        .await
        .map_err(Into::into)
}

async fn reingest(
    existing: Location,
    input: &AllocationInput<'_>,
    conn: &mut PgConnection,
) -> Result<Allocation> {
    let location = update_attributes(existing.id, input, conn).await?;
    debug!(
        external_key = input.external_key,
        slug = %location.slug,
        "Re-ingested existing location"
    );
    Ok(Allocation {
        location,
        created: false,
        previous_brand_id: existing.brand_id,
    })
}

/// Slugs equal to `base` or shaped like `base-<suffix>`.
async fn taken_slugs(base: &str, conn: &mut PgConnection) -> Result<HashSet<String>> {
    // `base` is slugified, so it holds no LIKE metacharacters.
    let rows = sqlx::query_scalar::<_, String>(
        "SELECT slug FROM locations WHERE slug = $1 OR slug LIKE $1 || '-%'",
    )
    .bind(base)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().collect())
}

async fn fallback_slug(base: &str, conn: &mut PgConnection) -> Result<String> {
    let sequence = sqlx::query_scalar::<_, i64>("SELECT nextval('location_slug_disambiguator')")
        .fetch_one(conn)
        .await?;
    Ok(disambiguated_slug(base, Utc::now().timestamp_millis(), sequence))
}

/// Overwrite mutable attributes; `slug`, `id`, and `is_active` are untouched.
async fn update_attributes(
    id: Uuid,
    input: &AllocationInput<'_>,
    conn: &mut PgConnection,
) -> Result<Location> {
    let attrs = input.attributes;
    sqlx::query_as::<_, Location>(
        r#"
        UPDATE locations SET
            name = $2,
            city = $3,
            address_street = $4,
            zip = $5,
            phone = $6,
            website = $7,
            latitude = $8,
            longitude = $9,
            rating = $10,
            review_count = $11,
            details = $12,
            brand_id = COALESCE($13, brand_id),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(input.name)
    .bind(input.city)
    .bind(&attrs.address_street)
    .bind(&attrs.zip)
    .bind(&attrs.phone)
    .bind(&attrs.website)
    .bind(attrs.latitude)
    .bind(attrs.longitude)
    .bind(attrs.rating)
    .bind(attrs.review_count)
    .bind(&attrs.details)
    .bind(attrs.brand_id)
    .fetch_one(conn)
    .await
    .map_err(Into::into)
}

/// Insert a new row, or `None` when a concurrent allocation of the same
/// external key got there first. A concurrent insert of the same slug raises
/// a unique violation on `locations_slug_key`.
async fn insert_location(
    input: &AllocationInput<'_>,
    slug: &str,
    conn: &mut PgConnection,
) -> std::result::Result<Option<Location>, sqlx::Error> {
    let attrs = input.attributes;
    sqlx::query_as::<_, Location>(
        r#"
        INSERT INTO locations (
            external_key, slug, name, city, address_street, zip, phone, website,
            latitude, longitude, rating, review_count, details, brand_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (external_key) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(input.external_key)
    .bind(slug)
    .bind(input.name)
    .bind(input.city)
    .bind(&attrs.address_street)
    .bind(&attrs.zip)
    .bind(&attrs.phone)
    .bind(&attrs.website)
    .bind(attrs.latitude)
    .bind(attrs.longitude)
    .bind(attrs.rating)
    .bind(attrs.review_count)
    .bind(&attrs.details)
    .bind(attrs.brand_id)
    .fetch_optional(conn)
    .await
}
