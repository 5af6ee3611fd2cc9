//! The in-process surface the application layer calls. Wires the four
//! components to one pool and runs the cross-component write paths
//! (deactivation, brand reassignment) as single transactions. Allocation
//! carries its own brand rollup.

use std::collections::BTreeSet;

use directory_core::{DirectoryDeps, DirectoryError, Result, Scope};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::brands::rollup::{self, BrandRollup};
use crate::brands::{Brand, BrandStats};
use crate::geo::{NearbyLocation, ProximityIndex};
use crate::locations::{IdentityAllocator, Location, LocationAttributes};
use crate::rankings::ledger::{self, RankingLedger};
use crate::rankings::{RankedLocation, Ranking, ScopeRecompute, ScoreSubmission};

#[derive(Clone)]
pub struct Directory {
    pool: PgPool,
    allocator: IdentityAllocator,
    ledger: RankingLedger,
    proximity: ProximityIndex,
    rollup: BrandRollup,
    default_leaderboard_limit: i64,
}

impl Directory {
    pub fn new(deps: &DirectoryDeps) -> Self {
        let pool = deps.db_pool.clone();
        let config = &deps.config;

        Self {
            allocator: IdentityAllocator::new(pool.clone(), config.allocator.max_slug_probes),
            ledger: RankingLedger::new(pool.clone()),
            proximity: ProximityIndex::new(pool.clone(), config.proximity.clone()),
            rollup: BrandRollup::new(pool.clone()),
            default_leaderboard_limit: config.ranking.default_limit,
            pool,
        }
    }

    pub fn allocator(&self) -> &IdentityAllocator {
        &self.allocator
    }

    pub fn ledger(&self) -> &RankingLedger {
        &self.ledger
    }

    pub fn proximity(&self) -> &ProximityIndex {
        &self.proximity
    }

    pub fn rollup(&self) -> &BrandRollup {
        &self.rollup
    }

    /// Allocate (or re-ingest) a location. The brand it left and the brand
    /// it belongs to now are refreshed before the allocation commits.
    pub async fn allocate(
        &self,
        external_key: &str,
        name: &str,
        city: &str,
        attributes: &LocationAttributes,
    ) -> Result<Location> {
        self.allocator
            .allocate(external_key, name, city, attributes)
            .await
    }

    pub async fn submit_score(
        &self,
        location_id: Uuid,
        scope: Scope,
        composite_score: f64,
    ) -> Result<Ranking> {
        self.ledger
            .submit_score(location_id, scope, composite_score)
            .await
    }

    pub async fn submit_scores(&self, batch: &[ScoreSubmission]) -> Result<Vec<Ranking>> {
        self.ledger.submit_scores(batch).await
    }

    pub async fn recompute_ranks(&self, scope: Scope) -> Result<ScopeRecompute> {
        self.ledger.recompute_ranks(scope).await
    }

    pub async fn recompute_all_scopes(&self) -> Result<Vec<ScopeRecompute>> {
        self.ledger.recompute_all_scopes().await
    }

    pub async fn get_by_scope(&self, scope: Scope, limit: i64) -> Result<Vec<RankedLocation>> {
        self.ledger.get_by_scope(scope, limit).await
    }

    /// [`get_by_scope`](Self::get_by_scope) with the configured default limit.
    pub async fn leaderboard(&self, scope: Scope) -> Result<Vec<RankedLocation>> {
        self.ledger
            .get_by_scope(scope, self.default_leaderboard_limit)
            .await
    }

    pub async fn find_nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_miles: f64,
        limit: i64,
    ) -> Result<Vec<NearbyLocation>> {
        self.proximity
            .find_nearby(latitude, longitude, radius_miles, limit)
            .await
    }

    pub async fn refresh_brand_stats(&self, brand_id: Uuid) -> Result<BrandStats> {
        self.rollup.refresh_brand_stats(brand_id).await
    }

    pub async fn refresh_all_brand_stats(&self) -> Result<usize> {
        self.rollup.refresh_all().await
    }

    /// Soft-delete a location: it leaves every scope it was ranked in, those
    /// scopes are renumbered, and its brand's stats are refreshed, all in one
    /// transaction. `None` when the id is unknown.
    pub async fn deactivate_location(&self, location_id: Uuid) -> Result<Option<Location>> {
        let mut tx = self.pool.begin().await?;

        let scopes = sqlx::query_as::<_, (String, i64)>(
            "SELECT DISTINCT scope_type, scope_id FROM rankings WHERE location_id = $1",
        )
        .bind(location_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|(scope_type, scope_id)| Ok(Scope::new(scope_type.parse()?, scope_id)))
        .collect::<Result<BTreeSet<Scope>>>()?;

        // Scope locks before the location row, matching the order score
        // batches take them in.
        for scope in &scopes {
            ledger::lock_scope(*scope, &mut tx).await?;
        }

        let Some(location) = Location::set_active(location_id, false, &mut *tx).await? else {
            return Ok(None);
        };

        let left = ledger::delete_for_location(location_id, &mut tx).await?;
        for scope in scopes.union(&left) {
            ledger::recompute_in(*scope, &mut tx).await?;
        }

        if let Some(brand_id) = location.brand_id {
            rollup::refresh_in(brand_id, &mut *tx).await?;
        }

        tx.commit().await?;

        info!(
            %location_id,
            scopes = left.len(),
            brand_id = ?location.brand_id,
            "Deactivated location"
        );
        Ok(Some(location))
    }

    /// Move a location into `brand_id` (or out of any brand with `None`) and
    /// refresh both the old and the new brand in the same transaction.
    /// An unknown `brand_id` is [`DirectoryError::NotFound`]; an unknown
    /// location is `Ok(None)`.
    pub async fn assign_brand(
        &self,
        location_id: Uuid,
        brand_id: Option<Uuid>,
    ) -> Result<Option<Location>> {
        let mut tx = self.pool.begin().await?;

        if let Some(brand_id) = brand_id {
            if Brand::find_by_id(brand_id, &mut *tx).await?.is_none() {
                return Err(DirectoryError::not_found(format!("brand {brand_id}")));
            }
        }

        let previous = sqlx::query_scalar::<_, Option<Uuid>>(
            "SELECT brand_id FROM locations WHERE id = $1 FOR UPDATE",
        )
        .bind(location_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(previous) = previous else {
            return Ok(None);
        };

        let Some(location) = Location::set_brand(location_id, brand_id, &mut *tx).await? else {
            return Ok(None);
        };

        let touched: BTreeSet<Uuid> = previous.into_iter().chain(brand_id).collect();
        for id in &touched {
            rollup::refresh_in(*id, &mut *tx).await?;
        }

        tx.commit().await?;

        info!(
            %location_id,
            previous_brand_id = ?previous,
            brand_id = ?brand_id,
            "Reassigned location brand"
        );
        Ok(Some(location))
    }
}
