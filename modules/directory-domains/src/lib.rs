pub mod brands;
pub mod directory;
pub mod geo;
pub mod locations;
pub mod rankings;

#[cfg(feature = "test-utils")]
pub mod testutil;

pub use brands::{Brand, BrandRollup, BrandStats};
pub use directory::Directory;
pub use geo::{distance_miles, BoundingBox, NearbyLocation, ProximityIndex};
pub use locations::{Allocation, IdentityAllocator, Location, LocationAttributes};
pub use rankings::{
    RankTrend, RankedLocation, Ranking, RankingLedger, ScopeRecompute, ScopeStats, ScoreSubmission,
};

use sqlx::migrate::Migrator;
use sqlx::PgPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Apply any pending schema migrations.
pub async fn migrate(pool: &PgPool) -> directory_core::Result<()> {
    MIGRATOR.run(pool).await?;
    tracing::info!("Directory migrations applied");
    Ok(())
}
