use chrono::{DateTime, Utc};
use directory_core::{Scope, ScopeType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A location's standing within one scope.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ranking {
    pub id: Uuid,
    pub location_id: Uuid,
    #[sqlx(try_from = "String")]
    pub scope_type: ScopeType,
    pub scope_id: i64,
    pub composite_score: f64,
    /// `None` until the first recomputation that includes this row.
    pub rank: Option<i32>,
    pub previous_rank: Option<i32>,
    pub calculated_at: DateTime<Utc>,
}

/// Movement between `previous_rank` and `rank`, for trend badges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "direction", content = "places", rename_all = "snake_case")]
pub enum RankTrend {
    /// Scored but not yet numbered.
    Unranked,
    /// Numbered for the first time.
    New,
    Up(i32),
    Down(i32),
    Unchanged,
}

impl Ranking {
    pub fn scope(&self) -> Scope {
        Scope::new(self.scope_type, self.scope_id)
    }

    pub fn trend(&self) -> RankTrend {
        match (self.rank, self.previous_rank) {
            (None, _) => RankTrend::Unranked,
            (Some(_), None) => RankTrend::New,
            (Some(now), Some(before)) if now < before => RankTrend::Up(before - now),
            (Some(now), Some(before)) if now > before => RankTrend::Down(now - before),
            _ => RankTrend::Unchanged,
        }
    }
}

/// A ranking joined with the display fields of its location.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RankedLocation {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub ranking: Ranking,
    pub name: String,
    pub slug: String,
    pub city: String,
    pub address_street: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub rating: Option<f64>,
    pub review_count: i32,
}

/// Score distribution across the active members of a scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScopeStats {
    pub total_ranked: i64,
    pub avg_score: Option<f64>,
    pub max_score: Option<f64>,
    pub min_score: Option<f64>,
}

/// What one recomputation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScopeRecompute {
    pub scope: Scope,
    /// Active rankings numbered `1..=ranked`.
    pub ranked: u64,
    /// Rankings of inactive locations whose rank was withdrawn.
    pub cleared: u64,
}

/// One entry of a score batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSubmission {
    pub location_id: Uuid,
    pub scope: Scope,
    pub composite_score: f64,
}
