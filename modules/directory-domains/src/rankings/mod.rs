pub mod ledger;
pub mod models;

pub use ledger::RankingLedger;
pub use models::{RankTrend, RankedLocation, Ranking, ScopeRecompute, ScopeStats, ScoreSubmission};
