pub mod ranking;

pub use ranking::{RankTrend, RankedLocation, Ranking, ScopeRecompute, ScopeStats, ScoreSubmission};
