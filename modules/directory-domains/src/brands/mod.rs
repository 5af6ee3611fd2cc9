pub mod models;
pub mod rollup;

pub use models::{Brand, BrandStats};
pub use rollup::BrandRollup;
