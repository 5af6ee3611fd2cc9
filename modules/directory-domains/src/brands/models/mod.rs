pub mod brand;

pub use brand::{Brand, BrandStats};
